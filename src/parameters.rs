//! The per-driver behavioural parameter store.

use crate::ParameterError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use constraint::Constraint;

mod constraint;
pub mod types;

/// The physical dimension of a parameter value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dimension {
    /// In m/s<sup>2</sup>.
    Acceleration,
    /// In m/s.
    Speed,
    /// In m.
    Length,
    /// In s.
    Duration,
    Dimensionless,
}

/// A typed key into [Parameters].
pub struct ParameterType {
    /// Unique identifier.
    pub id: &'static str,
    pub description: &'static str,
    pub dimension: Dimension,
    /// The value returned when the parameter is not set.
    pub default: Option<f64>,
    /// Constraints every stored value must satisfy.
    pub constraints: &'static [Constraint],
}

impl ParameterType {
    /// Checks a value against all constraints of this type.
    pub fn check(&self, value: f64, params: &Parameters) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::ConstraintViolated {
                id: self.id,
                value,
                constraint: "value must be finite",
            });
        }
        match self.constraints.iter().find(|c| !c.check(value, params)) {
            Some(constraint) => Err(ParameterError::ConstraintViolated {
                id: self.id,
                value,
                constraint: constraint.description(),
            }),
            None => Ok(()),
        }
    }
}

impl PartialEq for ParameterType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterType({})", self.id)
    }
}

/// A set of parameter values.
///
/// Every stored value satisfies the constraints of its type at the time it was set.
/// Setting a value is atomic: a rejected value leaves the store unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters {
    values: HashMap<&'static str, f64>,
    /// Values that were replaced by a resettable set; `None` if there was no value.
    previous: HashMap<&'static str, Option<f64>>,
}

static DEFAULT_PARAMETERS: Lazy<Arc<Parameters>> = Lazy::new(|| {
    let mut params = Parameters::new();
    params.set_default_parameters(types::DEFAULTS);
    Arc::new(params)
});

impl Parameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Default::default()
    }

    /// A shared parameter set holding the default of every standard parameter type.
    pub fn defaults() -> Arc<Parameters> {
        DEFAULT_PARAMETERS.clone()
    }

    /// Gets a parameter value, falling back to the type's default.
    pub fn get_parameter(&self, ty: &ParameterType) -> Result<f64, ParameterError> {
        self.get_parameter_or_none(ty)
            .ok_or(ParameterError::Missing { id: ty.id })
    }

    /// Gets a parameter value or its default, or `None` if neither exists.
    pub fn get_parameter_or_none(&self, ty: &ParameterType) -> Option<f64> {
        self.values.get(ty.id).copied().or(ty.default)
    }

    /// Whether a value is explicitly set for the parameter.
    pub fn contains(&self, ty: &ParameterType) -> bool {
        self.values.contains_key(ty.id)
    }

    /// Sets a parameter value after checking it against the type's constraints.
    ///
    /// Cross-parameter constraints are checked against the other parameter's value as stored
    /// now; setting the other parameter later does not re-validate this one.
    pub fn set_parameter(&mut self, ty: &ParameterType, value: f64) -> Result<(), ParameterError> {
        ty.check(value, self)?;
        self.previous.remove(ty.id);
        self.values.insert(ty.id, value);
        Ok(())
    }

    /// Sets a parameter value that can later be undone with [Self::reset_parameter].
    pub fn set_parameter_resettable(
        &mut self,
        ty: &ParameterType,
        value: f64,
    ) -> Result<(), ParameterError> {
        ty.check(value, self)?;
        let old = self.values.insert(ty.id, value);
        self.previous.insert(ty.id, old);
        Ok(())
    }

    /// Restores the value a parameter had before its last resettable set.
    pub fn reset_parameter(&mut self, ty: &ParameterType) -> Result<(), ParameterError> {
        match self.previous.remove(ty.id) {
            Some(Some(value)) => {
                self.values.insert(ty.id, value);
                Ok(())
            }
            Some(None) => {
                self.values.remove(ty.id);
                Ok(())
            }
            None => Err(ParameterError::NotResettable { id: ty.id }),
        }
    }

    /// Stores the type's default value explicitly, if it has one.
    pub fn set_default_parameter(&mut self, ty: &ParameterType) -> Result<(), ParameterError> {
        match ty.default {
            Some(value) => self.set_parameter(ty, value),
            None => Err(ParameterError::Missing { id: ty.id }),
        }
    }

    /// Stores the defaults of all the given types, skipping those without a default.
    pub fn set_default_parameters(&mut self, types: &[&ParameterType]) {
        for ty in types {
            if let Some(value) = ty.default {
                // Defaults are stored without cross-checks, they are consistent by construction
                self.values.insert(ty.id, value);
            }
        }
    }

    /// Gets the value stored for a parameter id, ignoring defaults.
    pub(crate) fn stored(&self, id: &str) -> Option<f64> {
        self.values.get(id).copied()
    }
}

#[cfg(test)]
mod test {
    use super::types::*;
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    static TEST_LOW: ParameterType = ParameterType {
        id: "test low",
        description: "Lower bound.",
        dimension: Dimension::Speed,
        default: None,
        constraints: &[Constraint::LessThan(&TEST_HIGH)],
    };

    static TEST_HIGH: ParameterType = ParameterType {
        id: "test high",
        description: "Upper bound.",
        dimension: Dimension::Speed,
        default: None,
        constraints: &[Constraint::GreaterThan(&TEST_LOW)],
    };

    fn check(constraint: Constraint, valid: &[f64], invalid: &[f64]) {
        let params = Parameters::new();
        for v in valid {
            assert!(constraint.check(*v, &params), "{:?} rejects {}", constraint, v);
        }
        for v in invalid {
            assert!(!constraint.check(*v, &params), "{:?} accepts {}", constraint, v);
        }
    }

    #[test]
    fn constraints() {
        check(Constraint::Positive, &[0.1, 5.0], &[0.0, -0.1]);
        check(Constraint::PositiveZero, &[0.0, 5.0], &[-0.1]);
        check(Constraint::Negative, &[-0.1], &[0.0, 0.1]);
        check(Constraint::NegativeZero, &[0.0, -5.0], &[0.1]);
        check(Constraint::NonZero, &[-1.0, 1.0], &[0.0]);
        check(Constraint::UnitInterval, &[0.0, 0.5, 1.0], &[-0.1, 1.1]);
        check(Constraint::AtLeastOne, &[1.0, 2.0], &[0.99]);
    }

    #[test]
    fn missing_parameter() {
        let params = Parameters::new();
        assert_eq!(
            params.get_parameter(&TEST_LOW),
            Err(ParameterError::Missing { id: "test low" })
        );
        assert_approx_eq!(params.get_parameter(&A).unwrap(), 1.25);
    }

    #[test]
    fn rejected_value_is_not_stored() {
        let mut params = Parameters::new();
        params.set_parameter(&A, 2.0).unwrap();
        assert!(matches!(
            params.set_parameter(&A, -1.0),
            Err(ParameterError::ConstraintViolated { id: "a", .. })
        ));
        assert_approx_eq!(params.get_parameter(&A).unwrap(), 2.0);
        assert!(params.set_parameter(&A, f64::NAN).is_err());
    }

    #[test]
    fn cross_parameter_constraints() {
        let mut params = Parameters::new();
        params.set_parameter(&TEST_LOW, 10.0).unwrap();
        assert!(params.set_parameter(&TEST_HIGH, 5.0).is_err());
        params.set_parameter(&TEST_HIGH, 20.0).unwrap();
        assert!(params.set_parameter(&TEST_LOW, 25.0).is_err());
        params.set_parameter(&TEST_LOW, 15.0).unwrap();
        assert_approx_eq!(params.get_parameter(&TEST_LOW).unwrap(), 15.0);
    }

    static TEST_CAPPED: ParameterType = ParameterType {
        id: "test capped",
        description: "Bounded by another parameter.",
        dimension: Dimension::Length,
        default: None,
        constraints: &[Constraint::LessThan(&TEST_FREE)],
    };

    static TEST_FREE: ParameterType = ParameterType {
        id: "test free",
        description: "Unconstrained.",
        dimension: Dimension::Length,
        default: None,
        constraints: &[],
    };

    #[test]
    fn later_set_does_not_revalidate() {
        let mut params = Parameters::new();
        params.set_parameter(&TEST_CAPPED, 10.0).unwrap();
        params.set_parameter(&TEST_FREE, 5.0).unwrap();
        assert_approx_eq!(params.get_parameter(&TEST_CAPPED).unwrap(), 10.0);
        assert!(params.set_parameter(&TEST_CAPPED, 6.0).is_err());
    }

    #[test]
    fn resettable() {
        let mut params = Parameters::new();
        params.set_parameter(&T, 1.5).unwrap();
        params.set_parameter_resettable(&T, 0.8).unwrap();
        assert_approx_eq!(params.get_parameter(&T).unwrap(), 0.8);
        params.reset_parameter(&T).unwrap();
        assert_approx_eq!(params.get_parameter(&T).unwrap(), 1.5);
        assert_eq!(
            params.reset_parameter(&T),
            Err(ParameterError::NotResettable { id: "T" })
        );

        params.set_parameter_resettable(&S0, 5.0).unwrap();
        params.reset_parameter(&S0).unwrap();
        assert!(!params.contains(&S0));
    }

    #[test]
    fn shared_defaults() {
        let params = Parameters::defaults();
        for ty in DEFAULTS {
            assert!(params.contains(ty), "{:?} missing", ty);
            let value = params.get_parameter(ty).unwrap();
            ty.check(value, &Parameters::new()).unwrap();
        }
    }
}
