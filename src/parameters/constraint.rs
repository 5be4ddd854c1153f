use super::{ParameterType, Parameters};
use std::fmt;

/// A predicate a parameter value must satisfy.
#[derive(Clone, Copy)]
pub enum Constraint {
    /// `x > 0`
    Positive,
    /// `x >= 0`
    PositiveZero,
    /// `x < 0`
    Negative,
    /// `x <= 0`
    NegativeZero,
    /// `x != 0`
    NonZero,
    /// `0 <= x <= 1`
    UnitInterval,
    /// `x >= 1`
    AtLeastOne,
    /// Less than the currently stored value of another parameter, if it is stored.
    LessThan(&'static ParameterType),
    /// Greater than the currently stored value of another parameter, if it is stored.
    GreaterThan(&'static ParameterType),
    Custom {
        description: &'static str,
        check: fn(f64) -> bool,
    },
}

impl Constraint {
    /// Whether the value satisfies the constraint, given the other stored parameters.
    pub fn check(&self, value: f64, params: &Parameters) -> bool {
        match self {
            Self::Positive => value > 0.0,
            Self::PositiveZero => value >= 0.0,
            Self::Negative => value < 0.0,
            Self::NegativeZero => value <= 0.0,
            Self::NonZero => value != 0.0,
            Self::UnitInterval => (0.0..=1.0).contains(&value),
            Self::AtLeastOne => value >= 1.0,
            Self::LessThan(other) => params.stored(other.id).map_or(true, |o| value < o),
            Self::GreaterThan(other) => params.stored(other.id).map_or(true, |o| value > o),
            Self::Custom { check, .. } => check(value),
        }
    }

    /// A human readable description of the constraint.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Positive => "value must be positive",
            Self::PositiveZero => "value must be positive or zero",
            Self::Negative => "value must be negative",
            Self::NegativeZero => "value must be negative or zero",
            Self::NonZero => "value must be non-zero",
            Self::UnitInterval => "value must be in the range [0, 1]",
            Self::AtLeastOne => "value must be at least 1",
            Self::LessThan(_) => "value must be less than the related parameter",
            Self::GreaterThan(_) => "value must be greater than the related parameter",
            Self::Custom { description, .. } => *description,
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LessThan(other) => write!(f, "LessThan({})", other.id),
            Self::GreaterThan(other) => write!(f, "GreaterThan({})", other.id),
            other => f.write_str(other.description()),
        }
    }
}
