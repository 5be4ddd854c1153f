use crate::car_following::CarFollowingKind;
use crate::network::Route;
use crate::parameters::{types::FSPEED, Parameters};
use crate::tactical::{Lmrs, LmrsSettings, TacticalPlanner};
use crate::util::Interval;
use crate::{GtuTypeId, ParameterError};
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::fmt::Debug;
use std::sync::Arc;

/// Creates the tactical planner of a new GTU.
pub trait PlannerFactory: Debug {
    fn create(&self) -> Box<dyn TacticalPlanner>;
}

/// Creates [Lmrs] planners.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LmrsFactory {
    pub model: CarFollowingKind,
    pub settings: LmrsSettings,
}

impl PlannerFactory for LmrsFactory {
    fn create(&self) -> Box<dyn TacticalPlanner> {
        Box::new(Lmrs::new(self.model.create(), self.settings.clone()))
    }
}

/// Everything needed to place a GTU on the network.
#[derive(Clone, Debug)]
pub struct LaneBasedGtuCharacteristics {
    pub gtu_type: GtuTypeId,
    /// Length in m.
    pub length: f64,
    /// Width in m.
    pub width: f64,
    /// Maximum speed in m/s.
    pub max_speed: f64,
    pub parameters: Parameters,
    pub route: Option<Route>,
    pub planner_factory: Arc<dyn PlannerFactory>,
}

/// The ranges GTU characteristics are drawn from.
#[derive(Clone, Debug)]
pub struct GtuTemplate {
    pub gtu_type: GtuTypeId,
    /// Length in m, drawn uniformly.
    pub length: Interval<f64>,
    /// Width in m, drawn uniformly.
    pub width: Interval<f64>,
    /// Maximum speed in m/s, drawn uniformly.
    pub max_speed: Interval<f64>,
    /// Standard deviation of the speed limit adherence factor, which is normally distributed
    /// around 1 and kept within [0.75, 1.25].
    pub speed_factor_stddev: f64,
    /// Parameters shared by all drawn GTUs.
    pub parameters: Parameters,
}

/// Draws GTU characteristics from weighted templates.
#[derive(Debug)]
pub struct LaneBasedGtuCharacteristicsGenerator<R: Rng> {
    rng: R,
    templates: Vec<(GtuTemplate, Normal<f64>)>,
    choice: WeightedIndex<f64>,
    route: Option<Route>,
    planner_factory: Arc<dyn PlannerFactory>,
}

impl<R: Rng> LaneBasedGtuCharacteristicsGenerator<R> {
    /// Creates a generator drawing each template with probability proportional to its weight.
    pub fn new(
        rng: R,
        templates: Vec<(GtuTemplate, f64)>,
        route: Option<Route>,
        planner_factory: Arc<dyn PlannerFactory>,
    ) -> Result<Self, ParameterError> {
        let choice = WeightedIndex::new(templates.iter().map(|(_, weight)| *weight)).map_err(
            |_| ParameterError::ConstraintViolated {
                id: "weight",
                value: templates.iter().map(|(_, weight)| *weight).sum(),
                constraint: "at least one template with a positive weight",
            },
        )?;
        let templates = templates
            .into_iter()
            .map(|(template, _)| {
                let stddev = template.speed_factor_stddev;
                Normal::new(1.0, stddev)
                    .map(|distr| (template, distr))
                    .map_err(|_| ParameterError::ConstraintViolated {
                        id: FSPEED.id,
                        value: stddev,
                        constraint: "standard deviation must be finite and non-negative",
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rng,
            templates,
            choice,
            route,
            planner_factory,
        })
    }

    /// Draws the characteristics of the next GTU.
    pub fn draw(&mut self) -> Result<LaneBasedGtuCharacteristics, ParameterError> {
        let (template, distr) = &self.templates[self.choice.sample(&mut self.rng)];
        let mut parameters = template.parameters.clone();
        let factor = distr.sample(&mut self.rng).clamp(0.75, 1.25);
        parameters.set_parameter(&FSPEED, factor)?;
        let mut uniform = |range: Interval<f64>| {
            if range.max > range.min {
                self.rng.gen_range(range.min..=range.max)
            } else {
                range.min
            }
        };
        Ok(LaneBasedGtuCharacteristics {
            gtu_type: template.gtu_type,
            length: uniform(template.length),
            width: uniform(template.width),
            max_speed: uniform(template.max_speed),
            parameters,
            route: self.route.clone(),
            planner_factory: self.planner_factory.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::GtuTypes;
    use rand::SeedableRng;

    fn template(types: &GtuTypes, name: &str, length: f64) -> GtuTemplate {
        GtuTemplate {
            gtu_type: types.by_name(name).unwrap(),
            length: Interval::new(length, length + 2.0),
            width: Interval::new(2.0, 2.0),
            max_speed: Interval::new(30.0, 40.0),
            speed_factor_stddev: 0.1,
            parameters: Parameters::new(),
        }
    }

    #[test]
    fn draws_within_ranges() {
        let types = GtuTypes::with_defaults();
        let rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut generator = LaneBasedGtuCharacteristicsGenerator::new(
            rng,
            vec![
                (template(&types, crate::gtu_type::CAR, 4.0), 0.8),
                (template(&types, crate::gtu_type::TRUCK, 12.0), 0.2),
            ],
            None,
            Arc::new(LmrsFactory::default()),
        )
        .unwrap();
        let mut trucks = 0;
        for _ in 0..200 {
            let drawn = generator.draw().unwrap();
            let fspeed = drawn.parameters.get_parameter(&FSPEED).unwrap();
            assert!((0.75..=1.25).contains(&fspeed));
            assert!((30.0..=40.0).contains(&drawn.max_speed));
            assert_eq!(drawn.width, 2.0);
            if drawn.gtu_type == types.by_name(crate::gtu_type::TRUCK).unwrap() {
                assert!(drawn.length >= 12.0);
                trucks += 1;
            } else {
                assert!(drawn.length <= 6.0);
            }
        }
        assert!(trucks > 10 && trucks < 80, "{}", trucks);
    }

    #[test]
    fn rejects_invalid_templates() {
        let types = GtuTypes::with_defaults();
        let rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut bad = template(&types, crate::gtu_type::CAR, 4.0);
        bad.speed_factor_stddev = -1.0;
        let factory: Arc<dyn PlannerFactory> = Arc::new(LmrsFactory::default());
        assert!(LaneBasedGtuCharacteristicsGenerator::new(
            rng.clone(),
            vec![(bad, 1.0)],
            None,
            factory.clone()
        )
        .is_err());
        assert!(LaneBasedGtuCharacteristicsGenerator::new(rng, vec![], None, factory).is_err());
    }
}
