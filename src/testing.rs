//! Small scenes of GTUs on straight parallel lanes, to perceive in unit tests.

use crate::gtu::{LaneBasedGtuCharacteristics, LmrsFactory};
use crate::gtu_type::CAR;
use crate::math::{LineSegment2d, Point2d};
use crate::network::{LaneAttributes, LateralDirection};
use crate::perception::{LanePerception, Perceived, PerceptionSettings};
use crate::{Compatibility, GtuId, GtuTypes, LaneId, LanePosition, Network, Parameters, Simulation};
use std::sync::Arc;

pub(crate) struct Scene {
    pub sim: Simulation,
    /// Left to right.
    pub lanes: Vec<LaneId>,
}

impl Scene {
    pub fn new(network: Network, lanes: Vec<LaneId>) -> Self {
        Self {
            sim: Simulation::new(network, GtuTypes::with_defaults()),
            lanes,
        }
    }

    /// Parallel lanes of `length` m in one link. Lanes that are not sinks are dead ends.
    pub fn road(count: usize, length: f64, sink: bool) -> Self {
        let mut network = Network::new();
        let lanes = (0..count)
            .map(|i| Self::lane(&mut network, 0.0, length, -3.5 * i as f64, sink))
            .collect::<Vec<_>>();
        network.add_link(&lanes).unwrap();
        Self::new(network, lanes)
    }

    /// Adds a straight lane from `x0` to `x1` at `y`, without a link.
    pub fn lane(network: &mut Network, x0: f64, x1: f64, y: f64, sink: bool) -> LaneId {
        network.add_lane(&LaneAttributes {
            curve: &LineSegment2d::from_ends(Point2d::new(x0, y), Point2d::new(x1, y)),
            width: 3.5,
            speed_limit: 25.0,
            compatibility: Compatibility::All,
            sink,
        })
    }

    pub fn car(&self, parameters: Parameters) -> LaneBasedGtuCharacteristics {
        LaneBasedGtuCharacteristics {
            gtu_type: self.sim.types().by_name(CAR).unwrap(),
            length: 4.0,
            width: 1.8,
            max_speed: 50.0,
            parameters,
            route: None,
            planner_factory: Arc::new(LmrsFactory::default()),
        }
    }

    /// Adds a car with default parameters on the lane with index `lane`.
    pub fn add(&mut self, lane: usize, position: f64, speed: f64) -> GtuId {
        self.add_car(self.car(Parameters::new()), lane, position, speed)
    }

    pub fn add_car(
        &mut self,
        characteristics: LaneBasedGtuCharacteristics,
        lane: usize,
        position: f64,
        speed: f64,
    ) -> GtuId {
        let position = LanePosition {
            lane: self.lanes[lane],
            position,
        };
        self.sim.add_gtu(characteristics, position, speed).unwrap()
    }

    pub fn indicate(&mut self, id: GtuId, indicator: LateralDirection) {
        self.sim.gtu_mut(id).unwrap().set_indicator(indicator);
    }

    /// What `id` perceives now with all perception categories.
    pub fn perceive(&self, id: GtuId) -> Perceived {
        self.perceive_with(id, PerceptionSettings::default())
    }

    pub fn perceive_with(&self, id: GtuId, settings: PerceptionSettings) -> Perceived {
        let params = self.sim.gtu(id).unwrap().parameters().clone();
        let perceived = LanePerception::new(settings)
            .perceive(&self.sim.snapshot(), id, &params)
            .unwrap();
        (*perceived).clone()
    }
}
