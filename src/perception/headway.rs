use crate::car_following::Leader;
use crate::network::{LateralDirection, LightState, Priority};
use crate::parameters::Parameters;
use crate::{ConflictId, GtuId, GtuTypeId, TrafficLightId};
use std::sync::Arc;

/// A snapshot of a nearby GTU, taken at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct PerceivedGtu {
    pub id: GtuId,
    pub gtu_type: GtuTypeId,
    /// Net distance: positive for leaders (to their rear), negative for followers
    /// (from their front), zero when alongside.
    pub distance: f64,
    pub length: f64,
    pub width: f64,
    pub speed: f64,
    pub acceleration: f64,
    pub max_speed: f64,
    /// The GTU's published parameters.
    pub parameters: Arc<Parameters>,
    /// The direction of the lane change the GTU is performing.
    pub lane_change: LateralDirection,
    pub indicator: LateralDirection,
}

impl PerceivedGtu {
    /// The net gap, regardless of whether the GTU is ahead or behind.
    pub fn gap(&self) -> f64 {
        self.distance.abs()
    }

    /// The GTU as a car-following leader.
    pub fn as_leader(&self) -> Leader {
        Leader {
            distance: self.distance,
            speed: self.speed,
        }
    }
}

/// A traffic light ahead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerceivedLight {
    pub id: TrafficLightId,
    /// Distance from the front of the GTU to the stop line, in m.
    pub distance: f64,
    pub state: LightState,
}

/// A GTU approaching a conflict on the conflicting lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConflictingGtu {
    pub id: GtuId,
    /// Distance from its front to the start of the conflict; negative once it has entered.
    pub distance: f64,
    pub speed: f64,
    pub length: f64,
}

/// A conflict ahead.
#[derive(Clone, Debug, PartialEq)]
pub struct PerceivedConflict {
    pub id: ConflictId,
    /// Distance from the front of the GTU to the start of the conflict, in m.
    pub distance: f64,
    /// Length of the conflict area along the lane, in m.
    pub length: f64,
    pub priority: Priority,
    /// Approaching GTUs on the conflicting lane, ordered by distance.
    pub conflicting: Vec<ConflictingGtu>,
}
