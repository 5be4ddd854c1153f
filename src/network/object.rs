use crate::{ConflictId, LaneId, TrafficLightId};

/// The state of a traffic light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightState {
    Red,
    Amber,
    Green,
}

/// A traffic light with its stop line on a lane.
#[derive(Clone, Debug)]
pub struct TrafficLight {
    pub(super) id: TrafficLightId,
    pub(super) lane: LaneId,
    pub(super) position: f64,
    pub(super) state: LightState,
}

impl TrafficLight {
    pub fn id(&self) -> TrafficLightId {
        self.id
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// The position of the stop line along the lane, in m.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn state(&self) -> LightState {
        self.state
    }
}

/// The right of way of a lane at a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Priority {
    /// Has right of way.
    Priority,
    /// Gives way to conflicting traffic.
    Yield,
    /// Stops at the conflict, then gives way.
    Stop,
}

/// One side of a conflict, as passed to [Network::add_conflict](super::Network::add_conflict).
#[derive(Clone, Copy, Debug)]
pub struct ConflictSide {
    pub lane: LaneId,
    /// The position of the start of the conflict area along the lane, in m.
    pub position: f64,
    /// The length of the conflict area along the lane, in m.
    pub length: f64,
    pub priority: Priority,
}

/// A point where a lane crosses or merges with another lane.
#[derive(Clone, Debug)]
pub struct Conflict {
    id: ConflictId,
    lane: LaneId,
    position: f64,
    length: f64,
    priority: Priority,
    /// The matching conflict on the other lane.
    pub(super) other: ConflictId,
}

impl Conflict {
    pub(super) fn new(id: ConflictId, side: &ConflictSide) -> Self {
        Self {
            id,
            lane: side.lane,
            position: side.position,
            length: side.length,
            priority: side.priority,
            other: ConflictId::default(),
        }
    }

    pub fn id(&self) -> ConflictId {
        self.id
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The matching conflict on the conflicting lane.
    pub fn other(&self) -> ConflictId {
        self.other
    }
}
