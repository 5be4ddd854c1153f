pub use cgmath;
pub use error::{Error, NetworkError, ParameterError, PlanError};
pub use gtu::{LaneBasedGtu, LaneBasedGtuCharacteristics, LanePosition};
pub use gtu_type::{Compatibility, GtuType, GtuTypes};
pub use network::{LateralDirection, Network, RelativeLane};
pub use parameters::types as parameter_types;
pub use parameters::{ParameterType, Parameters};
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use tactical::{SimpleOperationalPlan, TacticalPlanner};
pub use util::Interval;

pub mod car_following;
mod error;
pub mod gtu;
pub mod gtu_type;
pub mod math;
pub mod network;
pub mod parameters;
pub mod perception;
pub mod plan;
pub mod schedule;
mod simulation;
pub mod tactical;
#[cfg(test)]
mod testing;
mod util;

new_key_type! {
    /// Unique ID of a [Lane](network::Lane).
    pub struct LaneId;
    /// Unique ID of a [Link](network::Link).
    pub struct LinkId;
    /// Unique ID of a [LaneBasedGtu].
    pub struct GtuId;
    /// Unique ID of a [GtuType].
    pub struct GtuTypeId;
    /// Unique ID of a [TrafficLight](network::TrafficLight).
    pub struct TrafficLightId;
    /// Unique ID of a [Conflict](network::Conflict).
    pub struct ConflictId;
    /// Unique ID of a [Platoon](gtu::Platoon).
    pub struct PlatoonId;
    /// Unique ID of a scheduled event.
    pub struct EventId;
}

/// The GTUs of a simulation.
pub type GtuSet = SlotMap<GtuId, LaneBasedGtu>;
