//! Car-following models.

use crate::parameters::{types::*, Parameters};
use crate::ParameterError;
use std::fmt::Debug;

pub use idm::{Idm, IdmPlus};
pub use util::{
    approach_target_speed, clamp_anomaly, follow_single_leader, free_acceleration, stop,
    ACCELERATION_FLOOR,
};

mod idm;
mod util;

/// The speed limits that determine a GTU's desired speed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedLimitInfo {
    /// The maximum speed of the vehicle, in m/s.
    pub max_vehicle_speed: f64,
    /// The legal speed limit, in m/s.
    pub speed_limit: f64,
}

/// A leader as seen by a car-following model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leader {
    /// The net gap to the leader, in m.
    pub distance: f64,
    /// The leader's speed, in m/s.
    pub speed: f64,
}

/// A model determining longitudinal acceleration from the situation ahead.
pub trait CarFollowingModel: Debug {
    /// The name of the model.
    fn name(&self) -> &'static str;

    /// The speed the driver wants to drive at.
    fn desired_speed(
        &self,
        params: &Parameters,
        info: &SpeedLimitInfo,
    ) -> Result<f64, ParameterError> {
        let fspeed = params.get_parameter(&FSPEED)?;
        Ok(f64::min(fspeed * info.speed_limit, info.max_vehicle_speed))
    }

    /// The desired net gap when following at the given speed.
    fn desired_headway(&self, params: &Parameters, speed: f64) -> Result<f64, ParameterError> {
        Ok(params.get_parameter(&S0)? + speed * params.get_parameter(&T)?)
    }

    /// Computes the acceleration given the leaders ahead, ordered by distance.
    /// Without leaders this is the free flow acceleration.
    fn following_acceleration(
        &self,
        params: &Parameters,
        speed: f64,
        info: &SpeedLimitInfo,
        leaders: &[Leader],
    ) -> Result<f64, ParameterError>;
}

/// The car-following models available to a GTU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CarFollowingKind {
    Idm,
    #[default]
    IdmPlus,
}

impl CarFollowingKind {
    /// Creates the model.
    pub fn create(self) -> Box<dyn CarFollowingModel> {
        match self {
            Self::Idm => Box::new(Idm),
            Self::IdmPlus => Box::new(IdmPlus),
        }
    }
}
