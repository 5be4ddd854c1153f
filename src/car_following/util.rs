use super::{CarFollowingModel, Leader, SpeedLimitInfo};
use crate::parameters::{types::B, Parameters};
use crate::ParameterError;
use log::warn;

/// The most negative acceleration ever used, in m/s<sup>2</sup>.
pub const ACCELERATION_FLOOR: f64 = -100.0;

/// Clamps an anomalous acceleration (`NaN` or below the floor) to the floor, logging a warning.
pub fn clamp_anomaly(acc: f64) -> f64 {
    if acc.is_nan() || acc < ACCELERATION_FLOOR {
        warn!(
            "acceleration {} is below the floor, clamped to {}",
            acc, ACCELERATION_FLOOR
        );
        ACCELERATION_FLOOR
    } else {
        acc
    }
}

/// The acceleration to follow a single leader.
pub fn follow_single_leader(
    model: &dyn CarFollowingModel,
    params: &Parameters,
    speed: f64,
    info: &SpeedLimitInfo,
    distance: f64,
    leader_speed: f64,
) -> Result<f64, ParameterError> {
    let leader = Leader {
        distance,
        speed: leader_speed,
    };
    model.following_acceleration(params, speed, info, &[leader])
}

/// The acceleration to stop at a given distance, as if following a stationary leader.
pub fn stop(
    model: &dyn CarFollowingModel,
    params: &Parameters,
    speed: f64,
    info: &SpeedLimitInfo,
    distance: f64,
) -> Result<f64, ParameterError> {
    follow_single_leader(model, params, speed, info, distance, 0.0)
}

/// The acceleration with nothing ahead.
pub fn free_acceleration(
    model: &dyn CarFollowingModel,
    params: &Parameters,
    speed: f64,
    info: &SpeedLimitInfo,
) -> Result<f64, ParameterError> {
    model.following_acceleration(params, speed, info, &[])
}

/// Calculates the acceleration needed to comfortably decelerate to a lower target speed
/// at the given distance ahead.
///
/// Returns `None` while the required deceleration is still below the comfortable
/// deceleration; the driver waits until it has to brake. The result is limited to twice
/// the comfortable deceleration.
///
/// # Parameters
/// * `speed` - The speed of the GTU (m/s).
/// * `distance` - The distance to where the target speed applies (m).
/// * `target_speed` - The target speed (m/s).
pub fn approach_target_speed(
    params: &Parameters,
    speed: f64,
    distance: f64,
    target_speed: f64,
) -> Result<Option<f64>, ParameterError> {
    if distance <= 0.0 || target_speed >= speed {
        return Ok(None);
    }
    let b = params.get_parameter(&B)?;
    let acc = (target_speed.powi(2) - speed.powi(2)) / (2. * distance);
    if acc <= -b {
        Ok(Some(f64::max(-2.0 * b, acc)))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn anomalies_are_clamped() {
        assert_eq!(clamp_anomaly(f64::NAN), ACCELERATION_FLOOR);
        assert_eq!(clamp_anomaly(f64::NEG_INFINITY), ACCELERATION_FLOOR);
        assert_eq!(clamp_anomaly(-150.0), ACCELERATION_FLOOR);
        assert_eq!(clamp_anomaly(-1.5), -1.5);
    }

    #[test]
    fn approach_target_speed_waits_until_needed() {
        let params = Parameters::new();
        // 20 -> 10 m/s needs 150/(2*200) = 0.375 m/s^2, less than b
        assert_eq!(approach_target_speed(&params, 20.0, 200.0, 10.0), Ok(None));
        // 20 -> 10 m/s over 50 m needs 3 m/s^2
        let acc = approach_target_speed(&params, 20.0, 50.0, 10.0)
            .unwrap()
            .unwrap();
        assert_approx_eq!(acc, -3.0);
        // limited to twice the comfortable deceleration
        let acc = approach_target_speed(&params, 30.0, 10.0, 0.0)
            .unwrap()
            .unwrap();
        assert_approx_eq!(acc, -4.18);
    }
}
