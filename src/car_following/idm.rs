use super::{clamp_anomaly, CarFollowingModel, Leader, SpeedLimitInfo};
use crate::parameters::{types::*, Parameters};
use crate::ParameterError;

/// Gaps are clamped to at least this, so overlapping vehicles give a finite result, in m.
const MIN_GAP: f64 = 1e-3;

/// The Intelligent Driver Model.
#[derive(Clone, Copy, Debug, Default)]
pub struct Idm;

/// The IDM+, which takes the minimum of the free and interaction terms rather than their sum.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdmPlus;

/// The dimensionless free road term, limited so that it never decelerates harder than `b0`.
fn free_term(
    model: &dyn CarFollowingModel,
    params: &Parameters,
    speed: f64,
    info: &SpeedLimitInfo,
) -> Result<f64, ParameterError> {
    let a = params.get_parameter(&A)?;
    let b0 = params.get_parameter(&B0)?;
    let delta = params.get_parameter(&DELTA)?;
    let v0 = f64::max(model.desired_speed(params, info)?, f64::EPSILON);
    let term = 1. - (speed / v0).powf(delta);
    Ok(f64::max(term, -b0 / a))
}

/// The dimensionless interaction term `(s*/s)^2` for a leader.
fn interaction_term(
    model: &dyn CarFollowingModel,
    params: &Parameters,
    speed: f64,
    leader: &Leader,
) -> Result<f64, ParameterError> {
    let a = params.get_parameter(&A)?;
    let b = params.get_parameter(&B)?;
    let s0 = params.get_parameter(&S0)?;
    let appr = speed - leader.speed;
    let dynamic = model.desired_headway(params, speed)? - s0 + speed * appr / (2. * (a * b).sqrt());
    let s_star = s0 + f64::max(dynamic, 0.0);
    let gap = f64::max(leader.distance, MIN_GAP);
    Ok((s_star / gap).powi(2))
}

/// Applies `combine(free, interaction)` for every leader and takes the minimum.
fn acceleration(
    model: &dyn CarFollowingModel,
    params: &Parameters,
    speed: f64,
    info: &SpeedLimitInfo,
    leaders: &[Leader],
    combine: fn(f64, f64) -> f64,
) -> Result<f64, ParameterError> {
    let a = params.get_parameter(&A)?;
    let free = free_term(model, params, speed, info)?;
    let mut acc = a * free;
    for leader in leaders {
        let interaction = interaction_term(model, params, speed, leader)?;
        acc = f64::min(acc, a * combine(free, interaction));
    }
    Ok(clamp_anomaly(acc))
}

impl CarFollowingModel for Idm {
    fn name(&self) -> &'static str {
        "IDM"
    }

    fn following_acceleration(
        &self,
        params: &Parameters,
        speed: f64,
        info: &SpeedLimitInfo,
        leaders: &[Leader],
    ) -> Result<f64, ParameterError> {
        acceleration(self, params, speed, info, leaders, |free, interaction| {
            free - interaction
        })
    }
}

impl CarFollowingModel for IdmPlus {
    fn name(&self) -> &'static str {
        "IDM+"
    }

    fn following_acceleration(
        &self,
        params: &Parameters,
        speed: f64,
        info: &SpeedLimitInfo,
        leaders: &[Leader],
    ) -> Result<f64, ParameterError> {
        acceleration(self, params, speed, info, leaders, |free, interaction| {
            f64::min(free, 1. - interaction)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::car_following::{follow_single_leader, free_acceleration, ACCELERATION_FLOOR};
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng};

    const INFO: SpeedLimitInfo = SpeedLimitInfo {
        max_vehicle_speed: 50.0,
        speed_limit: 33.3,
    };

    #[test]
    fn idm_brakes_for_slower_leader() {
        let params = Parameters::new();
        let acc = follow_single_leader(&Idm, &params, 20.0, &INFO, 50.0, 15.0).unwrap();
        assert_approx_eq!(acc, -0.5905, 0.001);
        assert!(acc < 0.0 && acc >= -2.09 * 2.0);
    }

    #[test]
    fn idm_plus_brakes_for_slower_leader() {
        let params = Parameters::new();
        let acc = follow_single_leader(&IdmPlus, &params, 20.0, &INFO, 50.0, 15.0).unwrap();
        assert_approx_eq!(acc, -0.4281, 0.001);
    }

    #[test]
    fn free_flow_is_positive_and_bounded() {
        let params = Parameters::new();
        for model in [&Idm as &dyn CarFollowingModel, &IdmPlus] {
            for speed in [0.0, 10.0, 30.0] {
                let acc = free_acceleration(model, &params, speed, &INFO).unwrap();
                assert!(acc > 0.0 && acc <= 1.25, "{} at {}: {}", model.name(), speed, acc);
            }
        }
    }

    #[test]
    fn overspeed_is_limited_to_b0() {
        let params = Parameters::new();
        let acc = free_acceleration(&Idm, &params, 40.0, &INFO).unwrap();
        assert_approx_eq!(acc, -0.5);
    }

    #[test]
    fn overlap_is_finite() {
        let params = Parameters::new();
        for distance in [0.0, -5.0] {
            let acc = follow_single_leader(&Idm, &params, 20.0, &INFO, distance, 0.0).unwrap();
            assert_eq!(acc, ACCELERATION_FLOOR);
        }
    }

    #[test]
    fn closest_leader_binds() {
        let params = Parameters::new();
        let leaders = [
            Leader {
                distance: 20.0,
                speed: 10.0,
            },
            Leader {
                distance: 60.0,
                speed: 0.0,
            },
        ];
        let both = IdmPlus
            .following_acceleration(&params, 15.0, &INFO, &leaders)
            .unwrap();
        let first = follow_single_leader(&IdmPlus, &params, 15.0, &INFO, 20.0, 10.0).unwrap();
        let second = follow_single_leader(&IdmPlus, &params, 15.0, &INFO, 60.0, 0.0).unwrap();
        assert_approx_eq!(both, f64::min(first, second));
    }

    #[test]
    fn bounded_and_monotonic_in_gap() {
        let params = Parameters::new();
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let speed = rng.gen_range(0.0..40.0);
            let leader_speed = rng.gen_range(0.0..40.0);
            let gap = rng.gen_range(0.0..200.0);
            let more = gap + rng.gen_range(0.0..50.0);
            for model in [&Idm as &dyn CarFollowingModel, &IdmPlus] {
                let a1 =
                    follow_single_leader(model, &params, speed, &INFO, gap, leader_speed).unwrap();
                let a2 =
                    follow_single_leader(model, &params, speed, &INFO, more, leader_speed).unwrap();
                assert!(a1.is_finite() && a1 >= ACCELERATION_FLOOR);
                assert!(a2 >= a1, "{}: {} < {}", model.name(), a2, a1);
            }
        }
    }
}
