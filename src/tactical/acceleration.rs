use crate::car_following::{approach_target_speed, stop, CarFollowingModel, SpeedLimitInfo};
use crate::network::{LightState, Priority, RelativeLane};
use crate::parameters::{types::*, Parameters};
use crate::perception::{PerceivedConflict, Perceived};
use crate::util::min_acc;
use crate::PlanError;

/// Speed at or below which a GTU counts as stopped, in m/s.
const STOPPED: f64 = 0.1;

/// The most restrictive acceleration from speed limits ahead, traffic lights, conflicts and
/// the end of the current lane. Infinity if nothing constrains the GTU.
///
/// Categories the GTU does not perceive impose no constraint.
pub fn acceleration_constraints(
    perceived: &Perceived,
    params: &Parameters,
    model: &dyn CarFollowingModel,
) -> Result<f64, PlanError> {
    let ego = perceived.ego();
    let speed = ego.speed;
    let mut acc = f64::INFINITY;

    if let Some(infra) = perceived.try_infrastructure() {
        let info = infra.speed_limit();
        for change in infra.speed_limit_changes() {
            let target = model.desired_speed(
                params,
                &SpeedLimitInfo {
                    speed_limit: change.speed_limit,
                    ..info
                },
            )?;
            if let Some(a) = approach_target_speed(params, speed, change.distance, target)? {
                acc = min_acc(acc, a);
            }
        }
        // A lane change in progress is bound by the target lane, not the end of this one
        let dead_end = infra
            .lane(RelativeLane::CURRENT)
            .and_then(|lane| lane.dead_end)
            .filter(|_| !ego.lane_change.is_changing());
        if let Some(distance) = dead_end {
            acc = min_acc(acc, stop(model, params, speed, &info, distance)?);
        }
    }

    if let (Some(intersection), Some(infra)) =
        (perceived.try_intersection(), perceived.try_infrastructure())
    {
        let info = infra.speed_limit();
        let bcrit = params.get_parameter(&BCRIT)?;
        for light in intersection.lights() {
            match light.state {
                LightState::Green => {}
                LightState::Red => {
                    acc = min_acc(acc, stop(model, params, speed, &info, light.distance)?);
                }
                LightState::Amber => {
                    // Drive on if stopping is not possible without braking critically
                    let a = stop(model, params, speed, &info, light.distance)?;
                    if a >= -bcrit {
                        acc = min_acc(acc, a);
                    }
                }
            }
        }
        for conflict in intersection.conflicts() {
            if conflict.distance > 0.0 && must_stop(conflict, speed, ego.length) {
                acc = min_acc(acc, stop(model, params, speed, &info, conflict.distance)?);
            }
        }
    }

    Ok(acc)
}

/// Whether the GTU has to stop before a conflict ahead.
fn must_stop(conflict: &PerceivedConflict, speed: f64, length: f64) -> bool {
    match conflict.priority {
        Priority::Priority => false,
        Priority::Stop => !conflict.conflicting.is_empty(),
        Priority::Yield => {
            // The time we need to clear the conflict, at no less than walking pace
            let clear = (conflict.distance + conflict.length + length) / f64::max(speed, 1.0);
            conflict.conflicting.iter().any(|gtu| {
                gtu.distance <= 0.0 || gtu.distance / f64::max(gtu.speed, STOPPED) < clear
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::perception::ConflictingGtu;
    use crate::ConflictId;

    fn conflict(priority: Priority, conflicting: Vec<ConflictingGtu>) -> PerceivedConflict {
        PerceivedConflict {
            id: ConflictId::default(),
            distance: 50.0,
            length: 5.0,
            priority,
            conflicting,
        }
    }

    fn approaching(distance: f64, speed: f64) -> ConflictingGtu {
        ConflictingGtu {
            id: Default::default(),
            distance,
            speed,
            length: 4.0,
        }
    }

    #[test]
    fn priority_is_ignored() {
        let c = conflict(Priority::Priority, vec![approaching(5.0, 10.0)]);
        assert!(!must_stop(&c, 10.0, 4.0));
    }

    #[test]
    fn yield_to_arriving_traffic() {
        // we clear in (50 + 5 + 4) / 10 = 5.9 s
        let close = conflict(Priority::Yield, vec![approaching(40.0, 10.0)]);
        assert!(must_stop(&close, 10.0, 4.0));
        let far = conflict(Priority::Yield, vec![approaching(200.0, 10.0)]);
        assert!(!must_stop(&far, 10.0, 4.0));
        // a queue standing still far away does not arrive in time
        let waiting = conflict(Priority::Yield, vec![approaching(30.0, 0.0)]);
        assert!(!must_stop(&waiting, 10.0, 4.0));
    }

    #[test]
    fn stop_until_clear() {
        assert!(must_stop(
            &conflict(Priority::Stop, vec![approaching(200.0, 10.0)]),
            10.0,
            4.0
        ));
        assert!(!must_stop(&conflict(Priority::Stop, vec![]), 10.0, 4.0));
    }
}
