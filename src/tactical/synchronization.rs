use super::lmrs::{gentle_urgency, single_acceleration};
use super::Desire;
use crate::car_following::{CarFollowingModel, SpeedLimitInfo};
use crate::network::{LateralDirection, RelativeLane};
use crate::parameters::{types::*, Parameters};
use crate::perception::Perceived;
use crate::util::min_acc;
use crate::PlanError;

/// How a GTU adapts its speed to a lane change it cannot make yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Synchronization {
    /// No adaptation.
    None,
    /// Only stop before the point where the lane change must be made.
    DeadEnd,
    /// Stop before the point where the lane change must be made, and follow the leader on
    /// the target lane.
    #[default]
    Passive,
}

impl Synchronization {
    /// The acceleration to synchronize with the target lane in direction `dir`, or
    /// infinity if there is no constraint.
    pub fn synchronize(
        self,
        perceived: &Perceived,
        model: &dyn CarFollowingModel,
        params: &mut Parameters,
        info: &SpeedLimitInfo,
        desire: f64,
        dir: LateralDirection,
    ) -> Result<f64, PlanError> {
        match self {
            Self::None => Ok(f64::INFINITY),
            Self::DeadEnd => dead_end(perceived, params, dir),
            Self::Passive => {
                let mut acc = dead_end(perceived, params, dir)?;
                if acc < -params.get_parameter(&BCRIT)? {
                    return Ok(acc);
                }
                let dcoop = params.get_parameter(&DCOOP)?;
                let leaders = perceived.neighbors()?.leaders(dir.relative_lane());
                // With low desire, stationary GTUs are passed rather than synchronized with
                let leader = if desire >= dcoop {
                    leaders.first()
                } else {
                    leaders.iter().find(|gtu| gtu.speed > 0.0)
                };
                if let Some(leader) = leader {
                    let single = single_acceleration(
                        params,
                        model,
                        info,
                        perceived.ego().speed,
                        leader.distance,
                        leader.speed,
                        desire,
                    )?;
                    acc = gentle_urgency(min_acc(acc, single), desire, params)?;
                }
                Ok(acc)
            }
        }
    }
}

/// The distance within which the lane change in `dir` must be made.
fn remaining_distance(perceived: &Perceived, dir: LateralDirection) -> f64 {
    let Some(current) = perceived
        .try_infrastructure()
        .and_then(|infra| infra.lane(RelativeLane::CURRENT))
    else {
        return f64::INFINITY;
    };
    match current.route {
        Some(info) if info.lane_changes > 0 && info.direction == dir => info.remaining,
        Some(_) => f64::INFINITY,
        None => current.dead_end.unwrap_or(f64::INFINITY),
    }
}

/// Brakes critically to stop before the point where a lane change must be made, but
/// only once that cannot be done comfortably.
fn dead_end(
    perceived: &Perceived,
    params: &Parameters,
    dir: LateralDirection,
) -> Result<f64, PlanError> {
    let speed = perceived.ego().speed;
    let bcrit = params.get_parameter(&BCRIT)?;
    let remaining = remaining_distance(perceived, dir) - params.get_parameter(&S0)?;
    if remaining <= 0.0 {
        // Creep forward when stationary to avoid a deadlock
        return Ok(if speed > 0.0 { -bcrit } else { 1.0 });
    }
    let bmin = 0.5 * speed * speed / remaining;
    Ok(if bmin >= bcrit { -bmin } else { f64::INFINITY })
}

/// How a GTU helps adjacent GTUs that want to change into its lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cooperation {
    None,
    /// Create a gap by following an adjacent leader that indicates towards the current
    /// lane, with a deceleration of at most `b`.
    #[default]
    Passive,
}

impl Cooperation {
    /// The acceleration to cooperate with GTUs on the adjacent lane in `dir`, or infinity
    /// if there is no constraint.
    pub fn cooperate(
        self,
        perceived: &Perceived,
        model: &dyn CarFollowingModel,
        params: &mut Parameters,
        info: &SpeedLimitInfo,
        dir: LateralDirection,
        desire: Desire,
    ) -> Result<f64, PlanError> {
        if self == Self::None {
            return Ok(f64::INFINITY);
        }
        let Some(neighbors) = perceived.try_neighbors() else {
            return Ok(f64::INFINITY);
        };
        let dcoop = params.get_parameter(&DCOOP)?;
        let b = params.get_parameter(&B)?;
        let towards_us = dir.flip();
        let their_desire = match towards_us {
            LateralDirection::Left => &DLEFT,
            _ => &DRIGHT,
        };
        let mut acc = f64::INFINITY;
        for leader in neighbors.leaders(dir.relative_lane()) {
            let Some(d) = leader.parameters.get_parameter_or_none(their_desire) else {
                continue;
            };
            // Not when we want to go there more than they want to come here
            if d < dcoop || desire.get(dir) >= d {
                continue;
            }
            let single = single_acceleration(
                params,
                model,
                info,
                perceived.ego().speed,
                leader.distance,
                leader.speed,
                d,
            )?;
            acc = min_acc(acc, single);
        }
        Ok(if acc.is_finite() { f64::max(acc, -b) } else { acc })
    }
}
