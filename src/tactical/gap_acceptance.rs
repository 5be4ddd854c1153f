use super::lmrs::{set_desired_headway, single_acceleration};
use crate::car_following::{follow_single_leader, CarFollowingModel, SpeedLimitInfo};
use crate::network::LateralDirection;
use crate::parameters::{types::*, Parameters};
use crate::perception::Perceived;
use crate::PlanError;

/// How a GTU judges whether the gap on the target lane is large enough.
///
/// In all variants a lane change is rejected when a GTU on the target lane is alongside,
/// when the net gap to the target leader or follower is below `LC_MIN_GAP`, or when either
/// the GTU itself or its new follower would have to decelerate harder than `b * desire`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GapAcceptance {
    /// The new follower's response is computed with its own published parameters.
    #[default]
    Informed,
    /// The new follower's response is computed with the GTU's own parameters.
    EgoHeadway,
}

impl GapAcceptance {
    /// Whether the gap in direction `dir` is acceptable at the given desire.
    pub fn accept_gap(
        self,
        perceived: &Perceived,
        model: &dyn CarFollowingModel,
        params: &mut Parameters,
        info: &SpeedLimitInfo,
        desire: f64,
        dir: LateralDirection,
    ) -> Result<bool, PlanError> {
        let neighbors = perceived.neighbors()?;
        let ego = perceived.ego();
        let lane = dir.relative_lane();
        if neighbors.lane(lane).is_none() || neighbors.is_gtu_alongside(lane) {
            return Ok(false);
        }
        let min_gap = params.get_parameter(&LC_MIN_GAP)?;
        let threshold = -params.get_parameter(&B)? * desire;

        if let Some(leader) = neighbors.leader(lane) {
            if leader.gap() < min_gap {
                return Ok(false);
            }
            let own = single_acceleration(
                params,
                model,
                info,
                ego.speed,
                leader.distance,
                leader.speed,
                desire,
            )?;
            if own < threshold {
                return Ok(false);
            }
        }

        if let Some(follower) = neighbors.follower(lane) {
            if follower.gap() < min_gap {
                return Ok(false);
            }
            let mut follower_params = match self {
                Self::Informed => (*follower.parameters).clone(),
                Self::EgoHeadway => params.clone(),
            };
            set_desired_headway(&mut follower_params, desire, true)?;
            let follower_info = SpeedLimitInfo {
                max_vehicle_speed: follower.max_speed,
                ..*info
            };
            let response = follow_single_leader(
                model,
                &follower_params,
                follower.speed,
                &follower_info,
                follower.gap(),
                ego.speed,
            )?;
            if response < threshold {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
