//! The Lane change Model with Relaxation and Synchronization.

use super::{
    acceleration_constraints, Cooperation, Desire, GapAcceptance, Incentive, IncentiveContext,
    IncentiveKind, MandatoryIncentive, SimpleOperationalPlan, Synchronization, TacticalPlanner,
    VoluntaryIncentive,
};
use crate::car_following::{follow_single_leader, CarFollowingModel, Leader, SpeedLimitInfo};
use crate::gtu::LaneChangeState;
use crate::network::{LateralDirection, RelativeLane};
use crate::parameters::{types::*, Parameters};
use crate::perception::{LanePerception, PerceivedGtu, Perceived, PerceptionSettings, Snapshot};
use crate::util::min_acc;
use crate::{GtuId, ParameterError, PlanError};
use log::trace;

/// Model structure of an [Lmrs] planner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LmrsSettings {
    pub synchronization: Synchronization,
    pub cooperation: Cooperation,
    pub gap_acceptance: GapAcceptance,
    /// Incentives in the order they are evaluated.
    pub incentives: Vec<IncentiveKind>,
    pub perception: PerceptionSettings,
}

impl Default for LmrsSettings {
    fn default() -> Self {
        Self {
            synchronization: Default::default(),
            cooperation: Default::default(),
            gap_acceptance: Default::default(),
            incentives: vec![
                IncentiveKind::Route,
                IncentiveKind::LaneDrop,
                IncentiveKind::SpeedGain,
                IncentiveKind::Keep,
                IncentiveKind::Courtesy,
            ],
            perception: Default::default(),
        }
    }
}

#[cfg(feature = "serde")]
impl LmrsSettings {
    /// Reads settings from JSON. Fields that are left out keep their default.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A tactical planner that follows the leader with a car-following model and changes lanes
/// when the combined desire of its incentives is high enough.
///
/// Desire below `dFree` is ignored. From `dSync` the GTU adapts its speed to the target lane
/// and from `dCoop` it indicates, so that GTUs on the target lane create a gap. After a new
/// leader cuts in, or after changing lanes itself, the desired headway is reduced and relaxes
/// back to `Tmax` with time constant `tau`.
#[derive(Debug)]
pub struct Lmrs {
    model: Box<dyn CarFollowingModel>,
    settings: LmrsSettings,
    perception: LanePerception,
    mandatory: Vec<Box<dyn MandatoryIncentive>>,
    voluntary: Vec<Box<dyn VoluntaryIncentive>>,
    last_leader: Option<GtuId>,
    desire: Desire,
}

impl Lmrs {
    pub fn new(model: Box<dyn CarFollowingModel>, settings: LmrsSettings) -> Self {
        let mut lmrs = Self {
            model,
            perception: LanePerception::new(settings.perception),
            mandatory: vec![],
            voluntary: vec![],
            last_leader: None,
            desire: Desire::ZERO,
            settings,
        };
        for kind in lmrs.settings.incentives.clone() {
            match kind.create() {
                Incentive::Mandatory(incentive) => lmrs.mandatory.push(incentive),
                Incentive::Voluntary(incentive) => lmrs.voluntary.push(incentive),
            }
        }
        lmrs
    }

    /// Adds a custom mandatory incentive.
    pub fn with_mandatory_incentive(mut self, incentive: Box<dyn MandatoryIncentive>) -> Self {
        self.mandatory.push(incentive);
        self
    }

    /// Adds a custom voluntary incentive.
    pub fn with_voluntary_incentive(mut self, incentive: Box<dyn VoluntaryIncentive>) -> Self {
        self.voluntary.push(incentive);
        self
    }

    pub fn settings(&self) -> &LmrsSettings {
        &self.settings
    }

    pub fn model(&self) -> &dyn CarFollowingModel {
        self.model.as_ref()
    }

    /// The desire determined in the last plan.
    pub fn desire(&self) -> Desire {
        self.desire
    }

    /// Combines the incentives into the lane change desire. Voluntary desire that opposes
    /// mandatory desire is suppressed as the mandatory desire grows from `dSync` to `dCoop`.
    fn lane_change_desire(
        &self,
        perceived: &Perceived,
        params: &Parameters,
    ) -> Result<Desire, PlanError> {
        let ctx = IncentiveContext {
            perceived,
            params,
            model: self.model.as_ref(),
        };
        let mut mandatory = Desire::ZERO;
        for incentive in &self.mandatory {
            mandatory = mandatory + incentive.determine_desire(&ctx, mandatory)?;
        }
        let mut voluntary = Desire::ZERO;
        for incentive in &self.voluntary {
            voluntary = voluntary + incentive.determine_desire(&ctx, mandatory, voluntary)?;
        }

        let dsync = params.get_parameter(&DSYNC)?;
        let dcoop = params.get_parameter(&DCOOP)?;
        let lambda = params.get_parameter(&LAMBDA_V)?;
        let theta = |m: f64, v: f64| {
            if m.abs() <= dsync || m * v >= 0.0 {
                1.0
            } else if m.abs() < dcoop {
                (dcoop - m.abs()) / (dcoop - dsync)
            } else {
                0.0
            }
        };
        let mut desire = Desire::new(
            mandatory.left + lambda * theta(mandatory.left, voluntary.left) * voluntary.left,
            mandatory.right + lambda * theta(mandatory.right, voluntary.right) * voluntary.right,
        );

        let infra = perceived.infrastructure()?;
        for dir in [LateralDirection::Left, LateralDirection::Right] {
            if !infra.is_accessible(dir) || infra.legal_lane_change_possibility(dir) <= 0.0 {
                desire.set(dir, 0.0);
            }
        }
        Ok(desire)
    }

    /// Car-following on a relative lane.
    fn follow(
        &self,
        perceived: &Perceived,
        params: &Parameters,
        info: &SpeedLimitInfo,
        lane: RelativeLane,
    ) -> Result<f64, PlanError> {
        let leaders = perceived
            .neighbors()?
            .leaders(lane)
            .iter()
            .map(PerceivedGtu::as_leader)
            .collect::<Vec<Leader>>();
        Ok(self
            .model
            .following_acceleration(params, perceived.ego().speed, info, &leaders)?)
    }
}

impl TacticalPlanner for Lmrs {
    fn generate_plan(
        &mut self,
        snapshot: &Snapshot,
        ego_id: GtuId,
        params: &mut Parameters,
    ) -> Result<SimpleOperationalPlan, PlanError> {
        let perceived = self.perception.perceive(snapshot, ego_id, params)?;
        let ego = *perceived.ego();
        let neighbors = perceived.neighbors()?;
        let info = perceived.infrastructure()?.speed_limit();
        let duration = params.get_parameter(&DT)?;

        // A leader that cut in is followed at a reduced headway
        let leader = neighbors.leader(RelativeLane::CURRENT);
        if let Some(leader) = leader {
            if self.last_leader != Some(leader.id) {
                if let Some(dlc) = leader.parameters.get_parameter_or_none(&DLC) {
                    set_desired_headway(params, dlc, false)?;
                }
            }
        }
        self.last_leader = leader.map(|leader| leader.id);

        let mut acc = self.follow(&perceived, params, &info, RelativeLane::CURRENT)?;

        if let LaneChangeState::Changing { direction, .. } = ego.lane_change {
            acc = min_acc(
                acc,
                self.follow(&perceived, params, &info, direction.relative_lane())?,
            );
            acc = min_acc(
                acc,
                acceleration_constraints(&perceived, params, self.model.as_ref())?,
            );
            commit_desire(params, direction)?;
            let mut plan = SimpleOperationalPlan::new(acc, duration).with_lane_change(direction);
            plan.set_indicator(direction);
            trace!("GTU {:?} continues lane change: {:?}", ego_id, plan);
            return Ok(plan);
        }

        let desire = self.lane_change_desire(&perceived, params)?;
        self.desire = desire;
        let (dir, d) = desire.dominant();
        let mut lane_change = LateralDirection::None;
        let mut indicator = LateralDirection::None;

        let dfree = params.get_parameter(&DFREE)?;
        let can_start = ego.lane_change == LaneChangeState::None;
        if can_start
            && d >= dfree
            && self.settings.gap_acceptance.accept_gap(
                &perceived,
                self.model.as_ref(),
                params,
                &info,
                d,
                dir,
            )?
        {
            lane_change = dir;
            indicator = dir;
            params.set_parameter(&DLC, d.min(1.0))?;
            set_desired_headway(params, d, false)?;
            // The target leader is not responded to as a new leader next step
            self.last_leader = neighbors.leader(dir.relative_lane()).map(|leader| leader.id);
            acc = min_acc(
                acc,
                self.follow(&perceived, params, &info, dir.relative_lane())?,
            );
        }

        if lane_change.is_none() {
            params.set_parameter(&DLEFT, desire.left)?;
            params.set_parameter(&DRIGHT, desire.right)?;

            let dsync = params.get_parameter(&DSYNC)?;
            let dcoop = params.get_parameter(&DCOOP)?;
            if d >= dsync {
                if d >= dcoop {
                    indicator = dir;
                }
                let sync = self.settings.synchronization.synchronize(
                    &perceived,
                    self.model.as_ref(),
                    params,
                    &info,
                    d,
                    dir,
                )?;
                acc = min_acc(acc, sync);
            }
            for side in [LateralDirection::Left, LateralDirection::Right] {
                let coop = self.settings.cooperation.cooperate(
                    &perceived,
                    self.model.as_ref(),
                    params,
                    &info,
                    side,
                    desire,
                )?;
                acc = min_acc(acc, coop);
            }
            relax_headway(params)?;
        } else {
            commit_desire(params, lane_change)?;
        }

        acc = min_acc(
            acc,
            acceleration_constraints(&perceived, params, self.model.as_ref())?,
        );
        let mut plan = SimpleOperationalPlan::new(acc, duration).with_lane_change(lane_change);
        plan.set_indicator(indicator);
        trace!("GTU {:?} desire {:?} plan {:?}", ego_id, desire, plan);
        Ok(plan)
    }
}

/// Lowers the desired headway `T` towards `Tmin` according to lane change desire.
///
/// With `resettable` the previous value can be restored with [Parameters::reset_parameter].
pub(super) fn set_desired_headway(
    params: &mut Parameters,
    desire: f64,
    resettable: bool,
) -> Result<(), ParameterError> {
    let limited = desire.clamp(0.0, 1.0);
    let tmin = params.get_parameter(&TMIN)?;
    let tmax = params.get_parameter(&TMAX)?;
    let desired = limited * tmin + (1.0 - limited) * tmax;
    let t = f64::min(desired, params.get_parameter(&T)?);
    if resettable {
        params.set_parameter_resettable(&T, t)
    } else {
        params.set_parameter(&T, t)
    }
}

/// Publishes full desire in the direction of a lane change that is underway.
fn commit_desire(params: &mut Parameters, dir: LateralDirection) -> Result<(), ParameterError> {
    let left = if dir == LateralDirection::Left { 1.0 } else { 0.0 };
    params.set_parameter(&DLEFT, left)?;
    params.set_parameter(&DRIGHT, 1.0 - left)
}

/// Relaxes the desired headway exponentially towards `Tmax`, approximated per time step.
fn relax_headway(params: &mut Parameters) -> Result<(), ParameterError> {
    let ratio = f64::min(params.get_parameter(&DT)? / params.get_parameter(&TAU)?, 1.0);
    let t = params.get_parameter(&T)?;
    let tmax = params.get_parameter(&TMAX)?;
    params.set_parameter(&T, t + (tmax - t) * ratio)
}

/// Car-following acceleration towards a single leader, with the headway lowered by desire.
pub(super) fn single_acceleration(
    params: &mut Parameters,
    model: &dyn CarFollowingModel,
    info: &SpeedLimitInfo,
    speed: f64,
    distance: f64,
    leader_speed: f64,
    desire: f64,
) -> Result<f64, ParameterError> {
    set_desired_headway(params, desire, true)?;
    let acc = follow_single_leader(model, params, speed, info, distance, leader_speed);
    params.reset_parameter(&T)?;
    acc
}

/// Limits deceleration to `b` below `dCoop`, and to between `b` and `bCrit` as desire
/// grows from `dCoop` to one.
pub(super) fn gentle_urgency(acc: f64, desire: f64, params: &Parameters) -> Result<f64, ParameterError> {
    let b = params.get_parameter(&B)?;
    if acc > -b {
        return Ok(acc);
    }
    let dcoop = params.get_parameter(&DCOOP)?;
    if desire < dcoop {
        return Ok(-b);
    }
    let bcrit = params.get_parameter(&BCRIT)?;
    let f = ((desire - dcoop) / (1.0 - dcoop)).clamp(0.0, 1.0);
    Ok(f64::max(acc, -b + (b - bcrit) * f))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn headway_follows_desire() {
        let mut params = Parameters::new();
        set_desired_headway(&mut params, 1.0, true).unwrap();
        assert_approx_eq!(params.get_parameter(&T).unwrap(), 0.56);
        params.reset_parameter(&T).unwrap();
        assert_approx_eq!(params.get_parameter(&T).unwrap(), 1.2);
        // never raised by low desire
        params.set_parameter(&T, 0.8).unwrap();
        set_desired_headway(&mut params, 0.0, false).unwrap();
        assert_approx_eq!(params.get_parameter(&T).unwrap(), 0.8);
    }

    #[test]
    fn headway_relaxes_to_tmax() {
        let mut params = Parameters::new();
        params.set_parameter(&T, 0.56).unwrap();
        relax_headway(&mut params).unwrap();
        // 0.56 + 0.64 * 0.5 / 25
        assert_approx_eq!(params.get_parameter(&T).unwrap(), 0.5728);
        for _ in 0..1000 {
            relax_headway(&mut params).unwrap();
        }
        assert_approx_eq!(params.get_parameter(&T).unwrap(), 1.2, 1e-6);
    }

    #[test]
    fn single_acceleration_restores_headway() {
        let mut params = Parameters::new();
        let info = SpeedLimitInfo {
            max_vehicle_speed: 50.0,
            speed_limit: 30.0,
        };
        let model = crate::car_following::IdmPlus;
        let relaxed =
            follow_single_leader(&model, &params, 20.0, &info, 30.0, 20.0).unwrap();
        let eager = single_acceleration(&mut params, &model, &info, 20.0, 30.0, 20.0, 1.0).unwrap();
        assert!(eager > relaxed);
        assert!(!params.contains(&T));
    }

    #[test]
    fn urgency_limits_deceleration() {
        let params = Parameters::new();
        assert_approx_eq!(gentle_urgency(-1.0, 0.9, &params).unwrap(), -1.0);
        assert_approx_eq!(gentle_urgency(-5.0, 0.5, &params).unwrap(), -2.09);
        assert_approx_eq!(gentle_urgency(-5.0, 1.0, &params).unwrap(), -3.5);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn settings_from_partial_json() {
        let settings =
            LmrsSettings::from_json(r#"{ "synchronization": "None", "incentives": ["Route", "Queue"] }"#)
                .unwrap();
        assert_eq!(settings.synchronization, Synchronization::None);
        assert_eq!(settings.incentives, vec![IncentiveKind::Route, IncentiveKind::Queue]);
        assert_eq!(settings.cooperation, Cooperation::default());
        assert_eq!(settings.perception, PerceptionSettings::default());
        assert!(LmrsSettings::from_json("{ \"incentives\": 3 }").is_err());
    }
}
