use crate::math::Point2d;
use crate::network::{LateralDirection, Network, Route};
use crate::parameters::Parameters;
use crate::plan::LaneBasedOperationalPlan;
use crate::tactical::TacticalPlanner;
use crate::{EventId, GtuId, GtuTypeId, LaneId, NetworkError, PlatoonId};
use log::debug;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

pub use characteristics::{
    GtuTemplate, LaneBasedGtuCharacteristics, LaneBasedGtuCharacteristicsGenerator, LmrsFactory,
    PlannerFactory,
};

mod characteristics;

/// Lateral progress at or above this completes a lane change.
const LANE_CHANGE_DONE: f64 = 1.0 - 1e-9;

/// A longitudinal position on a lane.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LanePosition {
    pub lane: LaneId,
    /// The position of the GTU's front along the lane, in m.
    pub position: f64,
}

/// The lateral manoeuvre a GTU is performing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum LaneChangeState {
    #[default]
    None,
    /// Moving towards `target`, registered on both the source and target lane.
    Changing {
        direction: LateralDirection,
        target: LaneId,
        /// Lateral progress in [0, 1].
        progress: f64,
    },
    /// On the new lane, waiting for the rest of the platoon to complete.
    AwaitingGroup { direction: LateralDirection },
}

impl LaneChangeState {
    /// The direction of the manoeuvre, or `None` if there is none.
    pub fn direction(&self) -> LateralDirection {
        match self {
            Self::None => LateralDirection::None,
            Self::Changing { direction, .. } | Self::AwaitingGroup { direction } => *direction,
        }
    }

    /// Whether the GTU is moving between two lanes.
    pub fn is_changing(&self) -> bool {
        matches!(self, Self::Changing { .. })
    }
}

/// The speed and acceleration of a GTU at a point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KinematicState {
    pub time: f64,
    pub speed: f64,
    pub acceleration: f64,
}

/// The lane registrations that changed while advancing a GTU.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Movement {
    /// Lanes the GTU is no longer registered on.
    pub left: SmallVec<[LaneId; 4]>,
    /// Lanes the GTU is newly registered on.
    pub entered: SmallVec<[LaneId; 4]>,
    /// The direction of a lane change that completed.
    pub lane_change_completed: Option<LateralDirection>,
    /// Whether the rear of the GTU passed the end of a sink lane.
    pub exited: bool,
}

/// A group of GTUs that complete their lane changes together.
#[derive(Clone, Debug, Default)]
pub struct Platoon {
    pub(crate) members: Vec<GtuId>,
    /// The number of members that completed the current lane change.
    pub(crate) completed: usize,
}

impl Platoon {
    pub fn members(&self) -> &[GtuId] {
        &self.members
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Counts a completed lane change, returning true and resetting when all members are done.
    pub(crate) fn complete_one(&mut self) -> bool {
        self.completed += 1;
        if self.completed >= self.members.len() {
            self.completed = 0;
            true
        } else {
            false
        }
    }
}

/// A GTU driving on lanes.
pub struct LaneBasedGtu {
    id: GtuId,
    gtu_type: GtuTypeId,
    /// Length in m.
    length: f64,
    /// Width in m.
    width: f64,
    /// Maximum speed in m/s.
    max_speed: f64,
    /// The driver's parameters as last published by the planner.
    parameters: Arc<Parameters>,
    route: Option<Route>,
    /// Taken out while planning.
    pub(crate) planner: Option<Box<dyn TacticalPlanner>>,
    state: KinematicState,
    /// Lane positions at `state.time`; the first is the reference lane, the second the
    /// target lane during a lane change.
    registrations: SmallVec<[LanePosition; 2]>,
    lane_change: LaneChangeState,
    indicator: LateralDirection,
    plan: Option<LaneBasedOperationalPlan>,
    pub(crate) platoon: Option<PlatoonId>,
    /// The pending re-plan event.
    pub(crate) next_event: Option<EventId>,
}

impl std::fmt::Debug for LaneBasedGtu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaneBasedGtu")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("registrations", &self.registrations)
            .field("lane_change", &self.lane_change)
            .finish()
    }
}

impl LaneBasedGtu {
    pub(crate) fn new(
        id: GtuId,
        characteristics: LaneBasedGtuCharacteristics,
        position: LanePosition,
        speed: f64,
        time: f64,
    ) -> Self {
        let planner = characteristics.planner_factory.create();
        Self {
            id,
            gtu_type: characteristics.gtu_type,
            length: characteristics.length,
            width: characteristics.width,
            max_speed: characteristics.max_speed,
            parameters: Arc::new(characteristics.parameters),
            route: characteristics.route,
            planner: Some(planner),
            state: KinematicState {
                time,
                speed,
                acceleration: 0.0,
            },
            registrations: smallvec![position],
            lane_change: LaneChangeState::None,
            indicator: LateralDirection::None,
            plan: None,
            platoon: None,
            next_event: None,
        }
    }

    pub fn id(&self) -> GtuId {
        self.id
    }

    pub fn gtu_type(&self) -> GtuTypeId {
        self.gtu_type
    }

    /// The length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The width in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The maximum speed in m/s.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn parameters(&self) -> &Arc<Parameters> {
        &self.parameters
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// The state at the last time the GTU was advanced.
    pub fn state(&self) -> KinematicState {
        self.state
    }

    /// The reference lane and front position, at the last time the GTU was advanced.
    pub fn reference(&self) -> LanePosition {
        self.registrations[0]
    }

    pub fn registrations(&self) -> &[LanePosition] {
        &self.registrations
    }

    pub fn lane_change(&self) -> LaneChangeState {
        self.lane_change
    }

    pub fn indicator(&self) -> LateralDirection {
        self.indicator
    }

    /// The operational plan being executed.
    pub fn plan(&self) -> Option<&LaneBasedOperationalPlan> {
        self.plan.as_ref()
    }

    pub fn platoon(&self) -> Option<PlatoonId> {
        self.platoon
    }

    /// The distance travelled from the last advance until `t`.
    fn travelled(&self, t: f64) -> f64 {
        self.plan.as_ref().map_or(0.0, |plan| {
            let plan = plan.plan();
            f64::max(plan.distance_at(t) - plan.distance_at(self.state.time), 0.0)
        })
    }

    /// The front position at time `t` on a lane the GTU is registered on.
    pub fn position_on(&self, lane: LaneId, t: f64) -> Option<f64> {
        self.registrations
            .iter()
            .find(|reg| reg.lane == lane)
            .map(|reg| reg.position + self.travelled(t))
    }

    pub fn speed_at(&self, t: f64) -> f64 {
        self.plan
            .as_ref()
            .map_or(self.state.speed, |plan| plan.plan().speed_at(t))
    }

    pub fn acceleration_at(&self, t: f64) -> f64 {
        self.plan
            .as_ref()
            .map_or(self.state.acceleration, |plan| plan.plan().acceleration_at(t))
    }

    /// The world coordinates of the front of the GTU at time `t`, if it has a plan.
    pub fn location_at(&self, t: f64) -> Option<Point2d> {
        self.plan.as_ref().map(|plan| plan.plan().location_at(t).pos)
    }

    /// Moves the GTU along its plan to time `now`, following the lanes of the plan.
    pub(crate) fn advance(&mut self, now: f64, network: &Network) -> Result<Movement, NetworkError> {
        let mut movement = Movement::default();
        let Some(plan) = &self.plan else {
            self.state.time = now;
            return Ok(movement);
        };
        let travelled = self.travelled(now);

        let mut registrations: SmallVec<[LanePosition; 2]> = SmallVec::new();
        for (idx, reg) in self.registrations.iter().enumerate() {
            let lanes = if idx == 0 {
                plan.lanes()
            } else {
                plan.target_lanes()
            };
            let mut lane = reg.lane;
            let mut position = reg.position + travelled;
            let mut at = lanes.iter().position(|id| *id == lane);
            loop {
                let length = network.lane(lane)?.length();
                let next = at.and_then(|i| lanes.get(i + 1)).copied();
                match next {
                    Some(next) if position > length => {
                        position -= length;
                        movement.left.push(lane);
                        movement.entered.push(next);
                        lane = next;
                        at = at.map(|i| i + 1);
                    }
                    _ => break,
                }
            }
            registrations.push(LanePosition { lane, position });
        }
        let lane_change_progress = plan.lane_change_progress_at(now);
        let state = KinematicState {
            time: now,
            speed: plan.plan().speed_at(now),
            acceleration: plan.plan().acceleration_at(now),
        };

        if let LaneChangeState::Changing {
            direction,
            progress,
            ..
        } = self.lane_change
        {
            let progress = lane_change_progress.unwrap_or(progress);
            if progress >= LANE_CHANGE_DONE && registrations.len() > 1 {
                let source = registrations.remove(0);
                movement.left.push(source.lane);
                movement.lane_change_completed = Some(direction);
                self.lane_change = LaneChangeState::None;
                debug!("GTU {:?} completed a lane change {:?}", self.id, direction);
            } else if let Some(target) = registrations.get(1) {
                self.lane_change = LaneChangeState::Changing {
                    direction,
                    target: target.lane,
                    progress,
                };
            }
        }

        let reference = registrations[0];
        let lane = network.lane(reference.lane)?;
        movement.exited = lane.is_sink()
            && lane.successors().is_empty()
            && reference.position - self.length >= lane.length();

        self.state = state;
        self.registrations = registrations;
        Ok(movement)
    }

    /// Registers the GTU on the lane it starts changing to.
    pub(crate) fn start_lane_change(&mut self, direction: LateralDirection, target: LanePosition) {
        debug!(
            "GTU {:?} starts a lane change {:?} to {:?}",
            self.id, direction, target.lane
        );
        self.registrations.truncate(1);
        self.registrations.push(target);
        self.lane_change = LaneChangeState::Changing {
            direction,
            target: target.lane,
            progress: 0.0,
        };
    }

    /// Marks the lane change as completed by the whole platoon.
    pub(crate) fn finish_group_lane_change(&mut self) {
        if let LaneChangeState::AwaitingGroup { .. } = self.lane_change {
            self.lane_change = LaneChangeState::None;
        }
    }

    pub(crate) fn await_group(&mut self, direction: LateralDirection) {
        self.lane_change = LaneChangeState::AwaitingGroup { direction };
    }

    pub(crate) fn set_plan(
        &mut self,
        plan: LaneBasedOperationalPlan,
        parameters: Parameters,
        indicator: LateralDirection,
    ) {
        self.parameters = Arc::new(parameters);
        self.indicator = indicator;
        self.plan = Some(plan);
    }

    #[cfg(test)]
    pub(crate) fn set_indicator(&mut self, indicator: LateralDirection) {
        self.indicator = indicator;
    }
}
