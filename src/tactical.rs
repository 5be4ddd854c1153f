//! Tactical planning: deciding on an acceleration and lane changes for the next time step.

use crate::car_following::clamp_anomaly;
use crate::network::LateralDirection;
use crate::parameters::Parameters;
use crate::perception::Snapshot;
use crate::util::min_acc;
use crate::{GtuId, PlanError};
use std::fmt::Debug;
use std::ops::{Add, Mul};

pub use acceleration::acceleration_constraints;
pub use gap_acceptance::GapAcceptance;
pub use incentives::{
    Incentive, IncentiveContext, IncentiveCourtesy, IncentiveKeep, IncentiveKind,
    IncentiveLaneDrop, IncentiveQueue, IncentiveRoute, IncentiveSpeedGain, MandatoryIncentive,
    VoluntaryIncentive,
};
pub use lmrs::{Lmrs, LmrsSettings};
pub use synchronization::{Cooperation, Synchronization};

mod acceleration;
mod gap_acceptance;
mod incentives;
mod lmrs;
mod synchronization;

/// The outcome of a tactical decision: an acceleration held for a duration, and whether
/// to (continue to) change lanes.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimpleOperationalPlan {
    acceleration: f64,
    duration: f64,
    lane_change: LateralDirection,
    indicator: LateralDirection,
}

impl SimpleOperationalPlan {
    /// Creates a plan without lane change. Anomalous accelerations are clamped to the floor.
    pub fn new(acceleration: f64, duration: f64) -> Self {
        Self {
            acceleration: clamp_anomaly(acceleration),
            duration,
            lane_change: LateralDirection::None,
            indicator: LateralDirection::None,
        }
    }

    pub fn with_lane_change(mut self, lane_change: LateralDirection) -> Self {
        self.lane_change = lane_change;
        self
    }

    /// Lowers the acceleration to `acceleration` if that is more restrictive.
    pub fn minimize_acceleration(&mut self, acceleration: f64) {
        self.acceleration = clamp_anomaly(min_acc(self.acceleration, acceleration));
    }

    pub fn set_indicator(&mut self, indicator: LateralDirection) {
        self.indicator = indicator;
    }

    /// The acceleration in m/s<sup>2</sup>.
    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// The duration in s.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn lane_change(&self) -> LateralDirection {
        self.lane_change
    }

    pub fn is_lane_change(&self) -> bool {
        !self.lane_change.is_none()
    }

    pub fn indicator(&self) -> LateralDirection {
        self.indicator
    }
}

/// Lane change desire to the left and right.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Desire {
    pub left: f64,
    pub right: f64,
}

impl Desire {
    pub const ZERO: Self = Self {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// The desire in a direction; zero for `None`.
    pub fn get(&self, dir: LateralDirection) -> f64 {
        match dir {
            LateralDirection::Left => self.left,
            LateralDirection::Right => self.right,
            LateralDirection::None => 0.0,
        }
    }

    pub fn set(&mut self, dir: LateralDirection, value: f64) {
        match dir {
            LateralDirection::Left => self.left = value,
            LateralDirection::Right => self.right = value,
            LateralDirection::None => {}
        }
    }

    /// The direction with the largest desire, left on a tie, and its value.
    pub fn dominant(&self) -> (LateralDirection, f64) {
        if self.left >= self.right {
            (LateralDirection::Left, self.left)
        } else {
            (LateralDirection::Right, self.right)
        }
    }
}

impl Add for Desire {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
        }
    }
}

impl Mul<f64> for Desire {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            left: self.left * rhs,
            right: self.right * rhs,
        }
    }
}

/// Decides what a GTU does next, given what it perceives.
pub trait TacticalPlanner: Debug {
    /// Generates the plan for the next time step.
    ///
    /// The planner may update the driver's `parameters`; the caller publishes them to other
    /// GTUs once the plan is applied.
    fn generate_plan(
        &mut self,
        snapshot: &Snapshot,
        ego: GtuId,
        parameters: &mut Parameters,
    ) -> Result<SimpleOperationalPlan, PlanError>;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::car_following::ACCELERATION_FLOOR;

    #[test]
    fn simple_plan_clamps_anomalies() {
        let plan = SimpleOperationalPlan::new(f64::NEG_INFINITY, 0.5);
        assert_eq!(plan.acceleration(), ACCELERATION_FLOOR);
        let mut plan = SimpleOperationalPlan::new(1.0, 0.5);
        plan.minimize_acceleration(f64::NAN);
        assert_eq!(plan.acceleration(), 1.0);
        plan.minimize_acceleration(-2.0);
        plan.minimize_acceleration(0.5);
        assert_eq!(plan.acceleration(), -2.0);
    }

    #[test]
    fn desire_arithmetic() {
        let d = Desire::new(0.2, 0.5) + Desire::new(0.1, -0.1) * 2.0;
        assert!((d.left - 0.4).abs() < 1e-12 && (d.right - 0.3).abs() < 1e-12);
        assert_eq!(d.dominant().0, LateralDirection::Left);
        assert_eq!(Desire::new(0.3, 0.3).dominant().0, LateralDirection::Left);
        assert_eq!(d.get(LateralDirection::None), 0.0);
    }
}
