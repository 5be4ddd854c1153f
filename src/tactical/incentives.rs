//! Lane change incentives. Mandatory incentives follow from the route and the lanes
//! ahead, voluntary incentives from the traffic around the GTU.

use super::Desire;
use crate::car_following::{CarFollowingModel, Leader, SpeedLimitInfo};
use crate::network::{LateralDirection, LightState, RelativeLane};
use crate::parameters::{types::*, Parameters};
use crate::perception::{LaneInfrastructure, PerceivedGtu, Perceived};
use crate::PlanError;
use std::fmt::Debug;

/// What an incentive bases its desire on.
#[derive(Clone, Copy)]
pub struct IncentiveContext<'a> {
    pub perceived: &'a Perceived,
    pub params: &'a Parameters,
    pub model: &'a dyn CarFollowingModel,
}

/// An incentive that makes lane changes necessary, such as following the route.
pub trait MandatoryIncentive: Debug {
    /// Determines the desire given the mandatory desire of the incentives before it.
    fn determine_desire(
        &self,
        ctx: &IncentiveContext,
        mandatory: Desire,
    ) -> Result<Desire, PlanError>;
}

/// An incentive that makes lane changes attractive, such as driving faster.
pub trait VoluntaryIncentive: Debug {
    /// Determines the desire given the total mandatory desire and the voluntary desire of
    /// the incentives before it.
    fn determine_desire(
        &self,
        ctx: &IncentiveContext,
        mandatory: Desire,
        voluntary: Desire,
    ) -> Result<Desire, PlanError>;
}

/// The built-in incentives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IncentiveKind {
    Route,
    LaneDrop,
    SpeedGain,
    Keep,
    Courtesy,
    Queue,
}

/// A created incentive.
#[derive(Debug)]
pub enum Incentive {
    Mandatory(Box<dyn MandatoryIncentive>),
    Voluntary(Box<dyn VoluntaryIncentive>),
}

impl IncentiveKind {
    pub fn create(self) -> Incentive {
        match self {
            Self::Route => Incentive::Mandatory(Box::new(IncentiveRoute)),
            Self::LaneDrop => Incentive::Mandatory(Box::new(IncentiveLaneDrop)),
            Self::SpeedGain => Incentive::Voluntary(Box::new(IncentiveSpeedGain)),
            Self::Keep => Incentive::Voluntary(Box::new(IncentiveKeep)),
            Self::Courtesy => Incentive::Voluntary(Box::new(IncentiveCourtesy)),
            Self::Queue => Incentive::Voluntary(Box::new(IncentiveQueue)),
        }
    }
}

/// The desire to leave a lane that requires `lane_changes` more changes within `remaining`
/// metres. It grows linearly from zero at `lane_changes * max(x0, v * t0)` to one at the end.
fn desire_to_leave(
    params: &Parameters,
    remaining: f64,
    lane_changes: usize,
    speed: f64,
) -> Result<f64, PlanError> {
    if lane_changes == 0 {
        return Ok(0.0);
    }
    let x0 = params.get_parameter(&LOOKAHEAD)?;
    let t0 = params.get_parameter(&T0)?;
    let range = lane_changes as f64 * f64::max(x0, speed * t0);
    Ok((1.0 - remaining / range).clamp(0.0, 1.0))
}

/// Desire towards an adjacent lane from the desire to leave the current lane and the
/// desire to leave the adjacent lane: move if the adjacent lane is better, resist if worse.
fn compare(current: f64, adjacent: f64) -> f64 {
    if adjacent < current {
        current
    } else if adjacent > current {
        -adjacent
    } else {
        0.0
    }
}

/// Mandatory desire to reach lanes from which the route can be followed.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncentiveRoute;

impl MandatoryIncentive for IncentiveRoute {
    fn determine_desire(&self, ctx: &IncentiveContext, _: Desire) -> Result<Desire, PlanError> {
        let Some(infra) = ctx.perceived.try_infrastructure() else {
            return Ok(Desire::ZERO);
        };
        let speed = ctx.perceived.ego().speed;
        let leave = |lane: Option<&LaneInfrastructure>| -> Result<Option<f64>, PlanError> {
            match lane.and_then(|l| l.route) {
                Some(info) => Ok(Some(desire_to_leave(
                    ctx.params,
                    info.remaining,
                    info.lane_changes,
                    speed,
                )?)),
                None => Ok(None),
            }
        };
        let Some(current) = leave(infra.lane(RelativeLane::CURRENT))? else {
            return Ok(Desire::ZERO);
        };
        let mut desire = Desire::ZERO;
        for dir in [LateralDirection::Left, LateralDirection::Right] {
            let Some(lane) = infra.lane(dir.relative_lane()) else {
                continue;
            };
            // Lanes off the route are to be left straight away
            let adjacent = leave(Some(lane))?.unwrap_or(1.0);
            desire.set(dir, compare(current, adjacent));
        }
        Ok(desire)
    }
}

/// Mandatory desire to leave a lane that ends, for GTUs without a route.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncentiveLaneDrop;

impl MandatoryIncentive for IncentiveLaneDrop {
    fn determine_desire(&self, ctx: &IncentiveContext, _: Desire) -> Result<Desire, PlanError> {
        let Some(infra) = ctx.perceived.try_infrastructure() else {
            return Ok(Desire::ZERO);
        };
        let Some(current) = infra.lane(RelativeLane::CURRENT) else {
            return Ok(Desire::ZERO);
        };
        if current.route.is_some() {
            return Ok(Desire::ZERO);
        }
        let speed = ctx.perceived.ego().speed;
        let leave = |lane: &LaneInfrastructure| match lane.dead_end {
            Some(distance) => desire_to_leave(ctx.params, distance, 1, speed),
            None => Ok(0.0),
        };
        let current = leave(current)?;
        let mut desire = Desire::ZERO;
        for dir in [LateralDirection::Left, LateralDirection::Right] {
            if let Some(lane) = infra.lane(dir.relative_lane()) {
                desire.set(dir, compare(current, leave(lane)?));
            }
        }
        Ok(desire)
    }
}

/// Acceleration of `follower` when following a leader at `distance` driving at `speed`,
/// using the follower's own parameters.
fn follower_acceleration(
    ctx: &IncentiveContext,
    info: &SpeedLimitInfo,
    follower: &PerceivedGtu,
    leader: Option<Leader>,
) -> Result<f64, PlanError> {
    let info = SpeedLimitInfo {
        max_vehicle_speed: follower.max_speed,
        ..*info
    };
    let leaders = match &leader {
        Some(leader) => std::slice::from_ref(leader),
        None => &[],
    };
    Ok(ctx
        .model
        .following_acceleration(&follower.parameters, follower.speed, &info, leaders)?)
}

/// Voluntary desire to drive faster on an adjacent lane, weighed against the hindrance
/// caused to the new follower (MOBIL).
#[derive(Clone, Copy, Debug, Default)]
pub struct IncentiveSpeedGain;

impl VoluntaryIncentive for IncentiveSpeedGain {
    fn determine_desire(
        &self,
        ctx: &IncentiveContext,
        _: Desire,
        _: Desire,
    ) -> Result<Desire, PlanError> {
        let (Some(neighbors), Some(infra)) = (
            ctx.perceived.try_neighbors(),
            ctx.perceived.try_infrastructure(),
        ) else {
            return Ok(Desire::ZERO);
        };
        let ego = ctx.perceived.ego();
        let info = infra.speed_limit();
        let a = ctx.params.get_parameter(&A)?;
        let p = ctx.params.get_parameter(&POLITENESS)?;
        let vcong = ctx.params.get_parameter(&VCONG)?;
        let leaders = |lane: RelativeLane| {
            neighbors
                .leaders(lane)
                .iter()
                .map(PerceivedGtu::as_leader)
                .collect::<Vec<_>>()
        };
        let current = ctx.model.following_acceleration(
            ctx.params,
            ego.speed,
            &info,
            &leaders(RelativeLane::CURRENT),
        )?;

        let mut desire = Desire::ZERO;
        for dir in [LateralDirection::Left, LateralDirection::Right] {
            let lane = dir.relative_lane();
            if neighbors.lane(lane).is_none() {
                continue;
            }
            let mut adjacent =
                ctx.model
                    .following_acceleration(ctx.params, ego.speed, &info, &leaders(lane))?;
            // No overtaking on the right outside congestion
            if dir == LateralDirection::Right && ego.speed > vcong {
                adjacent = f64::min(adjacent, current);
            }
            let mut hindrance = 0.0;
            if let Some(follower) = neighbors.follower(lane) {
                let before = follower_acceleration(
                    ctx,
                    &info,
                    follower,
                    neighbors.leader(lane).map(|leader| Leader {
                        distance: leader.distance + ego.length - follower.distance,
                        speed: leader.speed,
                    }),
                )?;
                let after = follower_acceleration(
                    ctx,
                    &info,
                    follower,
                    Some(Leader {
                        distance: follower.gap(),
                        speed: ego.speed,
                    }),
                )?;
                hindrance = after - before;
            }
            desire.set(dir, ((adjacent - current + p * hindrance) / a).clamp(-1.0, 1.0));
        }
        Ok(desire)
    }
}

/// Voluntary desire to keep to the right lane.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncentiveKeep;

impl VoluntaryIncentive for IncentiveKeep {
    fn determine_desire(
        &self,
        ctx: &IncentiveContext,
        mandatory: Desire,
        voluntary: Desire,
    ) -> Result<Desire, PlanError> {
        if mandatory.right < 0.0 || voluntary.right < 0.0 {
            return Ok(Desire::ZERO);
        }
        let accessible = ctx
            .perceived
            .try_infrastructure()
            .map_or(false, |infra| infra.is_accessible(LateralDirection::Right));
        if !accessible {
            return Ok(Desire::ZERO);
        }
        Ok(Desire::new(0.0, ctx.params.get_parameter(&KEEP_BIAS)?))
    }
}

/// Voluntary desire to make room for adjacent GTUs that want to change into the current lane.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncentiveCourtesy;

impl VoluntaryIncentive for IncentiveCourtesy {
    fn determine_desire(
        &self,
        ctx: &IncentiveContext,
        _: Desire,
        _: Desire,
    ) -> Result<Desire, PlanError> {
        let Some(neighbors) = ctx.perceived.try_neighbors() else {
            return Ok(Desire::ZERO);
        };
        let mut desire = Desire::ZERO;
        for side in [LateralDirection::Left, LateralDirection::Right] {
            let lane = side.relative_lane();
            let towards_us = side.flip();
            let param = match towards_us {
                LateralDirection::Left => &DLEFT,
                _ => &DRIGHT,
            };
            let strongest = neighbors
                .leaders(lane)
                .iter()
                .chain(neighbors.alongside(lane))
                .filter(|gtu| gtu.indicator == towards_us || gtu.lane_change == towards_us)
                .filter_map(|gtu| gtu.parameters.get_parameter_or_none(param))
                .fold(0.0, f64::max);
            // Move away from the side they come from, if there is room to do so
            if neighbors.lane(towards_us.relative_lane()).is_some() {
                let away = desire.get(towards_us);
                desire.set(towards_us, f64::max(away, strongest.min(1.0)));
            }
        }
        Ok(desire)
    }
}

/// Voluntary desire to join the shorter queue in front of a traffic light.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncentiveQueue;

impl VoluntaryIncentive for IncentiveQueue {
    fn determine_desire(
        &self,
        ctx: &IncentiveContext,
        _: Desire,
        _: Desire,
    ) -> Result<Desire, PlanError> {
        let (Some(intersection), Some(neighbors)) = (
            ctx.perceived.try_intersection(),
            ctx.perceived.try_neighbors(),
        ) else {
            return Ok(Desire::ZERO);
        };
        let Some(light) = intersection
            .lights()
            .iter()
            .find(|light| light.state != LightState::Green)
        else {
            return Ok(Desire::ZERO);
        };
        let vcong = ctx.params.get_parameter(&VCONG)?;
        let queue = |lane: RelativeLane| {
            neighbors
                .leaders(lane)
                .iter()
                .filter(|gtu| gtu.distance < light.distance && gtu.speed < vcong)
                .count() as f64
        };
        let current = queue(RelativeLane::CURRENT);
        let mut desire = Desire::ZERO;
        for dir in [LateralDirection::Left, LateralDirection::Right] {
            let lane = dir.relative_lane();
            if neighbors.lane(lane).is_some() {
                let adjacent = queue(lane);
                desire.set(dir, (current - adjacent) / f64::max(current + adjacent, 1.0));
            }
        }
        Ok(desire)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::car_following::IdmPlus;
    use crate::network::{Network, Route};
    use crate::parameters::ParameterType;
    use crate::perception::PerceptionSettings;
    use crate::testing::Scene;
    use crate::GtuId;
    use assert_approx_eq::assert_approx_eq;

    fn voluntary(
        incentive: &dyn VoluntaryIncentive,
        perceived: &Perceived,
        params: &Parameters,
    ) -> Desire {
        let ctx = IncentiveContext {
            perceived,
            params,
            model: &IdmPlus,
        };
        incentive
            .determine_desire(&ctx, Desire::ZERO, Desire::ZERO)
            .unwrap()
    }

    fn mandatory(incentive: &dyn MandatoryIncentive, perceived: &Perceived) -> Desire {
        let ctx = IncentiveContext {
            perceived,
            params: &Parameters::new(),
            model: &IdmPlus,
        };
        incentive.determine_desire(&ctx, Desire::ZERO).unwrap()
    }

    fn with(param: &ParameterType, value: f64) -> Parameters {
        let mut params = Parameters::new();
        params.set_parameter(param, value).unwrap();
        params
    }

    #[test]
    fn speed_gain_towards_faster_lane() {
        let mut scene = Scene::road(2, 1000.0, true);
        let ego = scene.add(1, 100.0, 20.0);
        // slow leader 20 m ahead on the right lane
        scene.add(1, 124.0, 10.0);
        let desire = voluntary(&IncentiveSpeedGain, &scene.perceive(ego), &Parameters::new());
        assert_approx_eq!(desire.left, 1.0);
        assert_approx_eq!(desire.right, 0.0);
    }

    #[test]
    fn speed_gain_weighs_hindrance_by_politeness() {
        let mut scene = Scene::road(2, 1000.0, true);
        let ego = scene.add(1, 100.0, 20.0);
        // new follower 10 m behind at the same speed
        scene.add(0, 86.0, 20.0);
        let perceived = scene.perceive(ego);
        let polite = voluntary(&IncentiveSpeedGain, &perceived, &Parameters::new());
        assert_approx_eq!(polite.left, -1.0);
        let selfish = voluntary(&IncentiveSpeedGain, &perceived, &with(&POLITENESS, 0.0));
        assert_approx_eq!(selfish.left, 0.0);
    }

    #[test]
    fn no_overtaking_on_the_right_above_vcong() {
        let mut scene = Scene::road(2, 1000.0, true);
        let free = scene.add(0, 100.0, 20.0);
        scene.add(0, 134.0, 10.0);
        let desire = voluntary(&IncentiveSpeedGain, &scene.perceive(free), &Parameters::new());
        assert_approx_eq!(desire.right, 0.0);

        let mut scene = Scene::road(2, 1000.0, true);
        let congested = scene.add(0, 100.0, 10.0);
        scene.add(0, 134.0, 5.0);
        let desire = voluntary(&IncentiveSpeedGain, &scene.perceive(congested), &Parameters::new());
        assert!(desire.right > 0.5);
    }

    #[test]
    fn courtesy_makes_room_for_indicating_gtus() {
        let mut scene = Scene::road(3, 1000.0, true);
        let ego = scene.add(1, 100.0, 20.0);
        let merging = scene.add_car(scene.car(with(&DRIGHT, 0.7)), 0, 130.0, 20.0);
        let params = Parameters::new();
        let desire = voluntary(&IncentiveCourtesy, &scene.perceive(ego), &params);
        assert_eq!(desire, Desire::ZERO);

        scene.indicate(merging, LateralDirection::Right);
        let desire = voluntary(&IncentiveCourtesy, &scene.perceive(ego), &params);
        assert_approx_eq!(desire.right, 0.7);
        assert_approx_eq!(desire.left, 0.0);

        let from_right = scene.add_car(scene.car(with(&DLEFT, 0.4)), 2, 100.0, 20.0);
        scene.indicate(from_right, LateralDirection::Left);
        let desire = voluntary(&IncentiveCourtesy, &scene.perceive(ego), &params);
        assert_approx_eq!(desire.right, 0.7);
        assert_approx_eq!(desire.left, 0.4);
    }

    #[test]
    fn courtesy_needs_room_to_move() {
        let mut scene = Scene::road(2, 1000.0, true);
        let ego = scene.add(1, 100.0, 20.0);
        let merging = scene.add_car(scene.car(with(&DRIGHT, 0.7)), 0, 130.0, 20.0);
        scene.indicate(merging, LateralDirection::Right);
        let desire = voluntary(&IncentiveCourtesy, &scene.perceive(ego), &Parameters::new());
        assert_eq!(desire, Desire::ZERO);
    }

    /// A road of two lanes that splits after 200 m: the left lane continues on `main`, the
    /// right lane on `ramp`.
    fn split(route_to_ramp: bool, lane: usize) -> (Scene, GtuId) {
        let mut network = Network::new();
        let left = Scene::lane(&mut network, 0.0, 200.0, 3.5, false);
        let right = Scene::lane(&mut network, 0.0, 200.0, 0.0, false);
        let main = Scene::lane(&mut network, 200.0, 400.0, 3.5, true);
        let ramp = Scene::lane(&mut network, 200.0, 400.0, -20.0, true);
        let road = network.add_link(&[left, right]).unwrap();
        network.add_link(&[main]).unwrap();
        let ramp_link = network.add_link(&[ramp]).unwrap();
        network.connect(left, main).unwrap();
        network.connect(right, ramp).unwrap();
        let mut scene = Scene::new(network, vec![left, right]);
        let mut car = scene.car(Parameters::new());
        if route_to_ramp {
            car.route = Some(Route::new(vec![road, ramp_link]));
        }
        let ego = scene.add_car(car, lane, 100.0, 20.0);
        (scene, ego)
    }

    #[test]
    fn route_desire_towards_route_lane() {
        // 100 m left for one lane change; 860 m is where desire starts at 20 m/s
        let expected = 1.0 - 100.0 / 860.0;
        let (scene, ego) = split(true, 0);
        let desire = mandatory(&IncentiveRoute, &scene.perceive(ego));
        assert_approx_eq!(desire.right, expected);
        assert_approx_eq!(desire.left, 0.0);

        let (scene, ego) = split(true, 1);
        let desire = mandatory(&IncentiveRoute, &scene.perceive(ego));
        assert_approx_eq!(desire.left, -expected);
        assert_approx_eq!(desire.right, 0.0);
    }

    #[test]
    fn route_desire_needs_route() {
        let (scene, ego) = split(false, 0);
        assert_eq!(mandatory(&IncentiveRoute, &scene.perceive(ego)), Desire::ZERO);
    }

    /// Two lanes with a red light at 300 m on both, and the ego GTU on the right lane
    /// behind a queue of two.
    fn queue_scene() -> (Scene, GtuId) {
        let mut network = Network::new();
        let left = Scene::lane(&mut network, 0.0, 1000.0, 3.5, true);
        let right = Scene::lane(&mut network, 0.0, 1000.0, 0.0, true);
        network.add_link(&[left, right]).unwrap();
        network.add_traffic_light(left, 300.0).unwrap();
        network.add_traffic_light(right, 300.0).unwrap();
        let mut scene = Scene::new(network, vec![left, right]);
        let ego = scene.add(1, 100.0, 10.0);
        scene.add(1, 280.0, 0.0);
        scene.add(1, 290.0, 0.0);
        (scene, ego)
    }

    #[test]
    fn queue_desire_towards_shorter_queue() {
        let (scene, ego) = queue_scene();
        let desire = voluntary(&IncentiveQueue, &scene.perceive(ego), &Parameters::new());
        assert_approx_eq!(desire.left, 1.0);
        assert_approx_eq!(desire.right, 0.0);
    }

    #[test]
    fn queue_desire_needs_intersection_perception() {
        let (scene, ego) = queue_scene();
        let settings = PerceptionSettings {
            intersection: false,
            ..Default::default()
        };
        let perceived = scene.perceive_with(ego, settings);
        assert_eq!(voluntary(&IncentiveQueue, &perceived, &Parameters::new()), Desire::ZERO);
    }

    #[test]
    fn leave_desire_grows_towards_the_end() {
        let params = Parameters::new();
        // range = max(295, 20 * 43) = 860 m per lane change
        assert_approx_eq!(desire_to_leave(&params, 860.0, 1, 20.0).unwrap(), 0.0);
        assert_approx_eq!(desire_to_leave(&params, 430.0, 1, 20.0).unwrap(), 0.5);
        assert_approx_eq!(desire_to_leave(&params, 860.0, 2, 20.0).unwrap(), 0.5);
        assert_approx_eq!(desire_to_leave(&params, -5.0, 1, 20.0).unwrap(), 1.0);
        assert_approx_eq!(desire_to_leave(&params, 10.0, 0, 20.0).unwrap(), 0.0);
        // at low speed the look-ahead distance applies
        assert_approx_eq!(desire_to_leave(&params, 147.5, 1, 0.0).unwrap(), 0.5);
    }

    #[test]
    fn compare_lanes() {
        assert_eq!(compare(0.6, 0.0), 0.6);
        assert_eq!(compare(0.0, 0.6), -0.6);
        assert_eq!(compare(0.3, 0.3), 0.0);
    }
}
