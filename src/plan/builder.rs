use super::{time_to_cover, LaneBasedOperationalPlan, LateralProgress, OperationalPlan, Segment};
use crate::math::{lerp_point, CubicFn, Polyline};
use crate::network::{LateralDirection, Network, Route};
use crate::tactical::SimpleOperationalPlan;
use crate::{LaneId, PlanError};
use smallvec::{smallvec, SmallVec};

/// Consecutive lane centre lines closer than this are joined without a connecting segment, in m.
const JOIN_TOLERANCE: f64 = 0.1;

/// The spacing of points on a lane change path, in m.
const LANE_CHANGE_STEP: f64 = 1.0;

/// Where and how a GTU starts its next plan.
#[derive(Clone, Copy, Debug)]
pub struct PlanStart<'a> {
    pub time: f64,
    /// The reference (front) lane.
    pub lane: LaneId,
    /// The front position along the lane, in m.
    pub position: f64,
    pub speed: f64,
    pub route: Option<&'a Route>,
    pub lane_change: Option<LaneChangeStart>,
    /// The time a full lane change takes, in s.
    pub lane_change_duration: f64,
}

/// The state of a lane change at the start of a plan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneChangeStart {
    pub direction: LateralDirection,
    /// The lane being changed to.
    pub target: LaneId,
    /// Lateral progress so far, in [0, 1].
    pub progress: f64,
}

/// The constant acceleration segments for a plan, and the distance they cover.
///
/// A GTU that would come to a stop within the plan brakes to a standstill and holds.
fn acceleration_segments(speed: f64, acceleration: f64, duration: f64) -> (SmallVec<[Segment; 2]>, f64) {
    if speed <= 0.0 && acceleration <= 0.0 {
        return (smallvec![Segment::Speed { duration }], 0.0);
    }
    let end_speed = speed + acceleration * duration;
    if end_speed < 0.0 {
        let brake = -speed / acceleration;
        let segments = smallvec![
            Segment::Acceleration {
                duration: brake,
                acceleration
            },
            Segment::Speed {
                duration: duration - brake
            },
        ];
        return (segments, 0.5 * speed * brake);
    }
    let distance = speed * duration + 0.5 * acceleration * duration * duration;
    let segments = smallvec![Segment::Acceleration {
        duration,
        acceleration
    }];
    (segments, f64::max(distance, 0.0))
}

/// Lanes from a lane onwards, with their joined centre lines.
struct LaneChain {
    lanes: SmallVec<[LaneId; 4]>,
    line: Polyline,
    /// Where the lanes end, measured from the start of the first lane, if they end before
    /// the required distance. The line is extended straight ahead beyond it.
    dead_end: Option<f64>,
}

impl LaneChain {
    /// Fails if the lanes end before `end`.
    fn require(self, end: f64) -> Result<Self, PlanError> {
        match self.dead_end {
            Some(available) => Err(PlanError::PathTooShort {
                required: end,
                available,
            }),
            None => Ok(self),
        }
    }
}

/// Collects lanes from `lane` onwards until they hold `end` metres from the start of `lane`.
/// Sink lanes are extended without being a dead end.
fn lane_chain(
    network: &Network,
    lane: LaneId,
    end: f64,
    route: Option<&Route>,
) -> Result<LaneChain, PlanError> {
    let first = network.lane(lane)?;
    let mut lanes: SmallVec<[LaneId; 4]> = smallvec![lane];
    let mut line = first.centerline().clone();
    let mut total = first.length();
    let mut last = first;
    let mut dead_end = None;
    while total < end {
        match network.next_lane(last.id(), route)? {
            Some(id) => {
                let next = network.lane(id)?;
                line = line.concatenate(next.centerline(), JOIN_TOLERANCE);
                total += next.length();
                lanes.push(id);
                last = next;
            }
            None => {
                if !last.is_sink() {
                    dead_end = Some(total);
                }
                line = line.extend(end - total);
                break;
            }
        }
    }
    Ok(LaneChain {
        lanes,
        line,
        dead_end,
    })
}

/// Converts a tactical decision into an operational plan on the lanes ahead.
///
/// The path follows the centre line of the current lane and its successors. During a lane
/// change it blends towards the target lane with a smooth lateral profile. Lateral progress
/// grows with the time spent driving over the lane change duration, and a lane change off
/// a lane that ends completes before the end of that lane.
pub fn build_plan(
    network: &Network,
    start: &PlanStart,
    simple: &SimpleOperationalPlan,
) -> Result<LaneBasedOperationalPlan, PlanError> {
    let duration = simple.duration();
    let (segments, distance) = acceleration_segments(start.speed, simple.acceleration(), duration);

    let lane_change = start.lane_change.filter(|lc| !lc.direction.is_none());
    let target_start_position = match lane_change {
        Some(lc) => network.adjacent_position(start.lane, lc.target, start.position)?,
        None => 0.0,
    };

    let end = start.position + distance;
    let mut source = lane_chain(network, start.lane, end, start.route)?;
    let lateral = lane_change.map(|lc| LateralProgress {
        start: lc.progress,
        duration: start.lane_change_duration,
        complete_within: source.dead_end.map(|at| at - start.position),
    });

    if distance <= 0.0 {
        let mut location = network.location(start.lane, start.position)?;
        if let (Some(lc), Some(lateral)) = (lane_change, lateral) {
            let target = network.location(lc.target, target_start_position)?;
            let progress = lateral.at(0.0, 0.0);
            location = lerp_point(location, target, CubicFn::smoothstep().y(progress));
        }
        return Ok(LaneBasedOperationalPlan {
            plan: OperationalPlan::standstill(location, start.time, duration),
            lanes: smallvec![start.lane],
            start_position: start.position,
            target_lanes: lane_change.map(|lc| smallvec![lc.target]).unwrap_or_default(),
            target_start_position,
            lane_change: lane_change.map_or(LateralDirection::None, |lc| lc.direction),
            progress: lateral,
        });
    }

    if lane_change.is_none() {
        source = source.require(end)?;
    }
    let mut path = source.line.extract(start.position, end);

    let mut target_lanes = SmallVec::new();
    if let (Some(lc), Some(lateral)) = (lane_change, lateral) {
        let target_end = target_start_position + distance;
        let target = lane_chain(network, lc.target, target_end, start.route)?.require(target_end)?;
        let target_path = target.line.extract(target_start_position, target_end);
        let profile = CubicFn::smoothstep();
        let steps = (distance / LANE_CHANGE_STEP).ceil().max(4.0) as usize;
        path = Polyline::blend(&path, &target_path, steps, |frac| {
            let covered = frac * distance;
            let elapsed = time_to_cover(start.speed, &segments, covered);
            profile.y(lateral.at(covered, elapsed))
        });
        target_lanes = target.lanes;
    }

    // Lateral movement and curvature can make the path shorter than the distance travelled
    if path.length() < distance {
        path = path.extend(distance - path.length());
    }

    Ok(LaneBasedOperationalPlan {
        plan: OperationalPlan::new(path, start.time, start.speed, segments)?,
        lanes: source.lanes,
        start_position: start.position,
        target_lanes,
        target_start_position,
        lane_change: lane_change.map_or(LateralDirection::None, |lc| lc.direction),
        progress: lateral,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{LineSegment2d, Point2d};
    use crate::network::LaneAttributes;
    use crate::Compatibility;
    use assert_approx_eq::assert_approx_eq;

    fn network(sink: bool) -> (Network, LaneId, LaneId, LaneId) {
        let mut network = Network::new();
        let mut add = |x0: f64, x1: f64, y: f64| {
            network.add_lane(&LaneAttributes {
                curve: &LineSegment2d::from_ends(Point2d::new(x0, y), Point2d::new(x1, y)),
                width: 3.5,
                speed_limit: 25.0,
                compatibility: Compatibility::All,
                sink,
            })
        };
        let left = add(0.0, 100.0, 3.5);
        let right = add(0.0, 100.0, 0.0);
        let next = add(100.0, 150.0, 0.0);
        network.add_link(&[left, right]).unwrap();
        network.add_link(&[next]).unwrap();
        network.connect(right, next).unwrap();
        (network, left, right, next)
    }

    fn start(lane: LaneId, position: f64, speed: f64) -> PlanStart<'static> {
        PlanStart {
            time: 0.0,
            lane,
            position,
            speed,
            route: None,
            lane_change: None,
            lane_change_duration: 3.0,
        }
    }

    #[test]
    fn path_crosses_lanes() {
        let (network, _, right, next) = network(false);
        let simple = SimpleOperationalPlan::new(0.0, 2.0);
        let plan = build_plan(&network, &start(right, 90.0, 10.0), &simple).unwrap();
        assert_eq!(plan.lanes(), &[right, next]);
        assert_approx_eq!(plan.plan().path().length(), 20.0);
        assert_approx_eq!(plan.plan().location_at(2.0).pos.x, 110.0);
    }

    #[test]
    fn path_too_short() {
        let (network, left, _, _) = network(false);
        let simple = SimpleOperationalPlan::new(0.0, 2.0);
        let result = build_plan(&network, &start(left, 90.0, 10.0), &simple);
        assert!(matches!(result, Err(PlanError::PathTooShort { .. })));
    }

    #[test]
    fn sink_lane_is_extended() {
        let (network, left, _, _) = network(true);
        let simple = SimpleOperationalPlan::new(0.0, 2.0);
        let plan = build_plan(&network, &start(left, 90.0, 10.0), &simple).unwrap();
        assert!(plan.plan().path().length() >= 20.0 - 1e-9);
    }

    #[test]
    fn brake_to_stop() {
        let (network, _, right, _) = network(false);
        let simple = SimpleOperationalPlan::new(-4.0, 2.0);
        let plan = build_plan(&network, &start(right, 10.0, 4.0), &simple).unwrap();
        assert_eq!(plan.plan().segments().len(), 2);
        assert_approx_eq!(plan.plan().total_distance(), 2.0);
        assert_approx_eq!(plan.plan().end_speed(), 0.0);
    }

    #[test]
    fn waiting_plan() {
        let (network, _, right, _) = network(false);
        let simple = SimpleOperationalPlan::new(-1.0, 0.5);
        let plan = build_plan(&network, &start(right, 10.0, 0.0), &simple).unwrap();
        assert!(plan.plan().is_standstill());
        assert_approx_eq!(plan.plan().path().length(), 0.0);
        assert_approx_eq!(plan.plan().location_at(0.5).pos.x, 10.0);
    }

    #[test]
    fn lane_change_moves_laterally() {
        let (network, left, right, _) = network(false);
        let simple = SimpleOperationalPlan::new(0.0, 1.5);
        let mut from = start(right, 10.0, 10.0);
        from.lane_change = Some(LaneChangeStart {
            direction: LateralDirection::Left,
            target: left,
            progress: 0.0,
        });
        let plan = build_plan(&network, &from, &simple).unwrap();
        assert_eq!(plan.target_lanes(), &[left]);
        assert_approx_eq!(plan.lane_change_progress_at(1.5).unwrap(), 0.5);
        let end = plan.plan().location_at(1.5).pos;
        assert_approx_eq!(end.y, 1.75, 0.05);
        assert!(plan.plan().path().length() >= plan.plan().total_distance());
    }

    #[test]
    fn lane_change_completes_before_lane_ends() {
        let (network, left, right, next) = network(false);
        let simple = SimpleOperationalPlan::new(0.0, 2.0);
        let mut from = start(left, 90.0, 10.0);
        from.lane_change = Some(LaneChangeStart {
            direction: LateralDirection::Right,
            target: right,
            progress: 0.2,
        });
        let plan = build_plan(&network, &from, &simple).unwrap();
        assert_eq!(plan.target_lanes(), &[right, next]);
        assert_approx_eq!(plan.lane_change_progress_at(0.5).unwrap(), 0.6);
        assert_approx_eq!(plan.lane_change_progress_at(1.0).unwrap(), 1.0);
        assert_approx_eq!(plan.plan().location_at(2.0).pos.y, 0.0, 1e-6);
    }

    #[test]
    fn lane_change_past_lane_end_completes_at_once() {
        let (network, left, right, _) = network(false);
        let simple = SimpleOperationalPlan::new(-10.0, 0.5);
        let mut from = start(left, 100.5, 0.0);
        from.lane_change = Some(LaneChangeStart {
            direction: LateralDirection::Right,
            target: right,
            progress: 0.4,
        });
        let plan = build_plan(&network, &from, &simple).unwrap();
        assert!(plan.plan().is_standstill());
        assert_approx_eq!(plan.lane_change_progress_at(0.0).unwrap(), 1.0);
        assert_approx_eq!(plan.plan().location_at(0.5).pos.y, 0.0, 1e-6);
    }

    #[test]
    fn lane_change_progress_follows_distance_when_braking() {
        let (network, left, right, _) = network(false);
        // stops after 1 s and 5 m, then holds for 1 s
        let simple = SimpleOperationalPlan::new(-10.0, 2.0);
        let mut from = start(right, 10.0, 10.0);
        from.lane_change = Some(LaneChangeStart {
            direction: LateralDirection::Left,
            target: left,
            progress: 0.0,
        });
        let plan = build_plan(&network, &from, &simple).unwrap();
        assert_approx_eq!(plan.lane_change_progress_at(1.0).unwrap(), 1.0 / 3.0, 1e-6);
        assert_approx_eq!(plan.lane_change_progress_at(2.0).unwrap(), 1.0 / 3.0, 1e-6);
        let reached = plan.plan().path().last().y;
        assert_approx_eq!(reached, 3.5 * CubicFn::smoothstep().y(1.0 / 3.0), 1e-6);
    }
}
