//! Operational plans: a path plus constant-acceleration segments.

use crate::math::{Point2d, Polyline, PolylineSample};
use crate::network::LateralDirection;
use crate::{LaneId, PlanError};
use smallvec::{smallvec, SmallVec};

pub use builder::{build_plan, LaneChangeStart, PlanStart};

mod builder;

/// Paths may be this much shorter than the distance travelled, to absorb rounding, in m.
const PATH_TOLERANCE: f64 = 1e-6;

/// Distances this close count as reached, in m.
const DISTANCE_TOLERANCE: f64 = 1e-9;

/// A segment of an operational plan.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Segment {
    /// Constant acceleration.
    Acceleration { duration: f64, acceleration: f64 },
    /// Constant speed.
    Speed { duration: f64 },
}

impl Segment {
    pub fn duration(&self) -> f64 {
        match self {
            Self::Acceleration { duration, .. } | Self::Speed { duration } => *duration,
        }
    }

    pub fn acceleration(&self) -> f64 {
        match self {
            Self::Acceleration { acceleration, .. } => *acceleration,
            Self::Speed { .. } => 0.0,
        }
    }

    /// The distance covered in the first `t` seconds of the segment, given its start speed.
    fn distance(&self, v0: f64, t: f64) -> f64 {
        v0 * t + 0.5 * self.acceleration() * t * t
    }

    /// The time the segment needs to cover `distance`, given its start speed.
    fn time_to_cover(&self, v0: f64, distance: f64) -> f64 {
        let a = self.acceleration();
        if a.abs() < 1e-12 {
            return if v0 > 0.0 { distance / v0 } else { 0.0 };
        }
        let discr = f64::max(v0 * v0 + 2.0 * a * distance, 0.0);
        (discr.sqrt() - v0) / a
    }
}

/// The time from the start of a plan until `distance` is covered. If the plan stops short
/// of it, the time at which it stopped.
fn time_to_cover(start_speed: f64, segments: &[Segment], distance: f64) -> f64 {
    let mut elapsed = 0.0;
    let mut speed = start_speed;
    let mut remaining = f64::max(distance, 0.0);
    for segment in segments {
        let duration = segment.duration();
        let covered = segment.distance(speed, duration);
        if remaining <= covered + DISTANCE_TOLERANCE {
            let t = segment.time_to_cover(speed, f64::min(remaining, covered));
            return elapsed + t.clamp(0.0, duration);
        }
        remaining -= covered;
        speed = f64::max(speed + segment.acceleration() * duration, 0.0);
        elapsed += duration;
    }
    if speed > 0.0 {
        elapsed + remaining / speed
    } else {
        elapsed
    }
}

/// How a lane change progresses along a plan.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LateralProgress {
    /// Progress at the start of the plan.
    start: f64,
    /// The time a full lane change takes, in s.
    duration: f64,
    /// The distance along the plan within which the lane change must be complete, because
    /// the lane it leaves ends.
    complete_within: Option<f64>,
}

impl LateralProgress {
    /// Progress once the GTU has covered `distance`, which took it `elapsed` seconds.
    /// Progress only grows while the GTU moves.
    fn at(&self, distance: f64, elapsed: f64) -> f64 {
        let mut progress = self.start + elapsed / self.duration.max(f64::EPSILON);
        if let Some(within) = self.complete_within {
            let forced = if within > 0.0 {
                self.start + (1.0 - self.start) * distance / within
            } else {
                1.0
            };
            progress = f64::max(progress, forced);
        }
        f64::min(progress, 1.0)
    }
}

/// A short horizon trajectory: a path, with a speed profile along it.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationalPlan {
    path: Polyline,
    start_time: f64,
    start_speed: f64,
    segments: SmallVec<[Segment; 2]>,
}

impl OperationalPlan {
    /// Creates a plan, checking that the path is long enough for the segments.
    pub fn new(
        path: Polyline,
        start_time: f64,
        start_speed: f64,
        segments: SmallVec<[Segment; 2]>,
    ) -> Result<Self, PlanError> {
        let plan = Self {
            path,
            start_time,
            start_speed,
            segments,
        };
        let required = plan.total_distance();
        if plan.path.length() + PATH_TOLERANCE < required {
            return Err(PlanError::PathTooShort {
                required,
                available: plan.path.length(),
            });
        }
        Ok(plan)
    }

    /// A plan that stands still at a point for the given duration.
    pub fn standstill(location: Point2d, start_time: f64, duration: f64) -> Self {
        Self {
            path: Polyline::point(location),
            start_time,
            start_speed: 0.0,
            segments: smallvec![Segment::Speed { duration }],
        }
    }

    pub fn path(&self) -> &Polyline {
        &self.path
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn start_speed(&self) -> f64 {
        self.start_speed
    }

    pub fn duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration()
    }

    pub fn end_speed(&self) -> f64 {
        self.speed_at(self.end_time())
    }

    /// The distance covered over the whole plan.
    pub fn total_distance(&self) -> f64 {
        self.distance_at(self.end_time())
    }

    /// Whether the plan holds the GTU still throughout.
    pub fn is_standstill(&self) -> bool {
        self.start_speed == 0.0 && self.segments.iter().all(|s| s.acceleration() <= 0.0)
    }

    /// Finds the segment active at time `t`, with its start speed and the distance and time
    /// already covered. Times past the end resolve to the last segment.
    fn segment_at(&self, t: f64) -> (Segment, f64, f64, f64) {
        let mut elapsed = 0.0;
        let mut speed = self.start_speed;
        let mut dist = 0.0;
        let t = t - self.start_time;
        for (idx, segment) in self.segments.iter().enumerate() {
            let duration = segment.duration();
            if t < elapsed + duration || idx + 1 == self.segments.len() {
                return (*segment, speed, dist, elapsed);
            }
            dist += segment.distance(speed, duration);
            speed = f64::max(speed + segment.acceleration() * duration, 0.0);
            elapsed += duration;
        }
        (Segment::Speed { duration: 0.0 }, speed, dist, elapsed)
    }

    /// The distance travelled since the start of the plan. Past the end of the plan the
    /// final speed is maintained.
    pub fn distance_at(&self, t: f64) -> f64 {
        let (segment, v0, dist, elapsed) = self.segment_at(t);
        let dt = f64::max(t - self.start_time - elapsed, 0.0);
        let in_segment = f64::min(dt, segment.duration());
        let mut total = dist + segment.distance(v0, in_segment);
        if dt > segment.duration() {
            let v1 = f64::max(v0 + segment.acceleration() * segment.duration(), 0.0);
            total += v1 * (dt - segment.duration());
        }
        f64::max(total, 0.0)
    }

    pub fn speed_at(&self, t: f64) -> f64 {
        let (segment, v0, _, elapsed) = self.segment_at(t);
        let dt = (t - self.start_time - elapsed).clamp(0.0, segment.duration());
        f64::max(v0 + segment.acceleration() * dt, 0.0)
    }

    pub fn acceleration_at(&self, t: f64) -> f64 {
        let (segment, _, _, elapsed) = self.segment_at(t);
        if t - self.start_time - elapsed > segment.duration() {
            0.0
        } else {
            segment.acceleration()
        }
    }

    /// The time at which `distance` has been covered. If the plan stops short of it, the
    /// time at which it stopped.
    pub fn time_at_distance(&self, distance: f64) -> f64 {
        self.start_time + time_to_cover(self.start_speed, &self.segments, distance)
    }

    /// The location and heading on the path at time `t`.
    pub fn location_at(&self, t: f64) -> PolylineSample {
        self.path.sample(self.distance_at(t))
    }
}

/// An operational plan on lanes, possibly including (part of) a lane change.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneBasedOperationalPlan {
    plan: OperationalPlan,
    /// The reference lanes the path follows, starting with the current lane.
    lanes: SmallVec<[LaneId; 4]>,
    /// The position on the first lane at the start of the plan.
    start_position: f64,
    /// The lanes being changed to, empty if there is no lane change.
    target_lanes: SmallVec<[LaneId; 4]>,
    /// The position on the first target lane at the start of the plan.
    target_start_position: f64,
    lane_change: LateralDirection,
    /// Lateral progress of the lane change, `None` if there is no lane change.
    progress: Option<LateralProgress>,
}

impl LaneBasedOperationalPlan {
    pub fn plan(&self) -> &OperationalPlan {
        &self.plan
    }

    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    pub fn start_position(&self) -> f64 {
        self.start_position
    }

    pub fn target_lanes(&self) -> &[LaneId] {
        &self.target_lanes
    }

    pub fn target_start_position(&self) -> f64 {
        self.target_start_position
    }

    /// The direction of the lane change this plan is part of.
    pub fn lane_change(&self) -> LateralDirection {
        self.lane_change
    }

    /// Lateral progress of the lane change at time `t`, or `None` if there is no lane change.
    ///
    /// Progress is tied to the distance driven, matching the lateral position on the path.
    pub fn lane_change_progress_at(&self, t: f64) -> Option<f64> {
        if self.lane_change.is_none() {
            return None;
        }
        let progress = self.progress?;
        let t = t.clamp(self.plan.start_time(), self.plan.end_time());
        let distance = self.plan.distance_at(t);
        let elapsed = self.plan.time_at_distance(distance) - self.plan.start_time();
        Some(progress.at(distance, elapsed))
    }
}
