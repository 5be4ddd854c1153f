use super::{EgoPerception, LaneRecord, LaneStructure, Snapshot};
use crate::car_following::SpeedLimitInfo;
use crate::gtu::LaneBasedGtu;
use crate::network::{LaneChangeInfo, LateralDirection, RelativeLane};
use crate::parameters::{types::*, Parameters};
use crate::{LaneId, PlanError};
use arrayvec::ArrayVec;

/// A change of the speed limit ahead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedLimitChange {
    /// Distance from the front of the GTU to where the new limit applies, in m.
    pub distance: f64,
    /// The new limit, in m/s.
    pub speed_limit: f64,
}

/// Route and topology information for one relative lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneInfrastructure {
    pub relative: RelativeLane,
    pub lane: LaneId,
    /// The lane changes needed from this lane to follow the route, with `remaining`
    /// measured from the front of the GTU. `None` without a route or when the lane is off
    /// the route.
    pub route: Option<LaneChangeInfo>,
    /// Distance to the end of the lane if it ends without continuation, in m.
    pub dead_end: Option<f64>,
}

/// Speed limits, lane change rules and route information.
#[derive(Clone, Debug, PartialEq)]
pub struct InfrastructurePerception {
    speed_limit: SpeedLimitInfo,
    speed_limit_changes: Vec<SpeedLimitChange>,
    legal_left: f64,
    legal_right: f64,
    lanes: ArrayVec<LaneInfrastructure, 3>,
}

impl InfrastructurePerception {
    pub(super) fn build(
        snapshot: &Snapshot,
        structure: &LaneStructure,
        ego: &EgoPerception,
        gtu: &LaneBasedGtu,
        params: &Parameters,
    ) -> Result<Self, PlanError> {
        let network = snapshot.network;
        let lookahead = params.get_parameter(&LOOKAHEAD)?;
        let current = network.lane(ego.lane)?;
        let speed_limit = SpeedLimitInfo {
            max_vehicle_speed: ego.max_speed,
            speed_limit: current.speed_limit(),
        };

        let mut speed_limit_changes = vec![];
        let mut limit = current.speed_limit();
        for record in structure.downstream(RelativeLane::CURRENT) {
            if record.start_distance <= 0.0 || record.start_distance > lookahead {
                continue;
            }
            let lane_limit = network.lane(record.lane)?.speed_limit();
            if lane_limit != limit {
                speed_limit_changes.push(SpeedLimitChange {
                    distance: record.start_distance,
                    speed_limit: lane_limit,
                });
                limit = lane_limit;
            }
        }

        let legal = |dir: LateralDirection| -> Result<f64, PlanError> {
            let Some(mut record) = structure.root(RelativeLane::CURRENT) else {
                return Ok(0.0);
            };
            let mut distance = 0.0;
            while network.lane(record.lane)?.allows_lane_change(dir) {
                distance = record.end_distance();
                match next_on_route(structure, record) {
                    Some(next) if distance < lookahead => record = next,
                    _ => break,
                }
            }
            Ok(distance)
        };
        let legal_left = legal(LateralDirection::Left)?;
        let legal_right = legal(LateralDirection::Right)?;

        let mut lanes = ArrayVec::new();
        for relative in structure.relative_lanes() {
            let Some(root) = structure.root(relative) else {
                continue;
            };
            let route = gtu.route().and_then(|route| {
                snapshot
                    .routes
                    .lane_change_info(network, route, root.lane)
                    .map(|info| LaneChangeInfo {
                        remaining: info.remaining + root.start_distance,
                        ..info
                    })
            });
            let mut dead_end = None;
            for record in structure.downstream(relative) {
                let lane = network.lane(record.lane)?;
                if lane.successors().is_empty() && !lane.is_sink() {
                    let end = record.end_distance();
                    dead_end = Some(dead_end.map_or(end, |d: f64| d.min(end)));
                }
            }
            lanes.push(LaneInfrastructure {
                relative,
                lane: root.lane,
                route,
                dead_end,
            });
        }

        Ok(Self {
            speed_limit,
            speed_limit_changes,
            legal_left,
            legal_right,
            lanes,
        })
    }

    /// The speed limit at the GTU's position.
    pub fn speed_limit(&self) -> SpeedLimitInfo {
        self.speed_limit
    }

    /// Changes of the speed limit ahead, closest first.
    pub fn speed_limit_changes(&self) -> &[SpeedLimitChange] {
        &self.speed_limit_changes
    }

    /// The distance ahead over which a lane change in the given direction is allowed, in m.
    /// Zero if it is not allowed at the current position.
    pub fn legal_lane_change_possibility(&self, dir: LateralDirection) -> f64 {
        match dir {
            LateralDirection::Left => self.legal_left,
            LateralDirection::Right => self.legal_right,
            LateralDirection::None => f64::INFINITY,
        }
    }

    pub fn lane(&self, lane: RelativeLane) -> Option<&LaneInfrastructure> {
        self.lanes.iter().find(|l| l.relative == lane)
    }

    /// Whether the GTU can move onto the lane in the given direction.
    pub fn is_accessible(&self, dir: LateralDirection) -> bool {
        self.lane(dir.relative_lane()).is_some()
    }
}

fn next_on_route<'a>(structure: &'a LaneStructure, record: &LaneRecord) -> Option<&'a LaneRecord> {
    record
        .next
        .iter()
        .map(|idx| &structure.records()[*idx])
        .find(|r| r.on_route)
}
