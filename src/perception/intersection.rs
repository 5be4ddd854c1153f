use super::{ConflictingGtu, LaneStructure, PerceivedConflict, PerceivedLight, Snapshot};
use crate::network::RelativeLane;
use crate::parameters::{types::*, Parameters};
use crate::{LaneId, PlanError};
use std::collections::HashSet;

/// Traffic lights and conflicts on the lanes ahead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntersectionPerception {
    lights: Vec<PerceivedLight>,
    conflicts: Vec<PerceivedConflict>,
}

impl IntersectionPerception {
    pub(super) fn build(
        snapshot: &Snapshot,
        structure: &LaneStructure,
        params: &Parameters,
    ) -> Result<Self, PlanError> {
        let network = snapshot.network;
        let lookahead = params.get_parameter(&LOOKAHEAD)?;
        let mut lights = vec![];
        let mut conflicts = vec![];
        for record in structure.downstream(RelativeLane::CURRENT) {
            let lane = network.lane(record.lane)?;
            for light in lane.lights().iter().filter_map(|id| network.light(*id)) {
                let distance = record.start_distance + light.position();
                if distance >= 0.0 && distance <= lookahead {
                    lights.push(PerceivedLight {
                        id: light.id(),
                        distance,
                        state: light.state(),
                    });
                }
            }
            for conflict in lane.conflicts().iter().filter_map(|id| network.conflict(*id)) {
                let distance = record.start_distance + conflict.position();
                if distance + conflict.length() < 0.0 || distance > lookahead {
                    continue;
                }
                let Some(other) = network.conflict(conflict.other()) else {
                    continue;
                };
                let mut conflicting = vec![];
                let mut seen = HashSet::new();
                // Walk upstream from the conflict on the other lane
                let mut queue: Vec<(LaneId, f64)> = vec![(other.lane(), other.position())];
                while let Some((lane_id, offset)) = queue.pop() {
                    let lane = network.lane(lane_id)?;
                    for id in lane.gtus() {
                        if *id == structure.gtu() || !seen.insert(*id) {
                            continue;
                        }
                        let gtu = snapshot.gtu(*id)?;
                        let Some(position) = gtu.position_on(lane_id, snapshot.now) else {
                            continue;
                        };
                        let to_conflict = offset - position;
                        let cleared = to_conflict + other.length() + gtu.length() <= 0.0;
                        if cleared || to_conflict > lookahead {
                            continue;
                        }
                        conflicting.push(ConflictingGtu {
                            id: *id,
                            distance: to_conflict,
                            speed: gtu.speed_at(snapshot.now),
                            length: gtu.length(),
                        });
                    }
                    if offset < lookahead {
                        for pred in lane.predecessors() {
                            let length = network.lane(*pred)?.length();
                            queue.push((*pred, offset + length));
                        }
                    }
                }
                conflicting.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                conflicts.push(PerceivedConflict {
                    id: conflict.id(),
                    distance,
                    length: conflict.length(),
                    priority: conflict.priority(),
                    conflicting,
                });
            }
        }
        lights.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        conflicts.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(Self { lights, conflicts })
    }

    /// Traffic lights ahead, closest first.
    pub fn lights(&self) -> &[PerceivedLight] {
        &self.lights
    }

    /// Conflicts ahead, closest first.
    pub fn conflicts(&self) -> &[PerceivedConflict] {
        &self.conflicts
    }
}
