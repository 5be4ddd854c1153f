use super::Snapshot;
use crate::network::{LateralDirection, RelativeLane};
use crate::parameters::{types::*, Parameters};
use crate::{GtuId, LaneId, PlanError};
use arrayvec::ArrayVec;
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};

/// How a lane record was reached from the GTU's position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    /// A lane the GTU is on or directly beside.
    Root,
    Downstream,
    Upstream,
}

/// A lane in a [LaneStructure], positioned relative to the front of the GTU.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneRecord {
    pub lane: LaneId,
    pub relative: RelativeLane,
    pub kind: RecordKind,
    /// Distance from the GTU front to the start of the lane; negative if it starts behind.
    pub start_distance: f64,
    pub length: f64,
    /// Indices of the downstream records.
    pub next: SmallVec<[usize; 2]>,
    /// Indices of the upstream records.
    pub prev: SmallVec<[usize; 2]>,
    /// Whether the GTU drives onto the lane if it stays in its lane. At a split this is the
    /// successor on the route, or the first successor without a route.
    pub on_route: bool,
}

impl LaneRecord {
    /// Distance from the GTU front to the end of the lane.
    pub fn end_distance(&self) -> f64 {
        self.start_distance + self.length
    }
}

/// The lanes around a GTU, bounded by its look-ahead and look-back distances.
///
/// Downstream lanes follow the lanes the GTU will drive on. Lanes that branch off at a split
/// are perceived for a further `max(LOOKBACK, LOOKAHEAD_SPLITS)` past the split, for GTUs
/// that took the branch but have not fully left the shared lane.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneStructure {
    gtu: GtuId,
    time: f64,
    revision: u64,
    records: Vec<LaneRecord>,
    roots: ArrayVec<(RelativeLane, usize), 3>,
}

impl LaneStructure {
    /// Builds the lane structure around a GTU.
    pub fn build(
        snapshot: &Snapshot,
        gtu_id: GtuId,
        params: &Parameters,
    ) -> Result<Self, PlanError> {
        let lookahead = params.get_parameter(&LOOKAHEAD)?;
        let lookback = params.get_parameter(&LOOKBACK)?;
        let splits = params.get_parameter(&LOOKAHEAD_SPLITS)?;

        let gtu = snapshot.gtu(gtu_id)?;
        let network = snapshot.network;
        let reference = gtu.reference();
        let position = gtu
            .position_on(reference.lane, snapshot.now)
            .unwrap_or(reference.position);
        let route = gtu.route();
        let lane = network.lane(reference.lane)?;

        let mut structure = Self {
            gtu: gtu_id,
            time: snapshot.now,
            revision: network.revision(),
            records: vec![],
            roots: ArrayVec::new(),
        };
        let mut index = HashMap::new();

        // Roots: the current lane and its accessible neighbours
        for dir in [
            LateralDirection::None,
            LateralDirection::Left,
            LateralDirection::Right,
        ] {
            let Some(id) = lane.adjacent(dir) else {
                continue;
            };
            let root = network.lane(id)?;
            if dir != LateralDirection::None && !root.allows(gtu.gtu_type(), snapshot.types) {
                continue;
            }
            let pos = network.adjacent_position(reference.lane, id, position)?;
            let idx = structure.push(
                &mut index,
                LaneRecord {
                    lane: id,
                    relative: dir.relative_lane(),
                    kind: RecordKind::Root,
                    start_distance: -pos,
                    length: root.length(),
                    next: SmallVec::new(),
                    prev: SmallVec::new(),
                    on_route: true,
                },
            );
            structure.roots.push((dir.relative_lane(), idx));
        }

        // Downstream, each record carries the horizon of its branch
        let mut queue = structure
            .roots
            .iter()
            .map(|(_, idx)| (*idx, lookahead))
            .collect::<VecDeque<_>>();
        while let Some((idx, horizon)) = queue.pop_front() {
            let record = structure.records[idx].clone();
            if record.end_distance() >= horizon {
                continue;
            }
            let chosen = network.next_lane(record.lane, route)?;
            for succ_id in network.lane(record.lane)?.successors() {
                let succ = network.lane(*succ_id)?;
                if !succ.allows(gtu.gtu_type(), snapshot.types) {
                    continue;
                }
                if let Some(existing) = index.get(succ_id).copied() {
                    structure.link(idx, existing);
                    continue;
                }
                let on_route = record.on_route && chosen == Some(*succ_id);
                let horizon = if record.on_route && !on_route {
                    record.end_distance() + f64::max(lookback, splits)
                } else {
                    horizon
                };
                let next = structure.push(
                    &mut index,
                    LaneRecord {
                        lane: *succ_id,
                        relative: record.relative,
                        kind: RecordKind::Downstream,
                        start_distance: record.end_distance(),
                        length: succ.length(),
                        next: SmallVec::new(),
                        prev: SmallVec::new(),
                        on_route,
                    },
                );
                structure.link(idx, next);
                queue.push_back((next, horizon));
            }
        }

        // Upstream
        let mut queue = structure
            .roots
            .iter()
            .map(|(_, idx)| *idx)
            .collect::<VecDeque<_>>();
        while let Some(idx) = queue.pop_front() {
            let record = structure.records[idx].clone();
            if record.start_distance <= -lookback {
                continue;
            }
            for pred_id in network.lane(record.lane)?.predecessors() {
                let pred = network.lane(*pred_id)?;
                if !pred.allows(gtu.gtu_type(), snapshot.types) {
                    continue;
                }
                if let Some(existing) = index.get(pred_id).copied() {
                    structure.link(existing, idx);
                    continue;
                }
                let prev = structure.push(
                    &mut index,
                    LaneRecord {
                        lane: *pred_id,
                        relative: record.relative,
                        kind: RecordKind::Upstream,
                        start_distance: record.start_distance - pred.length(),
                        length: pred.length(),
                        next: SmallVec::new(),
                        prev: SmallVec::new(),
                        on_route: true,
                    },
                );
                structure.link(prev, idx);
                queue.push_back(prev);
            }
        }

        Ok(structure)
    }

    fn push(&mut self, index: &mut HashMap<LaneId, usize>, record: LaneRecord) -> usize {
        let idx = self.records.len();
        index.insert(record.lane, idx);
        self.records.push(record);
        idx
    }

    fn link(&mut self, from: usize, to: usize) {
        if !self.records[from].next.contains(&to) {
            self.records[from].next.push(to);
        }
        if !self.records[to].prev.contains(&from) {
            self.records[to].prev.push(from);
        }
    }

    /// The GTU the structure belongs to.
    pub fn gtu(&self) -> GtuId {
        self.gtu
    }

    /// The simulation time the structure was built at.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The network revision the structure was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn records(&self) -> &[LaneRecord] {
        &self.records
    }

    /// The relative lanes the GTU can perceive, left to right.
    pub fn relative_lanes(&self) -> impl Iterator<Item = RelativeLane> + '_ {
        let mut lanes = self.roots.iter().map(|(rel, _)| *rel).collect::<ArrayVec<_, 3>>();
        lanes.sort();
        lanes.into_iter()
    }

    /// The record of the lane at the GTU's position.
    pub fn root(&self, lane: RelativeLane) -> Option<&LaneRecord> {
        self.roots
            .iter()
            .find(|(rel, _)| *rel == lane)
            .map(|(_, idx)| &self.records[*idx])
    }

    /// The root and downstream records on the route for a relative lane, ordered by distance.
    pub fn downstream(&self, lane: RelativeLane) -> impl Iterator<Item = &LaneRecord> {
        let mut records = self
            .records
            .iter()
            .filter(|r| r.relative == lane && r.kind != RecordKind::Upstream && r.on_route)
            .collect::<Vec<_>>();
        records.sort_by(|a, b| a.start_distance.total_cmp(&b.start_distance));
        records.into_iter()
    }

    /// All records for a relative lane, in the order they were found.
    pub fn lane_records(&self, lane: RelativeLane) -> impl Iterator<Item = &LaneRecord> {
        self.records.iter().filter(move |r| r.relative == lane)
    }
}
