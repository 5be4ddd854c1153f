//! The lane-based road network: lanes, links, traffic lights and conflicts.

use crate::math::Point2d;
use crate::{ConflictId, GtuId, LaneId, LinkId, NetworkError, TrafficLightId};
use slotmap::SlotMap;
use smallvec::SmallVec;

pub use lane::{Lane, LaneAttributes};
pub use object::{Conflict, ConflictSide, LightState, Priority, TrafficLight};
pub use route::{LaneChangeInfo, Route, RouteCache};

mod lane;
mod object;
mod route;

/// A lateral direction, relative to the direction of travel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LateralDirection {
    #[default]
    None,
    Left,
    Right,
}

impl LateralDirection {
    /// The opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }

    /// The adjacent lane in this direction.
    pub fn relative_lane(self) -> RelativeLane {
        RelativeLane::CURRENT.adjacent(self)
    }
}

/// A lane relative to the lane a GTU drives on; negative values are to the left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelativeLane(pub i8);

impl RelativeLane {
    pub const LEFT: Self = Self(-1);
    pub const CURRENT: Self = Self(0);
    pub const RIGHT: Self = Self(1);

    /// The next lane over in the given direction.
    pub fn adjacent(self, dir: LateralDirection) -> Self {
        match dir {
            LateralDirection::None => self,
            LateralDirection::Left => Self(self.0 - 1),
            LateralDirection::Right => Self(self.0 + 1),
        }
    }

    /// The side of the current lane this lane is on.
    pub fn lateral(self) -> LateralDirection {
        match self.0 {
            0 => LateralDirection::None,
            x if x < 0 => LateralDirection::Left,
            _ => LateralDirection::Right,
        }
    }
}

/// A set of parallel lanes, ordered left to right.
#[derive(Clone, Debug)]
pub struct Link {
    id: LinkId,
    lanes: SmallVec<[LaneId; 4]>,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// The lanes of the link, ordered left to right.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }
}

/// The road network.
#[derive(Clone, Debug, Default)]
pub struct Network {
    lanes: SlotMap<LaneId, Lane>,
    links: SlotMap<LinkId, Link>,
    lights: SlotMap<TrafficLightId, TrafficLight>,
    conflicts: SlotMap<ConflictId, Conflict>,
    /// Incremented on every change to the topology.
    revision: u64,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// The topology revision, which changes whenever lanes or their connections change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Adds a lane to the network.
    pub fn add_lane(&mut self, attributes: &LaneAttributes) -> LaneId {
        self.revision += 1;
        self.lanes.insert_with_key(|id| Lane::new(id, attributes))
    }

    /// Groups lanes into a link. The lanes must be ordered left to right;
    /// each becomes the lateral neighbour of the next.
    pub fn add_link(&mut self, lane_ids: &[LaneId]) -> Result<LinkId, NetworkError> {
        for id in lane_ids {
            self.lane(*id)?;
        }
        self.revision += 1;
        let link_id = self.links.insert_with_key(|id| Link {
            id,
            lanes: lane_ids.iter().copied().collect(),
        });
        for (idx, id) in lane_ids.iter().enumerate() {
            let lane = &mut self.lanes[*id];
            lane.link = link_id;
            lane.left = idx.checked_sub(1).map(|i| lane_ids[i]);
            lane.right = lane_ids.get(idx + 1).copied();
        }
        Ok(link_id)
    }

    /// Specifies that the end of the `from` lane connects to the start of the `to` lane.
    pub fn connect(&mut self, from: LaneId, to: LaneId) -> Result<(), NetworkError> {
        let [a, b] = self
            .lanes
            .get_disjoint_mut([from, to])
            .ok_or(NetworkError::UnknownLane(from))?;
        if !a.successors.contains(&to) {
            a.successors.push(to);
        }
        if !b.predecessors.contains(&from) {
            b.predecessors.push(from);
        }
        self.revision += 1;
        Ok(())
    }

    /// Forbids lane changes from the lane in the given direction.
    pub fn restrict_lane_change(
        &mut self,
        lane: LaneId,
        dir: LateralDirection,
    ) -> Result<(), NetworkError> {
        let lane = self
            .lanes
            .get_mut(lane)
            .ok_or(NetworkError::UnknownLane(lane))?;
        match dir {
            LateralDirection::Left => lane.change_left = false,
            LateralDirection::Right => lane.change_right = false,
            LateralDirection::None => {}
        }
        self.revision += 1;
        Ok(())
    }

    /// Adds a traffic light (stop line) on a lane.
    pub fn add_traffic_light(
        &mut self,
        lane: LaneId,
        position: f64,
    ) -> Result<TrafficLightId, NetworkError> {
        self.lane(lane)?;
        self.revision += 1;
        let id = self.lights.insert_with_key(|id| TrafficLight {
            id,
            lane,
            position,
            state: LightState::Red,
        });
        self.lanes[lane].lights.push(id);
        Ok(id)
    }

    /// Sets the state of a traffic light.
    pub fn set_light_state(&mut self, id: TrafficLightId, state: LightState) {
        if let Some(light) = self.lights.get_mut(id) {
            light.state = state;
        }
    }

    /// Adds a conflict between two lanes that cross or merge.
    pub fn add_conflict(
        &mut self,
        a: ConflictSide,
        b: ConflictSide,
    ) -> Result<(ConflictId, ConflictId), NetworkError> {
        self.lane(a.lane)?;
        self.lane(b.lane)?;
        self.revision += 1;
        let id_a = self.conflicts.insert_with_key(|id| Conflict::new(id, &a));
        let id_b = self.conflicts.insert_with_key(|id| Conflict::new(id, &b));
        self.conflicts[id_a].other = id_b;
        self.conflicts[id_b].other = id_a;
        self.lanes[a.lane].conflicts.push(id_a);
        self.lanes[b.lane].conflicts.push(id_b);
        Ok((id_a, id_b))
    }

    /// Gets a lane.
    pub fn lane(&self, id: LaneId) -> Result<&Lane, NetworkError> {
        self.lanes.get(id).ok_or(NetworkError::UnknownLane(id))
    }

    /// Gets a link.
    pub fn link(&self, id: LinkId) -> Result<&Link, NetworkError> {
        self.links.get(id).ok_or(NetworkError::UnknownLink(id))
    }

    pub fn light(&self, id: TrafficLightId) -> Option<&TrafficLight> {
        self.lights.get(id)
    }

    pub fn conflict(&self, id: ConflictId) -> Option<&Conflict> {
        self.conflicts.get(id)
    }

    /// Returns an iterator over all the lanes.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// Returns an iterator over all the links.
    pub fn iter_links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Returns an iterator over all the traffic lights.
    pub fn iter_lights(&self) -> impl Iterator<Item = &TrafficLight> {
        self.lights.values()
    }

    /// The links reachable from the end of a link.
    pub fn link_successors(&self, link: LinkId) -> SmallVec<[LinkId; 4]> {
        let mut out = SmallVec::<[LinkId; 4]>::new();
        let lanes = self.links.get(link).map(|l| l.lanes()).unwrap_or_default();
        for lane in lanes.iter().filter_map(|id| self.lanes.get(*id)) {
            for succ in lane.successors().iter().filter_map(|id| self.lanes.get(*id)) {
                if !out.contains(&succ.link()) {
                    out.push(succ.link());
                }
            }
        }
        out
    }

    /// The lane a GTU continues on after `lane`: the first successor on the route, or the
    /// first successor if there is no route or none of them is on it.
    pub fn next_lane(
        &self,
        lane: LaneId,
        route: Option<&Route>,
    ) -> Result<Option<LaneId>, NetworkError> {
        let successors = self.lane(lane)?.successors();
        if let Some(route) = route {
            for id in successors {
                if route.contains(self.lane(*id)?.link()) {
                    return Ok(Some(*id));
                }
            }
        }
        Ok(successors.first().copied())
    }

    /// Maps a position on one lane onto another lane by fraction of length.
    pub fn adjacent_position(
        &self,
        from: LaneId,
        to: LaneId,
        pos: f64,
    ) -> Result<f64, NetworkError> {
        let from = self.lane(from)?;
        let to = self.lane(to)?;
        Ok(pos * to.length() / from.length().max(f64::EPSILON))
    }

    /// The point at a position along a lane.
    pub fn location(&self, lane: LaneId, pos: f64) -> Result<Point2d, NetworkError> {
        Ok(self.lane(lane)?.centerline().sample(pos).pos)
    }

    /// Checks that all references between lanes exist and are mutual.
    pub fn validate(&self) -> Result<(), NetworkError> {
        for (id, lane) in &self.lanes {
            for succ in lane.successors() {
                if !self.lane(*succ)?.predecessors().contains(&id) {
                    return Err(NetworkError::AsymmetricConnection {
                        from: id,
                        to: *succ,
                    });
                }
            }
            for pred in lane.predecessors() {
                if !self.lane(*pred)?.successors().contains(&id) {
                    return Err(NetworkError::AsymmetricConnection {
                        from: *pred,
                        to: id,
                    });
                }
            }
            if let Some(left) = lane.left() {
                if self.lane(left)?.right() != Some(id) {
                    return Err(NetworkError::AsymmetricAdjacency {
                        lane: id,
                        other: left,
                    });
                }
            }
            if let Some(right) = lane.right() {
                if self.lane(right)?.left() != Some(id) {
                    return Err(NetworkError::AsymmetricAdjacency {
                        lane: id,
                        other: right,
                    });
                }
            }
        }
        Ok(())
    }

    /// Registers a GTU on a lane.
    pub(crate) fn register(&mut self, lane: LaneId, gtu: GtuId) -> Result<(), NetworkError> {
        let lane = self
            .lanes
            .get_mut(lane)
            .ok_or(NetworkError::UnknownLane(lane))?;
        if !lane.gtus.contains(&gtu) {
            lane.gtus.push(gtu);
        }
        Ok(())
    }

    /// Removes a GTU's registration from a lane.
    pub(crate) fn deregister(&mut self, lane: LaneId, gtu: GtuId) {
        if let Some(lane) = self.lanes.get_mut(lane) {
            lane.gtus.retain(|id| *id != gtu);
        }
    }
}
