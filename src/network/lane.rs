use super::LateralDirection;
use crate::math::{ParametricCurve2d, Polyline};
use crate::{Compatibility, ConflictId, GtuId, GtuTypeId, GtuTypes, LaneId, LinkId, TrafficLightId};
use smallvec::SmallVec;

/// The maximum chord length when sampling a lane's curve, in m.
const SAMPLE_LENGTH: f64 = 1.0;

/// The attributes of a lane.
pub struct LaneAttributes<'a> {
    /// The centre line of the lane.
    pub curve: &'a dyn ParametricCurve2d,
    /// The lane width in m.
    pub width: f64,
    /// The speed limit in m/s.
    pub speed_limit: f64,
    /// The GTU types allowed on the lane.
    pub compatibility: Compatibility,
    /// Whether GTUs may drive off the end of the lane and leave the network.
    pub sink: bool,
}

/// A single lane of a road.
#[derive(Clone, Debug)]
pub struct Lane {
    id: LaneId,
    pub(super) link: LinkId,
    centerline: Polyline,
    width: f64,
    speed_limit: f64,
    compatibility: Compatibility,
    sink: bool,
    pub(super) left: Option<LaneId>,
    pub(super) right: Option<LaneId>,
    pub(super) change_left: bool,
    pub(super) change_right: bool,
    pub(super) successors: SmallVec<[LaneId; 2]>,
    pub(super) predecessors: SmallVec<[LaneId; 2]>,
    pub(super) lights: SmallVec<[TrafficLightId; 2]>,
    pub(super) conflicts: SmallVec<[ConflictId; 2]>,
    /// The GTUs registered on the lane.
    pub(super) gtus: Vec<GtuId>,
}

impl Lane {
    pub(super) fn new(id: LaneId, attributes: &LaneAttributes) -> Self {
        let curve = attributes.curve;
        let points = curve.subdivide(SAMPLE_LENGTH);
        let centerline = Polyline::new(points)
            .unwrap_or_else(|| Polyline::point(curve.sample(curve.bounds().min)));
        Self {
            id,
            link: LinkId::default(),
            centerline,
            width: attributes.width,
            speed_limit: attributes.speed_limit,
            compatibility: attributes.compatibility.clone(),
            sink: attributes.sink,
            left: None,
            right: None,
            change_left: true,
            change_right: true,
            successors: SmallVec::new(),
            predecessors: SmallVec::new(),
            lights: SmallVec::new(),
            conflicts: SmallVec::new(),
            gtus: vec![],
        }
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    /// The link the lane belongs to, or a null key if it is not part of a link.
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// The length of the lane in m.
    pub fn length(&self) -> f64 {
        self.centerline.length()
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    pub fn centerline(&self) -> &Polyline {
        &self.centerline
    }

    pub fn compatibility(&self) -> &Compatibility {
        &self.compatibility
    }

    /// Whether GTUs can leave the network at the end of this lane.
    pub fn is_sink(&self) -> bool {
        self.sink
    }

    pub fn left(&self) -> Option<LaneId> {
        self.left
    }

    pub fn right(&self) -> Option<LaneId> {
        self.right
    }

    /// The adjacent lane in the given direction.
    pub fn adjacent(&self, dir: LateralDirection) -> Option<LaneId> {
        match dir {
            LateralDirection::Left => self.left,
            LateralDirection::Right => self.right,
            LateralDirection::None => Some(self.id),
        }
    }

    /// Whether traffic rules allow changing from this lane in the given direction.
    pub fn allows_lane_change(&self, dir: LateralDirection) -> bool {
        match dir {
            LateralDirection::Left => self.change_left && self.left.is_some(),
            LateralDirection::Right => self.change_right && self.right.is_some(),
            LateralDirection::None => true,
        }
    }

    pub fn successors(&self) -> &[LaneId] {
        &self.successors
    }

    pub fn predecessors(&self) -> &[LaneId] {
        &self.predecessors
    }

    pub fn lights(&self) -> &[TrafficLightId] {
        &self.lights
    }

    pub fn conflicts(&self) -> &[ConflictId] {
        &self.conflicts
    }

    /// The GTUs registered on the lane.
    pub fn gtus(&self) -> &[GtuId] {
        &self.gtus
    }

    /// Whether a GTU of the given type may use the lane.
    pub fn allows(&self, ty: GtuTypeId, types: &GtuTypes) -> bool {
        self.compatibility.allows(ty, types)
    }
}
