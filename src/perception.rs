//! What a GTU perceives of its surroundings.
//!
//! Perception is built from a [Snapshot] of the world at one instant, so that every GTU
//! planning at that instant sees the same state. A [LanePerception] caches the result for
//! the instant it was built at.

use crate::gtu::{LaneBasedGtu, LaneChangeState};
use crate::network::{Network, RouteCache};
use crate::parameters::Parameters;
use crate::{GtuId, GtuSet, GtuTypeId, GtuTypes, LaneId, PlanError};
use std::rc::Rc;

pub use headway::{ConflictingGtu, PerceivedConflict, PerceivedGtu, PerceivedLight};
pub use infrastructure::{InfrastructurePerception, LaneInfrastructure, SpeedLimitChange};
pub use intersection::IntersectionPerception;
pub use neighbors::{LaneNeighbors, NeighborsPerception};
pub use structure::{LaneRecord, LaneStructure, RecordKind};

mod headway;
mod infrastructure;
mod intersection;
mod neighbors;
mod structure;

/// The state of the world at one instant, shared by all GTUs planning at that instant.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    /// The current simulation time, in s.
    pub now: f64,
    pub network: &'a Network,
    pub types: &'a GtuTypes,
    pub gtus: &'a GtuSet,
    pub routes: &'a RouteCache,
}

impl<'a> Snapshot<'a> {
    pub fn gtu(&self, id: GtuId) -> Result<&'a LaneBasedGtu, PlanError> {
        self.gtus.get(id).ok_or(PlanError::NotOnNetwork(id))
    }
}

/// Selects the perception categories a GTU has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerceptionSettings {
    pub neighbors: bool,
    pub infrastructure: bool,
    pub intersection: bool,
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            neighbors: true,
            infrastructure: true,
            intersection: true,
        }
    }
}

/// The GTU's own state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EgoPerception {
    pub id: GtuId,
    pub gtu_type: GtuTypeId,
    pub speed: f64,
    pub acceleration: f64,
    pub length: f64,
    pub width: f64,
    pub max_speed: f64,
    /// The reference lane.
    pub lane: LaneId,
    /// The front position on the reference lane, in m.
    pub position: f64,
    pub lane_change: LaneChangeState,
}

/// Everything a GTU perceived at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Perceived {
    time: f64,
    structure: LaneStructure,
    ego: EgoPerception,
    neighbors: Option<NeighborsPerception>,
    infrastructure: Option<InfrastructurePerception>,
    intersection: Option<IntersectionPerception>,
}

impl Perceived {
    /// The time the perception was made at.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn structure(&self) -> &LaneStructure {
        &self.structure
    }

    pub fn ego(&self) -> &EgoPerception {
        &self.ego
    }

    /// The neighbors, failing if the GTU does not perceive them.
    pub fn neighbors(&self) -> Result<&NeighborsPerception, PlanError> {
        self.neighbors
            .as_ref()
            .ok_or(PlanError::MissingPerception("neighbors"))
    }

    pub fn try_neighbors(&self) -> Option<&NeighborsPerception> {
        self.neighbors.as_ref()
    }

    /// The infrastructure, failing if the GTU does not perceive it.
    pub fn infrastructure(&self) -> Result<&InfrastructurePerception, PlanError> {
        self.infrastructure
            .as_ref()
            .ok_or(PlanError::MissingPerception("infrastructure"))
    }

    pub fn try_infrastructure(&self) -> Option<&InfrastructurePerception> {
        self.infrastructure.as_ref()
    }

    /// Traffic lights and conflicts, failing if the GTU does not perceive them.
    pub fn intersection(&self) -> Result<&IntersectionPerception, PlanError> {
        self.intersection
            .as_ref()
            .ok_or(PlanError::MissingPerception("intersection"))
    }

    pub fn try_intersection(&self) -> Option<&IntersectionPerception> {
        self.intersection.as_ref()
    }
}

/// Perceives the lanes around a GTU, once per simulation instant.
#[derive(Clone, Debug, Default)]
pub struct LanePerception {
    settings: PerceptionSettings,
    cache: Option<(f64, u64, Rc<Perceived>)>,
}

impl LanePerception {
    pub fn new(settings: PerceptionSettings) -> Self {
        Self {
            settings,
            cache: None,
        }
    }

    pub fn settings(&self) -> &PerceptionSettings {
        &self.settings
    }

    /// Perceives the surroundings of `ego`, reusing the previous result if it was made at
    /// the same instant on the same network revision.
    pub fn perceive(
        &mut self,
        snapshot: &Snapshot,
        ego: GtuId,
        params: &Parameters,
    ) -> Result<Rc<Perceived>, PlanError> {
        if let Some((time, revision, perceived)) = &self.cache {
            if *time == snapshot.now
                && *revision == snapshot.network.revision()
                && perceived.ego.id == ego
            {
                return Ok(perceived.clone());
            }
        }
        let perceived = Rc::new(self.build(snapshot, ego, params)?);
        self.cache = Some((
            snapshot.now,
            snapshot.network.revision(),
            perceived.clone(),
        ));
        Ok(perceived)
    }

    fn build(
        &self,
        snapshot: &Snapshot,
        ego_id: GtuId,
        params: &Parameters,
    ) -> Result<Perceived, PlanError> {
        let gtu = snapshot.gtu(ego_id)?;
        let reference = gtu.reference();
        let ego = EgoPerception {
            id: ego_id,
            gtu_type: gtu.gtu_type(),
            speed: gtu.speed_at(snapshot.now),
            acceleration: gtu.acceleration_at(snapshot.now),
            length: gtu.length(),
            width: gtu.width(),
            max_speed: gtu.max_speed(),
            lane: reference.lane,
            position: gtu
                .position_on(reference.lane, snapshot.now)
                .unwrap_or(reference.position),
            lane_change: gtu.lane_change(),
        };
        let structure = LaneStructure::build(snapshot, ego_id, params)?;
        let neighbors = match self.settings.neighbors {
            true => Some(NeighborsPerception::build(snapshot, &structure, &ego, params)?),
            false => None,
        };
        let infrastructure = match self.settings.infrastructure {
            true => Some(InfrastructurePerception::build(
                snapshot, &structure, &ego, gtu, params,
            )?),
            false => None,
        };
        let intersection = match self.settings.intersection {
            true => Some(IntersectionPerception::build(snapshot, &structure, params)?),
            false => None,
        };
        Ok(Perceived {
            time: snapshot.now,
            structure,
            ego,
            neighbors,
            infrastructure,
            intersection,
        })
    }
}
