use super::{EgoPerception, LaneStructure, PerceivedGtu, Snapshot};
use crate::gtu::LaneChangeState;
use crate::network::{LateralDirection, RelativeLane};
use crate::parameters::{types::*, Parameters};
use crate::PlanError;
use arrayvec::ArrayVec;
use std::collections::HashSet;

/// The GTUs around the ego GTU on one relative lane.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneNeighbors {
    pub relative: RelativeLane,
    /// GTUs ahead, closest first.
    pub leaders: Vec<PerceivedGtu>,
    /// GTUs behind, closest first.
    pub followers: Vec<PerceivedGtu>,
    /// GTUs overlapping the ego GTU longitudinally.
    pub alongside: Vec<PerceivedGtu>,
}

/// Leaders, followers and adjacent GTUs on the current and adjacent lanes.
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborsPerception {
    lanes: ArrayVec<LaneNeighbors, 3>,
}

impl NeighborsPerception {
    pub(super) fn build(
        snapshot: &Snapshot,
        structure: &LaneStructure,
        ego: &EgoPerception,
        params: &Parameters,
    ) -> Result<Self, PlanError> {
        let lookahead = params.get_parameter(&LOOKAHEAD)?;
        let lookback = params.get_parameter(&LOOKBACK)?;
        let mut lanes = ArrayVec::new();
        for relative in structure.relative_lanes() {
            let mut neighbors = LaneNeighbors {
                relative,
                leaders: vec![],
                followers: vec![],
                alongside: vec![],
            };
            let mut seen = HashSet::new();
            for record in structure.lane_records(relative) {
                let lane = snapshot.network.lane(record.lane)?;
                for id in lane.gtus() {
                    if *id == ego.id || !seen.insert(*id) {
                        continue;
                    }
                    let gtu = snapshot.gtu(*id)?;
                    let Some(position) = gtu.position_on(record.lane, snapshot.now) else {
                        continue;
                    };
                    // On a branch only while the rear is still on the lane before the split
                    if !record.on_route && position >= gtu.length() {
                        continue;
                    }
                    let front = record.start_distance + position;
                    let rear = front - gtu.length();
                    let (distance, list) = if rear >= 0.0 {
                        (rear, &mut neighbors.leaders)
                    } else if front <= -ego.length {
                        (front + ego.length, &mut neighbors.followers)
                    } else {
                        (0.0, &mut neighbors.alongside)
                    };
                    if distance > lookahead || distance < -lookback {
                        continue;
                    }
                    list.push(PerceivedGtu {
                        id: *id,
                        gtu_type: gtu.gtu_type(),
                        distance,
                        length: gtu.length(),
                        width: gtu.width(),
                        speed: gtu.speed_at(snapshot.now),
                        acceleration: gtu.acceleration_at(snapshot.now),
                        max_speed: gtu.max_speed(),
                        parameters: gtu.parameters().clone(),
                        lane_change: match gtu.lane_change() {
                            LaneChangeState::Changing { direction, .. } => direction,
                            _ => LateralDirection::None,
                        },
                        indicator: gtu.indicator(),
                    });
                }
            }
            neighbors
                .leaders
                .sort_by(|a, b| a.distance.total_cmp(&b.distance));
            neighbors
                .followers
                .sort_by(|a, b| b.distance.total_cmp(&a.distance));
            lanes.push(neighbors);
        }
        Ok(Self { lanes })
    }

    /// The neighbors on a relative lane, or `None` if the lane is not accessible.
    pub fn lane(&self, lane: RelativeLane) -> Option<&LaneNeighbors> {
        self.lanes.iter().find(|n| n.relative == lane)
    }

    pub fn leaders(&self, lane: RelativeLane) -> &[PerceivedGtu] {
        self.lane(lane)
            .map(|n| n.leaders.as_slice())
            .unwrap_or_default()
    }

    pub fn followers(&self, lane: RelativeLane) -> &[PerceivedGtu] {
        self.lane(lane)
            .map(|n| n.followers.as_slice())
            .unwrap_or_default()
    }

    pub fn alongside(&self, lane: RelativeLane) -> &[PerceivedGtu] {
        self.lane(lane)
            .map(|n| n.alongside.as_slice())
            .unwrap_or_default()
    }

    /// The closest leader on a relative lane.
    pub fn leader(&self, lane: RelativeLane) -> Option<&PerceivedGtu> {
        self.leaders(lane).first()
    }

    /// The closest follower on a relative lane.
    pub fn follower(&self, lane: RelativeLane) -> Option<&PerceivedGtu> {
        self.followers(lane).first()
    }

    pub fn is_gtu_alongside(&self, lane: RelativeLane) -> bool {
        !self.alongside(lane).is_empty()
    }
}

#[cfg(test)]
mod test {
    use crate::network::RelativeLane;
    use crate::testing::Scene;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn closest_first() {
        let mut scene = Scene::road(2, 1000.0, true);
        let ego = scene.add(1, 100.0, 20.0);
        let far = scene.add(1, 200.0, 20.0);
        let near = scene.add(1, 120.0, 20.0);
        let mid = scene.add(1, 150.0, 20.0);
        let behind_far = scene.add(1, 40.0, 20.0);
        let behind_near = scene.add(1, 80.0, 20.0);
        let beside = scene.add(0, 102.0, 20.0);

        let perceived = scene.perceive(ego);
        let neighbors = perceived.neighbors().unwrap();
        let ids = |gtus: &[super::PerceivedGtu]| gtus.iter().map(|g| g.id).collect::<Vec<_>>();
        assert_eq!(ids(neighbors.leaders(RelativeLane::CURRENT)), [near, mid, far]);
        assert_eq!(ids(neighbors.followers(RelativeLane::CURRENT)), [behind_near, behind_far]);
        assert_approx_eq!(neighbors.leader(RelativeLane::CURRENT).unwrap().distance, 16.0);
        assert_approx_eq!(neighbors.follower(RelativeLane::CURRENT).unwrap().gap(), 16.0);
        assert_eq!(ids(neighbors.alongside(RelativeLane::LEFT)), [beside]);
        assert!(neighbors.is_gtu_alongside(RelativeLane::LEFT));
        assert!(neighbors.lane(RelativeLane::RIGHT).is_none());
    }

    #[test]
    fn bounded_by_lookahead_and_lookback() {
        let mut scene = Scene::road(1, 1000.0, true);
        let ego = scene.add(0, 300.0, 20.0);
        scene.add(0, 700.0, 20.0);
        scene.add(0, 50.0, 20.0);
        let perceived = scene.perceive(ego);
        let neighbors = perceived.neighbors().unwrap();
        assert!(neighbors.leaders(RelativeLane::CURRENT).is_empty());
        assert!(neighbors.followers(RelativeLane::CURRENT).is_empty());
    }
}
