use super::{LateralDirection, Network};
use crate::{LaneId, LinkId, NetworkError};
use pathfinding::directed::dijkstra::dijkstra;
use std::cell::RefCell;
use std::collections::HashMap;

/// An ordered list of links a GTU intends to follow.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    links: Vec<LinkId>,
}

/// The lane changes needed to stay on a route, as seen from the start of a lane.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneChangeInfo {
    /// The number of lane changes needed.
    pub lane_changes: usize,
    /// The direction of the lane changes.
    pub direction: LateralDirection,
    /// The distance from the start of the lane within which they must be done, in m.
    pub remaining: f64,
}

impl LaneChangeInfo {
    /// No lane changes are needed before the end of the route.
    pub const NONE: Self = Self {
        lane_changes: 0,
        direction: LateralDirection::None,
        remaining: f64::INFINITY,
    };

    /// Whether `self` is a better lane to be on than `other`.
    fn is_better_than(&self, other: &Self) -> bool {
        (self.lane_changes, -self.remaining) < (other.lane_changes, -other.remaining)
    }
}

impl Route {
    /// Creates a route from an ordered list of links.
    pub fn new(links: Vec<LinkId>) -> Self {
        Self { links }
    }

    /// Finds the quickest route between two links at free flow speed.
    pub fn shortest(network: &Network, from: LinkId, to: LinkId) -> Result<Self, NetworkError> {
        network.link(from)?;
        network.link(to)?;
        let result = dijkstra(
            &from,
            |id| successors(network, *id),
            |id| *id == to,
        );
        result
            .map(|(links, _)| Self { links })
            .ok_or(NetworkError::NoRoute { from, to })
    }

    /// The links of the route.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn contains(&self, link: LinkId) -> bool {
        self.links.contains(&link)
    }

    /// The link after the given link, if both are on the route.
    pub fn next_link(&self, link: LinkId) -> Option<LinkId> {
        let idx = self.links.iter().position(|id| *id == link)?;
        self.links.get(idx + 1).copied()
    }

    /// The final link of the route.
    pub fn destination(&self) -> Option<LinkId> {
        self.links.last().copied()
    }

    /// Computes the lane change info of every lane on the route, working back from the end.
    fn lane_change_infos(&self, network: &Network) -> HashMap<LaneId, LaneChangeInfo> {
        let mut infos = HashMap::new();
        for (idx, link_id) in self.links.iter().enumerate().rev() {
            let Ok(link) = network.link(*link_id) else {
                continue;
            };
            let next_link = self.links.get(idx + 1).copied();
            let mut row = link
                .lanes()
                .iter()
                .map(|id| {
                    let lane = network.lane(*id).ok()?;
                    let Some(next_link) = next_link else {
                        return Some(LaneChangeInfo::NONE);
                    };
                    lane.successors()
                        .iter()
                        .filter(|s| network.lane(**s).map(|l| l.link()) == Ok(next_link))
                        .filter_map(|s| infos.get(s))
                        .map(|info: &LaneChangeInfo| LaneChangeInfo {
                            remaining: info.remaining + lane.length(),
                            ..*info
                        })
                        .reduce(|a, b| if b.is_better_than(&a) { b } else { a })
                })
                .collect::<Vec<_>>();

            // Lanes that do not continue on the route must change towards the nearest one that does
            let continuing = row
                .iter()
                .enumerate()
                .filter_map(|(i, info)| info.map(|_| i))
                .collect::<Vec<_>>();
            for (i, id) in link.lanes().iter().enumerate() {
                if row[i].is_some() {
                    continue;
                }
                let nearest = continuing.iter().min_by_key(|j| j.abs_diff(i));
                if let (Some(j), Ok(lane)) = (nearest, network.lane(*id)) {
                    row[i] = Some(LaneChangeInfo {
                        lane_changes: j.abs_diff(i),
                        direction: if *j < i {
                            LateralDirection::Left
                        } else {
                            LateralDirection::Right
                        },
                        remaining: lane.length(),
                    });
                }
            }

            for (id, info) in link.lanes().iter().zip(row) {
                if let Some(info) = info {
                    infos.insert(*id, info);
                }
            }
        }
        infos
    }
}

/// The links reachable from a link, with their free flow travel time in tenths of a second.
fn successors(network: &Network, link_id: LinkId) -> Vec<(LinkId, usize)> {
    network
        .link_successors(link_id)
        .into_iter()
        .filter_map(|id| {
            let link = network.link(id).ok()?;
            let lane = network.lane(*link.lanes().first()?).ok()?;
            let cost = (10. * lane.length() / lane.speed_limit().max(0.1)) as usize;
            Some((id, cost))
        })
        .collect()
}

/// A cache of [LaneChangeInfo] per lane and route, cleared when the network topology changes.
#[derive(Debug, Default)]
pub struct RouteCache {
    inner: RefCell<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    revision: u64,
    routes: HashMap<Route, HashMap<LaneId, LaneChangeInfo>>,
}

impl RouteCache {
    pub fn new() -> Self {
        Default::default()
    }

    /// The lane changes needed on `lane` to follow `route`, or `None` if the lane is not on it.
    pub fn lane_change_info(
        &self,
        network: &Network,
        route: &Route,
        lane: LaneId,
    ) -> Option<LaneChangeInfo> {
        let mut inner = self.inner.borrow_mut();
        if inner.revision != network.revision() {
            inner.routes.clear();
            inner.revision = network.revision();
        }
        if let Some(infos) = inner.routes.get(route) {
            return infos.get(&lane).copied();
        }
        let infos = route.lane_change_infos(network);
        let info = infos.get(&lane).copied();
        inner.routes.insert(route.clone(), infos);
        info
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{LineSegment2d, Point2d};
    use crate::network::LaneAttributes;
    use crate::Compatibility;

    fn lane(network: &mut Network, x0: f64, x1: f64, y: f64) -> LaneId {
        network.add_lane(&LaneAttributes {
            curve: &LineSegment2d::from_ends(Point2d::new(x0, y), Point2d::new(x1, y)),
            width: 3.5,
            speed_limit: 25.0,
            compatibility: Compatibility::All,
            sink: true,
        })
    }

    /// Two lanes that split: the left lane continues to `main`, the right lane exits to `ramp`.
    fn split() -> (Network, [LaneId; 4], [LinkId; 3]) {
        let mut network = Network::new();
        let left = lane(&mut network, 0.0, 200.0, 3.5);
        let right = lane(&mut network, 0.0, 200.0, 0.0);
        let main = lane(&mut network, 200.0, 400.0, 3.5);
        let ramp = lane(&mut network, 200.0, 400.0, -20.0);
        let road = network.add_link(&[left, right]).unwrap();
        let main_link = network.add_link(&[main]).unwrap();
        let ramp_link = network.add_link(&[ramp]).unwrap();
        network.connect(left, main).unwrap();
        network.connect(right, ramp).unwrap();
        (network, [left, right, main, ramp], [road, main_link, ramp_link])
    }

    #[test]
    fn shortest_route() {
        let (network, _, [road, main_link, ramp_link]) = split();
        let route = Route::shortest(&network, road, ramp_link).unwrap();
        assert_eq!(route.links(), &[road, ramp_link]);
        assert!(matches!(
            Route::shortest(&network, main_link, road),
            Err(NetworkError::NoRoute { .. })
        ));
    }

    #[test]
    fn lane_change_info() {
        let (network, [left, right, main, _], [road, _, ramp_link]) = split();
        let cache = RouteCache::new();
        let route = Route::new(vec![road, ramp_link]);
        let info = cache.lane_change_info(&network, &route, left).unwrap();
        assert_eq!(info.lane_changes, 1);
        assert_eq!(info.direction, LateralDirection::Right);
        assert_eq!(info.remaining, 200.0);
        let info = cache.lane_change_info(&network, &route, right).unwrap();
        assert_eq!(info.lane_changes, 0);
        assert!(info.remaining.is_infinite());
        assert_eq!(cache.lane_change_info(&network, &route, main), None);
    }

    #[test]
    fn routes_are_cached_separately() {
        let (network, [left, right, main, _], [road, main_link, ramp_link]) = split();
        let cache = RouteCache::new();
        let to_ramp = Route::new(vec![road, ramp_link]);
        let to_main = Route::new(vec![road, main_link]);
        assert_eq!(
            cache.lane_change_info(&network, &to_ramp, left).unwrap().lane_changes,
            1
        );
        let info = cache.lane_change_info(&network, &to_main, left).unwrap();
        assert_eq!(info.lane_changes, 0);
        let info = cache.lane_change_info(&network, &to_main, right).unwrap();
        assert_eq!(info.lane_changes, 1);
        assert_eq!(info.direction, LateralDirection::Left);
        assert!(cache.lane_change_info(&network, &to_main, main).is_some());
        assert_eq!(cache.inner.borrow().routes.len(), 2);
    }
}
