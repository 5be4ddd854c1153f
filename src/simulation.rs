use crate::gtu::{LaneBasedGtu, LaneBasedGtuCharacteristics, LaneChangeState, LanePosition, Platoon};
use crate::network::{LateralDirection, LightState, Network, RouteCache};
use crate::parameters::{types::*, Parameters};
use crate::perception::Snapshot;
use crate::plan::{build_plan, LaneBasedOperationalPlan, LaneChangeStart, PlanStart};
use crate::schedule::{EventQueue, Scheduler, SimEvent};
use crate::tactical::{SimpleOperationalPlan, TacticalPlanner};
use crate::{Error, GtuId, GtuSet, GtuTypes, PlanError, PlatoonId, TrafficLightId};
use log::{debug, warn};
use slotmap::SlotMap;

/// The outcome of planning one GTU, applied once all GTUs at an instant have planned.
struct Planned {
    id: GtuId,
    planner: Box<dyn TacticalPlanner>,
    parameters: Option<Parameters>,
    plan: LaneBasedOperationalPlan,
    indicator: LateralDirection,
    /// A lane change that starts with this plan.
    lane_change: Option<(LateralDirection, LanePosition)>,
}

/// A traffic simulation of lane-based GTUs driven by their tactical planners.
///
/// Each GTU re-plans when its plan ends. All GTUs due at an instant are first advanced to it,
/// then plan against the same state of the world, and only then have their plans applied.
#[derive(Debug, Default)]
pub struct Simulation {
    /// The road network.
    network: Network,
    /// The GTU type hierarchy.
    types: GtuTypes,
    /// The GTUs being simulated.
    gtus: GtuSet,
    /// Groups of GTUs that change lanes together.
    platoons: SlotMap<PlatoonId, Platoon>,
    /// Pending re-plan and platoon events.
    queue: EventQueue<SimEvent>,
    /// Route lane-change information, shared by all GTUs.
    routes: RouteCache,
}

impl Simulation {
    /// Creates a simulation on a network.
    pub fn new(network: Network, types: GtuTypes) -> Self {
        Self {
            network,
            types,
            ..Default::default()
        }
    }

    /// The current simulation time in s.
    pub fn now(&self) -> f64 {
        self.queue.now()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn types(&self) -> &GtuTypes {
        &self.types
    }

    /// Gets a GTU, if it is still in the simulation.
    pub fn gtu(&self, id: GtuId) -> Option<&LaneBasedGtu> {
        self.gtus.get(id)
    }

    #[cfg(test)]
    pub(crate) fn gtu_mut(&mut self, id: GtuId) -> Option<&mut LaneBasedGtu> {
        self.gtus.get_mut(id)
    }

    /// Returns an iterator over all the GTUs in the simulation.
    pub fn iter_gtus(&self) -> impl Iterator<Item = &LaneBasedGtu> {
        self.gtus.values()
    }

    pub fn platoon(&self, id: PlatoonId) -> Option<&Platoon> {
        self.platoons.get(id)
    }

    /// The state of the world at the current time, as GTUs perceive it.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_at(self.now())
    }

    fn snapshot_at(&self, now: f64) -> Snapshot {
        Snapshot {
            now,
            network: &self.network,
            types: &self.types,
            gtus: &self.gtus,
            routes: &self.routes,
        }
    }

    /// Adds a GTU at a position with a speed. It plans for the first time at the current time.
    pub fn add_gtu(
        &mut self,
        characteristics: LaneBasedGtuCharacteristics,
        position: LanePosition,
        speed: f64,
    ) -> Result<GtuId, Error> {
        self.network.lane(position.lane)?;
        let now = self.now();
        let id = self.gtus.insert_with_key(|id| {
            LaneBasedGtu::new(id, characteristics, position, speed, now)
        });
        self.network.register(position.lane, id)?;
        let event = self.queue.schedule(now, SimEvent::Replan(id));
        self.gtus[id].next_event = Some(event);
        debug!("GTU {:?} added on lane {:?}", id, position.lane);
        Ok(id)
    }

    /// Removes a GTU from the simulation, cancelling its pending events.
    pub fn remove_gtu(&mut self, id: GtuId) -> Option<LaneBasedGtu> {
        let gtu = self.gtus.remove(id)?;
        for reg in gtu.registrations() {
            self.network.deregister(reg.lane, id);
        }
        if let Some(event) = gtu.next_event {
            self.queue.cancel(event);
        }
        if let Some(platoon) = gtu.platoon().and_then(|p| self.platoons.get_mut(p)) {
            platoon.members.retain(|member| *member != id);
        }
        Some(gtu)
    }

    /// Makes a GTU plan anew at the current time, superseding its pending re-plan.
    pub fn trigger_replan(&mut self, id: GtuId) -> Result<(), Error> {
        let gtu = self.gtus.get_mut(id).ok_or(PlanError::NotOnNetwork(id))?;
        if let Some(stale) = gtu.next_event.take() {
            self.queue.cancel(stale);
        }
        let now = self.queue.now();
        gtu.next_event = Some(self.queue.schedule(now, SimEvent::Replan(id)));
        Ok(())
    }

    /// Sets the state of a traffic light. GTUs respond when they next plan.
    pub fn set_light_state(&mut self, id: TrafficLightId, state: LightState) {
        self.network.set_light_state(id, state);
    }

    /// Groups GTUs into a platoon whose lane changes count as complete once every member
    /// has completed its own.
    pub fn create_platoon(&mut self, members: &[GtuId]) -> Result<PlatoonId, Error> {
        for id in members {
            if !self.gtus.contains_key(*id) {
                return Err(PlanError::NotOnNetwork(*id).into());
            }
        }
        let platoon = self.platoons.insert(Platoon {
            members: members.to_vec(),
            completed: 0,
        });
        for id in members {
            self.gtus[*id].platoon = Some(platoon);
        }
        Ok(platoon)
    }

    /// Runs the simulation until time `until`, processing every event due by then.
    ///
    /// Plan errors of single GTUs are logged and the GTU waits; network errors abort the run.
    pub fn run_until(&mut self, until: f64) -> Result<(), Error> {
        while let Some(time) = self.queue.peek_time() {
            if time > until {
                break;
            }
            let mut due = vec![];
            while let Some((_, event)) = self.queue.pop_due(time) {
                match event {
                    SimEvent::Replan(id) => {
                        if let Some(gtu) = self.gtus.get_mut(id) {
                            gtu.next_event = None;
                            due.push(id);
                        }
                    }
                    SimEvent::PlatoonLaneChangeComplete(id) => {
                        if let Some(gtu) = self.gtus.get_mut(id) {
                            gtu.finish_group_lane_change();
                        }
                    }
                }
            }
            self.step(time, &due)?;
        }
        self.queue.advance_to(until);
        Ok(())
    }

    /// Advances, plans and applies the plans of the GTUs due at `time`.
    fn step(&mut self, time: f64, due: &[GtuId]) -> Result<(), Error> {
        let mut planners = Vec::with_capacity(due.len());
        for id in due {
            if self.advance(*id, time)? {
                if let Some(planner) = self.gtus[*id].planner.take() {
                    planners.push((*id, planner));
                } else {
                    warn!("GTU {:?} has no tactical planner", id);
                }
            }
        }

        let snapshot = self.snapshot_at(time);
        let mut planned = Vec::with_capacity(planners.len());
        for (id, planner) in planners {
            planned.push(plan_gtu(&snapshot, id, planner, time)?);
        }

        for outcome in planned {
            let gtu = &mut self.gtus[outcome.id];
            gtu.planner = Some(outcome.planner);
            if let Some((direction, target)) = outcome.lane_change {
                gtu.start_lane_change(direction, target);
                self.network.register(target.lane, outcome.id)?;
            }
            let end = outcome.plan.plan().end_time();
            let parameters = outcome
                .parameters
                .unwrap_or_else(|| (**gtu.parameters()).clone());
            gtu.set_plan(outcome.plan, parameters, outcome.indicator);
            gtu.next_event = Some(self.queue.schedule(end, SimEvent::Replan(outcome.id)));
        }
        Ok(())
    }

    /// Moves a GTU to `time`, updating lane registrations. Returns `false` if the GTU left
    /// the network.
    fn advance(&mut self, id: GtuId, time: f64) -> Result<bool, Error> {
        let Some(gtu) = self.gtus.get_mut(id) else {
            return Ok(false);
        };
        let movement = gtu.advance(time, &self.network)?;
        for lane in &movement.left {
            self.network.deregister(*lane, id);
        }
        for lane in &movement.entered {
            self.network.register(*lane, id)?;
        }
        if movement.exited {
            debug!("GTU {:?} left the network", id);
            self.remove_gtu(id);
            return Ok(false);
        }
        if let (Some(direction), Some(platoon)) = (movement.lane_change_completed, gtu.platoon) {
            gtu.await_group(direction);
            if let Some(platoon) = self.platoons.get_mut(platoon) {
                if platoon.complete_one() {
                    for member in &platoon.members {
                        self.queue
                            .schedule(time, SimEvent::PlatoonLaneChangeComplete(*member));
                    }
                }
            }
        }
        Ok(true)
    }
}

/// Generates and builds the next plan of a GTU. A GTU whose planning fails waits in place
/// for one interval; only network errors are returned.
fn plan_gtu(
    snapshot: &Snapshot,
    id: GtuId,
    mut planner: Box<dyn TacticalPlanner>,
    time: f64,
) -> Result<Planned, Error> {
    let gtu = snapshot.gtu(id)?;
    let mut params = (**gtu.parameters()).clone();
    let decided = planner
        .generate_plan(snapshot, id, &mut params)
        .and_then(|simple| {
            let (plan, lane_change) = build(snapshot, gtu, &params, &simple, time)?;
            Ok((simple, plan, lane_change))
        });
    match decided {
        Ok((simple, plan, lane_change)) => Ok(Planned {
            id,
            planner,
            parameters: Some(params),
            plan,
            indicator: simple.indicator(),
            lane_change,
        }),
        Err(PlanError::Network(err)) => Err(err.into()),
        Err(err) => {
            warn!("GTU {:?} could not plan at {}: {}", id, time, err);
            Ok(Planned {
                id,
                planner,
                parameters: None,
                plan: wait(snapshot, gtu, time)?,
                indicator: gtu.indicator(),
                lane_change: None,
            })
        }
    }
}

/// The lane change state a plan starts with, and the lane change that starts with it.
fn lane_change_start(
    network: &Network,
    gtu: &LaneBasedGtu,
    simple: &SimpleOperationalPlan,
) -> Result<(Option<LaneChangeStart>, Option<(LateralDirection, LanePosition)>), PlanError> {
    match gtu.lane_change() {
        LaneChangeState::Changing {
            direction,
            target,
            progress,
        } => Ok((
            Some(LaneChangeStart {
                direction,
                target,
                progress,
            }),
            None,
        )),
        LaneChangeState::None if simple.is_lane_change() => {
            let reference = gtu.reference();
            let direction = simple.lane_change();
            let Some(target) = network.lane(reference.lane)?.adjacent(direction) else {
                warn!("GTU {:?} has no lane to change to {:?}", gtu.id(), direction);
                return Ok((None, None));
            };
            let position = network.adjacent_position(reference.lane, target, reference.position)?;
            Ok((
                Some(LaneChangeStart {
                    direction,
                    target,
                    progress: 0.0,
                }),
                Some((direction, LanePosition { lane: target, position })),
            ))
        }
        _ => Ok((None, None)),
    }
}

/// Builds the operational plan for a tactical decision.
fn build(
    snapshot: &Snapshot,
    gtu: &LaneBasedGtu,
    params: &Parameters,
    simple: &SimpleOperationalPlan,
    time: f64,
) -> Result<(LaneBasedOperationalPlan, Option<(LateralDirection, LanePosition)>), PlanError> {
    let (lane_change, started) = lane_change_start(snapshot.network, gtu, simple)?;
    let reference = gtu.reference();
    let start = PlanStart {
        time,
        lane: reference.lane,
        position: reference.position,
        speed: gtu.state().speed,
        route: gtu.route(),
        lane_change,
        lane_change_duration: params.get_parameter(&LCDUR)?,
    };
    let plan = build_plan(snapshot.network, &start, simple)?;
    Ok((plan, started))
}

/// A plan that brakes critically to a stop, or stands still if even that cannot be built.
fn wait(snapshot: &Snapshot, gtu: &LaneBasedGtu, time: f64) -> Result<LaneBasedOperationalPlan, Error> {
    let params = gtu.parameters();
    let duration = params.get_parameter(&DT)?;
    let brake = if gtu.state().speed > 0.0 {
        -params.get_parameter(&BCRIT)?
    } else {
        0.0
    };
    let reference = gtu.reference();
    let lane_change = match gtu.lane_change() {
        LaneChangeState::Changing {
            direction,
            target,
            progress,
        } => Some(LaneChangeStart {
            direction,
            target,
            progress,
        }),
        _ => None,
    };
    let mut start = PlanStart {
        time,
        lane: reference.lane,
        position: reference.position,
        speed: gtu.state().speed,
        route: gtu.route(),
        lane_change,
        lane_change_duration: params.get_parameter(&LCDUR)?,
    };
    let simple = SimpleOperationalPlan::new(brake, duration);
    match build_plan(snapshot.network, &start, &simple) {
        Ok(plan) => Ok(plan),
        Err(PlanError::Network(err)) => Err(err.into()),
        Err(err) => {
            warn!("GTU {:?} is halted: {}", gtu.id(), err);
            start.speed = 0.0;
            Ok(build_plan(snapshot.network, &start, &SimpleOperationalPlan::new(0.0, duration))?)
        }
    }
}
