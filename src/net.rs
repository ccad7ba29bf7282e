use crate::brain::{Brain, ThinkContext};
use crate::lane::{EdgeLeave, LaneAttributes};
use crate::math::{Point2d, Vector2d};
use crate::{
    Agent, AgentId, AgentSet, AgentState, Edge, EdgeId, EdgeSet, Junction, JunctionId, JunctionSet,
    Lane, LaneId, LaneSet, Route, RouteId, SimError, SimResult, Vehicle,
};
use log::{debug, info, warn};
use pathfinding::directed::dijkstra::dijkstra;
use slotmap::{Key, SecondaryMap, SlotMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A road network and the agents driving on it.
#[derive(Default)]
pub struct Net {
    /// The junctions of the network.
    junctions: JunctionSet,
    /// The edges of the network.
    edges: EdgeSet,
    /// The lanes of the network.
    lanes: LaneSet,
    /// The agents being simulated.
    agents: AgentSet,
    /// The brain of each agent.
    brains: SecondaryMap<AgentId, Box<dyn Brain>>,
    /// Routes which have not departed yet.
    routes: SlotMap<RouteId, Route>,
    /// The number of ticks simulated so far.
    frame: usize,
}

/// What happened during one tick of simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickReport {
    /// The index of the tick.
    pub frame: usize,
    /// The simulated time advanced, in s.
    pub duration: f64,
    /// The total simulated time at the start of the tick, in s.
    pub total_time: f64,
    /// The number of agents spawned from routes.
    pub spawned: usize,
    /// The number of agents removed after crashing.
    pub collisions: usize,
    /// The number of agents which reached their destination.
    pub arrivals: usize,
    /// The number of agents which moved to a neighbouring lane.
    pub lane_changes: usize,
    /// The number of agents which moved across a junction.
    pub edge_transfers: usize,
}

impl Net {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a junction at the given location.
    pub fn add_junction(&mut self, pos: Point2d) -> JunctionId {
        self.junctions.insert_with_key(|id| Junction::new(id, pos))
    }

    /// Adds an edge leading from one junction to another.
    pub fn add_edge(&mut self, from: JunctionId, to: JunctionId) -> SimResult<EdgeId> {
        if !self.junctions.contains_key(to) {
            return Err(SimError::UnknownJunction(to));
        }
        let start = self
            .junctions
            .get_mut(from)
            .ok_or(SimError::UnknownJunction(from))?;
        let edge_id = self.edges.insert_with_key(|id| Edge::new(id, from, to));
        start.add_edge_out(edge_id);
        self.junctions[to].add_edge_in(edge_id);
        Ok(edge_id)
    }

    /// Adds a lane to an edge. Lanes are indexed in the order they are added,
    /// starting from the rightmost.
    pub fn add_lane(&mut self, edge: EdgeId, attributes: &LaneAttributes) -> SimResult<LaneId> {
        let index = self
            .edges
            .get(edge)
            .ok_or(SimError::UnknownEdge(edge))?
            .lanes()
            .len();
        let lane = Lane::new(LaneId::null(), edge, index, attributes)?;
        let lane_id = self.lanes.insert_with_key(|id| {
            let mut lane = lane;
            lane.id = id;
            lane
        });
        self.edges[edge].push_lane(lane_id);
        Ok(lane_id)
    }

    /// Specifies that agents at the end of `from` may continue onto `to`.
    /// The two lanes must meet at a junction.
    pub fn add_lane_connection(&mut self, from: LaneId, to: LaneId) -> SimResult<()> {
        let from_lane = self.lanes.get(from).ok_or(SimError::UnknownLane(from))?;
        let to_lane = self.lanes.get(to).ok_or(SimError::UnknownLane(to))?;
        let end = self.edges[from_lane.edge_id()].end();
        if !to_lane.comes_from(end, &self.edges) {
            return Err(SimError::NotJunctionAdjacent { from, to });
        }
        self.lanes[from].add_lane_out(to);
        Ok(())
    }

    /// Schedules a route for departure.
    pub fn add_route(&mut self, route: Route) -> SimResult<RouteId> {
        if route.lanes().is_empty() {
            return Err(SimError::EmptyRoute);
        }
        if let Some(lane) = route.lanes().iter().find(|id| !self.lanes.contains_key(**id)) {
            return Err(SimError::UnknownLane(*lane));
        }
        Ok(self.routes.insert(route))
    }

    /// Cancels a route that has not departed yet.
    pub fn remove_route(&mut self, id: RouteId) -> SimResult<Route> {
        self.routes.remove(id).ok_or(SimError::UnknownRoute(id))
    }

    /// Finds the shortest path of lanes from `from` to any lane of the edge `to`.
    pub fn plan_route(&self, from: LaneId, to: EdgeId, departure_time: f64) -> Option<Route> {
        self.lanes.get(from)?;
        let (lanes, _) = dijkstra(
            &from,
            |id| self.successors(*id),
            |id| self.lanes.get(*id).map_or(false, |lane| lane.edge_id() == to),
        )?;
        Route::new(departure_time, lanes).ok()
    }

    /// Adds an agent to a lane at the given position in m.
    pub fn add_agent(
        &mut self,
        vehicle: Vehicle,
        brain: Box<dyn Brain>,
        lane_id: LaneId,
        pos: f64,
    ) -> SimResult<AgentId> {
        let lane = self
            .lanes
            .get_mut(lane_id)
            .ok_or(SimError::UnknownLane(lane_id))?;
        let agent = Agent::new(AgentId::null(), vehicle, lane_id, pos, lane.length())?;
        let agent_id = self.agents.insert_with_key(|id| {
            let mut agent = agent;
            agent.id = id;
            agent
        });
        lane.add_agent(&self.agents[agent_id])?;
        self.brains.insert(agent_id, brain);
        Ok(agent_id)
    }

    /// Sets the velocity of an agent in m/s, bounded by its vehicle's top speed.
    pub fn set_agent_velocity(&mut self, id: AgentId, vel: f64) -> SimResult<()> {
        let agent = self.agents.get_mut(id).ok_or(SimError::UnknownAgent(id))?;
        if !(0.0..=agent.vehicle().max_speed()).contains(&vel) {
            return Err(SimError::InvalidVehicle("velocity must lie between zero and the top speed"));
        }
        agent.set_velocity(vel);
        Ok(())
    }

    /// Adds an agent at the start of a route. It leaves the simulation once it
    /// reaches the end of the edge the route finishes on.
    pub fn spawn(&mut self, route: &Route, brain: Box<dyn Brain>) -> SimResult<AgentId> {
        let (Some(start_lane), Some(end_lane)) = (route.start_lane(), route.end_lane()) else {
            return Err(SimError::EmptyRoute);
        };
        let destination = self
            .lanes
            .get(end_lane)
            .ok_or(SimError::UnknownLane(end_lane))?
            .edge_id();
        let agent_id = self.add_agent(*route.vehicle(), brain, start_lane, 0.0)?;
        self.agents[agent_id].set_route(route.lanes(), Some(destination));
        info!("Agent {:?} spawned on {:?}", agent_id, start_lane);
        Ok(agent_id)
    }

    /// Removes an agent from the simulation.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(id)?;
        self.brains.remove(id);
        if let Some(lane) = self.lanes.get_mut(agent.lane_id()) {
            if !lane.remove_agent(&agent) {
                lane.discard_edge_leave_candidate(id);
            }
        }
        Some(agent)
    }

    /// Removes every route due to depart before `time`, in order of departure.
    pub fn take_due_routes(&mut self, time: f64) -> Vec<Route> {
        let mut due = self
            .routes
            .iter()
            .filter(|(_, route)| route.is_due(time))
            .map(|(id, route)| (id, route.departure_time()))
            .collect::<Vec<_>>();
        due.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        due.into_iter()
            .filter_map(|(id, _)| self.routes.remove(id))
            .collect()
    }

    /// Asks every agent on a lane for its decision for this tick.
    ///
    /// All brains see the network as it was before any of them decided;
    /// decisions are only stored once every agent has thought.
    pub fn think(&mut self) {
        let mut brains = std::mem::take(&mut self.brains);
        let mut decisions = Vec::with_capacity(brains.len());
        for (id, brain) in brains.iter_mut() {
            let Some(agent) = self.agents.get(id) else {
                continue;
            };
            if agent.state() != AgentState::OnLane {
                continue;
            }
            let Some(lane) = self.lanes.get(agent.lane_id()) else {
                continue;
            };
            decisions.push((id, brain.think(&ThinkContext::new(agent, lane, self))));
        }
        self.brains = brains;
        for (id, decision) in decisions {
            self.agents[id].set_decision(decision);
        }
    }

    /// Advances every lane by `dt` seconds, then moves agents between lanes.
    ///
    /// Lane changes and junction transfers are applied only after every lane
    /// has finished its own sweep, so no agent is moved twice in one tick.
    pub fn simulate(&mut self, dt: f64) -> SimResult<TickReport> {
        let mut report = TickReport {
            frame: self.frame,
            duration: dt,
            ..Default::default()
        };

        let mut crashed = vec![];
        for lane in self.lanes.values_mut() {
            crashed.extend(lane.advance(dt, &mut self.agents)?);
        }

        let mut lane_changes = vec![];
        let mut edge_leaves = vec![];
        for lane in self.lanes.values() {
            for (agent, target) in lane.lane_change_transitions(&self.agents, &self.edges)? {
                if let Some(target) = target {
                    lane_changes.push((agent, lane.id(), target));
                }
            }
            for leave in lane.edge_leave_transitions(&mut self.agents)? {
                edge_leaves.push((lane.id(), leave));
            }
        }

        for (agent, from, to) in lane_changes {
            self.change_lane(agent, from, to)?;
            report.lane_changes += 1;
        }

        for (from, leave) in edge_leaves {
            match leave {
                EdgeLeave::Transfer { agent, lane } => {
                    self.transfer(agent, from, lane)?;
                    report.edge_transfers += 1;
                }
                EdgeLeave::Exit { agent } => {
                    self.lanes[from].remove_edge_leave_candidate(agent)?;
                    self.remove_agent(agent);
                    debug!("Agent {:?} arrived at the end of {:?}", agent, from);
                    report.arrivals += 1;
                }
                EdgeLeave::Invalid { agent } => {
                    self.lanes[from].remove_edge_leave_candidate(agent)?;
                    self.remove_agent(agent);
                    warn!("Agent {:?} chose a lane unreachable from {:?} and crashed", agent, from);
                    report.collisions += 1;
                }
            }
        }

        report.collisions += crashed.len();
        for agent in crashed {
            self.remove_agent(agent);
        }

        for agent in self.agents.values_mut() {
            agent.clear_decision();
        }
        self.frame += 1;
        Ok(report)
    }

    /// The number of ticks simulated so far.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets a reference to the junction with the given ID.
    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(id)
    }

    /// Gets a reference to the edge with the given ID.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Gets a reference to the lane with the given ID.
    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id)
    }

    /// Gets a reference to the agent with the given ID.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }

    /// Returns an iterator over all the junctions in the network.
    pub fn iter_junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    /// Returns an iterator over all the edges in the network.
    pub fn iter_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Returns an iterator over all the lanes in the network.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// Returns an iterator over all the agents being simulated.
    pub fn iter_agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Returns an iterator over the routes that have not departed yet.
    pub fn iter_routes(&self) -> impl Iterator<Item = (RouteId, &Route)> {
        self.routes.iter()
    }

    /// The number of agents being simulated.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// The number of routes that have not departed yet.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// The world space coordinates and heading of the centre of an agent.
    pub fn agent_world_position(&self, id: AgentId) -> Option<(Point2d, Vector2d)> {
        let agent = self.agents.get(id)?;
        let lane = self.lanes.get(agent.lane_id())?;
        Some(lane.shape().sample(agent.position()))
    }

    /// Moves an agent sideways onto a neighbouring lane, keeping its relative position.
    fn change_lane(&mut self, agent_id: AgentId, from: LaneId, to: LaneId) -> SimResult<()> {
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or(SimError::UnknownAgent(agent_id))?;
        self.lanes
            .get_mut(from)
            .ok_or(SimError::UnknownLane(from))?
            .remove_agent(agent);
        let dst = self.lanes.get_mut(to).ok_or(SimError::UnknownLane(to))?;
        let length = dst.length();
        agent.place(to, f64::min(agent.relative_position() * length, length), length)?;
        dst.add_agent(agent)?;
        debug!("Agent {:?} changed lanes from {:?} to {:?}", agent_id, from, to);
        Ok(())
    }

    /// Moves an edge-leave candidate across a junction to the start of a lane.
    fn transfer(&mut self, agent_id: AgentId, from: LaneId, to: LaneId) -> SimResult<()> {
        self.lanes
            .get_mut(from)
            .ok_or(SimError::UnknownLane(from))?
            .remove_edge_leave_candidate(agent_id)?;
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or(SimError::UnknownAgent(agent_id))?;
        let dst = self.lanes.get_mut(to).ok_or(SimError::UnknownLane(to))?;
        agent.place(to, 0.0, dst.length())?;
        dst.add_agent(agent)?;
        debug!("Agent {:?} left {:?} for {:?}", agent_id, from, to);
        Ok(())
    }

    /// The lanes reachable from the end of a lane, weighted by the length of the lane.
    fn successors(&self, lane_id: LaneId) -> impl Iterator<Item = (LaneId, u64)> + '_ {
        self.lanes.get(lane_id).into_iter().flat_map(|lane| {
            let cost = (10.0 * lane.length()) as u64;
            lane.lanes_out().iter().map(move |id| (*id, cost))
        })
    }
}
