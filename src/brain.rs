//! The decision-making capability of agents.

use crate::{Agent, Decision, LaneChangeDirection, LaneId, Lane, Net, Route};

pub use full_speed::FullSpeedBrain;
pub use idm::{IdmBrain, ModelParams};
pub use random::RandomBrain;

mod full_speed;
mod idm;
mod random;

/// A pluggable driving policy, owned one-to-one by an agent.
///
/// The brain is asked for exactly one [Decision] per tick, before any agent
/// moves. It gets read-only access to the network through the [ThinkContext]
/// and never changes which lane an agent is on itself.
pub trait Brain: Send {
    /// Produces the agent's decision for the current tick.
    fn think(&mut self, ctx: &ThinkContext) -> Decision;
}

impl<F: FnMut(&ThinkContext) -> Decision + Send> Brain for F {
    fn think(&mut self, ctx: &ThinkContext) -> Decision {
        self(ctx)
    }
}

/// Creates the brain of an agent spawned from a route.
pub type BrainFactory = Box<dyn FnMut(&Route) -> Box<dyn Brain> + Send>;

/// A read-only view of the network from the point of view of one agent.
pub struct ThinkContext<'a> {
    agent: &'a Agent,
    lane: &'a Lane,
    net: &'a Net,
}

impl<'a> ThinkContext<'a> {
    pub(crate) fn new(agent: &'a Agent, lane: &'a Lane, net: &'a Net) -> Self {
        Self { agent, lane, net }
    }

    /// The agent that is thinking.
    pub fn agent(&self) -> &'a Agent {
        self.agent
    }

    /// The lane the agent is on.
    pub fn lane(&self) -> &'a Lane {
        self.lane
    }

    /// The whole network.
    pub fn net(&self) -> &'a Net {
        self.net
    }

    /// The agents occupying the nearest position ahead on the same lane.
    pub fn agents_ahead(&self) -> impl Iterator<Item = &'a Agent> + 'a {
        let net = self.net;
        self.lane
            .next_agents_ahead(self.agent.relative_position())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |id| net.agent(*id))
    }

    /// The smallest gap to an agent ahead on the same lane, in m, along with
    /// that agent's velocity.
    pub fn leader(&self) -> Option<(f64, f64)> {
        self.agents_ahead()
            .map(|ahead| (self.agent.gap_to(ahead), ahead.velocity()))
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// The distance from the front of the agent to the end of its lane, in m.
    pub fn distance_to_lane_end(&self) -> f64 {
        self.lane.length() - self.agent.pos_front()
    }

    /// The lane on the given side of the agent's lane, if there is one.
    pub fn neighbour(&self, direction: LaneChangeDirection) -> Option<LaneId> {
        self.lane.neighbour(direction, self.net.edges())
    }

    /// The lanes reachable across the junction at the end of the agent's lane.
    pub fn next_lanes(&self) -> &'a [LaneId] {
        self.lane.lanes_out()
    }

    /// The reachable lane that continues the agent's route.
    ///
    /// If the agent changed lanes since it was routed, any reachable lane on
    /// the edge the route continues onto will do.
    pub fn route_next_lane(&self) -> Option<LaneId> {
        let route = self.agent.route();
        let edge_of = |id: &LaneId| self.net.lane(*id).map(|l| l.edge_id());
        let idx = route
            .iter()
            .position(|id| edge_of(id) == Some(self.lane.edge_id()))?;
        let planned = *route.get(idx + 1)?;
        if self.lane.lanes_out().contains(&planned) {
            return Some(planned);
        }
        let planned_edge = edge_of(&planned)?;
        self.lane
            .lanes_out()
            .iter()
            .copied()
            .find(|id| edge_of(id) == Some(planned_edge))
    }

    /// The lane the agent should head for next: its route if it has one,
    /// otherwise the first reachable lane.
    pub fn preferred_next_lane(&self) -> Option<LaneId> {
        self.route_next_lane()
            .or_else(|| self.lane.lanes_out().first().copied())
    }
}
