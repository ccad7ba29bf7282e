use crate::math::Polyline2d;
use crate::{
    Agent, AgentId, AgentSet, AgentState, EdgeId, EdgeSet, JunctionId, LaneChangeDirection, LaneId,
    SimError, SimResult,
};
use itertools::iproduct;
use log::info;
use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};

/// The agents sharing one relative position on a lane.
type Bucket = SmallVec<[AgentId; 2]>;

/// A lane represents a single direction of traffic within an edge.
///
/// Agents are indexed by their relative position, ascending in the direction
/// of travel, so the agent with the highest key is the one nearest the lane end.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane ID.
    pub(crate) id: LaneId,
    /// The edge the lane belongs to.
    edge: EdgeId,
    /// The index of the lane within its edge, counted from the right.
    index: usize,
    /// The centre line of the lane.
    shape: Polyline2d,
    /// Speed limit in m/s.
    speed_limit: f64,
    /// The lanes reachable across the junction at the end of this lane.
    lanes_out: Vec<LaneId>,
    /// The agents on the lane, keyed by relative position.
    agents: BTreeMap<OrderedFloat<f64>, Bucket>,
    /// The agents which have reached the end of the lane.
    edge_leave_candidates: BTreeSet<AgentId>,
    /// The agents which asked for a lane change during the last sweep.
    lane_change_candidates: Vec<AgentId>,
}

/// The attributes of a lane.
pub struct LaneAttributes<'a> {
    /// The centre line of the lane.
    pub shape: &'a Polyline2d,
    /// The speed limit in m/s.
    pub speed_limit: f64,
}

/// How an edge-leave candidate is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeLeave {
    /// The agent moves to the start of the given lane.
    Transfer { agent: AgentId, lane: LaneId },
    /// The agent has arrived and leaves the simulation.
    Exit { agent: AgentId },
    /// The agent chose a lane it cannot reach, and has crashed.
    Invalid { agent: AgentId },
}

impl Lane {
    /// Creates a new lane.
    pub(crate) fn new(id: LaneId, edge: EdgeId, index: usize, attribs: &LaneAttributes) -> SimResult<Self> {
        if !(attribs.speed_limit >= 0.0) {
            return Err(SimError::InvalidLane("speed limit must not be negative"));
        }
        Ok(Self {
            id,
            edge,
            index,
            shape: attribs.shape.clone(),
            speed_limit: attribs.speed_limit,
            lanes_out: vec![],
            agents: BTreeMap::new(),
            edge_leave_candidates: BTreeSet::new(),
            lane_change_candidates: vec![],
        })
    }

    /// Gets the lane ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// Gets the ID of the edge the lane belongs to.
    pub fn edge_id(&self) -> EdgeId {
        self.edge
    }

    /// The index of the lane within its edge.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.shape.length()
    }

    /// Gets the speed limit of the lane in m/s.
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    /// Gets the centre line of the lane.
    pub fn shape(&self) -> &Polyline2d {
        &self.shape
    }

    /// The lanes reachable across the junction at the end of this lane.
    pub fn lanes_out(&self) -> &[LaneId] {
        &self.lanes_out
    }

    /// Whether the lane's edge starts at the given junction.
    pub fn comes_from(&self, junction: JunctionId, edges: &EdgeSet) -> bool {
        edges.get(self.edge).map_or(false, |e| e.start() == junction)
    }

    /// Whether the lane's edge ends at the given junction.
    pub fn goes_to(&self, junction: JunctionId, edges: &EdgeSet) -> bool {
        edges.get(self.edge).map_or(false, |e| e.end() == junction)
    }

    /// Finds the index-adjacent lane on the same edge in the given direction.
    pub fn neighbour(&self, direction: LaneChangeDirection, edges: &EdgeSet) -> Option<LaneId> {
        let index = match direction {
            LaneChangeDirection::Left => self.index.checked_add(1)?,
            LaneChangeDirection::Right => self.index.checked_sub(1)?,
            LaneChangeDirection::None => return None,
        };
        edges.get(self.edge)?.lane(index)
    }

    /// Converts an absolute position in m to a relative position on this lane.
    pub fn relative_position(&self, pos: f64) -> SimResult<f64> {
        if !(0.0..=self.length()).contains(&pos) {
            return Err(SimError::PositionOutOfRange {
                pos,
                length: self.length(),
            });
        }
        Ok(pos / self.length())
    }

    /// Converts a relative position on this lane to an absolute position in m.
    pub fn absolute_position(&self, rel_pos: f64) -> SimResult<f64> {
        check_relative(rel_pos)?;
        Ok(rel_pos * self.length())
    }

    /// The number of agents on the lane, including edge-leave candidates.
    pub fn agent_count(&self) -> usize {
        self.agents.values().map(|b| b.len()).sum::<usize>() + self.edge_leave_candidates.len()
    }

    /// Whether there are no agents on the lane.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.edge_leave_candidates.is_empty()
    }

    /// Returns the indexed agents from the start of the lane to the end.
    pub fn agents_in_order(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.values().flatten().copied()
    }

    /// Returns the agents waiting to leave the lane.
    pub fn edge_leave_candidates(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.edge_leave_candidates.iter().copied()
    }

    /// Whether the agent is indexed on this lane or waiting to leave it.
    pub fn contains(&self, agent: &Agent) -> bool {
        self.edge_leave_candidates.contains(&agent.id)
            || self
                .agents
                .get(&OrderedFloat(agent.relative_position()))
                .map_or(false, |b| b.contains(&agent.id))
    }

    /// Returns the agents occupying the nearest position strictly ahead of
    /// `rel_pos`, or an empty slice if nobody is ahead.
    pub fn next_agents_ahead(&self, rel_pos: f64) -> SimResult<&[AgentId]> {
        check_relative(rel_pos)?;
        Ok(self
            .agents
            .range((Excluded(OrderedFloat(rel_pos)), Unbounded))
            .next()
            .map_or(&[][..], |(_, bucket)| bucket.as_slice()))
    }

    /// Returns the agents nearest ahead of an agent on this lane.
    pub fn next_agents_ahead_of(&self, agent: &Agent) -> SimResult<&[AgentId]> {
        self.check_on_lane(agent)?;
        self.next_agents_ahead(agent.relative_position())
    }

    /// Inserts an agent into the position index at its current relative position.
    pub(crate) fn add_agent(&mut self, agent: &Agent) -> SimResult<()> {
        self.check_on_lane(agent)?;
        let rel_pos = agent.relative_position();
        check_relative(rel_pos)?;
        let bucket = self.agents.entry(OrderedFloat(rel_pos)).or_default();
        if !bucket.contains(&agent.id) {
            bucket.push(agent.id);
        }
        Ok(())
    }

    /// Removes an agent from the position index.
    /// Returns `false` if it was not indexed at its current relative position.
    pub(crate) fn remove_agent(&mut self, agent: &Agent) -> bool {
        let key = OrderedFloat(agent.relative_position());
        let Some(bucket) = self.agents.get_mut(&key) else {
            return false;
        };
        let Some(idx) = bucket.iter().position(|id| *id == agent.id) else {
            return false;
        };
        bucket.remove(idx);
        if bucket.is_empty() {
            self.agents.remove(&key);
        }
        true
    }

    /// Marks an agent as having reached the end of the lane.
    pub(crate) fn add_edge_leave_candidate(&mut self, agent: &Agent) -> SimResult<()> {
        self.check_on_lane(agent)?;
        self.edge_leave_candidates.insert(agent.id);
        Ok(())
    }

    /// Removes an agent from the set of edge-leave candidates.
    pub(crate) fn remove_edge_leave_candidate(&mut self, agent: AgentId) -> SimResult<()> {
        if self.discard_edge_leave_candidate(agent) {
            Ok(())
        } else {
            Err(SimError::NotEdgeLeaveCandidate {
                agent,
                lane: self.id,
            })
        }
    }

    /// Removes an agent from the set of edge-leave candidates.
    /// Returns `false` if it was not a candidate.
    pub(crate) fn discard_edge_leave_candidate(&mut self, agent: AgentId) -> bool {
        self.edge_leave_candidates.remove(&agent)
    }

    /// Adds a lane reachable across the junction at the end of this lane.
    pub(crate) fn add_lane_out(&mut self, lane: LaneId) {
        if !self.lanes_out.contains(&lane) {
            self.lanes_out.push(lane);
        }
    }

    /// Moves every indexed agent according to its decision and detects collisions.
    ///
    /// The index is rebuilt from a snapshot taken before anybody moved. Groups
    /// are swept from the start of the lane to the end: each group is moved,
    /// then compared with the group directly ahead of it as it stood at the
    /// start of the tick. Agents that reached the end of the lane become
    /// edge-leave candidates; collided agents are dropped from the lane and
    /// returned.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    /// * `agents` - The agents in the network
    pub(crate) fn advance(&mut self, dt: f64, agents: &mut AgentSet) -> SimResult<Vec<AgentId>> {
        let groups = std::mem::take(&mut self.agents)
            .into_values()
            .collect::<Vec<_>>();
        self.lane_change_candidates.clear();

        // Where each agent was, and half its length, before the sweep
        let starts = groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|id| -> SimResult<_> {
                        let agent = agents.get(*id).ok_or(SimError::UnknownAgent(*id))?;
                        Ok((*id, agent.position(), agent.vehicle().half_length()))
                    })
                    .collect::<SimResult<SmallVec<[_; 2]>>>()
            })
            .collect::<SimResult<Vec<_>>>()?;

        let mut collided = vec![];
        for (idx, group) in groups.iter().enumerate() {
            for id in group {
                let agent = agents.get_mut(*id).ok_or(SimError::UnknownAgent(*id))?;
                if !agent.is_collided() {
                    agent.integrate(dt, self.speed_limit, self.length())?;
                }
            }

            if let Some(ahead) = starts.get(idx + 1) {
                for (behind_id, &(ahead_id, ahead_pos, ahead_half_len)) in iproduct!(group, ahead) {
                    let behind = &agents[*behind_id];
                    if behind.is_collided() {
                        continue;
                    }
                    let gap = (ahead_pos - behind.position())
                        - behind.vehicle().half_length()
                        - ahead_half_len;
                    if gap <= 0.0 {
                        info!("Collision on {:?}: {:?} <-> {:?}", self.id, behind_id, ahead_id);
                        for id in [*behind_id, ahead_id] {
                            let agent = &mut agents[id];
                            if !agent.is_collided() {
                                agent.collide();
                                collided.push(id);
                            }
                        }
                    }
                }
            }

            for id in group {
                let agent = &agents[*id];
                match agent.state() {
                    AgentState::Collided => {}
                    AgentState::EdgeLeaveCandidate => self.add_edge_leave_candidate(agent)?,
                    AgentState::OnLane => {
                        if agent.is_lane_change_candidate() {
                            self.lane_change_candidates.push(*id);
                        }
                        self.add_agent(agent)?;
                    }
                }
            }
        }

        Ok(collided)
    }

    /// Resolves each lane change candidate of the last sweep to the lane it
    /// wants to move into, or `None` if there is no lane on that side.
    pub(crate) fn lane_change_transitions(
        &self,
        agents: &AgentSet,
        edges: &EdgeSet,
    ) -> SimResult<Vec<(AgentId, Option<LaneId>)>> {
        self.lane_change_candidates
            .iter()
            .map(|id| {
                let agent = agents.get(*id).ok_or(SimError::UnknownAgent(*id))?;
                let direction = agent.decision().map(|d| d.lane_change).unwrap_or_default();
                match direction {
                    LaneChangeDirection::Left | LaneChangeDirection::Right => {
                        Ok((*id, self.neighbour(direction, edges)))
                    }
                    LaneChangeDirection::None => Err(SimError::MissingLaneChangeDirection(*id)),
                }
            })
            .collect()
    }

    /// Resolves each edge-leave candidate.
    ///
    /// Agents whose destination is this lane's edge exit. Otherwise the lane
    /// chosen in the agent's decision must be reachable across the junction; an
    /// agent that chose any other lane, or none, is collided.
    pub(crate) fn edge_leave_transitions(&self, agents: &mut AgentSet) -> SimResult<Vec<EdgeLeave>> {
        let mut result = Vec::with_capacity(self.edge_leave_candidates.len());
        for id in &self.edge_leave_candidates {
            let agent = agents.get_mut(*id).ok_or(SimError::UnknownAgent(*id))?;
            let next_lane = agent.decision().and_then(|d| d.next_lane);
            if agent.destination() == Some(self.edge) {
                result.push(EdgeLeave::Exit { agent: *id });
            } else if let Some(lane) = next_lane.filter(|lane| self.lanes_out.contains(lane)) {
                result.push(EdgeLeave::Transfer { agent: *id, lane });
            } else {
                agent.collide();
                result.push(EdgeLeave::Invalid { agent: *id });
            }
        }
        Ok(result)
    }

    fn check_on_lane(&self, agent: &Agent) -> SimResult<()> {
        if agent.lane_id() == self.id {
            Ok(())
        } else {
            Err(SimError::AgentNotOnLane {
                agent: agent.id,
                lane: self.id,
            })
        }
    }
}

fn check_relative(rel_pos: f64) -> SimResult<()> {
    if (0.0..=1.0).contains(&rel_pos) {
        Ok(())
    } else {
        Err(SimError::RelativePositionOutOfRange(rel_pos))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;
    use crate::{Decision, Vehicle, VehicleAttributes};
    use slotmap::KeyData;

    fn lane(length: f64) -> Lane {
        let shape = Polyline2d::line(Point2d::new(0.0, 0.0), Point2d::new(length, 0.0)).unwrap();
        Lane::new(
            LaneId::from(KeyData::from_ffi(1)),
            EdgeId::from(KeyData::from_ffi(1)),
            0,
            &LaneAttributes {
                shape: &shape,
                speed_limit: 30.0,
            },
        )
        .unwrap()
    }

    fn add(lane: &mut Lane, agents: &mut AgentSet, pos: f64, vel: f64) -> AgentId {
        let vehicle = Vehicle::new(&VehicleAttributes {
            length: 4.0,
            ..Default::default()
        })
        .unwrap();
        let id = agents.insert_with_key(|id| {
            let mut agent = Agent::new(id, vehicle, lane.id(), pos, lane.length()).unwrap();
            agent.set_velocity(vel);
            agent.set_decision(Decision::default());
            agent
        });
        lane.add_agent(&agents[id]).unwrap();
        id
    }

    #[test]
    fn next_agents_ahead_returns_the_nearest_bucket() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let a = add(&mut lane, &mut agents, 20.0, 0.0);
        let b = add(&mut lane, &mut agents, 20.0, 0.0);
        let c = add(&mut lane, &mut agents, 50.0, 0.0);

        let mut tied = lane.next_agents_ahead(0.1).unwrap().to_vec();
        tied.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(tied, expected);
        assert_eq!(lane.next_agents_ahead(0.2).unwrap(), &[c]);
        assert!(lane.next_agents_ahead(0.5).unwrap().is_empty());
        assert_eq!(
            lane.next_agents_ahead(1.5),
            Err(SimError::RelativePositionOutOfRange(1.5))
        );
        assert_eq!(lane.next_agents_ahead_of(&agents[a]).unwrap(), &[c]);
        assert_eq!(lane.agents_in_order().last(), Some(c));
    }

    #[test]
    fn overlapping_agents_collide() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let a = add(&mut lane, &mut agents, 10.0, 0.0);
        let b = add(&mut lane, &mut agents, 13.0, 0.0);
        let c = add(&mut lane, &mut agents, 60.0, 0.0);

        let mut collided = lane.advance(0.1, &mut agents).unwrap();
        collided.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(collided, expected);
        assert!(agents[a].is_collided());
        assert!(agents[b].is_collided());
        assert!(!agents[c].is_collided());
        assert_eq!(lane.agents_in_order().collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn agents_in_the_same_bucket_do_not_collide() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        add(&mut lane, &mut agents, 0.0, 0.0);
        add(&mut lane, &mut agents, 0.0, 0.0);

        assert!(lane.advance(0.1, &mut agents).unwrap().is_empty());
        assert_eq!(lane.agent_count(), 2);
    }

    #[test]
    fn reaching_the_end_makes_an_edge_leave_candidate() {
        let mut lane = lane(1000.0);
        let mut agents = AgentSet::default();
        let a = add(&mut lane, &mut agents, 999.0, 20.0);
        assert_eq!(agents[a].relative_position(), 0.999);

        lane.advance(1.0, &mut agents).unwrap();
        assert!(agents[a].is_edge_leave_candidate());
        assert_eq!(agents[a].relative_position(), 1.0);
        assert_eq!(lane.edge_leave_candidates().collect::<Vec<_>>(), vec![a]);
        assert_eq!(lane.agents_in_order().count(), 0);
        assert!(lane.contains(&agents[a]));
    }

    #[test]
    fn removing_a_non_candidate_fails() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let a = add(&mut lane, &mut agents, 10.0, 0.0);
        assert_eq!(
            lane.remove_edge_leave_candidate(a),
            Err(SimError::NotEdgeLeaveCandidate {
                agent: a,
                lane: lane.id()
            })
        );
    }

    #[test]
    fn agents_on_other_lanes_are_rejected() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let vehicle = Vehicle::default();
        let other = LaneId::from(KeyData::from_ffi(2));
        let id = agents.insert_with_key(|id| Agent::new(id, vehicle, other, 5.0, 100.0).unwrap());
        assert!(matches!(
            lane.add_agent(&agents[id]),
            Err(SimError::AgentNotOnLane { .. })
        ));
    }

    #[test]
    fn position_conversions_check_their_range() {
        let lane = lane(1000.0);
        assert_eq!(lane.relative_position(250.0), Ok(0.25));
        assert_eq!(lane.absolute_position(0.5), Ok(500.0));
        assert!(matches!(
            lane.relative_position(1000.5),
            Err(SimError::PositionOutOfRange { .. })
        ));
        assert_eq!(
            lane.absolute_position(-0.1),
            Err(SimError::RelativePositionOutOfRange(-0.1))
        );
    }

    #[test]
    fn follower_entering_the_leaders_start_position_collides() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let behind = add(&mut lane, &mut agents, 14.0, 10.0);
        let ahead = add(&mut lane, &mut agents, 20.0, 10.0);

        let mut collided = lane.advance(1.0, &mut agents).unwrap();
        collided.sort();
        let mut expected = vec![behind, ahead];
        expected.sort();
        assert_eq!(collided, expected);
        assert!(lane.is_empty());
    }

    #[test]
    fn follower_short_of_the_leaders_start_position_is_safe() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let behind = add(&mut lane, &mut agents, 10.0, 5.0);
        let ahead = add(&mut lane, &mut agents, 30.0, 5.0);

        assert!(lane.advance(1.0, &mut agents).unwrap().is_empty());
        assert_eq!(agents[behind].position(), 15.0);
        assert_eq!(agents[ahead].position(), 35.0);
        assert_eq!(lane.agents_in_order().collect::<Vec<_>>(), vec![behind, ahead]);
    }

    #[test]
    fn only_the_group_directly_ahead_is_compared() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        // Overtakes `middle` and ends up overlapping `front` too
        let fast = add(&mut lane, &mut agents, 10.0, 30.0);
        let middle = add(&mut lane, &mut agents, 20.0, 0.0);
        let front = add(&mut lane, &mut agents, 38.0, 0.0);

        let mut collided = lane.advance(1.0, &mut agents).unwrap();
        collided.sort();
        let mut expected = vec![fast, middle];
        expected.sort();
        assert_eq!(collided, expected);
        assert!(!agents[front].is_collided());
        assert_eq!(lane.agents_in_order().collect::<Vec<_>>(), vec![front]);
    }

    #[test]
    fn follower_reaching_an_edge_leave_candidate_collides() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let behind = add(&mut lane, &mut agents, 90.0, 10.0);
        let ahead = add(&mut lane, &mut agents, 98.0, 10.0);

        let collided = lane.advance(1.0, &mut agents).unwrap();
        assert_eq!(collided.len(), 2);
        assert!(agents[behind].is_collided());
        assert!(agents[ahead].is_collided());
        assert_eq!(lane.edge_leave_candidates().count(), 0);
        assert!(lane.is_empty());
    }

    #[test]
    fn follower_well_behind_an_edge_leave_candidate_is_safe() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let behind = add(&mut lane, &mut agents, 80.0, 10.0);
        let ahead = add(&mut lane, &mut agents, 98.0, 10.0);

        assert!(lane.advance(1.0, &mut agents).unwrap().is_empty());
        assert_eq!(lane.edge_leave_candidates().collect::<Vec<_>>(), vec![ahead]);
        assert_eq!(lane.agents_in_order().collect::<Vec<_>>(), vec![behind]);
    }

    #[test]
    fn discarding_a_candidate_reports_whether_it_was_one() {
        let mut lane = lane(100.0);
        let mut agents = AgentSet::default();
        let a = add(&mut lane, &mut agents, 99.0, 10.0);
        lane.advance(1.0, &mut agents).unwrap();

        assert!(lane.discard_edge_leave_candidate(a));
        assert!(!lane.discard_edge_leave_candidate(a));
        assert!(lane.is_empty());
    }
}
