use crate::{AgentId, Decision, EdgeId, LaneChangeDirection, LaneId, SimError, SimResult, Vehicle};

/// Where an agent is in its lifecycle on the current lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgentState {
    /// Indexed by relative position on its lane.
    #[default]
    OnLane,
    /// Reached the end of its lane and is waiting to be transferred.
    EdgeLeaveCandidate,
    /// Crashed; it will be removed from the simulation.
    Collided,
}

/// A simulated mobile entity bound to exactly one lane at a time.
#[derive(Clone, Debug)]
pub struct Agent {
    /// The agent's ID.
    pub(crate) id: AgentId,
    /// The lane the agent is currently on.
    lane: LaneId,
    /// The longitudinal position of the centre of the agent along its lane, in m.
    pos: f64,
    /// `pos` divided by the length of the lane.
    rel_pos: f64,
    /// The velocity in m/s.
    vel: f64,
    /// The physical parameters.
    vehicle: Vehicle,
    /// The decision for the current tick, if one has been made.
    decision: Option<Decision>,
    state: AgentState,
    /// The lanes the agent was routed along, including the one it started on.
    route: Vec<LaneId>,
    /// The edge at which the agent leaves the simulation.
    destination: Option<EdgeId>,
}

impl Agent {
    /// Creates an agent on the given lane.
    pub(crate) fn new(
        id: AgentId,
        vehicle: Vehicle,
        lane: LaneId,
        pos: f64,
        lane_length: f64,
    ) -> SimResult<Self> {
        let mut agent = Self {
            id,
            lane,
            pos: 0.0,
            rel_pos: 0.0,
            vel: 0.0,
            vehicle,
            decision: None,
            state: AgentState::OnLane,
            route: vec![],
            destination: None,
        };
        agent.place(lane, pos, lane_length)?;
        Ok(agent)
    }

    /// Gets the agent's ID.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The ID of the lane the agent is currently on.
    pub fn lane_id(&self) -> LaneId {
        self.lane
    }

    /// The position of the centre of the agent along its lane, in m.
    pub fn position(&self) -> f64 {
        self.pos
    }

    /// The position along the lane normalised to [0, 1].
    pub fn relative_position(&self) -> f64 {
        self.rel_pos
    }

    /// The position of the rear of the agent in m.
    pub fn pos_rear(&self) -> f64 {
        self.pos - self.vehicle.half_length()
    }

    /// The position of the front of the agent in m.
    pub fn pos_front(&self) -> f64 {
        self.pos + self.vehicle.half_length()
    }

    /// The velocity in m/s.
    pub fn velocity(&self) -> f64 {
        self.vel
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    /// The decision made for the current tick, or `None` between ticks.
    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_collided(&self) -> bool {
        self.state == AgentState::Collided
    }

    pub fn is_edge_leave_candidate(&self) -> bool {
        self.state == AgentState::EdgeLeaveCandidate
    }

    /// Whether the agent is on its lane and wants to move to a neighbouring one.
    pub fn is_lane_change_candidate(&self) -> bool {
        self.state == AgentState::OnLane
            && self
                .decision
                .map_or(false, |d| d.lane_change != LaneChangeDirection::None)
    }

    /// The lanes the agent was routed along.
    pub fn route(&self) -> &[LaneId] {
        &self.route
    }

    /// The edge at which the agent will leave the simulation, if it has one.
    pub fn destination(&self) -> Option<EdgeId> {
        self.destination
    }

    /// The gap between the rear of `ahead` and the front of this agent, in m.
    /// Negative if the two overlap or `ahead` is actually behind.
    pub fn gap_to(&self, ahead: &Agent) -> f64 {
        (ahead.pos - self.pos) - self.vehicle.half_length() - ahead.vehicle.half_length()
    }

    pub(crate) fn set_route(&mut self, route: &[LaneId], destination: Option<EdgeId>) {
        self.route = route.to_vec();
        self.destination = destination;
    }

    pub(crate) fn set_decision(&mut self, decision: Decision) {
        self.decision = Some(decision);
    }

    pub(crate) fn clear_decision(&mut self) {
        self.decision = None;
    }

    pub(crate) fn set_velocity(&mut self, vel: f64) {
        self.vel = vel;
    }

    pub(crate) fn collide(&mut self) {
        self.state = AgentState::Collided;
    }

    /// Moves the agent onto a lane at the given position.
    pub(crate) fn place(&mut self, lane: LaneId, pos: f64, lane_length: f64) -> SimResult<()> {
        if !(0.0..=lane_length).contains(&pos) {
            return Err(SimError::PositionOutOfRange {
                pos,
                length: lane_length,
            });
        }
        self.lane = lane;
        self.pos = pos;
        self.rel_pos = pos / lane_length;
        self.state = AgentState::OnLane;
        Ok(())
    }

    /// Integrates the agent's velocity and position using this tick's decision.
    /// An agent that reaches the end of its lane is clamped there and becomes
    /// an edge-leave candidate.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    /// * `speed_limit` - The speed limit of the lane in m/s
    /// * `lane_length` - The length of the lane in m
    pub(crate) fn integrate(&mut self, dt: f64, speed_limit: f64, lane_length: f64) -> SimResult<()> {
        let decision = self.decision.ok_or(SimError::MissingDecision(self.id))?;
        let acc = self.vehicle.clamp_acceleration(decision.acceleration);
        let max_vel = f64::min(self.vehicle.max_speed(), speed_limit);
        let vel = (self.vel + dt * acc).clamp(0.0, max_vel);
        let pos = self.pos + 0.5 * (self.vel + vel) * dt;
        self.vel = vel;

        if pos >= lane_length {
            self.pos = lane_length;
            self.rel_pos = 1.0;
            self.state = AgentState::EdgeLeaveCandidate;
        } else {
            self.pos = pos;
            self.rel_pos = pos / lane_length;
        }
        Ok(())
    }
}
