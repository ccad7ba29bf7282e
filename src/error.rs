use crate::{AgentId, EdgeId, JunctionId, LaneId, RouteId};
use thiserror::Error;

/// Errors raised when a caller breaks a precondition of the simulation core.
///
/// None of these are recoverable mid-tick: a tick that returns one of them
/// has left the network in an unspecified state and the run should stop.
/// Collisions and invalid junction choices are simulation outcomes, not errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("relative position {0} is outside [0, 1]")]
    RelativePositionOutOfRange(f64),

    #[error("position {pos} m is outside a lane of length {length} m")]
    PositionOutOfRange { pos: f64, length: f64 },

    #[error("{agent:?} is not an edge-leave candidate of {lane:?}")]
    NotEdgeLeaveCandidate { agent: AgentId, lane: LaneId },

    #[error("{agent:?} is not on {lane:?}")]
    AgentNotOnLane { agent: AgentId, lane: LaneId },

    #[error("{0:?} is flagged for a lane change without a direction")]
    MissingLaneChangeDirection(AgentId),

    #[error("{0:?} has no decision for the current tick")]
    MissingDecision(AgentId),

    #[error("unknown junction {0:?}")]
    UnknownJunction(JunctionId),

    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),

    #[error("unknown lane {0:?}")]
    UnknownLane(LaneId),

    #[error("unknown agent {0:?}")]
    UnknownAgent(AgentId),

    #[error("unknown route {0:?}")]
    UnknownRoute(RouteId),

    #[error("invalid vehicle: {0}")]
    InvalidVehicle(&'static str),

    #[error("invalid lane: {0}")]
    InvalidLane(&'static str),

    #[error("{from:?} does not end at the junction where {to:?} starts")]
    NotJunctionAdjacent { from: LaneId, to: LaneId },

    #[error("a route must contain at least one lane")]
    EmptyRoute,

    #[error("the simulation has shut down and no longer accepts commands")]
    Disconnected,
}

pub type SimResult<T> = Result<T, SimError>;
