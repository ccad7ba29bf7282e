pub use agent::{Agent, AgentState};
pub use brain::{Brain, BrainFactory, FullSpeedBrain, IdmBrain, ModelParams, RandomBrain, ThinkContext};
pub use cgmath;
pub use decision::{Decision, LaneChangeDirection};
pub use edge::Edge;
pub use error::{SimError, SimResult};
pub use junction::Junction;
pub use lane::{EdgeLeave, Lane, LaneAttributes};
pub use net::{Net, TickReport};
pub use route::Route;
pub use simulation::{
    Clock, Command, CommandSender, Console, LogConsole, ManualClock, Simulation, SimulationConfig,
    SystemClock,
};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{Vehicle, VehicleAttributes};

mod agent;
mod brain;
mod decision;
mod edge;
mod error;
mod junction;
mod lane;
pub mod math;
mod net;
mod route;
mod simulation;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Junction].
    pub struct JunctionId;
    /// Unique ID of an [Edge].
    pub struct EdgeId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of an [Agent].
    pub struct AgentId;
    /// Unique ID of a scheduled [Route].
    pub struct RouteId;
}

type JunctionSet = SlotMap<JunctionId, Junction>;
/// The edges of a network, as handed to lane queries that need their neighbours.
pub type EdgeSet = SlotMap<EdgeId, Edge>;
type LaneSet = SlotMap<LaneId, Lane>;
type AgentSet = SlotMap<AgentId, Agent>;
