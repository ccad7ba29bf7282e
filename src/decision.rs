use crate::LaneId;
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The direction of a requested lane change.
///
/// Lanes on an edge are indexed from the right, so `Left` targets the lane
/// with the next higher index and `Right` the next lower one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneChangeDirection {
    #[default]
    None,
    Left,
    Right,
}

impl LaneChangeDirection {
    /// Picks one of the three directions uniformly at random.
    pub fn random(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..3) {
            0 => Self::None,
            1 => Self::Left,
            _ => Self::Right,
        }
    }
}

/// What an agent intends to do during the current tick.
///
/// A fresh decision is produced by the agent's [Brain](crate::Brain) every tick
/// and replaces the previous one wholesale.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Decision {
    /// The requested acceleration in m/s^2.
    pub acceleration: f64,
    /// The lane change to perform, honoured while the agent is on its lane.
    pub lane_change: LaneChangeDirection,
    /// The lane to enter once the agent reaches the end of its current lane.
    pub next_lane: Option<LaneId>,
}
