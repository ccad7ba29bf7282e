use super::{Brain, ThinkContext};
use crate::{Decision, LaneChangeDirection};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Picks an acceleration, a lane change and a next lane at random each tick.
#[derive(Clone, Debug)]
pub struct RandomBrain {
    rng: StdRng,
}

impl RandomBrain {
    /// Creates a brain with a reproducible sequence of choices.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a brain seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Brain for RandomBrain {
    fn think(&mut self, ctx: &ThinkContext) -> Decision {
        let vehicle = ctx.agent().vehicle();
        Decision {
            acceleration: self
                .rng
                .gen_range(vehicle.min_acceleration()..=vehicle.max_acceleration()),
            lane_change: LaneChangeDirection::random(&mut self.rng),
            next_lane: ctx.next_lanes().choose(&mut self.rng).copied(),
        }
    }
}
