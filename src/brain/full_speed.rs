use super::{Brain, ThinkContext};
use crate::Decision;

/// Accelerates as hard as the vehicle allows and never changes lanes.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullSpeedBrain;

impl Brain for FullSpeedBrain {
    fn think(&mut self, ctx: &ThinkContext) -> Decision {
        Decision {
            acceleration: ctx.agent().vehicle().max_acceleration(),
            next_lane: ctx.preferred_next_lane(),
            ..Default::default()
        }
    }
}
