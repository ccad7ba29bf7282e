use super::{Brain, ThinkContext};
use crate::Decision;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// The minimum gap to maintain between vehicles in m.
const MIN_GAP: f64 = 2.0; // m

/// Follows the agent ahead using the intelligent driver model.
#[derive(Clone, Debug)]
pub struct IdmBrain {
    headway: f64,
    comf_dec: f64,
    vel_adj: f64,
}

/// The parameters of the car following model.
#[derive(Clone, Copy, Debug)]
pub struct ModelParams {
    /// The desired gap between this and the vehicle ahead in seconds.
    pub time_headway: f64,
    /// The comfortable decelleration in m/s<sup>2</sup>, a positive number.
    pub comf_deceleration: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            time_headway: 1.5,
            comf_deceleration: 2.0,
        }
    }
}

impl IdmBrain {
    /// Creates a new car following brain.
    pub fn new(params: &ModelParams) -> Self {
        Self {
            headway: params.time_headway,
            comf_dec: params.comf_deceleration,
            vel_adj: 1.0,
        }
    }

    /// Set the desired velocity adjustment factor, a scalar which is
    /// multiplied with the speed limit before following it.
    pub fn set_velocity_adjust(&mut self, factor: f64) {
        self.vel_adj = factor;
    }

    /// Samples a desired velocity adjustment factor from a normal distribution
    /// with a mean of 1 (no adjustment) and standard deviation of `stddev`.
    pub fn randomise_velocity_adjust(&mut self, stddev: f64, rng: &mut impl Rng) {
        if let Ok(distr) = Normal::new(1.0, stddev) {
            self.vel_adj = distr.sample(rng).clamp(0.75, 1.25);
        }
    }

    /// The desired velocity adjustment factor.
    pub fn velocity_adjust(&self) -> f64 {
        self.vel_adj
    }

    /// Calculates the acceleration needed to maintain the speed limit.
    fn free_road(&self, vel: f64, speed_limit: f64, max_acc: f64) -> f64 {
        let speed_limit = self.vel_adj * speed_limit;
        if speed_limit <= 0.0 {
            return -self.comf_dec;
        }
        max_acc * (1. - (vel / speed_limit).powi(4))
    }

    /// Computes an acceleration using the intelligent driver model.
    ///
    /// # Arguments
    /// * `net_dist` - The distance between this vehicle and the vehicle ahead in metres.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `their_vel` - The vehicle ahead's velocity (m/s).
    /// * `max_acc` - The maximum acceleration of the simulated vehicle (m/s^2).
    fn idm(&self, net_dist: f64, my_vel: f64, their_vel: f64, max_acc: f64) -> f64 {
        if net_dist <= MIN_GAP {
            -10. * max_acc
        } else {
            let appr = my_vel - their_vel;
            let factor = 1. / (2. * (max_acc * self.comf_dec).sqrt().max(f64::EPSILON));
            let ss = MIN_GAP + (my_vel * self.headway) + (my_vel * appr * factor);
            let term = ss / net_dist;
            max_acc * (1. - (term * term))
        }
    }
}

impl Default for IdmBrain {
    fn default() -> Self {
        Self::new(&ModelParams::default())
    }
}

impl Brain for IdmBrain {
    fn think(&mut self, ctx: &ThinkContext) -> Decision {
        let agent = ctx.agent();
        let vehicle = agent.vehicle();
        let vel = agent.velocity();
        let max_acc = vehicle.max_acceleration();
        let speed_limit = f64::min(ctx.lane().speed_limit(), vehicle.max_speed());

        let mut acc = self.free_road(vel, speed_limit, max_acc);
        if let Some((gap, their_vel)) = ctx.leader() {
            acc = f64::min(acc, self.idm(gap, vel, their_vel, max_acc));
        }

        Decision {
            acceleration: acc.max(vehicle.min_acceleration()),
            next_lane: ctx.preferred_next_lane(),
            ..Default::default()
        }
    }
}
