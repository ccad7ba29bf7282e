use crate::util::Interval;
use crate::{SimError, SimResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The static physical parameters of a simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vehicle {
    /// Half the vehicle's length in m.
    half_len: f64,
    /// The range of accelerations the vehicle can produce, in m/s^2.
    acc: Interval<f64>,
    /// The vehicle's top speed in m/s.
    max_vel: f64,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleAttributes {
    /// The vehicle length in m.
    pub length: f64,
    /// The strongest deceleration of the vehicle, a negative number in m/s^2.
    pub min_acc: f64,
    /// The maximum acceleration of the vehicle, in m/s^2.
    pub max_acc: f64,
    /// The top speed of the vehicle, in m/s.
    pub max_vel: f64,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            length: 4.5,
            min_acc: -6.0,
            max_acc: 2.5,
            max_vel: 50.0,
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle, validating its attributes.
    pub fn new(attributes: &VehicleAttributes) -> SimResult<Self> {
        if !(attributes.length > 0.0) {
            return Err(SimError::InvalidVehicle("length must be positive"));
        }
        if !(attributes.max_acc >= attributes.min_acc) {
            return Err(SimError::InvalidVehicle(
                "maximum acceleration is below minimum acceleration",
            ));
        }
        if !(attributes.max_vel >= 0.0) {
            return Err(SimError::InvalidVehicle("top speed must not be negative"));
        }
        Ok(Self {
            half_len: 0.5 * attributes.length,
            acc: Interval::new(attributes.min_acc, attributes.max_acc),
            max_vel: attributes.max_vel,
        })
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    /// Half the vehicle's length in m.
    pub fn half_length(&self) -> f64 {
        self.half_len
    }

    /// The strongest deceleration in m/s^2.
    pub fn min_acceleration(&self) -> f64 {
        self.acc.min
    }

    /// The maximum acceleration in m/s^2.
    pub fn max_acceleration(&self) -> f64 {
        self.acc.max
    }

    /// The top speed in m/s.
    pub fn max_speed(&self) -> f64 {
        self.max_vel
    }

    /// Restricts a requested acceleration to what the vehicle can produce.
    pub fn clamp_acceleration(&self, acc: f64) -> f64 {
        self.acc.clamp(acc)
    }
}

impl Default for Vehicle {
    fn default() -> Self {
        let attributes = VehicleAttributes::default();
        Self {
            half_len: 0.5 * attributes.length,
            acc: Interval::new(attributes.min_acc, attributes.max_acc),
            max_vel: attributes.max_vel,
        }
    }
}
