use crate::{LaneId, SimError, SimResult, Vehicle};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A scheduled trip: the agent departing at `departure_time` starts on the
/// first lane of the path and leaves the simulation at the end of the edge
/// containing the last one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Route {
    /// The departure time, in simulated seconds.
    departure_time: f64,
    /// The lanes to travel along.
    lanes: Vec<LaneId>,
    /// The vehicle the spawned agent drives.
    vehicle: Vehicle,
}

impl Route {
    /// Creates a route using the default vehicle.
    pub fn new(departure_time: f64, lanes: Vec<LaneId>) -> SimResult<Self> {
        if lanes.is_empty() {
            return Err(SimError::EmptyRoute);
        }
        Ok(Self {
            departure_time,
            lanes,
            vehicle: Vehicle::default(),
        })
    }

    /// Sets the vehicle the spawned agent will drive.
    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicle = vehicle;
        self
    }

    /// The departure time in simulated seconds.
    pub fn departure_time(&self) -> f64 {
        self.departure_time
    }

    /// The lanes of the route, in order of travel.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// The lane the agent is spawned on.
    pub fn start_lane(&self) -> Option<LaneId> {
        self.lanes.first().copied()
    }

    /// The last lane of the route.
    pub fn end_lane(&self) -> Option<LaneId> {
        self.lanes.last().copied()
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    /// Whether the route should have departed by `time`.
    pub fn is_due(&self, time: f64) -> bool {
        self.departure_time < time
    }
}
