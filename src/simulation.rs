use crate::brain::{Brain, BrainFactory, FullSpeedBrain};
use crate::{Net, Route, SimError, SimResult, TickReport};
use log::{info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A source of wall-clock time.
pub trait Clock: Send {
    /// The time elapsed since some fixed reference point.
    fn now(&self) -> Duration;
}

impl<F: Fn() -> Duration + Send> Clock for F {
    fn now(&self) -> Duration {
        self()
    }
}

/// Measures real time from the moment it is created.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock(Instant);

impl Default for SystemClock {
    fn default() -> Self {
        Self(Instant::now())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.0.elapsed()
    }
}

/// A clock which only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<Mutex<Duration>>);

impl ManualClock {
    pub fn new() -> Self {
        Default::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.0.lock() {
            *now += by;
        }
    }

    /// Moves the clock forward by a number of seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.lock().map(|now| *now).unwrap_or_default()
    }
}

/// A unit of work submitted to the simulation from outside the tick loop.
pub trait Command: Send {
    /// Executes against the simulation, returning text for the console.
    fn execute(self: Box<Self>, sim: &mut Simulation) -> String;
}

impl<F: FnOnce(&mut Simulation) -> String + Send> Command for F {
    fn execute(self: Box<Self>, sim: &mut Simulation) -> String {
        (*self)(sim)
    }
}

/// Receives the output of executed commands.
pub trait Console: Send {
    fn write(&mut self, output: &str);
}

/// A console which forwards command output to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogConsole;

impl Console for LogConsole {
    fn write(&mut self, output: &str) {
        if !output.is_empty() {
            info!("{}", output);
        }
    }
}

/// A cloneable handle for submitting commands from any thread.
#[derive(Clone)]
pub struct CommandSender(Sender<Box<dyn Command>>);

impl CommandSender {
    /// Queues a command for the next tick. Never blocks.
    pub fn submit(&self, command: impl Command + 'static) -> SimResult<()> {
        self.0
            .send(Box::new(command))
            .map_err(|_| SimError::Disconnected)
    }
}

/// The time scaling of a simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Simulated seconds per real second.
    pub time_factor: f64,
    /// Multiplier applied to the simulated time when deciding which routes
    /// depart, so arrivals can be compressed relative to motion.
    pub spawn_time_factor: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_factor: 1.0,
            spawn_time_factor: 1.0,
        }
    }
}

/// Drives a [Net] forward in time, one tick at a time.
pub struct Simulation {
    /// The network being simulated.
    net: Net,
    /// The source of wall-clock time.
    clock: Box<dyn Clock>,
    /// The time scaling.
    config: SimulationConfig,
    /// The clock reading when the simulation started.
    start: Duration,
    /// The clock reading at the end of the previous tick.
    last_tick: Duration,
    /// The simulated time advanced by the last tick, in s.
    time_delta: f64,
    /// The total simulated time, in s.
    time_total: f64,
    /// The commands waiting to be executed.
    commands: Receiver<Box<dyn Command>>,
    /// Kept so that handles can be created on demand.
    sender: Sender<Box<dyn Command>>,
    /// Receives command output.
    console: Box<dyn Console>,
    /// Creates the brains of spawned agents.
    brain_factory: BrainFactory,
    /// The report of the previous tick.
    last_report: TickReport,
}

impl Simulation {
    /// Creates a simulation running in real time.
    pub fn new(net: Net) -> Self {
        Self::with_clock(net, SystemClock::default())
    }

    /// Creates a simulation which reads time from the given clock.
    pub fn with_clock(net: Net, clock: impl Clock + 'static) -> Self {
        let (sender, commands) = channel();
        let mut sim = Self {
            net,
            clock: Box::new(clock),
            config: Default::default(),
            start: Duration::ZERO,
            last_tick: Duration::ZERO,
            time_delta: 0.0,
            time_total: 0.0,
            commands,
            sender,
            console: Box::new(LogConsole),
            brain_factory: Box::new(|_: &Route| Box::new(FullSpeedBrain) as Box<dyn Brain>),
            last_report: Default::default(),
        };
        sim.start();
        sim
    }

    /// Sets the time scaling.
    pub fn set_config(&mut self, config: SimulationConfig) {
        self.config = config;
    }

    /// Sets the number of simulated seconds per real second.
    pub fn set_time_factor(&mut self, factor: f64) {
        self.config.time_factor = factor;
    }

    /// Sets the multiplier applied to simulated time when spawning routes.
    pub fn set_spawn_time_factor(&mut self, factor: f64) {
        self.config.spawn_time_factor = factor;
    }

    /// Sets where command output is written.
    pub fn set_console(&mut self, console: impl Console + 'static) {
        self.console = Box::new(console);
    }

    /// Sets how the brains of agents spawned from routes are created.
    pub fn set_brain_factory(
        &mut self,
        factory: impl FnMut(&Route) -> Box<dyn Brain> + Send + 'static,
    ) {
        self.brain_factory = Box::new(factory);
    }

    /// Resets the reference points of the simulation clock to now.
    pub fn start(&mut self) {
        self.start = self.clock.now();
        self.last_tick = self.start;
    }

    /// Returns a handle for submitting commands.
    pub fn commands(&self) -> CommandSender {
        CommandSender(self.sender.clone())
    }

    pub fn config(&self) -> SimulationConfig {
        self.config
    }

    pub fn net(&self) -> &Net {
        &self.net
    }

    pub fn net_mut(&mut self) -> &mut Net {
        &mut self.net
    }

    /// The total simulated time in s.
    pub fn time_total(&self) -> f64 {
        self.time_total
    }

    /// The simulated time advanced by the last tick in s.
    pub fn time_delta(&self) -> f64 {
        self.time_delta
    }

    /// The report of the most recent tick.
    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    /// Performs one step of the simulation.
    ///
    /// The steps are: measure elapsed time, execute queued commands, spawn due
    /// routes, let every agent think, then advance every lane.
    pub fn tick(&mut self) -> SimResult<TickReport> {
        let now = self.clock.now();
        let duration = now.saturating_sub(self.last_tick).as_secs_f64() * self.config.time_factor;
        self.time_delta = duration;
        self.time_total = now.saturating_sub(self.start).as_secs_f64() * self.config.time_factor;

        self.execute_commands();
        let spawned = self.spawn(self.time_total * self.config.spawn_time_factor)?;
        self.net.think();
        let mut report = self.net.simulate(duration)?;
        report.spawned = spawned;
        report.total_time = self.time_total;

        self.last_tick = self.clock.now();
        trace!("Tick {} advanced {:.3} s", report.frame, duration);
        self.last_report = report;
        Ok(report)
    }

    /// Calls [Self::tick] once per `period` until `running` is cleared.
    pub fn run(&mut self, period: Duration, running: &AtomicBool) -> SimResult<()> {
        while running.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.tick()?;
            if let Some(rest) = period.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        Ok(())
    }

    /// Executes the commands queued before this tick began.
    fn execute_commands(&mut self) {
        let pending = self.commands.try_iter().collect::<Vec<_>>();
        for command in pending {
            let output = command.execute(self);
            self.console.write(&output);
        }
    }

    /// Spawns an agent for every route due before `spawn_time`.
    fn spawn(&mut self, spawn_time: f64) -> SimResult<usize> {
        let routes = self.net.take_due_routes(spawn_time);
        for route in &routes {
            let brain = (self.brain_factory)(route);
            self.net.spawn(route, brain)?;
        }
        Ok(routes.len())
    }
}
