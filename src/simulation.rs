use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::trace;
use parking_lot::RwLock;

use crate::physics::{Body, System};
use crate::scenario::Scenario;

#[derive(Debug)]
struct SimulationState {
    system: System,
    dt: f64,
    steps: u64,
}

/// Thread-safe handle on an evolving system.
///
/// Clones share the same state, so one clone can step the system while
/// another reads snapshots.
#[derive(Debug)]
pub struct Simulation {
    state: Arc<RwLock<SimulationState>>,
}

impl Clone for Simulation {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Simulation {
    /// Creates a simulation advancing `system` by `dt` per step.
    pub fn new(system: System, dt: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(anyhow!("time step must be a positive number, got {dt}"));
        }
        Ok(Self {
            state: Arc::new(RwLock::new(SimulationState {
                system,
                dt,
                steps: 0,
            })),
        })
    }

    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        Self::new(scenario.system(), scenario.dt)
    }

    /// Advances the system by `count` RK4 steps and returns the total step count.
    pub fn step(&self, count: u64) -> u64 {
        let mut state = self.state.write();
        for _ in 0..count {
            state.system = state.system.rk4_step(state.dt);
            state.steps += 1;
        }
        trace!("simulation advanced to step {}", state.steps);
        state.steps
    }

    /// Returns a copy of the current system.
    pub fn snapshot(&self) -> System {
        self.state.read().system.clone()
    }

    /// Returns a copy of the named body.
    pub fn body(&self, name: &str) -> Option<Body> {
        self.state.read().system.body(name).cloned()
    }

    pub fn steps(&self) -> u64 {
        self.state.read().steps
    }

    pub fn dt(&self) -> f64 {
        self.state.read().dt
    }

    /// Simulated time since the start.
    pub fn elapsed(&self) -> f64 {
        let state = self.state.read();
        state.steps as f64 * state.dt
    }
}
