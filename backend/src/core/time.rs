//! World clock for the simulation
//!
//! The simulation operates in discrete steps, one step per simulated day.
//! The clock knows the horizon and tracks the engine lifecycle:
//!
//! ```text
//! NotStarted --first step--> Running --step == horizon--> Finished
//! ```
//!
//! Once `Finished`, the clock never advances again.

use serde::{Deserialize, Serialize};

/// Lifecycle of the step engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldStatus {
    /// No step has been executed yet
    NotStarted,
    /// At least one step executed and the horizon is not reached
    Running,
    /// The step counter reached the horizon; further steps are no-ops
    Finished,
}

/// Manages simulation time in discrete steps
///
/// # Example
/// ```
/// use supply_chain_sim_core::{WorldClock, WorldStatus};
///
/// let mut clock = WorldClock::new(2);
/// assert_eq!(clock.status(), WorldStatus::NotStarted);
///
/// clock.begin_step();
/// clock.advance();
/// assert_eq!(clock.current_step(), 1);
/// assert_eq!(clock.status(), WorldStatus::Running);
///
/// clock.begin_step();
/// clock.advance();
/// assert!(clock.is_finished());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldClock {
    /// Steps elapsed since simulation start
    current_step: usize,
    /// Number of steps to simulate
    horizon: usize,
    status: WorldStatus,
}

impl WorldClock {
    /// Create a new clock
    ///
    /// # Panics
    /// Panics if `horizon` is zero
    pub fn new(horizon: usize) -> Self {
        assert!(horizon > 0, "horizon must be positive");
        Self {
            current_step: 0,
            horizon,
            status: WorldStatus::NotStarted,
        }
    }

    /// Mark the start of a step (enters `Running` on the first call)
    pub fn begin_step(&mut self) {
        if self.status == WorldStatus::NotStarted {
            self.status = WorldStatus::Running;
        }
    }

    /// Advance time by one step, finishing at the horizon
    pub fn advance(&mut self) {
        if self.status == WorldStatus::Finished {
            return;
        }
        self.current_step += 1;
        if self.current_step >= self.horizon {
            self.status = WorldStatus::Finished;
        }
    }

    /// Current step (number of completed steps)
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Total number of steps
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn status(&self) -> WorldStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == WorldStatus::Finished
    }

    /// Steps left before the horizon
    pub fn remaining_steps(&self) -> usize {
        self.horizon.saturating_sub(self.current_step)
    }

    /// Fraction of the horizon already simulated, in [0, 1]
    pub fn relative_time(&self) -> f64 {
        self.current_step as f64 / self.horizon as f64
    }
}
