//! Orchestrator - world construction and the step loop
//!
//! See `engine.rs` for the step loop and `config.rs` for the construction
//! payload.

pub mod config;
pub mod engine;

pub use config::{AgentEntry, WorldConfig};
pub use engine::{AgentScore, StepResult, World};
