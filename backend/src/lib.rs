//! Supply Chain Simulator Core
//!
//! Production-network economy generator and step engine with deterministic
//! execution.
//!
//! # Architecture
//!
//! - **core**: World clock and lifecycle status
//! - **models**: Domain types (Agent, Profile, Contract, State, Event)
//! - **topology**: Agents per level, type assignment, naming
//! - **generator**: Feasibility-constrained world generation
//! - **negotiation**: Alternating-offers sessions and reference strategies
//! - **orchestrator**: World construction and the step loop
//! - **tournament**: Competitor assignment and score aggregation
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64
//! 2. All randomness is deterministic (seeded RNG)
//! 3. Negotiated contracts only connect adjacent levels

pub mod core;
pub mod error;
pub mod generator;
pub mod models;
pub mod negotiation;
pub mod orchestrator;
pub mod parallel;
pub mod rng;
pub mod topology;
pub mod tournament;

// Re-exports for convenience
pub use crate::core::time::{WorldClock, WorldStatus};
pub use error::{
    ConfigurationError, ExecutionError, FeasibilityError, GenerationError,
    NegotiationTimeoutError, SimulationError, TournamentError,
};
pub use generator::{GeneratorConfig, WorldGenerator};
pub use models::{
    agent::{Agent, AgentParams, AgentSpec},
    contract::{
        is_system_agent, Contract, ContractFilter, ContractKind, ExecutionRecord,
        ExogenousContract, NegotiatedContract, Party, SYSTEM_BUYER_ID, SYSTEM_SELLER_ID,
    },
    event::{Event, EventLog},
    profile::{PenaltyDistribution, Profile, INFINITE_COST},
    state::SimulationState,
};
pub use negotiation::{Negotiator, NegotiatorRegistry};
pub use orchestrator::{AgentEntry, AgentScore, StepResult, World, WorldConfig};
pub use rng::RngManager;
pub use tournament::{Tournament, TournamentConfig, TournamentResults};
