//! Error taxonomy
//!
//! - `ConfigurationError`: structurally invalid generator or constructor input
//! - `FeasibilityError`: no profitable trade path can be guaranteed
//! - `NegotiationTimeoutError`: a session exhausted its round budget
//!   (recovered locally as "no contract")
//! - `ExecutionError`: a due contract references an unknown or retired agent
//!   (fatal, aborts the step)
//! - `TournamentError`: generation or simulation failure inside a tournament
//!
//! Configuration and feasibility errors are raised before any `World` exists.

use thiserror::Error;

/// Structurally inconsistent inputs
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("Level counts sum to {actual} but {expected} agent types were supplied")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Expected {expected} {what}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} must be positive, got {value}")]
    NonPositive { what: String, value: i64 },

    #[error("Invalid range for {what}: [{lo}, {hi}]")]
    InvalidRange { what: &'static str, lo: i64, hi: i64 },

    #[error("Revelation step {revelation} is after delivery step {delivery}")]
    RevelationAfterDelivery { revelation: usize, delivery: usize },

    #[error("Exogenous contract must have exactly one environment party")]
    EnvironmentParty,

    #[error("Unknown agent type '{0}'")]
    UnknownAgentType(String),

    #[error("Duplicate agent ID: {0}")]
    DuplicateAgent(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Range-mode topology left {0} agent type(s) unassigned")]
    SurplusAgentTypes(usize),

    #[error("Range-mode topology left {0} slot(s) without an agent type")]
    UnfilledSlots(usize),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("neg_n_steps ({neg_n_steps}) must be below the per-step round budget ({rounds_per_step})")]
    NegotiationBudget {
        neg_n_steps: usize,
        rounds_per_step: usize,
    },

    #[error("{0}")]
    Invalid(String),
}

/// The generator cannot guarantee a profitable path for some agent
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeasibilityError {
    #[error("Agent {agent_id} at level {level} needs a sale price above {required} but margins cap it at {ceiling}")]
    UnprofitableAgent {
        agent_id: String,
        level: usize,
        required: i64,
        ceiling: i64,
    },

    #[error("Agent {agent_id} cannot run process {process} on any line")]
    NoRunnableLine { agent_id: String, process: usize },
}

/// A negotiation session used its full round budget without agreement
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Negotiation {session_id} timed out after {rounds} round(s)")]
pub struct NegotiationTimeoutError {
    pub session_id: String,
    pub rounds: usize,
}

/// A due contract could not be executed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("Contract {contract_id} references unknown agent {agent_id}")]
    UnknownAgent {
        contract_id: String,
        agent_id: String,
    },

    #[error("Contract {contract_id} references retired agent {agent_id}")]
    RetiredAgent {
        contract_id: String,
        agent_id: String,
    },
}

/// Errors surfaced by world generation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Feasibility error: {0}")]
    Feasibility(#[from] FeasibilityError),
}

/// Errors surfaced by world construction and stepping
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(#[from] ConfigurationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

/// Errors surfaced while planning or running a tournament
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TournamentError {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

impl From<ConfigurationError> for TournamentError {
    fn from(err: ConfigurationError) -> Self {
        TournamentError::Generation(GenerationError::Configuration(err))
    }
}
