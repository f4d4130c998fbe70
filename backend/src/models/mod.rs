//! Domain models for the production network

pub mod agent;
pub mod contract;
pub mod event;
pub mod profile;
pub mod state;

// Re-exports
pub use agent::{Agent, AgentParams, AgentSpec};
pub use contract::{
    is_system_agent, Contract, ContractFilter, ContractKind, ExecutionRecord, ExogenousContract,
    NegotiatedContract, Party, SYSTEM_BUYER_ID, SYSTEM_SELLER_ID,
};
pub use event::{Event, EventLog};
pub use profile::{PenaltyDistribution, Profile, INFINITE_COST};
pub use state::SimulationState;
