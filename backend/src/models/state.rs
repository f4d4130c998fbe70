//! Simulation State
//!
//! Holds every agent in level order plus the world-wide contract books.
//!
//! # Critical Invariants
//!
//! 1. **Agent Uniqueness**: each agent id appears exactly once
//! 2. **Level Order**: `agents()` yields level 0 first, then level 1, ...
//! 3. **Append-only Books**: concluded contracts and execution records are
//!    never mutated or removed once recorded

use crate::models::agent::Agent;
use crate::models::contract::{Contract, ContractFilter, ExecutionRecord};
use std::collections::{HashMap, HashSet};

/// Complete simulation state
///
/// # Example
///
/// ```rust
/// use supply_chain_sim_core::{Agent, Profile, SimulationState};
///
/// let p0 = Profile::single_process(2, 2, 0, 3).unwrap();
/// let p1 = Profile::single_process(2, 2, 1, 3).unwrap();
/// let state = SimulationState::new(vec![
///     Agent::new("00@0".to_string(), 0, "greedy".to_string(), 1_000, p0),
///     Agent::new("01@1".to_string(), 1, "greedy".to_string(), 2_000, p1),
/// ]);
/// assert_eq!(state.num_agents(), 2);
/// assert_eq!(state.total_balance(), 3_000);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// All agents, sorted by level (stable within a level)
    agents: Vec<Agent>,

    /// Agent id -> position in `agents`
    index: HashMap<String, usize>,

    /// Agents removed from the simulation
    retired: HashSet<String>,

    /// Every concluded contract (revealed exogenous and signed negotiated)
    contracts: Vec<Contract>,

    /// Every executed contract
    executions: Vec<ExecutionRecord>,
}

impl SimulationState {
    /// Create a new simulation state with given agents
    ///
    /// Agents are reordered by level; relative order within a level is kept.
    pub fn new(mut agents: Vec<Agent>) -> Self {
        agents.sort_by_key(Agent::level);
        let index = agents
            .iter()
            .enumerate()
            .map(|(i, agent)| (agent.id().to_string(), i))
            .collect();

        Self {
            agents,
            index,
            retired: HashSet::new(),
            contracts: Vec::new(),
            executions: Vec::new(),
        }
    }

    /// Get reference to an agent by ID
    pub fn get_agent(&self, id: &str) -> Option<&Agent> {
        self.index.get(id).map(|&i| &self.agents[i])
    }

    /// Get mutable reference to an agent by ID
    pub fn get_agent_mut(&mut self, id: &str) -> Option<&mut Agent> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.agents[i]),
            None => None,
        }
    }

    /// Position of an agent in level order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// All agents in level order
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agents at `level`, skipping retired ones
    pub fn active_agents_at_level(&self, level: usize) -> Vec<&Agent> {
        self.agents
            .iter()
            .filter(|a| a.level() == level && !self.retired.contains(a.id()))
            .collect()
    }

    /// Get number of agents in system
    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn retire(&mut self, id: &str) -> bool {
        self.contains(id) && self.retired.insert(id.to_string())
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    /// Record a concluded contract
    pub fn add_contract(&mut self, contract: Contract) {
        self.contracts.push(contract);
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    /// Concluded contracts matching `filter`
    pub fn contracts_matching(&self, filter: &ContractFilter) -> Vec<&Contract> {
        self.contracts.iter().filter(|c| filter.matches(c)).collect()
    }

    pub fn record_execution(&mut self, record: ExecutionRecord) {
        self.executions.push(record);
    }

    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.executions
    }

    /// Sum of all agent balances
    pub fn total_balance(&self) -> i64 {
        self.agents.iter().map(Agent::balance).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contract::{ContractKind, NegotiatedContract};
    use crate::models::profile::Profile;

    fn agent(id: &str, level: usize) -> Agent {
        let profile = Profile::single_process(2, 3, level, 1).unwrap();
        Agent::new(id.to_string(), level, "greedy".to_string(), 100, profile)
    }

    #[test]
    fn test_agents_sorted_by_level() {
        let state = SimulationState::new(vec![agent("c", 2), agent("a", 0), agent("b", 1), agent("a2", 0)]);
        let ids: Vec<&str> = state.agents().iter().map(Agent::id).collect();
        assert_eq!(ids, vec!["a", "a2", "b", "c"]);
        assert_eq!(state.position("b"), Some(2));
        let b = state.position("b").map(|i| &state.agents()[i]);
        assert_eq!(b.map(Agent::id), state.get_agent("b").map(Agent::id));
        assert_eq!(state.position("missing"), None);
    }

    #[test]
    fn test_retired_agents_leave_level_view() {
        let mut state = SimulationState::new(vec![agent("a", 0), agent("b", 0)]);
        assert!(state.retire("a"));
        assert!(!state.retire("a"));
        assert!(!state.retire("missing"));
        let active: Vec<&str> = state.active_agents_at_level(0).iter().map(|a| a.id()).collect();
        assert_eq!(active, vec!["b"]);
    }

    #[test]
    fn test_contract_filter_by_kind_and_step() {
        let mut state = SimulationState::new(vec![agent("a", 0)]);
        for step in 0..3 {
            state.add_contract(Contract::Negotiated(NegotiatedContract {
                id: format!("neg_{}", step),
                session_id: format!("sess_{}", step),
                product: 1,
                quantity: 1,
                unit_price: 5,
                delivery_step: step,
                signed_step: step,
                seller_id: "a".to_string(),
                buyer_id: "b".to_string(),
            }));
        }
        let filter = ContractFilter::default()
            .kind(ContractKind::Negotiated)
            .steps(1..3);
        assert_eq!(state.contracts_matching(&filter).len(), 2);
        let exo = ContractFilter::default().kind(ContractKind::Exogenous);
        assert!(state.contracts_matching(&exo).is_empty());
    }
}
