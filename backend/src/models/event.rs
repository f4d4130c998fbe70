//! Event logging for simulation replay and auditing.
//!
//! Every significant state change during a step is captured as an `Event`:
//! - **Reveal**: an exogenous contract became known to its owner
//! - **Negotiation**: sessions opened, signed, withdrawn or timed out
//! - **Production**: inputs converted into outputs
//! - **Execution**: a due contract was executed
//! - **Disposal**: leftover stock discarded at the end of a step
//! - **Step**: step boundary summary
//!
//! # Example
//!
//! ```rust
//! use supply_chain_sim_core::models::Event;
//!
//! let event = Event::ContractRevealed {
//!     step: 3,
//!     contract_id: "exo_000007".to_string(),
//!     agent_id: "00@0".to_string(),
//!     delivery_step: 4,
//! };
//!
//! assert_eq!(event.step(), 3);
//! assert_eq!(event.event_type(), "ContractRevealed");
//! ```

/// Simulation event capturing a state change.
///
/// Events are logged in the order they occur within a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Exogenous contract revealed to its owning agent
    ContractRevealed {
        step: usize,
        contract_id: String,
        agent_id: String,
        delivery_step: usize,
    },

    /// Negotiation session opened between adjacent-level agents
    NegotiationOpened {
        step: usize,
        session_id: String,
        seller_id: String,
        buyer_id: String,
        product: usize,
    },

    /// Session ended with an agreement
    ContractSigned {
        step: usize,
        contract_id: String,
        session_id: String,
        seller_id: String,
        buyer_id: String,
        quantity: usize,
        unit_price: i64,
        delivery_step: usize,
        rounds: usize,
    },

    /// A party ended the session without agreement
    NegotiationWithdrawn {
        step: usize,
        session_id: String,
        seller_id: String,
        buyer_id: String,
        round: usize,
    },

    /// Session used its whole round budget
    NegotiationTimedOut {
        step: usize,
        session_id: String,
        seller_id: String,
        buyer_id: String,
        rounds: usize,
    },

    /// Agent converted inputs into outputs
    Production {
        step: usize,
        agent_id: String,
        runs: usize,
        cost: i64,
    },

    /// Due contract executed
    ContractExecuted {
        step: usize,
        contract_id: String,
        seller_id: String,
        buyer_id: String,
        delivered: usize,
        shortfall: usize,
        payment: i64,
        penalty: i64,
    },

    /// Leftover stock discarded
    Disposal {
        step: usize,
        agent_id: String,
        quantity: usize,
        cost: i64,
    },

    /// Agent removed from the simulation
    AgentRetired { step: usize, agent_id: String },

    /// Step completed
    EndOfStep {
        step: usize,
        contracts_signed: usize,
        contracts_executed: usize,
    },
}

impl Event {
    /// Get the step number when this event occurred
    pub fn step(&self) -> usize {
        match self {
            Event::ContractRevealed { step, .. } => *step,
            Event::NegotiationOpened { step, .. } => *step,
            Event::ContractSigned { step, .. } => *step,
            Event::NegotiationWithdrawn { step, .. } => *step,
            Event::NegotiationTimedOut { step, .. } => *step,
            Event::Production { step, .. } => *step,
            Event::ContractExecuted { step, .. } => *step,
            Event::Disposal { step, .. } => *step,
            Event::AgentRetired { step, .. } => *step,
            Event::EndOfStep { step, .. } => *step,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ContractRevealed { .. } => "ContractRevealed",
            Event::NegotiationOpened { .. } => "NegotiationOpened",
            Event::ContractSigned { .. } => "ContractSigned",
            Event::NegotiationWithdrawn { .. } => "NegotiationWithdrawn",
            Event::NegotiationTimedOut { .. } => "NegotiationTimedOut",
            Event::Production { .. } => "Production",
            Event::ContractExecuted { .. } => "ContractExecuted",
            Event::Disposal { .. } => "Disposal",
            Event::AgentRetired { .. } => "AgentRetired",
            Event::EndOfStep { .. } => "EndOfStep",
        }
    }

    /// Contract ID if the event relates to a specific contract
    pub fn contract_id(&self) -> Option<&str> {
        match self {
            Event::ContractRevealed { contract_id, .. } => Some(contract_id),
            Event::ContractSigned { contract_id, .. } => Some(contract_id),
            Event::ContractExecuted { contract_id, .. } => Some(contract_id),
            _ => None,
        }
    }

    /// True if the event involves `agent_id`
    pub fn involves(&self, agent_id: &str) -> bool {
        match self {
            Event::ContractRevealed { agent_id: a, .. }
            | Event::Production { agent_id: a, .. }
            | Event::Disposal { agent_id: a, .. }
            | Event::AgentRetired { agent_id: a, .. } => a == agent_id,
            Event::NegotiationOpened {
                seller_id, buyer_id, ..
            }
            | Event::ContractSigned {
                seller_id, buyer_id, ..
            }
            | Event::NegotiationWithdrawn {
                seller_id, buyer_id, ..
            }
            | Event::NegotiationTimedOut {
                seller_id, buyer_id, ..
            }
            | Event::ContractExecuted {
                seller_id, buyer_id, ..
            } => seller_id == agent_id || buyer_id == agent_id,
            Event::EndOfStep { .. } => false,
        }
    }
}

/// Event log for storing and querying simulation events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events for a specific step
    pub fn events_at_step(&self, step: usize) -> Vec<&Event> {
        self.events.iter().filter(|e| e.step() == step).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events involving a specific agent
    pub fn events_for_agent(&self, agent_id: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.involves(agent_id)).collect()
    }

    /// Get events for a specific contract
    pub fn events_for_contract(&self, contract_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.contract_id() == Some(contract_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_involves_both_parties() {
        let event = Event::ContractSigned {
            step: 2,
            contract_id: "neg_000001".to_string(),
            session_id: "sess_000001".to_string(),
            seller_id: "00@0".to_string(),
            buyer_id: "01@1".to_string(),
            quantity: 3,
            unit_price: 15,
            delivery_step: 2,
            rounds: 4,
        };
        assert!(event.involves("00@0"));
        assert!(event.involves("01@1"));
        assert!(!event.involves("02@1"));
        assert_eq!(event.contract_id(), Some("neg_000001"));
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        log.log(Event::Production {
            step: 0,
            agent_id: "A".to_string(),
            runs: 2,
            cost: 10,
        });
        log.log(Event::EndOfStep {
            step: 0,
            contracts_signed: 0,
            contracts_executed: 0,
        });
        log.log(Event::Production {
            step: 1,
            agent_id: "B".to_string(),
            runs: 1,
            cost: 4,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_at_step(0).len(), 2);
        assert_eq!(log.events_of_type("Production").len(), 2);
        assert_eq!(log.events_for_agent("B").len(), 1);
    }
}
