//! Contract models
//!
//! Two kinds of contract move goods and money through the chain:
//! - **Exogenous**: injected by the environment. A supply contract sells raw
//!   material to a first-level agent, a sale contract buys final product from
//!   a last-level agent. Each has a revelation step (when the owning agent
//!   learns about it) and a delivery step (when it executes).
//! - **Negotiated**: signed at runtime by two agents on adjacent levels.
//!
//! Contracts are immutable once a world is built.
//!
//! CRITICAL: All money values are i64

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Reporting id of the environment when it sells (supply contracts)
pub const SYSTEM_SELLER_ID: &str = "SELLER";

/// Reporting id of the environment when it buys (sale contracts)
pub const SYSTEM_BUYER_ID: &str = "BUYER";

/// True for the environment/bookkeeping pseudo-agents
pub fn is_system_agent(id: &str) -> bool {
    id == SYSTEM_SELLER_ID || id == SYSTEM_BUYER_ID
}

/// One side of a contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    Agent(String),
    Environment,
}

impl Party {
    pub fn agent(id: impl Into<String>) -> Self {
        Party::Agent(id.into())
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, Party::Environment)
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Party::Agent(id) => Some(id),
            Party::Environment => None,
        }
    }
}

/// Contract injected by the environment
///
/// # Example
/// ```
/// use supply_chain_sim_core::{ExogenousContract, Party};
///
/// let supply = ExogenousContract::new(
///     "exo_000001".to_string(),
///     0,                       // raw material
///     4,                       // quantity
///     10,                      // unit price
///     3,                       // delivery step
///     0,                       // revelation step
///     Party::Environment,
///     Party::agent("00@0"),
/// ).unwrap();
/// assert!(supply.is_supply());
/// assert_eq!(supply.owner(), "00@0");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExogenousContract {
    id: String,
    product: usize,
    quantity: usize,
    unit_price: i64,
    delivery_step: usize,
    revelation_step: usize,
    seller: Party,
    buyer: Party,
}

impl ExogenousContract {
    /// Create a validated exogenous contract
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when quantity or price is not positive, when the
    /// revelation step is after the delivery step, or when not exactly one
    /// party is the environment.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        product: usize,
        quantity: usize,
        unit_price: i64,
        delivery_step: usize,
        revelation_step: usize,
        seller: Party,
        buyer: Party,
    ) -> Result<Self, ConfigurationError> {
        let contract = Self {
            id,
            product,
            quantity,
            unit_price,
            delivery_step,
            revelation_step,
            seller,
            buyer,
        };
        contract.validate()?;
        Ok(contract)
    }

    /// Re-check the construction invariants
    ///
    /// Deserialized contracts never went through `new`, so world validation
    /// calls this on every exogenous contract it loads.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.quantity == 0 {
            return Err(ConfigurationError::NonPositive {
                what: format!("quantity of contract {}", self.id),
                value: 0,
            });
        }
        if self.unit_price <= 0 {
            return Err(ConfigurationError::NonPositive {
                what: format!("unit price of contract {}", self.id),
                value: self.unit_price,
            });
        }
        if self.revelation_step > self.delivery_step {
            return Err(ConfigurationError::RevelationAfterDelivery {
                revelation: self.revelation_step,
                delivery: self.delivery_step,
            });
        }
        if self.seller.is_environment() == self.buyer.is_environment() {
            return Err(ConfigurationError::EnvironmentParty);
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn product(&self) -> usize {
        self.product
    }

    pub fn quantity(&self) -> usize {
        self.quantity
    }

    pub fn unit_price(&self) -> i64 {
        self.unit_price
    }

    pub fn delivery_step(&self) -> usize {
        self.delivery_step
    }

    pub fn revelation_step(&self) -> usize {
        self.revelation_step
    }

    pub fn seller(&self) -> &Party {
        &self.seller
    }

    pub fn buyer(&self) -> &Party {
        &self.buyer
    }

    /// Environment sells to an agent
    pub fn is_supply(&self) -> bool {
        self.seller.is_environment()
    }

    /// Environment buys from an agent
    pub fn is_sale(&self) -> bool {
        self.buyer.is_environment()
    }

    /// The agent this contract is revealed to
    pub fn owner(&self) -> &str {
        // Construction guarantees exactly one side is an agent
        self.seller
            .agent_id()
            .or_else(|| self.buyer.agent_id())
            .unwrap_or_default()
    }

    /// Reporting id of the seller (system id for the environment)
    pub fn seller_id(&self) -> &str {
        self.seller.agent_id().unwrap_or(SYSTEM_SELLER_ID)
    }

    /// Reporting id of the buyer (system id for the environment)
    pub fn buyer_id(&self) -> &str {
        self.buyer.agent_id().unwrap_or(SYSTEM_BUYER_ID)
    }

    pub fn total_value(&self) -> i64 {
        self.quantity as i64 * self.unit_price
    }

    /// Point the agent side at a renamed agent
    pub(crate) fn rename_agent(&mut self, from: &str, to: &str) {
        for party in [&mut self.seller, &mut self.buyer] {
            if party.agent_id() == Some(from) {
                *party = Party::agent(to);
            }
        }
    }
}

/// Contract signed by two agents at the end of a successful negotiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiatedContract {
    pub id: String,
    pub session_id: String,
    pub product: usize,
    pub quantity: usize,
    pub unit_price: i64,
    pub delivery_step: usize,
    pub signed_step: usize,
    pub seller_id: String,
    pub buyer_id: String,
}

impl NegotiatedContract {
    pub fn total_value(&self) -> i64 {
        self.quantity as i64 * self.unit_price
    }
}

/// Contract discriminator used for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    Exogenous,
    Negotiated,
}

/// Either kind of contract, as stored in the world's contract books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Contract {
    Exogenous(ExogenousContract),
    Negotiated(NegotiatedContract),
}

impl Contract {
    pub fn kind(&self) -> ContractKind {
        match self {
            Contract::Exogenous(_) => ContractKind::Exogenous,
            Contract::Negotiated(_) => ContractKind::Negotiated,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Contract::Exogenous(c) => c.id(),
            Contract::Negotiated(c) => &c.id,
        }
    }

    pub fn product(&self) -> usize {
        match self {
            Contract::Exogenous(c) => c.product(),
            Contract::Negotiated(c) => c.product,
        }
    }

    pub fn quantity(&self) -> usize {
        match self {
            Contract::Exogenous(c) => c.quantity(),
            Contract::Negotiated(c) => c.quantity,
        }
    }

    pub fn unit_price(&self) -> i64 {
        match self {
            Contract::Exogenous(c) => c.unit_price(),
            Contract::Negotiated(c) => c.unit_price,
        }
    }

    pub fn delivery_step(&self) -> usize {
        match self {
            Contract::Exogenous(c) => c.delivery_step(),
            Contract::Negotiated(c) => c.delivery_step,
        }
    }

    /// Reporting id of the seller
    pub fn seller_id(&self) -> &str {
        match self {
            Contract::Exogenous(c) => c.seller_id(),
            Contract::Negotiated(c) => &c.seller_id,
        }
    }

    /// Reporting id of the buyer
    pub fn buyer_id(&self) -> &str {
        match self {
            Contract::Exogenous(c) => c.buyer_id(),
            Contract::Negotiated(c) => &c.buyer_id,
        }
    }

    /// True when the seller is the environment
    pub fn seller_is_environment(&self) -> bool {
        matches!(self, Contract::Exogenous(c) if c.is_supply())
    }

    /// True when the buyer is the environment
    pub fn buyer_is_environment(&self) -> bool {
        matches!(self, Contract::Exogenous(c) if c.is_sale())
    }
}

/// Outcome of executing one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub contract: Contract,
    pub step: usize,
    /// Units actually handed over
    pub delivered: usize,
    /// Units the seller failed to deliver
    pub shortfall: usize,
    /// Penalty paid by the seller for the shortfall
    pub penalty: i64,
}

/// Filter for contract queries
///
/// # Example
/// ```
/// use supply_chain_sim_core::{ContractFilter, ContractKind};
///
/// let filter = ContractFilter::default()
///     .kind(ContractKind::Negotiated)
///     .steps(2..5);
/// assert!(filter.matches_step(3));
/// assert!(!filter.matches_step(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractFilter {
    pub kind: Option<ContractKind>,
    /// Delivery steps to include (half-open)
    pub steps: Option<Range<usize>>,
}

impl ContractFilter {
    pub fn kind(mut self, kind: ContractKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn steps(mut self, steps: Range<usize>) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn matches_step(&self, step: usize) -> bool {
        self.steps.as_ref().map_or(true, |r| r.contains(&step))
    }

    pub fn matches(&self, contract: &Contract) -> bool {
        self.kind.map_or(true, |k| k == contract.kind())
            && self.matches_step(contract.delivery_step())
    }
}
