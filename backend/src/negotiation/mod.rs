//! Negotiation Module
//!
//! Agents on adjacent levels trade intermediate products through short
//! bilateral sessions. This module defines what a strategy must be able to do
//! and ships a bounded alternating-offers session runner plus three reference
//! strategies.
//!
//! # Capabilities
//!
//! A strategy is assembled from capability traits rather than a base class:
//! - [`Proposer`]: produce an offer (or walk away) when it is its turn
//! - [`Responder`]: accept, reject or end in reply to the partner's offer
//! - [`Negotiator`]: both of the above plus optional lifecycle hooks
//!
//! Strategies only ever see a read-only [`NegotiationContext`] built by the
//! world, never the world itself.
//!
//! # Example
//!
//! ```rust
//! use supply_chain_sim_core::negotiation::{
//!     Negotiator, NegotiationContext, Offer, Proposer, Responder, Response, SessionState,
//! };
//! use supply_chain_sim_core::RngManager;
//!
//! /// Accepts anything on the last round, otherwise stays silent
//! struct Patient;
//!
//! impl Proposer for Patient {
//!     fn propose(&mut self, _ctx: &NegotiationContext, _state: &SessionState, _rng: &mut RngManager) -> Option<Offer> {
//!         None
//!     }
//! }
//!
//! impl Responder for Patient {
//!     fn respond(&mut self, _ctx: &NegotiationContext, state: &SessionState, _offer: &Offer, _rng: &mut RngManager) -> Response {
//!         if state.is_last_round() { Response::Accept } else { Response::Reject }
//!     }
//! }
//!
//! impl Negotiator for Patient {
//!     fn type_name(&self) -> &str {
//!         "patient"
//!     }
//! }
//! ```

pub mod mechanism;
pub mod registry;
pub mod strategies;

pub use mechanism::{run_session, Participant, SessionOutcome};
pub use registry::{InnerParams, NegotiatorBuilder, NegotiatorRegistry};
pub use strategies::{DoNothingNegotiator, GreedyNegotiator, RandomNegotiator};

use crate::models::contract::{ExecutionRecord, NegotiatedContract};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Terms proposed by one side of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub quantity: usize,
    pub unit_price: i64,
    pub delivery_step: usize,
}

/// Reply to an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Accept,
    Reject,
    /// Leave the session without agreement
    End,
}

/// Which side of the trade a negotiator is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Seller,
    Buyer,
}

/// Inclusive bounds on every negotiable issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issues {
    pub quantity: (usize, usize),
    pub unit_price: (i64, i64),
    pub delivery_step: (usize, usize),
}

impl Issues {
    /// Issues for trading a product whose catalog price is `catalog_price`
    ///
    /// Quantity is limited by the number of lines, price spans half to twice
    /// the catalog price, delivery spans `step..=last_delivery`.
    pub fn for_product(
        n_lines: usize,
        catalog_price: i64,
        step: usize,
        last_delivery: usize,
    ) -> Self {
        Self {
            quantity: (1, n_lines.max(1)),
            unit_price: ((catalog_price / 2).max(1), (catalog_price * 2).max(1)),
            delivery_step: (step, last_delivery.max(step)),
        }
    }

    /// Pull every term of `offer` inside the bounds
    pub fn clamp(&self, offer: Offer) -> Offer {
        Offer {
            quantity: offer.quantity.clamp(self.quantity.0, self.quantity.1),
            unit_price: offer.unit_price.clamp(self.unit_price.0, self.unit_price.1),
            delivery_step: offer
                .delivery_step
                .clamp(self.delivery_step.0, self.delivery_step.1),
        }
    }

    pub fn contains(&self, offer: &Offer) -> bool {
        self.clamp(*offer) == *offer
    }
}

/// Per-side view of a running session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session_id: String,
    /// Zero-based round about to be played
    pub round: usize,
    /// Round budget of the session
    pub n_rounds: usize,
    pub issues: Issues,
    pub product: usize,
    pub role: Role,
    pub partner_id: String,
}

impl SessionState {
    pub fn is_last_round(&self) -> bool {
        self.round + 1 >= self.n_rounds
    }

    /// Fraction of the budget already used, in [0, 1)
    pub fn relative_time(&self) -> f64 {
        if self.n_rounds == 0 {
            return 1.0;
        }
        self.round as f64 / self.n_rounds as f64
    }
}

/// What an agent knows when negotiating at a given step
///
/// Quantities refer to deliveries due at `step`. `market_supply` and
/// `market_sale` summarize the exogenous contracts of the whole chain for the
/// step, which every agent may observe.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationContext {
    pub step: usize,
    pub agent_id: String,
    pub level: usize,
    pub n_processes: usize,
    pub capacity: usize,
    pub unit_cost: i64,
    pub balance: i64,
    /// Catalog price of the product this agent consumes
    pub input_price: i64,
    /// Catalog price of the product this agent produces
    pub output_price: i64,
    pub exogenous_input: usize,
    pub exogenous_output: usize,
    pub secured_sales: usize,
    pub secured_supplies: usize,
    pub market_supply: usize,
    pub market_sale: usize,
}

impl NegotiationContext {
    pub fn is_first_level(&self) -> bool {
        self.level == 0
    }

    pub fn is_last_level(&self) -> bool {
        self.level + 1 == self.n_processes
    }

    /// Units this agent expects to process this step
    fn target_throughput(&self) -> usize {
        if self.is_first_level() {
            self.exogenous_input.min(self.capacity)
        } else if self.is_last_level() {
            self.exogenous_output.min(self.capacity)
        } else {
            self.capacity.min(self.market_supply).min(self.market_sale)
        }
    }

    /// Output units still to be sold to the next level
    pub fn needed_sales(&self) -> usize {
        if self.is_last_level() {
            return 0;
        }
        let available = if self.is_first_level() {
            self.target_throughput()
        } else {
            self.secured_supplies.min(self.capacity)
        };
        available.saturating_sub(self.secured_sales)
    }

    /// Input units still to be bought from the previous level
    pub fn needed_supplies(&self) -> usize {
        if self.is_first_level() {
            return 0;
        }
        self.target_throughput()
            .saturating_sub(self.secured_supplies)
    }

    /// Remaining need for the given side of a trade
    pub fn needs(&self, role: Role) -> usize {
        match role {
            Role::Seller => self.needed_sales(),
            Role::Buyer => self.needed_supplies(),
        }
    }
}

/// Produces offers when it is this side's turn
pub trait Proposer {
    /// `None` ends the session without agreement
    fn propose(
        &mut self,
        ctx: &NegotiationContext,
        state: &SessionState,
        rng: &mut RngManager,
    ) -> Option<Offer>;
}

/// Answers the partner's offers
pub trait Responder {
    fn respond(
        &mut self,
        ctx: &NegotiationContext,
        state: &SessionState,
        offer: &Offer,
        rng: &mut RngManager,
    ) -> Response;
}

/// A complete strategy, owned by the world on behalf of one agent
pub trait Negotiator: Proposer + Responder + Send {
    /// Registry name of this strategy
    fn type_name(&self) -> &str;

    /// Called once per step before any session opens
    fn on_step_start(&mut self, _ctx: &NegotiationContext) {}

    /// Called after the agent signs a contract
    fn on_negotiation_success(&mut self, _contract: &NegotiatedContract) {}

    /// Called after a contract the agent is party to executes
    fn on_contract_executed(&mut self, _record: &ExecutionRecord) {}
}
