//! Agent (factory) model
//!
//! Represents a factory occupying one production level. Each agent has:
//! - A balance (i64) and the balance it started with
//! - A production profile (owned exclusively)
//! - Stock of its input and output products for the current step
//! - Its private view of revealed exogenous contracts
//! - The negotiated contracts it has signed
//!
//! The decision-making strategy is not stored here: the world keeps one
//! negotiator per agent, keyed by agent id.
//!
//! CRITICAL: All money values are i64

use crate::models::contract::{ExogenousContract, NegotiatedContract};
use crate::models::profile::Profile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Construction parameters for one agent
///
/// `adapter` parameters configure the factory-level agent itself (display
/// name and similar). `inner` parameters configure the wrapped strategy that
/// makes negotiation decisions. Keeping them apart means a strategy never
/// sees adapter keys and vice versa.
///
/// # Example
/// ```
/// use supply_chain_sim_core::AgentParams;
/// use serde_json::json;
///
/// let params = AgentParams::default()
///     .with_adapter("name", json!("buyer-1"))
///     .with_inner("p_accept", json!(0.4));
/// assert_eq!(params.display_name(), Some("buyer-1"));
/// assert_eq!(params.inner_f64("p_accept"), Some(0.4));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentParams {
    pub adapter: BTreeMap<String, Value>,
    pub inner: BTreeMap<String, Value>,
}

impl AgentParams {
    pub fn with_adapter(mut self, key: &str, value: Value) -> Self {
        self.adapter.insert(key.to_string(), value);
        self
    }

    pub fn with_inner(mut self, key: &str, value: Value) -> Self {
        self.inner.insert(key.to_string(), value);
        self
    }

    /// Explicit display name requested through the adapter parameters
    pub fn display_name(&self) -> Option<&str> {
        self.adapter.get("name").and_then(Value::as_str)
    }

    pub fn inner_f64(&self, key: &str) -> Option<f64> {
        self.inner.get(key).and_then(Value::as_f64)
    }
}

/// Agent type plus its construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Strategy type name resolved by the negotiator registry
    pub type_name: String,
    #[serde(default)]
    pub params: AgentParams,
}

impl AgentSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            params: AgentParams::default(),
        }
    }

    pub fn with_params(mut self, params: AgentParams) -> Self {
        self.params = params;
        self
    }

    /// Agent type used to fill levels nobody else occupies
    pub fn default_agent() -> Self {
        Self::new("random")
    }
}

/// Represents a factory in the production network
///
/// # Example
/// ```
/// use supply_chain_sim_core::{Agent, Profile};
///
/// let profile = Profile::single_process(2, 2, 0, 5).unwrap();
/// let mut agent = Agent::new("00@0".to_string(), 0, "greedy".to_string(), 1_000, profile);
///
/// agent.debit(300);
/// assert_eq!(agent.balance(), 700);
/// assert_eq!(agent.initial_balance(), 1_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier, also used as display name
    id: String,

    /// Production level (the process this agent runs)
    level: usize,

    /// Strategy type name
    type_name: String,

    /// Filled in by the topology planner rather than supplied by the caller
    is_default: bool,

    balance: i64,

    initial_balance: i64,

    profile: Profile,

    /// Units of the input product available this step
    input_stock: usize,

    /// Units of the output product available this step
    output_stock: usize,

    /// Exogenous contracts revealed to this agent so far
    revealed: Vec<ExogenousContract>,

    /// Negotiated contracts this agent signed (as buyer or seller)
    signed: Vec<NegotiatedContract>,
}

impl Agent {
    pub fn new(id: String, level: usize, type_name: String, balance: i64, profile: Profile) -> Self {
        Self {
            id,
            level,
            type_name,
            is_default: false,
            balance,
            initial_balance: balance,
            profile,
            input_stock: 0,
            output_stock: 0,
            revealed: Vec::new(),
            signed: Vec::new(),
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Product consumed by this agent
    pub fn input_product(&self) -> usize {
        self.level
    }

    /// Product produced by this agent
    pub fn output_product(&self) -> usize {
        self.level + 1
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn initial_balance(&self) -> i64 {
        self.initial_balance
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Cheapest cost of one unit of this agent's own process
    pub fn unit_cost(&self) -> Option<i64> {
        self.profile.unit_cost(self.level)
    }

    /// Units this agent can produce per step
    pub fn capacity(&self) -> usize {
        self.profile.capacity(self.level)
    }

    /// Decrease balance (may go negative)
    pub fn debit(&mut self, amount: i64) {
        self.balance -= amount;
    }

    /// Increase balance
    pub fn credit(&mut self, amount: i64) {
        self.balance += amount;
    }

    pub fn input_stock(&self) -> usize {
        self.input_stock
    }

    pub fn output_stock(&self) -> usize {
        self.output_stock
    }

    pub fn receive_input(&mut self, quantity: usize) {
        self.input_stock += quantity;
    }

    /// Convert input stock into output stock
    pub fn convert(&mut self, consumed: usize, produced: usize) {
        self.input_stock -= consumed.min(self.input_stock);
        self.output_stock += produced;
    }

    /// Hand over up to `quantity` units of output, returning what was delivered
    pub fn take_output(&mut self, quantity: usize) -> usize {
        let delivered = quantity.min(self.output_stock);
        self.output_stock -= delivered;
        delivered
    }

    /// Drop all remaining stock, returning (input, output) discarded
    pub fn clear_stock(&mut self) -> (usize, usize) {
        let leftover = (self.input_stock, self.output_stock);
        self.input_stock = 0;
        self.output_stock = 0;
        leftover
    }

    // ========================================================================
    // Contract views
    // ========================================================================

    /// Record a newly revealed exogenous contract
    pub fn reveal(&mut self, contract: ExogenousContract) {
        self.revealed.push(contract);
    }

    pub fn revealed(&self) -> &[ExogenousContract] {
        &self.revealed
    }

    /// Revealed exogenous supply quantity due at `step`
    pub fn exogenous_input(&self, step: usize) -> usize {
        self.revealed
            .iter()
            .filter(|c| c.is_supply() && c.delivery_step() == step)
            .map(ExogenousContract::quantity)
            .sum()
    }

    /// Revealed exogenous sale quantity due at `step`
    pub fn exogenous_output(&self, step: usize) -> usize {
        self.revealed
            .iter()
            .filter(|c| c.is_sale() && c.delivery_step() == step)
            .map(ExogenousContract::quantity)
            .sum()
    }

    /// Record a signed negotiated contract
    pub fn sign(&mut self, contract: NegotiatedContract) {
        self.signed.push(contract);
    }

    pub fn signed(&self) -> &[NegotiatedContract] {
        &self.signed
    }

    /// Negotiated quantity this agent sells for delivery at `step`
    pub fn secured_sales(&self, step: usize) -> usize {
        self.signed
            .iter()
            .filter(|c| c.seller_id == self.id && c.delivery_step == step)
            .map(|c| c.quantity)
            .sum()
    }

    /// Negotiated quantity this agent buys for delivery at `step`
    pub fn secured_supplies(&self, step: usize) -> usize {
        self.signed
            .iter()
            .filter(|c| c.buyer_id == self.id && c.delivery_step == step)
            .map(|c| c.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contract::Party;

    fn agent() -> Agent {
        let profile = Profile::single_process(3, 2, 1, 4).unwrap();
        Agent::new("01@1".to_string(), 1, "greedy".to_string(), 500, profile)
    }

    #[test]
    fn test_products_follow_level() {
        let a = agent();
        assert_eq!(a.input_product(), 1);
        assert_eq!(a.output_product(), 2);
        assert_eq!(a.capacity(), 3);
        assert_eq!(a.unit_cost(), Some(4));
    }

    #[test]
    fn test_take_output_caps_at_stock() {
        let mut a = agent();
        a.receive_input(5);
        a.convert(2, 2);
        assert_eq!(a.input_stock(), 3);
        assert_eq!(a.take_output(4), 2);
        assert_eq!(a.output_stock(), 0);
        assert_eq!(a.clear_stock(), (3, 0));
    }

    #[test]
    fn test_secured_quantities_by_side() {
        let mut a = agent();
        let mut sale = NegotiatedContract {
            id: "neg_1".to_string(),
            session_id: "sess_1".to_string(),
            product: 2,
            quantity: 3,
            unit_price: 20,
            delivery_step: 4,
            signed_step: 4,
            seller_id: "01@1".to_string(),
            buyer_id: "02@2".to_string(),
        };
        a.sign(sale.clone());
        sale.id = "neg_2".to_string();
        sale.seller_id = "00@0".to_string();
        sale.buyer_id = "01@1".to_string();
        sale.quantity = 2;
        a.sign(sale);

        assert_eq!(a.secured_sales(4), 3);
        assert_eq!(a.secured_supplies(4), 2);
        assert_eq!(a.secured_sales(5), 0);
    }

    #[test]
    fn test_exogenous_views_filter_by_step_and_side() {
        let mut a = agent();
        let c = ExogenousContract::new(
            "exo_1".to_string(),
            2,
            6,
            30,
            2,
            1,
            Party::agent("01@1"),
            Party::Environment,
        )
        .unwrap();
        a.reveal(c);
        assert_eq!(a.exogenous_output(2), 6);
        assert_eq!(a.exogenous_input(2), 0);
        assert_eq!(a.exogenous_output(3), 0);
    }
}
