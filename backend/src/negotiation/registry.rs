//! Strategy registry
//!
//! Maps agent type names to builders. Builders receive the agent's `inner`
//! parameters only; adapter parameters never reach a strategy.

use super::strategies::{DoNothingNegotiator, GreedyNegotiator, RandomNegotiator};
use super::Negotiator;
use crate::error::ConfigurationError;
use crate::models::agent::AgentSpec;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Inner parameters handed to a builder
pub type InnerParams = BTreeMap<String, Value>;

/// Builds a strategy from its inner parameters
pub type NegotiatorBuilder = Box<
    dyn Fn(&InnerParams) -> Result<Box<dyn Negotiator>, ConfigurationError> + Send + Sync,
>;

/// Type-name to strategy-builder lookup
///
/// # Example
///
/// ```rust
/// use supply_chain_sim_core::negotiation::{DoNothingNegotiator, Negotiator, NegotiatorRegistry};
/// use supply_chain_sim_core::AgentSpec;
///
/// let mut registry = NegotiatorRegistry::default();
/// registry.register("idle", |_| Ok(Box::new(DoNothingNegotiator)));
///
/// let negotiator = registry.build(&AgentSpec::new("idle")).unwrap();
/// assert_eq!(negotiator.type_name(), "do_nothing");
/// assert!(registry.build(&AgentSpec::new("missing")).is_err());
/// ```
pub struct NegotiatorRegistry {
    builders: BTreeMap<String, NegotiatorBuilder>,
}

impl NegotiatorRegistry {
    /// Registry without any strategy
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Registry with `greedy`, `random` and `do_nothing`
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("greedy", |_| Ok(Box::new(GreedyNegotiator::new())));
        registry.register("random", |params| {
            let p_accept = match params.get("p_accept") {
                None => RandomNegotiator::DEFAULT_P_ACCEPT,
                Some(value) => value.as_f64().ok_or_else(|| {
                    ConfigurationError::InvalidParameter {
                        name: "p_accept".to_string(),
                        reason: format!("expected a number, got {}", value),
                    }
                })?,
            };
            Ok(Box::new(RandomNegotiator::new(p_accept)?))
        });
        registry.register("do_nothing", |_| Ok(Box::new(DoNothingNegotiator)));
        registry
    }

    /// Register (or replace) a builder under `type_name`
    pub fn register<F>(&mut self, type_name: &str, builder: F)
    where
        F: Fn(&InnerParams) -> Result<Box<dyn Negotiator>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.builders
            .insert(type_name.to_string(), Box::new(builder));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Instantiate the strategy for `spec`
    ///
    /// # Errors
    ///
    /// `UnknownAgentType` for unregistered names, or whatever the builder
    /// reports about its parameters.
    pub fn build(&self, spec: &AgentSpec) -> Result<Box<dyn Negotiator>, ConfigurationError> {
        let builder = self
            .builders
            .get(&spec.type_name)
            .ok_or_else(|| ConfigurationError::UnknownAgentType(spec.type_name.clone()))?;
        builder(&spec.params.inner)
    }
}

impl Default for NegotiatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for NegotiatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiatorRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
