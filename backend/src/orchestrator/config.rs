//! World construction payload
//!
//! `WorldConfig` is what the generator emits and what `World::new` consumes.
//! It can also be written by hand for fully explicit worlds.

use crate::error::ConfigurationError;
use crate::models::agent::AgentSpec;
use crate::models::contract::{is_system_agent, ExogenousContract};
use crate::models::profile::Profile;
use crate::topology::{AgentSlot, NamingConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One agent of an explicit world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Display name; derived from `NamingConfig` when absent
    #[serde(default)]
    pub id: Option<String>,
    pub level: usize,
    pub spec: AgentSpec,
    #[serde(default)]
    pub is_default: bool,
    pub initial_balance: i64,
    pub profile: Profile,
}

/// Complete description of a world
///
/// # Fields
///
/// * `n_processes` - Production levels; products are `0..=n_processes`
/// * `catalog_prices` - Reference price of each product
/// * `n_lines` - Production lines per factory (negotiable quantity bound)
/// * `horizon` - Number of simulated steps
/// * `neg_n_steps` - Round budget of one negotiation session
/// * `rounds_per_step` - Negotiation rounds available within one step
/// * `neg_delivery_horizon` - Furthest delivery a session may agree on,
///   in steps after the current one
/// * `force_sequential` - Run negotiation waves sequentially even when
///   the `parallel` feature is enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub n_processes: usize,
    pub catalog_prices: Vec<i64>,
    pub n_lines: usize,
    pub horizon: usize,
    pub neg_n_steps: usize,
    pub rounds_per_step: usize,
    #[serde(default)]
    pub neg_delivery_horizon: usize,
    pub agents: Vec<AgentEntry>,
    #[serde(default)]
    pub exogenous_contracts: Vec<ExogenousContract>,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub force_sequential: bool,
}

impl WorldConfig {
    /// Agent ids in entry order, deriving missing ones from the naming flags
    pub fn resolved_ids(&self) -> Vec<String> {
        let mut defaults_per_level: HashMap<usize, usize> = HashMap::new();
        self.agents
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let j = defaults_per_level.entry(entry.level).or_insert(0);
                let default_index = *j;
                if entry.is_default {
                    *j += 1;
                }
                match &entry.id {
                    Some(id) => id.clone(),
                    None => {
                        let slot = AgentSlot {
                            level: entry.level,
                            index_in_level: 0,
                            spec: entry.spec.clone(),
                            is_default: entry.is_default,
                        };
                        self.naming.agent_name(&slot, i, default_index)
                    }
                }
            })
            .collect()
    }

    /// Index of the last production level
    pub fn last_level(&self) -> usize {
        self.n_processes.saturating_sub(1)
    }

    /// Exogenous contracts grouped by revelation step
    pub fn contracts_by_revelation(&self) -> BTreeMap<usize, Vec<ExogenousContract>> {
        let mut grouped: BTreeMap<usize, Vec<ExogenousContract>> = BTreeMap::new();
        for contract in &self.exogenous_contracts {
            grouped
                .entry(contract.revelation_step())
                .or_default()
                .push(contract.clone());
        }
        grouped
    }

    /// Check structural consistency
    ///
    /// # Errors
    ///
    /// The first `ConfigurationError` found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_scalars()?;
        let ids = self.resolved_ids();
        self.validate_agents(&ids)?;
        self.validate_exogenous(&ids)
    }

    fn validate_scalars(&self) -> Result<(), ConfigurationError> {
        for (what, value) in [
            ("n_processes", self.n_processes),
            ("n_lines", self.n_lines),
            ("horizon", self.horizon),
            ("neg_n_steps", self.neg_n_steps),
        ] {
            if value == 0 {
                return Err(ConfigurationError::NonPositive {
                    what: what.to_string(),
                    value: 0,
                });
            }
        }
        if self.neg_n_steps >= self.rounds_per_step {
            return Err(ConfigurationError::NegotiationBudget {
                neg_n_steps: self.neg_n_steps,
                rounds_per_step: self.rounds_per_step,
            });
        }
        if self.catalog_prices.len() != self.n_processes + 1 {
            return Err(ConfigurationError::LengthMismatch {
                what: "catalog prices",
                expected: self.n_processes + 1,
                actual: self.catalog_prices.len(),
            });
        }
        if let Some((product, &price)) = self
            .catalog_prices
            .iter()
            .enumerate()
            .find(|(_, p)| **p <= 0)
        {
            return Err(ConfigurationError::NonPositive {
                what: format!("catalog price of product {}", product),
                value: price,
            });
        }
        Ok(())
    }

    fn validate_agents(&self, ids: &[String]) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        let mut per_level = vec![0usize; self.n_processes];
        for (entry, id) in self.agents.iter().zip(ids) {
            if is_system_agent(id) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "agent id".to_string(),
                    reason: format!("'{}' is reserved for the environment", id),
                });
            }
            if !seen.insert(id.as_str()) {
                return Err(ConfigurationError::DuplicateAgent(id.clone()));
            }
            if entry.level >= self.n_processes {
                return Err(ConfigurationError::InvalidParameter {
                    name: format!("level of {}", id),
                    reason: format!("{} is not below {} processes", entry.level, self.n_processes),
                });
            }
            per_level[entry.level] += 1;
            entry.profile.validate()?;
            if entry.profile.n_processes() != self.n_processes {
                return Err(ConfigurationError::LengthMismatch {
                    what: "processes in profile",
                    expected: self.n_processes,
                    actual: entry.profile.n_processes(),
                });
            }
            if entry.profile.unit_cost(entry.level).is_none() {
                return Err(ConfigurationError::Invalid(format!(
                    "profile of {} cannot run process {}",
                    id, entry.level
                )));
            }
        }
        if let Some(level) = per_level.iter().position(|&n| n == 0) {
            return Err(ConfigurationError::Invalid(format!("level {} has no agent", level)));
        }
        Ok(())
    }

    fn validate_exogenous(&self, ids: &[String]) -> Result<(), ConfigurationError> {
        let levels: HashMap<&str, usize> = ids
            .iter()
            .map(String::as_str)
            .zip(self.agents.iter().map(|e| e.level))
            .collect();
        let mut contract_ids = HashSet::new();
        for contract in &self.exogenous_contracts {
            if !contract_ids.insert(contract.id()) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "exogenous contract id".to_string(),
                    reason: format!("'{}' is used twice", contract.id()),
                });
            }
            contract.validate()?;
            let owner = contract.owner();
            let level = *levels
                .get(owner)
                .ok_or_else(|| ConfigurationError::UnknownAgent(owner.to_string()))?;
            let (expected_product, expected_level) = if contract.is_supply() {
                (0, 0)
            } else {
                (self.n_processes, self.last_level())
            };
            if contract.product() != expected_product || level != expected_level {
                return Err(ConfigurationError::InvalidParameter {
                    name: format!("exogenous contract {}", contract.id()),
                    reason: format!(
                        "product {} for agent {} at level {} does not match its side of the chain",
                        contract.product(),
                        owner,
                        level
                    ),
                });
            }
            if contract.delivery_step() >= self.horizon {
                return Err(ConfigurationError::InvalidParameter {
                    name: format!("exogenous contract {}", contract.id()),
                    reason: format!(
                        "delivery step {} is beyond horizon {}",
                        contract.delivery_step(),
                        self.horizon
                    ),
                });
            }
        }
        Ok(())
    }

    /// SHA-256 of the canonical JSON form, as lowercase hex
    ///
    /// Equal configs always hash equally, whatever the map ordering inside
    /// agent parameters.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        use serde_json::Value;

        fn canonicalize(value: Value) -> Value {
            match value {
                Value::Object(map) => {
                    let sorted: BTreeMap<String, Value> =
                        map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                    Value::Object(sorted.into_iter().collect())
                }
                Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
                other => other,
            }
        }

        let canonical = canonicalize(serde_json::to_value(self)?);
        let json = serde_json::to_string(&canonical)?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}
