//! Feasibility-Constrained World Generator
//!
//! Turns a `GeneratorConfig` into a `WorldConfig` in which every agent can in
//! principle make a profit.
//!
//! # Pipeline
//!
//! ```text
//! 1. Plan topology (agents per level, type per slot)
//! 2. Resolve production costs and build profiles
//! 3. Validate or derive catalog prices
//! 4. Check feasibility and derive sale price bounds
//! 5. Generate exogenous supply/sale contracts with revelation steps
//! 6. Assign initial balances and names
//! ```
//!
//! Every failure is reported before anything is returned; there is no
//! partially generated world.
//!
//! # Example
//!
//! ```rust
//! use supply_chain_sim_core::generator::{GeneratorConfig, WorldGenerator};
//!
//! let config = GeneratorConfig {
//!     seed: Some(42),
//!     ..GeneratorConfig::default()
//! };
//! let world_config = WorldGenerator::generate(&config).unwrap();
//! assert_eq!(world_config.agents.len(), config.agent_types.len());
//! ```

pub mod costs;
pub mod exogenous;

use crate::error::{ConfigurationError, FeasibilityError, GenerationError};
use crate::models::agent::AgentSpec;
use crate::models::profile::{PenaltyDistribution, Profile};
use crate::orchestrator::config::{AgentEntry, WorldConfig};
use crate::rng::RngManager;
use crate::topology::{LevelSizing, NamingConfig, RangeFillPolicy, TopologyPlanner};
use exogenous::ChainEnds;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Steps of full-capacity production an `Auto` balance can pay for
pub const AUTO_BALANCE_STEPS: i64 = 10;

/// A count given exactly or as an inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntSpec {
    Fixed(usize),
    Range(usize, usize),
}

impl IntSpec {
    pub fn resolve(&self, what: &'static str, rng: &mut RngManager) -> Result<usize, ConfigurationError> {
        let value = match *self {
            IntSpec::Fixed(n) => n,
            IntSpec::Range(lo, hi) => {
                if lo > hi {
                    return Err(ConfigurationError::InvalidRange {
                        what,
                        lo: lo as i64,
                        hi: hi as i64,
                    });
                }
                rng.range_inclusive(lo as i64, hi as i64) as usize
            }
        };
        if value == 0 {
            return Err(ConfigurationError::NonPositive {
                what: what.to_string(),
                value: 0,
            });
        }
        Ok(value)
    }
}

/// Production cost of an agent's own process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostSpec {
    /// Same nominal cost for everyone
    Fixed(i64),
    /// One cost per realized agent, in level order
    PerAgent(Vec<i64>),
    /// Uniform draw per agent
    Range(i64, i64),
}

/// Initial balance of each agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSpec {
    Fixed(i64),
    Range(i64, i64),
    /// Enough to run every line for `AUTO_BALANCE_STEPS` steps
    Auto,
}

/// Markup bounds over the final-product catalog price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitMargins {
    pub min: f64,
    pub max: f64,
}

impl ProfitMargins {
    pub fn mean(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

impl Default for ProfitMargins {
    fn default() -> Self {
        Self { min: 0.1, max: 0.5 }
    }
}

/// When exogenous contracts become known to their owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevelationPolicy {
    /// Supplies known from step 0, sales one step before delivery
    Default,
    /// Fixed lead times before delivery
    Lead { supply: usize, sale: usize },
    /// Known only on the delivery step
    AtDelivery,
}

impl Default for RevelationPolicy {
    fn default() -> Self {
        RevelationPolicy::Default
    }
}

/// Everything the generator needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Agent types, consumed in order, level 0 first
    pub agent_types: Vec<AgentSpec>,
    pub level_sizing: LevelSizing,
    pub fill_policy: RangeFillPolicy,
    pub n_processes: usize,
    pub n_lines: usize,
    pub n_steps: IntSpec,
    pub neg_n_steps: usize,
    /// Negotiation rounds per step; `neg_n_steps + 1` when absent
    pub rounds_per_step: Option<usize>,
    pub neg_delivery_horizon: usize,
    pub production_costs: CostSpec,
    pub cost_increases_with_level: bool,
    pub initial_balance: BalanceSpec,
    /// One price per product; derived from costs when absent
    pub catalog_prices: Option<Vec<i64>>,
    pub raw_material_price: i64,
    pub profit_margins: ProfitMargins,
    /// Range of the mean shortfall penalty rate
    pub shortfall_penalty: (f64, f64),
    /// Range of the mean disposal cost rate
    pub disposal_cost: (f64, f64),
    /// Penalty standard deviation as a fraction of its mean
    pub penalty_std_fraction: f64,
    pub revelation: RevelationPolicy,
    pub naming: NamingConfig,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            agent_types: vec![AgentSpec::new("greedy"); 4],
            level_sizing: LevelSizing::default(),
            fill_policy: RangeFillPolicy::default(),
            n_processes: 2,
            n_lines: 10,
            n_steps: IntSpec::Fixed(10),
            neg_n_steps: 20,
            rounds_per_step: None,
            neg_delivery_horizon: 0,
            production_costs: CostSpec::Range(1, 10),
            cost_increases_with_level: true,
            initial_balance: BalanceSpec::Auto,
            catalog_prices: None,
            raw_material_price: 10,
            profit_margins: ProfitMargins::default(),
            shortfall_penalty: (0.2, 1.0),
            disposal_cost: (0.0, 0.2),
            penalty_std_fraction: 0.1,
            revelation: RevelationPolicy::Default,
            naming: NamingConfig::default(),
            seed: None,
        }
    }
}

fn validate_real_range(what: &'static str, range: (f64, f64)) -> Result<(), ConfigurationError> {
    if !(range.0 >= 0.0 && range.0 <= range.1) {
        return Err(ConfigurationError::InvalidParameter {
            name: what.to_string(),
            reason: format!("[{}, {}] is not a non-negative range", range.0, range.1),
        });
    }
    Ok(())
}

impl GeneratorConfig {
    fn validate(&self) -> Result<usize, ConfigurationError> {
        for (what, value) in [
            ("n_processes", self.n_processes),
            ("n_lines", self.n_lines),
            ("neg_n_steps", self.neg_n_steps),
        ] {
            if value == 0 {
                return Err(ConfigurationError::NonPositive {
                    what: what.to_string(),
                    value: 0,
                });
            }
        }
        let rounds_per_step = self.rounds_per_step.unwrap_or(self.neg_n_steps + 1);
        if self.neg_n_steps >= rounds_per_step {
            return Err(ConfigurationError::NegotiationBudget {
                neg_n_steps: self.neg_n_steps,
                rounds_per_step,
            });
        }
        let margins = &self.profit_margins;
        if !(margins.min >= 0.0 && margins.min <= margins.max) {
            return Err(ConfigurationError::InvalidParameter {
                name: "profit_margins".to_string(),
                reason: format!("[{}, {}] is not a non-negative range", margins.min, margins.max),
            });
        }
        validate_real_range("shortfall_penalty", self.shortfall_penalty)?;
        validate_real_range("disposal_cost", self.disposal_cost)?;
        if self.penalty_std_fraction < 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "penalty_std_fraction".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(rounds_per_step)
    }
}

fn sample_penalty(range: (f64, f64), std_fraction: f64, rng: &mut RngManager) -> PenaltyDistribution {
    let mean = rng.uniform(range.0, range.1);
    PenaltyDistribution::new(mean, mean * std_fraction)
}

/// Builds worlds from generator configs
pub struct WorldGenerator;

impl WorldGenerator {
    /// Generate a world, seeding from `config.seed` (wall clock when absent)
    pub fn generate(config: &GeneratorConfig) -> Result<WorldConfig, GenerationError> {
        let mut rng = RngManager::from_optional_seed(config.seed);
        Self::generate_with_rng(config, &mut rng)
    }

    /// Generate a world drawing from an explicit random source
    ///
    /// # Errors
    ///
    /// `GenerationError::Configuration` for inconsistent inputs,
    /// `GenerationError::Feasibility` when margins cannot cover costs.
    pub fn generate_with_rng(
        config: &GeneratorConfig,
        rng: &mut RngManager,
    ) -> Result<WorldConfig, GenerationError> {
        let rounds_per_step = config.validate()?;
        let n_processes = config.n_processes;
        let horizon = config.n_steps.resolve("n_steps", rng)?;

        // STEP 1: TOPOLOGY
        let topology = TopologyPlanner::plan(
            config.agent_types.clone(),
            n_processes,
            &config.level_sizing,
            &config.fill_policy,
            rng,
        )?;
        let slots = topology.slots();
        let names = config.naming.names(slots);

        // STEP 2: COSTS AND PROFILES
        let costs = costs::resolve_costs(
            &config.production_costs,
            slots,
            config.cost_increases_with_level,
            rng,
        )?;
        let mut profiles = Vec::with_capacity(slots.len());
        for ((slot, &cost), name) in slots.iter().zip(&costs).zip(&names) {
            let shortfall =
                sample_penalty(config.shortfall_penalty, config.penalty_std_fraction, rng);
            let disposal = sample_penalty(config.disposal_cost, config.penalty_std_fraction, rng);
            let profile = Profile::single_process(config.n_lines, n_processes, slot.level, cost)?
                .with_penalties(shortfall, disposal);
            if profile.unit_cost(slot.level).is_none() {
                return Err(FeasibilityError::NoRunnableLine {
                    agent_id: name.clone(),
                    process: slot.level,
                }
                .into());
            }
            profiles.push(profile);
        }

        // STEP 3: CATALOG
        let catalog = costs::catalog_prices(
            config.catalog_prices.as_deref(),
            config.raw_material_price,
            &costs,
            slots,
            n_processes,
            &config.profit_margins,
        )?;

        // STEP 4: FEASIBILITY
        let sale_prices =
            costs::sale_price_bounds(&names, &costs, slots, &catalog, &config.profit_margins)?;
        debug!(?catalog, ?sale_prices, "derived prices");

        // STEP 5: EXOGENOUS CONTRACTS
        let last_level = n_processes - 1;
        let ends = ChainEnds {
            first_level: slots
                .iter()
                .zip(&names)
                .zip(&profiles)
                .filter(|((slot, _), _)| slot.level == 0)
                .map(|((_, name), profile)| (name.as_str(), profile.capacity(0)))
                .collect(),
            last_level: slots
                .iter()
                .zip(&names)
                .zip(&profiles)
                .filter(|((slot, _), _)| slot.level == last_level)
                .map(|((_, name), profile)| (name.as_str(), profile.capacity(last_level)))
                .collect(),
            final_product: n_processes,
        };
        let exogenous_contracts = exogenous::generate_contracts(
            &ends,
            horizon,
            catalog[0],
            sale_prices,
            &config.revelation,
            rng,
        )?;

        // STEP 6: BALANCES AND ENTRIES
        let mut agents = Vec::with_capacity(slots.len());
        for (((slot, cost), profile), name) in slots.iter().zip(&costs).zip(profiles).zip(&names) {
            let initial_balance = match config.initial_balance {
                BalanceSpec::Fixed(balance) => balance,
                BalanceSpec::Range(lo, hi) => {
                    if lo > hi {
                        return Err(ConfigurationError::InvalidRange {
                            what: "initial balance",
                            lo,
                            hi,
                        }
                        .into());
                    }
                    rng.range_inclusive(lo, hi)
                }
                BalanceSpec::Auto => {
                    config.n_lines as i64 * (catalog[slot.level] + cost) * AUTO_BALANCE_STEPS
                }
            };
            agents.push(AgentEntry {
                id: Some(name.clone()),
                level: slot.level,
                spec: slot.spec.clone(),
                is_default: slot.is_default,
                initial_balance,
                profile,
            });
        }

        let world_config = WorldConfig {
            n_processes,
            catalog_prices: catalog,
            n_lines: config.n_lines,
            horizon,
            neg_n_steps: config.neg_n_steps,
            rounds_per_step,
            neg_delivery_horizon: config.neg_delivery_horizon,
            agents,
            exogenous_contracts,
            naming: config.naming,
            seed: rng.next(),
            force_sequential: false,
        };
        world_config.validate()?;

        info!(
            n_agents = world_config.agents.len(),
            counts = ?topology.counts(),
            horizon,
            n_contracts = world_config.exogenous_contracts.len(),
            "generated world"
        );
        Ok(world_config)
    }
}
