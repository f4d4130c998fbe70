//! Tournament world layout
//!
//! A tournament world holds `n_competitors * n_agents_per_competitor`
//! assignable factories spread over the levels, topped up with default
//! managers so that each level reaches `min_factories_per_level`. Default
//! managers sit last within their level and are named `_df_{level}_{j}`.

use crate::error::{ConfigurationError, GenerationError};
use crate::generator::{GeneratorConfig, WorldGenerator};
use crate::models::agent::{AgentParams, AgentSpec};
use crate::orchestrator::config::WorldConfig;
use crate::rng::RngManager;
use crate::topology::{integer_cut, LevelSizing, DEFAULT_AGENT_PREFIX};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// How many factories each level gets and who fills the default ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentLayout {
    pub n_agents_per_competitor: usize,
    /// Strictly guaranteed
    pub min_factories_per_level: usize,
    /// Only enforced by trimming default managers
    pub max_factories_per_level: usize,
    /// Inclusive range of default managers drawn per level
    pub n_default_managers: (usize, usize),
    /// Types picked uniformly for default managers
    pub non_competitors: Vec<AgentSpec>,
}

impl Default for TournamentLayout {
    fn default() -> Self {
        Self {
            n_agents_per_competitor: 1,
            min_factories_per_level: 2,
            max_factories_per_level: 6,
            n_default_managers: (0, 0),
            non_competitors: vec![AgentSpec::default_agent()],
        }
    }
}

/// Factories of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPlan {
    pub competitors: usize,
    pub defaults: usize,
}

impl LevelPlan {
    pub fn total(&self) -> usize {
        self.competitors + self.defaults
    }
}

impl TournamentLayout {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.n_agents_per_competitor == 0 {
            return Err(ConfigurationError::NonPositive {
                what: "n_agents_per_competitor".to_string(),
                value: 0,
            });
        }
        if self.min_factories_per_level == 0 {
            return Err(ConfigurationError::NonPositive {
                what: "min_factories_per_level".to_string(),
                value: 0,
            });
        }
        if self.min_factories_per_level > self.max_factories_per_level {
            return Err(ConfigurationError::InvalidRange {
                what: "factories per level",
                lo: self.min_factories_per_level as i64,
                hi: self.max_factories_per_level as i64,
            });
        }
        let (lo, hi) = self.n_default_managers;
        if lo > hi {
            return Err(ConfigurationError::InvalidRange {
                what: "n_default_managers",
                lo: lo as i64,
                hi: hi as i64,
            });
        }
        if self.non_competitors.is_empty() {
            return Err(ConfigurationError::Invalid(
                "at least one non-competitor type is needed for default managers".to_string(),
            ));
        }
        Ok(())
    }

    /// Split competitor factories over levels and size the default top-up
    pub fn plan_levels(
        &self,
        n_competitors: usize,
        n_levels: usize,
        rng: &mut RngManager,
    ) -> Result<Vec<LevelPlan>, ConfigurationError> {
        self.validate()?;
        let (lo, hi) = self.n_default_managers;
        let mut defaults: Vec<usize> = (0..n_levels)
            .map(|_| rng.range_inclusive(lo as i64, hi as i64) as usize)
            .collect();
        let competitors = integer_cut(
            n_competitors * self.n_agents_per_competitor,
            n_levels,
            0,
            rng,
        )?;

        let min = self.min_factories_per_level;
        for (n_d, &n_a) in defaults.iter_mut().zip(&competitors) {
            if n_a + *n_d < min {
                *n_d = min - n_a;
            }
            if n_a + *n_d > self.max_factories_per_level && *n_d > 1 {
                *n_d = min.saturating_sub(n_a).max(1);
            }
        }

        Ok(competitors
            .into_iter()
            .zip(defaults)
            .map(|(competitors, defaults)| LevelPlan {
                competitors,
                defaults,
            })
            .collect())
    }

    /// Generate one world following `levels`
    ///
    /// Competitor slots carry `placeholder` until an assignment replaces it.
    /// Default managers come back with `is_default` set.
    pub fn generate_base(
        &self,
        template: &GeneratorConfig,
        levels: &[LevelPlan],
        placeholder: &AgentSpec,
        rng: &mut RngManager,
    ) -> Result<WorldConfig, GenerationError> {
        let mut agent_types = Vec::new();
        let mut default_flags = Vec::new();
        for (level, plan) in levels.iter().enumerate() {
            for j in 0..plan.total() {
                if j < plan.competitors {
                    agent_types.push(AgentSpec::new(placeholder.type_name.clone()));
                    default_flags.push(false);
                    continue;
                }
                let picked = &self.non_competitors[rng.index(self.non_competitors.len())];
                let mut params: AgentParams = picked.params.clone();
                params.adapter.insert(
                    "name".to_string(),
                    Value::String(format!("{}{}_{}", DEFAULT_AGENT_PREFIX, level, j)),
                );
                agent_types.push(AgentSpec::new(picked.type_name.clone()).with_params(params));
                default_flags.push(true);
            }
        }

        let config = GeneratorConfig {
            agent_types,
            level_sizing: LevelSizing::Exact(levels.iter().map(LevelPlan::total).collect()),
            n_processes: levels.len(),
            ..template.clone()
        };
        let mut world = WorldGenerator::generate_with_rng(&config, rng)?;
        for (entry, is_default) in world.agents.iter_mut().zip(default_flags) {
            entry.is_default = is_default;
        }
        debug!(
            levels = ?levels.iter().map(|l| (l.competitors, l.defaults)).collect::<Vec<_>>(),
            "generated tournament base world"
        );
        Ok(world)
    }
}
