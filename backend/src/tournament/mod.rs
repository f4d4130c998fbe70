//! Tournaments
//!
//! Ranks competing agent types by running them through many generated
//! worlds:
//!
//! ```text
//! For each of n_configs base worlds:
//!   1. Plan levels: competitor factories plus default-manager top-up
//!   2. Generate the base world from the generator template
//!   3. Assign competitors to the assignable factories (fair rotation)
//!   4. Run every assignment n_runs_per_world times with shared run seeds
//! Aggregate per-agent scores by competitor
//! ```
//!
//! # Example
//!
//! ```rust
//! use supply_chain_sim_core::tournament::{Tournament, TournamentConfig};
//! use supply_chain_sim_core::AgentSpec;
//!
//! let config = TournamentConfig {
//!     competitors: vec![AgentSpec::new("greedy"), AgentSpec::new("do_nothing")],
//!     n_configs: 1,
//!     n_runs_per_world: 1,
//!     seed: Some(11),
//!     ..TournamentConfig::default()
//! };
//! let results = Tournament::run(&config).unwrap();
//! assert_eq!(results.runs.len(), 2);
//! assert_eq!(results.standings.len(), 2);
//! ```

pub mod assigner;
pub mod layout;

pub use assigner::{Assignment, CompetitorAssigner};
pub use layout::{LevelPlan, TournamentLayout};

use crate::error::{ConfigurationError, TournamentError};
use crate::generator::GeneratorConfig;
use crate::models::agent::AgentSpec;
use crate::negotiation::NegotiatorRegistry;
use crate::orchestrator::config::WorldConfig;
use crate::orchestrator::engine::{AgentScore, World};
use crate::parallel;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Everything a tournament needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    /// Template for every base world; its agent types and level sizing are
    /// replaced by the tournament layout
    pub generator: GeneratorConfig,
    pub competitors: Vec<AgentSpec>,
    pub n_configs: usize,
    /// Worlds per base config; one fair round when absent
    pub max_worlds_per_config: Option<usize>,
    pub n_runs_per_world: usize,
    pub fair: bool,
    pub layout: TournamentLayout,
    /// Leave default managers out of the scores
    pub ignore_default: bool,
    pub seed: Option<u64>,
    pub force_sequential: bool,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            competitors: vec![AgentSpec::new("greedy"), AgentSpec::new("random")],
            n_configs: 2,
            max_worlds_per_config: None,
            n_runs_per_world: 2,
            fair: true,
            layout: TournamentLayout::default(),
            ignore_default: true,
            seed: None,
            force_sequential: false,
        }
    }
}

impl TournamentConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        for (what, value) in [
            ("number of competitors", self.competitors.len()),
            ("n_configs", self.n_configs),
            ("n_runs_per_world", self.n_runs_per_world),
        ] {
            if value == 0 {
                return Err(ConfigurationError::NonPositive {
                    what: what.to_string(),
                    value: 0,
                });
            }
        }
        self.layout.validate()
    }

    fn check_types(&self, registry: &NegotiatorRegistry) -> Result<(), ConfigurationError> {
        match self
            .competitors
            .iter()
            .chain(&self.layout.non_competitors)
            .find(|spec| !registry.contains(&spec.type_name))
        {
            Some(unknown) => Err(ConfigurationError::UnknownAgentType(unknown.type_name.clone())),
            None => Ok(()),
        }
    }
}

/// One world run scheduled by the tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRun {
    pub config_index: usize,
    pub assignment_index: usize,
    pub run_index: usize,
    pub competitor_of: BTreeMap<String, usize>,
    pub world: WorldConfig,
}

/// Score of one agent in one run, tagged with its competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScore {
    /// `None` for default managers
    pub competitor: Option<usize>,
    pub score: AgentScore,
}

/// Outcome of one world run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRun {
    pub config_index: usize,
    pub assignment_index: usize,
    pub run_index: usize,
    pub world_id: String,
    pub fingerprint: String,
    pub scores: Vec<RunScore>,
}

/// Aggregated scores of one competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorStanding {
    pub competitor: usize,
    pub type_name: String,
    pub n_scores: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-run scores plus standings, best mean first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentResults {
    pub runs: Vec<WorldRun>,
    pub standings: Vec<CompetitorStanding>,
}

impl TournamentResults {
    pub fn winner(&self) -> Option<&CompetitorStanding> {
        self.standings.first()
    }
}

/// Plans and runs tournaments
pub struct Tournament;

impl Tournament {
    /// Run with the built-in strategies
    pub fn run(config: &TournamentConfig) -> Result<TournamentResults, TournamentError> {
        Self::run_with(config, NegotiatorRegistry::default)
    }

    /// Run resolving agent types through registries built by `registry`
    ///
    /// # Errors
    ///
    /// `TournamentError::Generation` when planning fails and
    /// `TournamentError::Simulation` when any world run fails.
    pub fn run_with<F>(config: &TournamentConfig, registry: F) -> Result<TournamentResults, TournamentError>
    where
        F: Fn() -> NegotiatorRegistry + Sync + Send,
    {
        config.check_types(&registry())?;
        let schedule = Self::plan(config)?;
        info!(
            n_competitors = config.competitors.len(),
            n_runs = schedule.len(),
            "starting tournament"
        );

        let runs: Vec<WorldRun> = parallel::map_vec(
            schedule,
            |run| -> Result<WorldRun, TournamentError> {
                let mut world = World::with_registry(run.world, registry())?;
                world.run()?;
                let scores = world
                    .scores(config.ignore_default)
                    .into_iter()
                    .map(|score| RunScore {
                        competitor: run.competitor_of.get(&score.agent_id).copied(),
                        score,
                    })
                    .collect();
                debug!(
                    config = run.config_index,
                    assignment = run.assignment_index,
                    run = run.run_index,
                    "world run finished"
                );
                Ok(WorldRun {
                    config_index: run.config_index,
                    assignment_index: run.assignment_index,
                    run_index: run.run_index,
                    world_id: world.id().to_string(),
                    fingerprint: world.fingerprint().to_string(),
                    scores,
                })
            },
            config.force_sequential,
        )
        .into_iter()
        .collect::<Result<_, TournamentError>>()?;

        let standings = standings(&config.competitors, &runs);
        if let Some(best) = standings.first() {
            info!(winner = %best.type_name, mean = best.mean, "tournament finished");
        }
        Ok(TournamentResults { runs, standings })
    }

    /// Every world the tournament would run, without running them
    pub fn plan(config: &TournamentConfig) -> Result<Vec<ScheduledRun>, TournamentError> {
        config.validate()?;
        let mut rng = RngManager::from_optional_seed(config.seed);
        let assigner = CompetitorAssigner {
            n_agents_per_competitor: config.layout.n_agents_per_competitor,
            max_worlds: config.max_worlds_per_config,
            fair: config.fair,
        };
        let n_levels = config.generator.n_processes;
        let mut schedule = Vec::new();

        for config_index in 0..config.n_configs {
            // STEP 1: LEVEL PLAN
            let levels = config
                .layout
                .plan_levels(config.competitors.len(), n_levels, &mut rng)?;

            // STEP 2: BASE WORLD
            let base = config.layout.generate_base(
                &config.generator,
                &levels,
                &config.competitors[0],
                &mut rng,
            )?;

            // STEP 3: ASSIGNMENTS
            let assignments = assigner.assign(&base, &config.competitors, &mut rng)?;

            // STEP 4: RUNS (seeds shared across assignments)
            let run_seeds: Vec<u64> = (0..config.n_runs_per_world).map(|_| rng.next()).collect();
            debug!(
                config_index,
                n_assignments = assignments.len(),
                n_agents = base.agents.len(),
                "planned tournament config"
            );
            for assignment in assignments {
                for (run_index, &seed) in run_seeds.iter().enumerate() {
                    let mut world = assignment.world.clone();
                    world.seed = seed;
                    world.force_sequential = config.force_sequential;
                    schedule.push(ScheduledRun {
                        config_index,
                        assignment_index: assignment.index,
                        run_index,
                        competitor_of: assignment.competitor_of.clone(),
                        world,
                    });
                }
            }
        }
        Ok(schedule)
    }
}

/// Mean, min and max score of each competitor, best mean first
pub fn standings(competitors: &[AgentSpec], runs: &[WorldRun]) -> Vec<CompetitorStanding> {
    let mut collected: Vec<Vec<f64>> = vec![Vec::new(); competitors.len()];
    for score in runs.iter().flat_map(|run| &run.scores) {
        if let Some(scores) = score.competitor.and_then(|c| collected.get_mut(c)) {
            scores.push(score.score.score);
        }
    }

    let mut standings: Vec<CompetitorStanding> = collected
        .into_iter()
        .enumerate()
        .map(|(competitor, scores)| {
            let n_scores = scores.len();
            let mean = if n_scores == 0 {
                0.0
            } else {
                scores.iter().sum::<f64>() / n_scores as f64
            };
            CompetitorStanding {
                competitor,
                type_name: competitors[competitor].type_name.clone(),
                n_scores,
                mean,
                min: scores.iter().copied().fold(f64::INFINITY, f64::min),
                max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect();
    standings.sort_by(|a, b| b.mean.total_cmp(&a.mean).then(a.competitor.cmp(&b.competitor)));
    standings
}
