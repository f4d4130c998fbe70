//! scsim - generate, run and rank supply chain worlds

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use supply_chain_sim_core::{
    AgentScore, AgentSpec, GeneratorConfig, StepResult, Tournament, TournamentConfig, World,
    WorldConfig, WorldGenerator,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "scsim")]
#[command(about = "Generate and simulate production-network economies")]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a world and write it as JSON
    Generate {
        /// Generator config JSON (defaults when absent)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the generator seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output file (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a world and print a JSON summary
    Run {
        /// Explicit world JSON, as written by `generate`
        #[arg(short, long, conflicts_with = "config")]
        world: Option<PathBuf>,

        /// Generator config JSON used when no world is given
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the generator seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Stop after this many steps
        #[arg(long)]
        steps: Option<usize>,

        /// Run negotiation waves sequentially
        #[arg(long)]
        sequential: bool,

        /// Leave default agents out of the scores
        #[arg(long)]
        ignore_default: bool,
    },
    /// Rotate competitors through generated worlds and rank them
    Tournament {
        /// Tournament config JSON (defaults when absent)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Competitor agent types, comma separated
        #[arg(long, value_delimiter = ',')]
        competitors: Vec<String>,

        /// Number of base worlds
        #[arg(long)]
        configs: Option<usize>,

        /// Runs per assigned world
        #[arg(long)]
        runs: Option<usize>,

        /// Worlds per base world (one fair round when absent)
        #[arg(long)]
        max_worlds: Option<usize>,

        /// Factories per competitor in every world
        #[arg(long)]
        agents_per_competitor: Option<usize>,

        /// Override the tournament seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Draw random assignments instead of fair rotations
        #[arg(long)]
        unfair: bool,

        /// Score default managers too
        #[arg(long)]
        include_default: bool,

        /// Run worlds sequentially
        #[arg(long)]
        sequential: bool,

        /// Print the planned worlds without running them
        #[arg(long)]
        plan_only: bool,
    },
}

#[derive(Serialize)]
struct RunSummary {
    world_id: String,
    fingerprint: String,
    steps_run: usize,
    horizon: usize,
    contracts_signed: usize,
    contracts_executed: usize,
    timeouts: usize,
    total_shortfall: usize,
    scores: Vec<AgentScore>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn generate(config: Option<&Path>, seed: Option<u64>) -> anyhow::Result<WorldConfig> {
    let mut generator_config: GeneratorConfig = match config {
        Some(path) => read_json(path)?,
        None => GeneratorConfig::default(),
    };
    if seed.is_some() {
        generator_config.seed = seed;
    }
    Ok(WorldGenerator::generate(&generator_config)?)
}

#[allow(clippy::too_many_arguments)]
fn tournament_config(
    config: Option<&Path>,
    competitors: Vec<String>,
    configs: Option<usize>,
    runs: Option<usize>,
    max_worlds: Option<usize>,
    agents_per_competitor: Option<usize>,
    seed: Option<u64>,
    unfair: bool,
) -> anyhow::Result<TournamentConfig> {
    let mut tournament: TournamentConfig = match config {
        Some(path) => read_json(path)?,
        None => TournamentConfig::default(),
    };
    if !competitors.is_empty() {
        tournament.competitors = competitors.into_iter().map(AgentSpec::new).collect();
    }
    if let Some(n) = configs {
        tournament.n_configs = n;
    }
    if let Some(n) = runs {
        tournament.n_runs_per_world = n;
    }
    if max_worlds.is_some() {
        tournament.max_worlds_per_config = max_worlds;
    }
    if let Some(n) = agents_per_competitor {
        tournament.layout.n_agents_per_competitor = n;
    }
    if seed.is_some() {
        tournament.seed = seed;
    }
    if unfair {
        tournament.fair = false;
    }
    Ok(tournament)
}

fn summarize(world: &World, results: &[StepResult], ignore_default: bool) -> RunSummary {
    RunSummary {
        world_id: world.id().to_string(),
        fingerprint: world.fingerprint().to_string(),
        steps_run: results.len(),
        horizon: world.horizon(),
        contracts_signed: results.iter().map(|r| r.num_agreements).sum(),
        contracts_executed: results.iter().map(|r| r.num_executed).sum(),
        timeouts: results.iter().map(|r| r.num_timeouts).sum(),
        total_shortfall: results.iter().map(|r| r.total_shortfall).sum(),
        scores: world.scores(ignore_default),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            config,
            seed,
            output,
        } => {
            let world_config = generate(config.as_deref(), seed)?;
            let json = serde_json::to_string_pretty(&world_config)?;
            match output {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), agents = world_config.agents.len(), "world written");
                }
                None => println!("{}", json),
            }
        }
        Commands::Run {
            world,
            config,
            seed,
            steps,
            sequential,
            ignore_default,
        } => {
            let mut world_config = match world {
                Some(path) => read_json::<WorldConfig>(&path)?,
                None => generate(config.as_deref(), seed)?,
            };
            if sequential {
                world_config.force_sequential = true;
            }
            if steps == Some(0) {
                bail!("--steps must be positive");
            }

            let mut world = World::new(world_config)?;
            let limit = steps.unwrap_or(world.horizon());
            let mut results = Vec::new();
            while results.len() < limit {
                match world.step()? {
                    Some(result) => results.push(result),
                    None => break,
                }
            }

            let summary = summarize(&world, &results, ignore_default);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Tournament {
            config,
            competitors,
            configs,
            runs,
            max_worlds,
            agents_per_competitor,
            seed,
            unfair,
            include_default,
            sequential,
            plan_only,
        } => {
            let mut tournament = tournament_config(
                config.as_deref(),
                competitors,
                configs,
                runs,
                max_worlds,
                agents_per_competitor,
                seed,
                unfair,
            )?;
            if include_default {
                tournament.ignore_default = false;
            }
            if sequential {
                tournament.force_sequential = true;
            }

            if plan_only {
                let schedule = Tournament::plan(&tournament)?;
                println!("{}", serde_json::to_string_pretty(&schedule)?);
            } else {
                let results = Tournament::run(&tournament)?;
                if let Some(best) = results.winner() {
                    info!(winner = %best.type_name, mean = best.mean, "tournament winner");
                }
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
        }
    }

    Ok(())
}
