//! World Engine
//!
//! Main simulation loop integrating all components:
//! - Exogenous contract revelation
//! - Negotiation between adjacent levels (session waves)
//! - Contract execution, production and disposal
//! - Event logging (complete simulation history)
//!
//! # Architecture
//!
//! Each call to `World::step` simulates one day:
//!
//! ```text
//! For each step t:
//! 0. Check every contract due at t references an active agent
//! 1. Reveal exogenous contracts whose revelation step is t (owner only)
//! 2. Negotiate, level pair by level pair, in waves of agent-disjoint sessions
//! 3. Execute due contracts level by level, producing in between
//! 4. Deliver exogenous sales, dispose of leftover stock
//! 5. Advance time (Finished at the horizon)
//! ```
//!
//! # Example
//!
//! ```rust
//! use supply_chain_sim_core::generator::{GeneratorConfig, WorldGenerator};
//! use supply_chain_sim_core::{World, WorldStatus};
//!
//! let config = GeneratorConfig { seed: Some(3), ..GeneratorConfig::default() };
//! let mut world = World::new(WorldGenerator::generate(&config).unwrap()).unwrap();
//!
//! while let Some(result) = world.step().unwrap() {
//!     assert!(result.num_agreements <= result.num_sessions);
//! }
//! assert_eq!(world.status(), WorldStatus::Finished);
//! assert!(world.step().unwrap().is_none());
//! ```

use crate::core::time::{WorldClock, WorldStatus};
use crate::error::{ConfigurationError, ExecutionError, NegotiationTimeoutError, SimulationError};
use crate::models::agent::Agent;
use crate::models::contract::{
    is_system_agent, Contract, ContractFilter, ExecutionRecord, ExogenousContract,
    NegotiatedContract,
};
use crate::models::event::{Event, EventLog};
use crate::models::profile::Profile;
use crate::models::state::SimulationState;
use crate::negotiation::{
    run_session, Issues, NegotiationContext, Negotiator, NegotiatorRegistry, Participant,
    SessionOutcome,
};
use crate::orchestrator::config::WorldConfig;
use crate::parallel;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step number
    pub step: usize,

    /// Exogenous contracts revealed this step
    pub num_revealed: usize,

    /// Negotiation sessions opened this step
    pub num_sessions: usize,

    /// Sessions that ended with a signed contract
    pub num_agreements: usize,

    /// Sessions that used their whole round budget
    pub num_timeouts: usize,

    /// Contracts executed this step
    pub num_executed: usize,

    /// Units sellers failed to deliver
    pub total_shortfall: usize,
}

/// Final standing of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentScore {
    pub agent_id: String,
    pub type_name: String,
    pub level: usize,
    pub is_default: bool,
    pub initial_balance: i64,
    pub balance: i64,
    pub score: f64,
}

/// Everything one negotiation session owns while it runs
struct SessionTask {
    session_id: String,
    product: usize,
    issues: Issues,
    seller_id: String,
    buyer_id: String,
    seller: Box<dyn Negotiator>,
    buyer: Box<dyn Negotiator>,
    seller_ctx: NegotiationContext,
    buyer_ctx: NegotiationContext,
    rng: RngManager,
}

/// Per-step realized penalty rates of one agent
#[derive(Debug, Clone, Copy)]
struct Rates {
    shortfall: f64,
    disposal: f64,
}

/// Split `pairs` into one wave of agent-disjoint pairs and the rest
fn schedule_wave(pairs: Vec<(String, String)>) -> (Vec<(String, String)>, Vec<(String, String)>) {
    let mut busy: HashSet<String> = HashSet::new();
    let mut wave = Vec::new();
    let mut rest = Vec::new();
    for (seller, buyer) in pairs {
        if busy.contains(&seller) || busy.contains(&buyer) {
            rest.push((seller, buyer));
        } else {
            busy.insert(seller.clone());
            busy.insert(buyer.clone());
            wave.push((seller, buyer));
        }
    }
    (wave, rest)
}

/// Revealed exogenous supply and sale quantities due at `step`
fn market_summary(state: &SimulationState, step: usize) -> (usize, usize) {
    state
        .contracts()
        .iter()
        .filter_map(|c| match c {
            Contract::Exogenous(e) if e.delivery_step() == step => Some(e),
            _ => None,
        })
        .fold((0, 0), |(supply, sale), e| {
            if e.is_supply() {
                (supply + e.quantity(), sale)
            } else {
                (supply, sale + e.quantity())
            }
        })
}

fn build_context(
    agent: &Agent,
    catalog: &[i64],
    n_processes: usize,
    step: usize,
    market: (usize, usize),
) -> NegotiationContext {
    NegotiationContext {
        step,
        agent_id: agent.id().to_string(),
        level: agent.level(),
        n_processes,
        capacity: agent.capacity(),
        unit_cost: agent.unit_cost().unwrap_or_default(),
        balance: agent.balance(),
        input_price: catalog[agent.input_product()],
        output_price: catalog[agent.output_product()],
        exogenous_input: agent.exogenous_input(step),
        exogenous_output: agent.exogenous_output(step),
        secured_sales: agent.secured_sales(step),
        secured_supplies: agent.secured_supplies(step),
        market_supply: market.0,
        market_sale: market.1,
    }
}

fn penalty(rate: f64, unit_price: i64, missing: usize) -> i64 {
    (rate * unit_price as f64 * missing as f64).round() as i64
}

/// A running production-network simulation
pub struct World {
    /// Unique id of this run
    id: String,

    /// Construction payload (catalog, budgets, horizon)
    config: WorldConfig,

    /// SHA-256 of the construction payload
    fingerprint: String,

    clock: WorldClock,

    rng: RngManager,

    state: SimulationState,

    /// One strategy per agent id
    negotiators: HashMap<String, Box<dyn Negotiator>>,

    /// Every exogenous contract, grouped by revelation step
    exogenous: BTreeMap<usize, Vec<ExogenousContract>>,

    event_log: EventLog,

    next_session_id: usize,

    next_contract_id: usize,
}

impl World {
    /// Build a world using the default strategy registry
    pub fn new(config: WorldConfig) -> Result<Self, SimulationError> {
        Self::with_registry(config, NegotiatorRegistry::default())
    }

    /// Build a world resolving agent types through `registry`
    ///
    /// # Errors
    ///
    /// `SimulationError::InvalidConfig` for any structural problem in
    /// `config` or an agent type the registry cannot build.
    pub fn with_registry(
        config: WorldConfig,
        registry: NegotiatorRegistry,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let fingerprint = config
            .fingerprint()
            .map_err(|e| ConfigurationError::Invalid(format!("config serialization failed: {}", e)))?;

        let ids = config.resolved_ids();
        let mut agents = Vec::with_capacity(config.agents.len());
        let mut negotiators = HashMap::with_capacity(config.agents.len());
        for (entry, id) in config.agents.iter().zip(ids) {
            let negotiator = registry.build(&entry.spec)?;
            let mut agent = Agent::new(
                id.clone(),
                entry.level,
                entry.spec.type_name.clone(),
                entry.initial_balance,
                entry.profile.clone(),
            );
            if entry.is_default {
                agent = agent.as_default();
            }
            agents.push(agent);
            negotiators.insert(id, negotiator);
        }

        let exogenous = config.contracts_by_revelation();
        let world = Self {
            id: uuid::Uuid::new_v4().to_string(),
            clock: WorldClock::new(config.horizon),
            rng: RngManager::new(config.seed),
            state: SimulationState::new(agents),
            negotiators,
            exogenous,
            event_log: EventLog::new(),
            next_session_id: 0,
            next_contract_id: 0,
            fingerprint,
            config,
        };
        info!(
            world_id = %world.id,
            n_agents = world.state.num_agents(),
            horizon = world.config.horizon,
            fingerprint = %world.fingerprint,
            "world created"
        );
        Ok(world)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// SHA-256 of the construction payload
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn current_step(&self) -> usize {
        self.clock.current_step()
    }

    pub fn horizon(&self) -> usize {
        self.clock.horizon()
    }

    pub fn status(&self) -> WorldStatus {
        self.clock.status()
    }

    pub fn catalog_prices(&self) -> &[i64] {
        &self.config.catalog_prices
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.state.get_agent(id)
    }

    pub fn agents(&self) -> &[Agent] {
        self.state.agents()
    }

    /// Agent ids in level order
    pub fn agent_ids(&self) -> Vec<&str> {
        self.state.agents().iter().map(Agent::id).collect()
    }

    pub fn balance(&self, id: &str) -> Option<i64> {
        self.state.get_agent(id).map(Agent::balance)
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.state.get_agent(id).map(Agent::profile)
    }

    /// Every exogenous contract, grouped by revelation step
    pub fn exogenous_contracts(&self) -> &BTreeMap<usize, Vec<ExogenousContract>> {
        &self.exogenous
    }

    /// Concluded contracts matching `filter`
    pub fn contracts(&self, filter: &ContractFilter) -> Vec<&Contract> {
        self.state.contracts_matching(filter)
    }

    pub fn executions(&self) -> &[ExecutionRecord] {
        self.state.executions()
    }

    /// Exogenous contracts revealed to `id` so far
    pub fn revealed_to(&self, id: &str) -> Option<&[ExogenousContract]> {
        self.state.get_agent(id).map(Agent::revealed)
    }

    /// True for the environment's reporting ids
    pub fn is_system_agent(&self, id: &str) -> bool {
        is_system_agent(id)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn event_count(&self) -> usize {
        self.event_log.len()
    }

    fn log_event(&mut self, event: Event) {
        self.event_log.log(event);
    }

    /// Remove an agent from negotiation and production
    ///
    /// Contracts already concluded with the agent stay in the books; executing
    /// one of them later fails with `ExecutionError::RetiredAgent`.
    pub fn retire_agent(&mut self, id: &str) -> Result<(), SimulationError> {
        if !self.state.contains(id) {
            return Err(ConfigurationError::UnknownAgent(id.to_string()).into());
        }
        if self.state.retire(id) {
            let step = self.current_step();
            self.log_event(Event::AgentRetired {
                step,
                agent_id: id.to_string(),
            });
            debug!(agent_id = id, step, "agent retired");
        }
        Ok(())
    }

    /// Relative balance change of every agent
    ///
    /// Scores are `(balance - initial) / initial` when every counted agent
    /// started with a non-zero balance, and the plain difference otherwise.
    /// Default agents are left out when `ignore_default` is set.
    pub fn scores(&self, ignore_default: bool) -> Vec<AgentScore> {
        let counted: Vec<&Agent> = self
            .state
            .agents()
            .iter()
            .filter(|a| !is_system_agent(a.id()) && !(ignore_default && a.is_default()))
            .collect();
        let relative = counted.iter().all(|a| a.initial_balance() != 0);
        counted
            .into_iter()
            .map(|a| {
                let diff = (a.balance() - a.initial_balance()) as f64;
                AgentScore {
                    agent_id: a.id().to_string(),
                    type_name: a.type_name().to_string(),
                    level: a.level(),
                    is_default: a.is_default(),
                    initial_balance: a.initial_balance(),
                    balance: a.balance(),
                    score: if relative {
                        diff / a.initial_balance() as f64
                    } else {
                        diff
                    },
                }
            })
            .collect()
    }

    // ========================================================================
    // Simulation Loop
    // ========================================================================

    /// Run steps until the horizon, returning every step result
    pub fn run(&mut self) -> Result<Vec<StepResult>, SimulationError> {
        let mut results = Vec::with_capacity(self.clock.remaining_steps());
        while let Some(result) = self.step()? {
            results.push(result);
        }
        info!(world_id = %self.id, steps = results.len(), "simulation finished");
        Ok(results)
    }

    /// Execute one simulation step
    ///
    /// Returns `Ok(None)` without touching anything once the world is
    /// `Finished`.
    ///
    /// # Errors
    ///
    /// `SimulationError::Execution` when a contract due this step references
    /// an unknown or retired agent. The check runs before anything changes,
    /// so a failed step leaves the world as it was.
    pub fn step(&mut self) -> Result<Option<StepResult>, SimulationError> {
        if self.clock.is_finished() {
            return Ok(None);
        }
        let step = self.current_step();

        // STEP 0: PRE-EXECUTION CHECK
        self.check_due_parties(step)?;
        self.clock.begin_step();

        let mut result = StepResult {
            step,
            num_revealed: 0,
            num_sessions: 0,
            num_agreements: 0,
            num_timeouts: 0,
            num_executed: 0,
            total_shortfall: 0,
        };

        // STEP 1: REVELATION
        self.reveal(step, &mut result);

        // STEP 2: NEGOTIATION
        self.negotiate(step, &mut result);

        // STEP 3-4: EXECUTION, PRODUCTION, DISPOSAL
        self.execute(step, &mut result);

        // STEP 5: ADVANCE TIME
        self.log_event(Event::EndOfStep {
            step,
            contracts_signed: result.num_agreements,
            contracts_executed: result.num_executed,
        });
        self.clock.advance();
        debug!(
            step,
            revealed = result.num_revealed,
            sessions = result.num_sessions,
            agreements = result.num_agreements,
            timeouts = result.num_timeouts,
            executed = result.num_executed,
            shortfall = result.total_shortfall,
            "step completed"
        );
        Ok(Some(result))
    }

    fn check_party(&self, contract_id: &str, agent_id: Option<&str>) -> Result<(), ExecutionError> {
        let Some(agent_id) = agent_id else {
            return Ok(());
        };
        if !self.state.contains(agent_id) {
            return Err(ExecutionError::UnknownAgent {
                contract_id: contract_id.to_string(),
                agent_id: agent_id.to_string(),
            });
        }
        if self.state.is_retired(agent_id) {
            return Err(ExecutionError::RetiredAgent {
                contract_id: contract_id.to_string(),
                agent_id: agent_id.to_string(),
            });
        }
        Ok(())
    }

    fn check_due_parties(&self, step: usize) -> Result<(), ExecutionError> {
        for contract in self.exogenous.values().flatten() {
            if contract.delivery_step() == step {
                self.check_party(contract.id(), contract.seller().agent_id())?;
                self.check_party(contract.id(), contract.buyer().agent_id())?;
            }
        }
        for contract in self.state.contracts() {
            if let Contract::Negotiated(c) = contract {
                if c.delivery_step == step {
                    self.check_party(&c.id, Some(&c.seller_id))?;
                    self.check_party(&c.id, Some(&c.buyer_id))?;
                }
            }
        }
        Ok(())
    }

    fn reveal(&mut self, step: usize, result: &mut StepResult) {
        let revealed = self.exogenous.get(&step).cloned().unwrap_or_default();
        for contract in revealed {
            let owner = contract.owner().to_string();
            if !self.state.is_retired(&owner) {
                if let Some(agent) = self.state.get_agent_mut(&owner) {
                    agent.reveal(contract.clone());
                }
                self.log_event(Event::ContractRevealed {
                    step,
                    contract_id: contract.id().to_string(),
                    agent_id: owner,
                    delivery_step: contract.delivery_step(),
                });
                result.num_revealed += 1;
            }
            self.state.add_contract(Contract::Exogenous(contract));
        }
    }

    // ========================================================================
    // Negotiation
    // ========================================================================

    fn contexts_for(&self, ids: &[String], step: usize) -> HashMap<String, NegotiationContext> {
        let state = &self.state;
        let catalog = self.config.catalog_prices.as_slice();
        let n_processes = self.config.n_processes;
        let market = market_summary(state, step);
        let contexts = parallel::map_slice(
            ids,
            |id| {
                state
                    .get_agent(id)
                    .map(|agent| build_context(agent, catalog, n_processes, step, market))
            },
            self.config.force_sequential,
        );
        ids.iter()
            .cloned()
            .zip(contexts)
            .filter_map(|(id, ctx)| ctx.map(|ctx| (id, ctx)))
            .collect()
    }

    fn negotiate(&mut self, step: usize, result: &mut StepResult) {
        let n_processes = self.config.n_processes;

        let active: Vec<String> = (0..n_processes)
            .flat_map(|level| self.state.active_agents_at_level(level))
            .map(|a| a.id().to_string())
            .collect();
        let contexts = self.contexts_for(&active, step);
        for id in &active {
            if let (Some(negotiator), Some(ctx)) = (self.negotiators.get_mut(id), contexts.get(id)) {
                negotiator.on_step_start(ctx);
            }
        }

        for level in 0..n_processes.saturating_sub(1) {
            let sellers: Vec<String> = self
                .state
                .active_agents_at_level(level)
                .iter()
                .map(|a| a.id().to_string())
                .collect();
            let buyers: Vec<String> = self
                .state
                .active_agents_at_level(level + 1)
                .iter()
                .map(|a| a.id().to_string())
                .collect();

            let mut pending: Vec<(String, String)> = sellers
                .iter()
                .flat_map(|s| buyers.iter().map(move |b| (s.clone(), b.clone())))
                .collect();
            while !pending.is_empty() {
                let (wave, rest) = schedule_wave(pending);
                pending = rest;
                self.run_wave(step, level, wave, result);
            }
        }
    }

    fn run_wave(&mut self, step: usize, level: usize, wave: Vec<(String, String)>, result: &mut StepResult) {
        let ids: Vec<String> = wave
            .iter()
            .flat_map(|(s, b)| [s.clone(), b.clone()])
            .collect();
        let contexts = self.contexts_for(&ids, step);

        let product = level + 1;
        let last_delivery = (step + self.config.neg_delivery_horizon).min(self.config.horizon - 1);
        let issues = Issues::for_product(
            self.config.n_lines,
            self.config.catalog_prices[product],
            step,
            last_delivery,
        );

        let mut tasks = Vec::with_capacity(wave.len());
        for (seller_id, buyer_id) in wave {
            let (Some(seller_ctx), Some(buyer_ctx)) = (contexts.get(&seller_id), contexts.get(&buyer_id)) else {
                continue;
            };
            if seller_ctx.needed_sales() == 0 || buyer_ctx.needed_supplies() == 0 {
                continue;
            }
            let Some(seller) = self.negotiators.remove(&seller_id) else {
                warn!(agent_id = %seller_id, "no negotiator registered");
                continue;
            };
            let Some(buyer) = self.negotiators.remove(&buyer_id) else {
                warn!(agent_id = %buyer_id, "no negotiator registered");
                self.negotiators.insert(seller_id, seller);
                continue;
            };

            self.next_session_id += 1;
            let session_id = format!("sess_{:06}", self.next_session_id);
            self.log_event(Event::NegotiationOpened {
                step,
                session_id: session_id.clone(),
                seller_id: seller_id.clone(),
                buyer_id: buyer_id.clone(),
                product,
            });
            result.num_sessions += 1;

            tasks.push(SessionTask {
                session_id,
                product,
                issues,
                seller_ctx: seller_ctx.clone(),
                buyer_ctx: buyer_ctx.clone(),
                seller_id,
                buyer_id,
                seller,
                buyer,
                rng: self.rng.fork(),
            });
        }

        let n_rounds = self.config.neg_n_steps;
        let outcomes = parallel::map_vec(
            tasks,
            |mut task| {
                let outcome = run_session(
                    &task.session_id,
                    task.product,
                    task.issues,
                    n_rounds,
                    Participant {
                        id: &task.seller_id,
                        negotiator: task.seller.as_mut(),
                        context: &task.seller_ctx,
                    },
                    Participant {
                        id: &task.buyer_id,
                        negotiator: task.buyer.as_mut(),
                        context: &task.buyer_ctx,
                    },
                    &mut task.rng,
                );
                (task, outcome)
            },
            self.config.force_sequential,
        );

        for (task, outcome) in outcomes {
            self.conclude_session(step, task, outcome, result);
        }
    }

    fn conclude_session(
        &mut self,
        step: usize,
        mut task: SessionTask,
        outcome: Result<SessionOutcome, NegotiationTimeoutError>,
        result: &mut StepResult,
    ) {
        match outcome {
            Ok(SessionOutcome::Agreed { offer, rounds }) => {
                self.next_contract_id += 1;
                let contract = NegotiatedContract {
                    id: format!("neg_{:06}", self.next_contract_id),
                    session_id: task.session_id.clone(),
                    product: task.product,
                    quantity: offer.quantity,
                    unit_price: offer.unit_price,
                    delivery_step: offer.delivery_step,
                    signed_step: step,
                    seller_id: task.seller_id.clone(),
                    buyer_id: task.buyer_id.clone(),
                };
                for id in [&task.seller_id, &task.buyer_id] {
                    if let Some(agent) = self.state.get_agent_mut(id) {
                        agent.sign(contract.clone());
                    }
                }
                task.seller.on_negotiation_success(&contract);
                task.buyer.on_negotiation_success(&contract);

                self.log_event(Event::ContractSigned {
                    step,
                    contract_id: contract.id.clone(),
                    session_id: task.session_id.clone(),
                    seller_id: task.seller_id.clone(),
                    buyer_id: task.buyer_id.clone(),
                    quantity: offer.quantity,
                    unit_price: offer.unit_price,
                    delivery_step: offer.delivery_step,
                    rounds,
                });
                self.state.add_contract(Contract::Negotiated(contract));
                result.num_agreements += 1;
            }
            Ok(SessionOutcome::Withdrawn { round }) => {
                self.log_event(Event::NegotiationWithdrawn {
                    step,
                    session_id: task.session_id.clone(),
                    seller_id: task.seller_id.clone(),
                    buyer_id: task.buyer_id.clone(),
                    round,
                });
            }
            Err(timeout) => {
                debug!(%timeout, "negotiation timed out");
                self.log_event(Event::NegotiationTimedOut {
                    step,
                    session_id: timeout.session_id,
                    seller_id: task.seller_id.clone(),
                    buyer_id: task.buyer_id.clone(),
                    rounds: timeout.rounds,
                });
                result.num_timeouts += 1;
            }
        }
        self.negotiators.insert(task.seller_id, task.seller);
        self.negotiators.insert(task.buyer_id, task.buyer);
    }

    // ========================================================================
    // Execution
    // ========================================================================

    fn execute(&mut self, step: usize, result: &mut StepResult) {
        let n_processes = self.config.n_processes;

        // Penalty rates are realized once per agent per step
        let mut rates: HashMap<String, Rates> = HashMap::new();
        for agent in self.state.agents() {
            if self.state.is_retired(agent.id()) {
                continue;
            }
            let profile = agent.profile();
            let shortfall = profile.shortfall_penalty().sample(&mut self.rng);
            let disposal = profile.disposal_cost().sample(&mut self.rng);
            rates.insert(agent.id().to_string(), Rates { shortfall, disposal });
        }

        let due: Vec<Contract> = self
            .state
            .contracts()
            .iter()
            .filter(|c| c.delivery_step() == step)
            .cloned()
            .collect();

        for level in 0..n_processes {
            let agent_ids: Vec<String> = self
                .state
                .active_agents_at_level(level)
                .iter()
                .map(|a| a.id().to_string())
                .collect();
            for agent_id in agent_ids {
                // Inputs first
                for contract in due.iter().filter(|c| c.buyer_id() == agent_id) {
                    self.execute_contract(step, contract, &rates, result);
                }

                // Then production
                if let Some(agent) = self.state.get_agent_mut(&agent_id) {
                    let runs = agent.input_stock().min(agent.capacity());
                    if runs > 0 {
                        let cost = agent
                            .profile()
                            .production_cost(level, runs)
                            .unwrap_or_default();
                        agent.convert(runs, runs);
                        agent.debit(cost);
                        self.log_event(Event::Production {
                            step,
                            agent_id: agent_id.clone(),
                            runs,
                            cost,
                        });
                    }
                }
            }
        }

        // Sales to the environment once every level has produced
        for contract in due.iter().filter(|c| c.buyer_is_environment()) {
            self.execute_contract(step, contract, &rates, result);
        }

        // Perishable stock: whatever is left is disposed of
        let agent_ids: Vec<String> = self.agent_ids().into_iter().map(str::to_string).collect();
        for agent_id in agent_ids {
            if self.state.is_retired(&agent_id) {
                continue;
            }
            let rate = rates.get(&agent_id).map_or(0.0, |r| r.disposal);
            let catalog = &self.config.catalog_prices;
            let Some(agent) = self.state.get_agent_mut(&agent_id) else {
                continue;
            };
            let (input, output) = agent.clear_stock();
            if input + output == 0 {
                continue;
            }
            let value = input as i64 * catalog[agent.input_product()]
                + output as i64 * catalog[agent.output_product()];
            let cost = (rate * value as f64).round() as i64;
            agent.debit(cost);
            self.log_event(Event::Disposal {
                step,
                agent_id,
                quantity: input + output,
                cost,
            });
        }
    }

    fn execute_contract(
        &mut self,
        step: usize,
        contract: &Contract,
        rates: &HashMap<String, Rates>,
        result: &mut StepResult,
    ) {
        let quantity = contract.quantity();
        let unit_price = contract.unit_price();
        let seller_id = contract.seller_id().to_string();
        let buyer_id = contract.buyer_id().to_string();

        // Seller hands over what it has
        let (delivered, penalty_paid) = if contract.seller_is_environment() {
            (quantity, 0)
        } else {
            let rate = rates.get(&seller_id).map_or(0.0, |r| r.shortfall);
            match self.state.get_agent_mut(&seller_id) {
                Some(seller) => {
                    let delivered = seller.take_output(quantity);
                    let paid = penalty(rate, unit_price, quantity - delivered);
                    seller.debit(paid);
                    seller.credit(delivered as i64 * unit_price);
                    (delivered, paid)
                }
                None => (0, 0),
            }
        };

        // Buyer pays for what it received
        let payment = delivered as i64 * unit_price;
        if !contract.buyer_is_environment() {
            if let Some(buyer) = self.state.get_agent_mut(&buyer_id) {
                buyer.debit(payment);
                buyer.receive_input(delivered);
            }
        }

        let shortfall = quantity - delivered;
        let record = ExecutionRecord {
            contract: contract.clone(),
            step,
            delivered,
            shortfall,
            penalty: penalty_paid,
        };
        for id in [&seller_id, &buyer_id] {
            if let Some(negotiator) = self.negotiators.get_mut(id.as_str()) {
                negotiator.on_contract_executed(&record);
            }
        }
        self.log_event(Event::ContractExecuted {
            step,
            contract_id: contract.id().to_string(),
            seller_id,
            buyer_id,
            delivered,
            shortfall,
            payment,
            penalty: penalty_paid,
        });
        self.state.record_execution(record);
        result.num_executed += 1;
        result.total_shortfall += shortfall;
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("current_step", &self.current_step())
            .field("horizon", &self.horizon())
            .field("status", &self.status())
            .field("num_agents", &self.state.num_agents())
            .field("num_contracts", &self.state.contracts().len())
            .field("event_count", &self.event_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::AgentSpec;
    use crate::models::contract::Party;
    use crate::orchestrator::config::AgentEntry;
    use crate::topology::NamingConfig;

    fn entry(id: &str, level: usize, type_name: &str, cost: i64) -> AgentEntry {
        AgentEntry {
            id: Some(id.to_string()),
            level,
            spec: AgentSpec::new(type_name),
            is_default: false,
            initial_balance: 1_000,
            profile: Profile::single_process(4, 2, level, cost).unwrap(),
        }
    }

    fn supply(id: &str, to: &str, quantity: usize, delivery: usize) -> ExogenousContract {
        ExogenousContract::new(
            id.to_string(),
            0,
            quantity,
            10,
            delivery,
            0,
            Party::Environment,
            Party::agent(to),
        )
        .unwrap()
    }

    fn sale(id: &str, from: &str, quantity: usize, price: i64, delivery: usize) -> ExogenousContract {
        ExogenousContract::new(
            id.to_string(),
            2,
            quantity,
            price,
            delivery,
            0,
            Party::agent(from),
            Party::Environment,
        )
        .unwrap()
    }

    fn two_level_config(seller_type: &str, buyer_type: &str) -> WorldConfig {
        WorldConfig {
            n_processes: 2,
            catalog_prices: vec![10, 20, 40],
            n_lines: 4,
            horizon: 2,
            neg_n_steps: 6,
            rounds_per_step: 7,
            neg_delivery_horizon: 0,
            agents: vec![entry("S", 0, seller_type, 2), entry("B", 1, buyer_type, 3)],
            exogenous_contracts: vec![supply("exo_1", "S", 3, 0), sale("exo_2", "B", 3, 50, 0)],
            naming: NamingConfig::default(),
            seed: 5,
            force_sequential: true,
        }
    }

    #[test]
    fn test_greedy_chain_trades_and_settles() {
        let mut world = World::new(two_level_config("greedy", "greedy")).unwrap();
        let result = world.step().unwrap().unwrap();

        assert_eq!(result.num_revealed, 2);
        assert_eq!(result.num_sessions, 1);
        assert_eq!(result.num_agreements, 1);
        // supply, negotiated, sale
        assert_eq!(result.num_executed, 3);
        assert_eq!(result.total_shortfall, 0);

        let negotiated = world.contracts(&ContractFilter::default().kind(crate::ContractKind::Negotiated));
        assert_eq!(negotiated.len(), 1);
        let price = negotiated[0].unit_price();
        // Last round (5) is proposed by the buyer at the lowest price
        assert_eq!(price, 10);

        // S: -30 supply, -6 production, +3 * price
        assert_eq!(world.balance("S"), Some(1_000 - 30 - 6 + 3 * price));
        // B: -3 * price, -9 production, +150 sale
        assert_eq!(world.balance("B"), Some(1_000 - 3 * price - 9 + 150));
    }

    #[test]
    fn test_do_nothing_leaves_shortfall() {
        let mut config = two_level_config("do_nothing", "greedy");
        config.agents[0].profile = Profile::single_process(4, 2, 0, 2)
            .unwrap()
            .with_penalties(crate::PenaltyDistribution::zero(), crate::PenaltyDistribution::new(0.5, 0.0));
        config.agents[1].profile = Profile::single_process(4, 2, 1, 3)
            .unwrap()
            .with_penalties(crate::PenaltyDistribution::new(1.0, 0.0), crate::PenaltyDistribution::zero());
        let mut world = World::new(config).unwrap();
        let result = world.step().unwrap().unwrap();

        assert_eq!(result.num_agreements, 0);
        assert_eq!(result.total_shortfall, 3);
        // S bought 3 raw units, produced 3 outputs nobody bought, disposed at 0.5 * 20
        assert_eq!(world.balance("S"), Some(1_000 - 30 - 6 - 30));
        // B could not deliver its sale: penalty 1.0 * 50 * 3
        assert_eq!(world.balance("B"), Some(1_000 - 150));
    }

    #[test]
    fn test_finished_world_ignores_steps() {
        let mut world = World::new(two_level_config("greedy", "greedy")).unwrap();
        assert_eq!(world.run().unwrap().len(), 2);
        let events = world.event_count();
        let balances: Vec<Option<i64>> = world.agent_ids().iter().map(|id| world.balance(id)).collect();

        assert!(world.step().unwrap().is_none());
        assert!(world.step().unwrap().is_none());
        assert_eq!(world.event_count(), events);
        assert_eq!(world.current_step(), 2);
        let after: Vec<Option<i64>> = world.agent_ids().iter().map(|id| world.balance(id)).collect();
        assert_eq!(balances, after);
    }

    #[test]
    fn test_retired_agent_fails_execution_without_mutation() {
        let mut world = World::new(two_level_config("greedy", "greedy")).unwrap();
        world.retire_agent("B").unwrap();
        let events = world.event_count();
        let err = world.step().unwrap_err();
        assert_eq!(
            err,
            SimulationError::Execution(ExecutionError::RetiredAgent {
                contract_id: "exo_2".to_string(),
                agent_id: "B".to_string()
            })
        );
        assert_eq!(world.current_step(), 0);
        assert_eq!(world.status(), WorldStatus::NotStarted);
        assert_eq!(world.event_count(), events);
        assert!(world.retire_agent("nobody").is_err());
    }

    #[test]
    fn test_scores_relative_to_initial_balance() {
        let mut config = two_level_config("greedy", "greedy");
        config.agents[1].is_default = true;
        let mut world = World::new(config).unwrap();
        world.run().unwrap();

        let all = world.scores(false);
        assert_eq!(all.len(), 2);
        for score in &all {
            let expected = (score.balance - score.initial_balance) as f64 / score.initial_balance as f64;
            assert!((score.score - expected).abs() < 1e-12);
        }
        let counted = world.scores(true);
        assert_eq!(counted.len(), 1);
        assert_eq!(counted[0].agent_id, "S");
    }

    #[test]
    fn test_wave_scheduling_is_agent_disjoint() {
        let pairs: Vec<(String, String)> = ["a", "b"]
            .iter()
            .flat_map(|s| ["x", "y", "z"].iter().map(move |b| (s.to_string(), b.to_string())))
            .collect();
        let (wave, rest) = schedule_wave(pairs);
        assert_eq!(
            wave,
            vec![("a".to_string(), "x".to_string()), ("b".to_string(), "y".to_string())]
        );
        assert_eq!(rest.len(), 4);
    }
}
