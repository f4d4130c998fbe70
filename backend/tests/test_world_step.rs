//! Step semantics of the world engine

use supply_chain_sim_core::generator::{GeneratorConfig, IntSpec};
use supply_chain_sim_core::negotiation::{
    NegotiationContext, Negotiator, NegotiatorRegistry, Offer, Proposer, Responder, Response,
    SessionState,
};
use supply_chain_sim_core::topology::NamingConfig;
use supply_chain_sim_core::{
    AgentEntry, AgentSpec, ConfigurationError, Contract, ContractFilter, ContractKind, Event,
    ExecutionError, ExogenousContract, Party, Profile, RngManager, SimulationError, World,
    WorldConfig, WorldGenerator, WorldStatus, SYSTEM_BUYER_ID, SYSTEM_SELLER_ID,
};

// ============================================================================
// Fixtures
// ============================================================================

fn entry(id: &str, level: usize, type_name: &str) -> AgentEntry {
    AgentEntry {
        id: Some(id.to_string()),
        level,
        spec: AgentSpec::new(type_name),
        is_default: false,
        initial_balance: 10_000,
        profile: Profile::single_process(5, 2, level, 2).unwrap(),
    }
}

fn supply(id: &str, quantity: usize, delivery: usize, revelation: usize) -> ExogenousContract {
    ExogenousContract::new(
        id.to_string(),
        0,
        quantity,
        10,
        delivery,
        revelation,
        Party::Environment,
        Party::agent("S"),
    )
    .unwrap()
}

fn sale(id: &str, quantity: usize, delivery: usize, revelation: usize) -> ExogenousContract {
    ExogenousContract::new(
        id.to_string(),
        2,
        quantity,
        60,
        delivery,
        revelation,
        Party::agent("B"),
        Party::Environment,
    )
    .unwrap()
}

fn chain(seller_type: &str, buyer_type: &str) -> WorldConfig {
    WorldConfig {
        n_processes: 2,
        catalog_prices: vec![10, 20, 40],
        n_lines: 5,
        horizon: 3,
        neg_n_steps: 6,
        rounds_per_step: 7,
        neg_delivery_horizon: 0,
        agents: vec![entry("S", 0, seller_type), entry("B", 1, buyer_type)],
        exogenous_contracts: vec![
            supply("exo_s0", 2, 0, 0),
            sale("exo_b0", 2, 0, 0),
            supply("exo_s2", 4, 2, 0),
            sale("exo_b2", 4, 2, 1),
        ],
        naming: NamingConfig::default(),
        seed: 42,
        force_sequential: true,
    }
}

/// Always proposes, never accepts
struct Stubborn;

impl Proposer for Stubborn {
    fn propose(
        &mut self,
        _ctx: &NegotiationContext,
        state: &SessionState,
        _rng: &mut RngManager,
    ) -> Option<Offer> {
        Some(Offer {
            quantity: 1,
            unit_price: state.issues.unit_price.0,
            delivery_step: state.issues.delivery_step.0,
        })
    }
}

impl Responder for Stubborn {
    fn respond(
        &mut self,
        _ctx: &NegotiationContext,
        _state: &SessionState,
        _offer: &Offer,
        _rng: &mut RngManager,
    ) -> Response {
        Response::Reject
    }
}

impl Negotiator for Stubborn {
    fn type_name(&self) -> &str {
        "stubborn"
    }
}

// ============================================================================
// Revelation
// ============================================================================

#[test]
fn test_contract_revealed_only_to_owner_at_revelation_step() {
    let mut world = World::new(chain("greedy", "greedy")).unwrap();

    world.step().unwrap();
    let owned_by_b = |w: &World| -> Vec<String> {
        w.revealed_to("B")
            .unwrap()
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    };
    assert_eq!(owned_by_b(&world), vec!["exo_b0".to_string()]);
    let revealed_to_s: Vec<&str> = world.revealed_to("S").unwrap().iter().map(|c| c.id()).collect();
    assert_eq!(revealed_to_s, vec!["exo_s0", "exo_s2"]);

    world.step().unwrap();
    assert_eq!(owned_by_b(&world), vec!["exo_b0".to_string(), "exo_b2".to_string()]);
    assert!(world.revealed_to("S").unwrap().iter().all(|c| c.id() != "exo_b2"));

    let revelations: Vec<(usize, String)> = world
        .event_log()
        .events_of_type("ContractRevealed")
        .into_iter()
        .filter_map(|e| match e {
            Event::ContractRevealed {
                step, contract_id, ..
            } => Some((*step, contract_id.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        revelations.iter().filter(|(_, id)| id == "exo_b2").collect::<Vec<_>>(),
        vec![&(1, "exo_b2".to_string())]
    );
    assert!(world.revealed_to("nobody").is_none());
}

#[test]
fn test_supply_revealed_to_buyer_at_its_delivery_step() {
    let mut config = chain("greedy", "greedy");
    config.exogenous_contracts.push(supply("exo_s1", 1, 1, 1));
    let mut world = World::new(config).unwrap();

    world.step().unwrap();
    assert!(world.revealed_to("S").unwrap().iter().all(|c| c.id() != "exo_s1"));
    world.step().unwrap();
    assert!(world.revealed_to("S").unwrap().iter().any(|c| c.id() == "exo_s1"));
    assert!(world.revealed_to("B").unwrap().iter().all(|c| c.id() != "exo_s1"));
    assert_eq!(
        world.event_log().events_for_contract("exo_s1")[0].step(),
        1
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_status_transitions_and_finished_noop() {
    let mut world = World::new(chain("greedy", "greedy")).unwrap();
    assert_eq!(world.status(), WorldStatus::NotStarted);

    world.step().unwrap();
    assert_eq!(world.status(), WorldStatus::Running);

    let rest = world.run().unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(world.status(), WorldStatus::Finished);

    let events = world.event_log().len();
    let executions = world.executions().len();
    assert!(world.step().unwrap().is_none());
    assert_eq!(world.event_log().len(), events);
    assert_eq!(world.executions().len(), executions);
    assert!(world.run().unwrap().is_empty());
}

#[test]
fn test_retired_agent_with_due_contract_aborts_step() {
    let mut world = World::new(chain("greedy", "greedy")).unwrap();
    world.step().unwrap();
    world.retire_agent("S").unwrap();

    // Nothing is due at step 1
    assert!(world.step().unwrap().is_some());

    let before = world.balance("B");
    match world.step() {
        Err(SimulationError::Execution(ExecutionError::RetiredAgent { agent_id, .. })) => {
            assert_eq!(agent_id, "S");
        }
        other => panic!("expected execution error, got {:?}", other),
    }
    assert_eq!(world.current_step(), 2);
    assert_eq!(world.balance("B"), before);
    assert_eq!(world.event_log().events_of_type("AgentRetired").len(), 1);
}

#[test]
fn test_unknown_agent_type_rejected() {
    let err = World::new(chain("greedy", "telepathic")).unwrap_err();
    assert_eq!(
        err,
        SimulationError::InvalidConfig(ConfigurationError::UnknownAgentType(
            "telepathic".to_string()
        ))
    );
}

#[test]
fn test_invalid_config_rejected_before_construction() {
    let mut config = chain("greedy", "greedy");
    config.exogenous_contracts.push(supply("exo_late", 1, 3, 0));
    assert!(matches!(
        World::new(config),
        Err(SimulationError::InvalidConfig(_))
    ));

    let mut config = chain("greedy", "greedy");
    config.agents[1].id = Some(SYSTEM_BUYER_ID.to_string());
    assert!(World::new(config).is_err());
}

/// Round-trips `chain` through JSON after `edit` rewrites the raw document
fn chain_from_json(edit: impl FnOnce(&mut serde_json::Value)) -> WorldConfig {
    let mut doc = serde_json::to_value(chain("greedy", "greedy")).unwrap();
    edit(&mut doc);
    serde_json::from_value(doc).unwrap()
}

#[test]
fn test_loaded_contract_revealed_after_delivery_rejected() {
    let config = chain_from_json(|doc| {
        let contract = &mut doc["exogenous_contracts"][0];
        contract["delivery_step"] = 1.into();
        contract["revelation_step"] = 3.into();
    });
    assert_eq!(
        World::new(config).unwrap_err(),
        SimulationError::InvalidConfig(ConfigurationError::RevelationAfterDelivery {
            revelation: 3,
            delivery: 1,
        })
    );
}

#[test]
fn test_loaded_contract_with_non_positive_terms_rejected() {
    let config = chain_from_json(|doc| {
        doc["exogenous_contracts"][1]["quantity"] = 0.into();
    });
    assert!(matches!(
        World::new(config),
        Err(SimulationError::InvalidConfig(ConfigurationError::NonPositive { value: 0, .. }))
    ));

    let config = chain_from_json(|doc| {
        doc["exogenous_contracts"][1]["unit_price"] = (-5).into();
    });
    assert!(matches!(
        World::new(config),
        Err(SimulationError::InvalidConfig(ConfigurationError::NonPositive { value: -5, .. }))
    ));

    let config = chain_from_json(|doc| {
        doc["exogenous_contracts"][0]["seller"] = serde_json::json!({ "Agent": "B" });
    });
    assert_eq!(
        World::new(config).unwrap_err(),
        SimulationError::InvalidConfig(ConfigurationError::EnvironmentParty)
    );
}

#[test]
fn test_loaded_profile_with_negative_cost_rejected() {
    let config = chain_from_json(|doc| {
        doc["agents"][0]["profile"]["costs"][0][0] = (-3).into();
    });
    assert!(matches!(
        World::new(config),
        Err(SimulationError::InvalidConfig(ConfigurationError::InvalidParameter { .. }))
    ));

    let config = chain_from_json(|doc| {
        doc["agents"][1]["profile"]["shortfall_penalty"]["mean"] = (-1.0).into();
    });
    assert!(matches!(
        World::new(config),
        Err(SimulationError::InvalidConfig(ConfigurationError::InvalidParameter { .. }))
    ));
}

// ============================================================================
// Negotiation
// ============================================================================

#[test]
fn test_always_rejecting_sessions_time_out() {
    let mut registry = NegotiatorRegistry::default();
    registry.register("stubborn", |_| Ok(Box::new(Stubborn)));
    let mut world = World::with_registry(chain("stubborn", "stubborn"), registry).unwrap();

    let result = world.step().unwrap().unwrap();
    assert_eq!(result.num_sessions, 1);
    assert_eq!(result.num_timeouts, 1);
    assert_eq!(result.num_agreements, 0);

    let timeouts = world.event_log().events_of_type("NegotiationTimedOut");
    assert_eq!(timeouts.len(), 1);
    match timeouts[0] {
        Event::NegotiationTimedOut { rounds, .. } => assert_eq!(*rounds, 6),
        _ => unreachable!(),
    }
    assert!(world
        .contracts(&ContractFilter::default().kind(ContractKind::Negotiated))
        .is_empty());
}

#[test]
fn test_negotiated_contracts_link_adjacent_levels_within_issue_bounds() {
    let config = GeneratorConfig {
        agent_types: (0..9).map(|_| AgentSpec::new("random")).collect(),
        n_processes: 3,
        n_steps: IntSpec::Fixed(6),
        neg_delivery_horizon: 2,
        seed: Some(31),
        ..GeneratorConfig::default()
    };
    let world_config = WorldGenerator::generate(&config).unwrap();
    let catalog = world_config.catalog_prices.clone();
    let horizon = world_config.horizon;
    let mut world = World::new(world_config).unwrap();
    world.run().unwrap();

    let negotiated = world.contracts(&ContractFilter::default().kind(ContractKind::Negotiated));
    assert!(!negotiated.is_empty());
    for contract in negotiated {
        let Contract::Negotiated(c) = contract else {
            unreachable!()
        };
        let seller = world.agent(&c.seller_id).unwrap();
        let buyer = world.agent(&c.buyer_id).unwrap();
        assert_eq!(seller.level() + 1, buyer.level());
        assert_eq!(c.product, buyer.level());

        let p = catalog[c.product];
        assert!(c.unit_price >= (p / 2).max(1) && c.unit_price <= 2 * p);
        assert!(c.quantity >= 1 && c.quantity <= world.config().n_lines);
        assert!(c.delivery_step >= c.signed_step);
        assert!(c.delivery_step <= (c.signed_step + 2).min(horizon - 1));
    }
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn test_money_only_enters_or_leaves_through_environment_and_costs() {
    let config = GeneratorConfig {
        agent_types: (0..6)
            .map(|i| AgentSpec::new(if i % 2 == 0 { "greedy" } else { "random" }))
            .collect(),
        n_processes: 3,
        n_steps: IntSpec::Fixed(8),
        neg_delivery_horizon: 1,
        seed: Some(8),
        ..GeneratorConfig::default()
    };
    let mut world = World::new(WorldGenerator::generate(&config).unwrap()).unwrap();
    let initial: i64 = world.agents().iter().map(|a| a.initial_balance()).sum();
    world.run().unwrap();
    let last: i64 = world.agents().iter().map(|a| a.balance()).sum();

    let mut expected = 0i64;
    for event in world.event_log().events() {
        match event {
            Event::ContractExecuted {
                seller_id,
                buyer_id,
                payment,
                penalty,
                ..
            } => {
                if buyer_id == SYSTEM_BUYER_ID {
                    expected += payment;
                }
                if seller_id == SYSTEM_SELLER_ID {
                    expected -= payment;
                }
                expected -= penalty;
            }
            Event::Production { cost, .. } | Event::Disposal { cost, .. } => expected -= cost,
            _ => {}
        }
    }
    assert_eq!(last - initial, expected);
}

#[test]
fn test_stock_never_carries_over() {
    let mut world = World::new(chain("greedy", "do_nothing")).unwrap();
    while world.step().unwrap().is_some() {
        for agent in world.agents() {
            assert_eq!(agent.input_stock(), 0);
            assert_eq!(agent.output_stock(), 0);
        }
    }
}

#[test]
fn test_every_due_contract_executes_once() {
    let mut world = World::new(chain("greedy", "greedy")).unwrap();
    world.run().unwrap();
    let ids: Vec<&str> = world.executions().iter().map(|r| r.contract.id()).collect();
    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(ids.len(), unique.len());
    for id in ["exo_s0", "exo_b0", "exo_s2", "exo_b2"] {
        assert!(ids.contains(&id));
    }
    for record in world.executions() {
        assert_eq!(record.step, record.contract.delivery_step());
        assert_eq!(record.delivered + record.shortfall, record.contract.quantity());
    }
}
