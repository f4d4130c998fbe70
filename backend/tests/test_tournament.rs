//! Tournament planning: competitor rotation, default managers, aggregation

use std::collections::BTreeSet;
use supply_chain_sim_core::generator::{GeneratorConfig, IntSpec};
use supply_chain_sim_core::topology::{short_type_name, NamingConfig};
use supply_chain_sim_core::tournament::{
    CompetitorAssigner, Tournament, TournamentConfig, TournamentLayout,
};
use supply_chain_sim_core::{AgentSpec, RngManager, World, WorldConfig};

// ============================================================================
// Fixtures
// ============================================================================

fn competitors() -> Vec<AgentSpec> {
    ["greedy", "random", "do_nothing"]
        .iter()
        .map(|t| AgentSpec::new(*t))
        .collect()
}

fn template() -> GeneratorConfig {
    GeneratorConfig {
        n_processes: 2,
        n_lines: 4,
        n_steps: IntSpec::Fixed(4),
        ..GeneratorConfig::default()
    }
}

fn base_world(layout: &TournamentLayout, template: &GeneratorConfig, seed: u64) -> WorldConfig {
    let mut rng = RngManager::new(seed);
    let levels = layout
        .plan_levels(competitors().len(), template.n_processes, &mut rng)
        .unwrap();
    layout
        .generate_base(template, &levels, &competitors()[0], &mut rng)
        .unwrap()
}

fn small_tournament(seed: u64) -> TournamentConfig {
    TournamentConfig {
        generator: template(),
        competitors: vec![AgentSpec::new("greedy"), AgentSpec::new("do_nothing")],
        n_configs: 2,
        n_runs_per_world: 2,
        seed: Some(seed),
        force_sequential: true,
        ..TournamentConfig::default()
    }
}

// ============================================================================
// Assignment
// ============================================================================

#[test]
fn test_each_competitor_occupies_each_slot_once_per_round() {
    for n_agents_per_competitor in [1, 2] {
        let layout = TournamentLayout {
            n_agents_per_competitor,
            ..TournamentLayout::default()
        };
        let base = base_world(&layout, &template(), 5);
        let assigner = CompetitorAssigner {
            n_agents_per_competitor,
            max_worlds: Some(6),
            fair: true,
        };
        let mut rng = RngManager::new(17);
        let worlds = assigner.assign(&base, &competitors(), &mut rng).unwrap();
        assert_eq!(worlds.len(), 6);

        let assignable: Vec<usize> = (0..base.agents.len())
            .filter(|&i| !base.agents[i].is_default)
            .collect();
        assert_eq!(assignable.len(), 3 * n_agents_per_competitor);

        let all: BTreeSet<&str> = ["do_nothing", "greedy", "random"].into_iter().collect();
        for round in worlds.chunks(3) {
            for &slot in &assignable {
                let seen: Vec<&str> = round
                    .iter()
                    .map(|a| a.world.agents[slot].spec.type_name.as_str())
                    .collect();
                let distinct: BTreeSet<&str> = seen.iter().copied().collect();
                assert_eq!(seen.len(), 3);
                assert_eq!(distinct, all, "slot {} in round {:?}", slot, seen);
            }
            // Every world places n_agents_per_competitor agents per competitor
            for assignment in round {
                for competitor in 0..3 {
                    let placed = assignment
                        .competitor_of
                        .values()
                        .filter(|&&c| c == competitor)
                        .count();
                    assert_eq!(placed, n_agents_per_competitor);
                }
            }
        }
    }
}

#[test]
fn test_default_managers_keep_their_type_and_name() {
    let layout = TournamentLayout {
        min_factories_per_level: 3,
        non_competitors: vec![AgentSpec::new("random")],
        ..TournamentLayout::default()
    };
    let base = base_world(&layout, &template(), 8);
    let assigner = CompetitorAssigner {
        n_agents_per_competitor: 1,
        max_worlds: None,
        fair: true,
    };
    let mut rng = RngManager::new(2);
    let worlds = assigner.assign(&base, &competitors(), &mut rng).unwrap();
    assert_eq!(worlds.len(), 3);

    let base_ids = base.resolved_ids();
    for assignment in &worlds {
        let ids = assignment.world.resolved_ids();
        for (i, entry) in assignment.world.agents.iter().enumerate() {
            if entry.is_default {
                assert!(ids[i].starts_with("_df_"));
                assert_eq!(entry.spec, base.agents[i].spec);
                assert!(!assignment.competitor_of.contains_key(&ids[i]));
            }
        }
        assert_eq!(ids, base_ids);
        assert!(World::new(assignment.world.clone()).is_ok());
    }
    for level in 0..2 {
        assert!(base.agents.iter().filter(|a| a.level == level).count() >= 3);
    }
}

#[test]
fn test_type_revealing_names_follow_the_assigned_type() {
    let template = GeneratorConfig {
        naming: NamingConfig {
            reveal_level: true,
            reveal_type: true,
        },
        ..template()
    };
    let base = base_world(&TournamentLayout::default(), &template, 3);
    let assigner = CompetitorAssigner {
        n_agents_per_competitor: 1,
        max_worlds: None,
        fair: true,
    };
    let mut rng = RngManager::new(4);
    for assignment in assigner.assign(&base, &competitors(), &mut rng).unwrap() {
        let world = &assignment.world;
        let ids = world.resolved_ids();
        for (i, entry) in world.agents.iter().enumerate() {
            if !entry.is_default {
                let prefix = format!("{:02}{}", i, short_type_name(&entry.spec.type_name));
                assert!(ids[i].starts_with(&prefix), "{} vs {}", ids[i], prefix);
                assert!(assignment.competitor_of.contains_key(&ids[i]));
            }
        }
        let known: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        assert!(world
            .exogenous_contracts
            .iter()
            .all(|c| known.contains(c.owner())));
        assert!(World::new(world.clone()).is_ok());
    }
}

// ============================================================================
// Planning and runs
// ============================================================================

#[test]
fn test_plan_covers_configs_assignments_and_runs() {
    let config = TournamentConfig {
        competitors: competitors(),
        ..small_tournament(21)
    };
    let schedule = Tournament::plan(&config).unwrap();
    assert_eq!(schedule.len(), 2 * 3 * 2);

    for config_index in 0..2 {
        for run_index in 0..2 {
            let seeds: BTreeSet<u64> = schedule
                .iter()
                .filter(|r| r.config_index == config_index && r.run_index == run_index)
                .map(|r| r.world.seed)
                .collect();
            assert_eq!(seeds.len(), 1, "assignments of one config share run seeds");
        }
    }
    assert!(schedule.iter().all(|r| r.world.force_sequential));
}

#[test]
fn test_tournament_scores_every_competitor_agent() {
    let results = Tournament::run(&small_tournament(9)).unwrap();

    // 2 configs x 2 rotations x 2 runs
    assert_eq!(results.runs.len(), 8);
    for run in &results.runs {
        assert!(run.scores.iter().all(|s| s.competitor.is_some()));
        assert!(run.scores.iter().all(|s| !s.score.is_default));
    }
    assert_eq!(results.standings.len(), 2);
    for standing in &results.standings {
        assert_eq!(standing.n_scores, 8);
        assert!(standing.min <= standing.mean && standing.mean <= standing.max);
    }
    assert!(results.standings[0].mean >= results.standings[1].mean);
    assert_eq!(results.winner(), results.standings.first());
}

#[test]
fn test_tournament_is_reproducible_and_can_count_defaults() {
    let a = Tournament::run(&small_tournament(13)).unwrap();
    let b = Tournament::run(&small_tournament(13)).unwrap();
    assert_eq!(a.standings, b.standings);
    let fingerprints = |r: &supply_chain_sim_core::TournamentResults| -> Vec<String> {
        r.runs.iter().map(|run| run.fingerprint.clone()).collect()
    };
    assert_eq!(fingerprints(&a), fingerprints(&b));

    let with_defaults = Tournament::run(&TournamentConfig {
        ignore_default: false,
        layout: TournamentLayout {
            min_factories_per_level: 3,
            ..TournamentLayout::default()
        },
        ..small_tournament(13)
    })
    .unwrap();
    assert!(with_defaults
        .runs
        .iter()
        .all(|run| run.scores.iter().any(|s| s.competitor.is_none() && s.score.is_default)));
}
