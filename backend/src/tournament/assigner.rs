//! Competitor assignment
//!
//! Turns one base world into several worlds that differ only in which
//! competitor runs which assignable (non-default) factory. Assignable
//! factories are shuffled once and cut into one group per competitor.
//!
//! With fair assignment each round shuffles the competitor order and then
//! emits every cyclic shift of it, so within a round each competitor runs
//! each group exactly once.

use crate::error::ConfigurationError;
use crate::models::agent::AgentSpec;
use crate::orchestrator::config::WorldConfig;
use crate::rng::RngManager;
use crate::topology::AgentSlot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One competitor-to-factory assignment of a base world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub index: usize,
    pub world: WorldConfig,
    /// Competitor index of every assignable agent id
    pub competitor_of: BTreeMap<String, usize>,
}

/// Spreads competitors over the assignable factories of a base world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorAssigner {
    pub n_agents_per_competitor: usize,
    /// `None` runs a single fair round
    pub max_worlds: Option<usize>,
    pub fair: bool,
}

impl CompetitorAssigner {
    /// Produce the assigned worlds of `base`
    ///
    /// # Errors
    ///
    /// `CountMismatch` when the base world does not have exactly
    /// `competitors.len() * n_agents_per_competitor` assignable factories,
    /// `InvalidParameter` when `max_worlds` is too small for a fair round.
    pub fn assign(
        &self,
        base: &WorldConfig,
        competitors: &[AgentSpec],
        rng: &mut RngManager,
    ) -> Result<Vec<Assignment>, ConfigurationError> {
        let n = competitors.len();
        if n == 0 {
            return Err(ConfigurationError::NonPositive {
                what: "number of competitors".to_string(),
                value: 0,
            });
        }
        if self.n_agents_per_competitor == 0 {
            return Err(ConfigurationError::NonPositive {
                what: "n_agents_per_competitor".to_string(),
                value: 0,
            });
        }

        let mut assignable: Vec<usize> = base
            .agents
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_default)
            .map(|(i, _)| i)
            .collect();
        let expected = n * self.n_agents_per_competitor;
        if assignable.len() != expected {
            return Err(ConfigurationError::CountMismatch {
                expected,
                actual: assignable.len(),
            });
        }
        shuffle(&mut assignable, rng);
        let groups: Vec<&[usize]> = assignable.chunks(self.n_agents_per_competitor).collect();

        let permutations = self.permutations(n, rng)?;
        debug!(
            n_competitors = n,
            n_worlds = permutations.len(),
            fair = self.fair,
            "assigning competitors"
        );

        Ok(permutations
            .into_iter()
            .enumerate()
            .map(|(index, order)| apply(base, competitors, &groups, &order, index))
            .collect())
    }

    /// Competitor index per group, one vector per world
    fn permutations(&self, n: usize, rng: &mut RngManager) -> Result<Vec<Vec<usize>>, ConfigurationError> {
        let mut order: Vec<usize> = (0..n).collect();
        let n_rounds = match (self.max_worlds, self.fair) {
            (None, _) => 1,
            (Some(max), true) => {
                if max < n {
                    return Err(ConfigurationError::InvalidParameter {
                        name: "max_worlds_per_config".to_string(),
                        reason: format!(
                            "fair assignment of {} competitors needs at least {} worlds, got {}",
                            n, n, max
                        ),
                    });
                }
                max / n
            }
            (Some(max), false) => {
                if max == 0 {
                    return Err(ConfigurationError::NonPositive {
                        what: "max_worlds_per_config".to_string(),
                        value: 0,
                    });
                }
                return Ok((0..max)
                    .map(|_| {
                        shuffle(&mut order, rng);
                        order.clone()
                    })
                    .collect());
            }
        };

        let mut worlds = Vec::with_capacity(n_rounds * n);
        for _ in 0..n_rounds {
            shuffle(&mut order, rng);
            for shift in 0..n {
                worlds.push((0..n).map(|g| order[(g + n - shift) % n]).collect());
            }
        }
        Ok(worlds)
    }
}

fn apply(
    base: &WorldConfig,
    competitors: &[AgentSpec],
    groups: &[&[usize]],
    order: &[usize],
    index: usize,
) -> Assignment {
    let ids = base.resolved_ids();
    let mut world = base.clone();
    let mut renames: Vec<(&str, String)> = Vec::new();
    let mut competitor_of = BTreeMap::new();

    for (group, &competitor) in groups.iter().zip(order) {
        let spec = &competitors[competitor];
        for &position in group.iter() {
            let entry = &mut world.agents[position];
            entry.spec = spec.clone();
            let mut id = ids[position].clone();
            if world.naming.reveal_type {
                // Type-revealing names follow the new type
                let slot = AgentSlot {
                    level: entry.level,
                    index_in_level: 0,
                    spec: AgentSpec::new(spec.type_name.clone()),
                    is_default: false,
                };
                id = world.naming.agent_name(&slot, position, 0);
                entry.id = Some(id.clone());
                renames.push((ids[position].as_str(), id.clone()));
            }
            competitor_of.insert(id, competitor);
        }
    }

    for contract in &mut world.exogenous_contracts {
        let owner = contract.owner().to_string();
        if let Some((old, new)) = renames.iter().find(|(old, _)| *old == owner) {
            contract.rename_agent(old, new);
        }
    }

    Assignment {
        index,
        world,
        competitor_of,
    }
}

/// Fisher-Yates on the simulation's own random stream
fn shuffle<T>(items: &mut [T], rng: &mut RngManager) {
    for i in (1..items.len()).rev() {
        let j = rng.index(i + 1);
        items.swap(i, j);
    }
}
