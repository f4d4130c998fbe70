//! Topology Planner
//!
//! Decides how many agents sit on each production level and which agent type
//! fills each slot.
//!
//! # Sizing modes
//!
//! - `Exact(counts)`: per-level counts used verbatim; they must add up to the
//!   number of supplied agent types
//! - `SharedRange(lo, hi)`: one draw in `[lo, hi]` applied to every level
//! - `PerLevelRange(lo, hi)`: an independent draw per level
//! - `Distributed { min_per_level }`: exactly one slot per supplied type,
//!   spread randomly over the levels with a per-level minimum
//!
//! Range modes draw from the caller's `RngManager`, so two calls on the same
//! generator give different results while reseeding reproduces them. When a
//! range draw does not match the number of supplied types, `RangeFillPolicy`
//! decides what happens to the difference.

pub mod naming;

pub use naming::{is_default_name, short_type_name, NamingConfig, DEFAULT_AGENT_PREFIX};

use crate::error::ConfigurationError;
use crate::models::agent::AgentSpec;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many agents each level receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelSizing {
    Exact(Vec<usize>),
    SharedRange(usize, usize),
    PerLevelRange(usize, usize),
    Distributed { min_per_level: usize },
}

impl Default for LevelSizing {
    fn default() -> Self {
        LevelSizing::Distributed { min_per_level: 1 }
    }
}

/// What to put in slots left over once every agent type is used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnfilledSlots {
    /// Fill with this spec and mark the agent as a default agent
    FillWithDefault(AgentSpec),
    /// Reuse the last supplied type
    RepeatLast,
    Error,
}

/// What to do with agent types left over once every slot is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurplusTypes {
    Truncate,
    Error,
}

/// Resolution of range-mode count mismatches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeFillPolicy {
    pub unfilled: UnfilledSlots,
    pub surplus: SurplusTypes,
}

impl Default for RangeFillPolicy {
    fn default() -> Self {
        Self {
            unfilled: UnfilledSlots::FillWithDefault(AgentSpec::default_agent()),
            surplus: SurplusTypes::Error,
        }
    }
}

/// One position in the chain, waiting for an agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSlot {
    pub level: usize,
    pub index_in_level: usize,
    pub spec: AgentSpec,
    /// Added by the planner rather than supplied by the caller
    pub is_default: bool,
}

/// Planned assignment of agent types to levels
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    counts: Vec<usize>,
    slots: Vec<AgentSlot>,
}

impl Topology {
    pub fn n_levels(&self) -> usize {
        self.counts.len()
    }

    /// Agents per level
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Slots in level order
    pub fn slots(&self) -> &[AgentSlot] {
        &self.slots
    }

    pub fn n_agents(&self) -> usize {
        self.slots.len()
    }

    pub fn into_slots(self) -> Vec<AgentSlot> {
        self.slots
    }
}

/// Generates `l` integers summing to `n`, each at least `min`
///
/// Starts every part at `min` and hands out the remainder one unit at a time
/// to uniformly chosen parts.
///
/// # Example
/// ```
/// use supply_chain_sim_core::topology::integer_cut;
/// use supply_chain_sim_core::RngManager;
///
/// let mut rng = RngManager::new(7);
/// let parts = integer_cut(10, 3, 2, &mut rng).unwrap();
/// assert_eq!(parts.iter().sum::<usize>(), 10);
/// assert!(parts.iter().all(|&p| p >= 2));
/// ```
pub fn integer_cut(
    n: usize,
    l: usize,
    min: usize,
    rng: &mut RngManager,
) -> Result<Vec<usize>, ConfigurationError> {
    integer_cut_bounded(n, &vec![min; l], None, rng)
}

/// `integer_cut` with per-part minimums and optional per-part caps
///
/// With caps, the total handed out stops at the sum of the caps.
pub fn integer_cut_bounded(
    n: usize,
    mins: &[usize],
    caps: Option<&[usize]>,
    rng: &mut RngManager,
) -> Result<Vec<usize>, ConfigurationError> {
    let floor: usize = mins.iter().sum();
    if mins.is_empty() || n < floor {
        return Err(ConfigurationError::InvalidParameter {
            name: "integer cut".to_string(),
            reason: format!(
                "cannot split {} into {} parts with minimums summing to {}",
                n,
                mins.len(),
                floor
            ),
        });
    }
    let mut sizes = mins.to_vec();
    let target = match caps {
        Some(caps) => {
            if caps.len() != mins.len() {
                return Err(ConfigurationError::LengthMismatch {
                    what: "integer cut caps",
                    expected: mins.len(),
                    actual: caps.len(),
                });
            }
            let ceiling: usize = caps.iter().zip(mins).map(|(&c, &m)| c.max(m)).sum();
            n.min(ceiling)
        }
        None => n,
    };

    let mut total = floor;
    while total < target {
        let open: Vec<usize> = match caps {
            Some(caps) => (0..sizes.len()).filter(|&i| sizes[i] < caps[i]).collect(),
            None => (0..sizes.len()).collect(),
        };
        let i = open[rng.index(open.len())];
        sizes[i] += 1;
        total += 1;
    }
    Ok(sizes)
}

fn validate_range(lo: usize, hi: usize) -> Result<(), ConfigurationError> {
    if lo == 0 || lo > hi {
        return Err(ConfigurationError::InvalidRange {
            what: "agents per level",
            lo: lo as i64,
            hi: hi as i64,
        });
    }
    Ok(())
}

/// Stateless planner; all randomness comes from the caller's generator
pub struct TopologyPlanner;

impl TopologyPlanner {
    /// Decide the per-level agent counts
    pub fn level_counts(
        n_types: usize,
        n_levels: usize,
        sizing: &LevelSizing,
        rng: &mut RngManager,
    ) -> Result<Vec<usize>, ConfigurationError> {
        if n_levels == 0 {
            return Err(ConfigurationError::NonPositive {
                what: "number of levels".to_string(),
                value: 0,
            });
        }
        match sizing {
            LevelSizing::Exact(counts) => {
                if counts.len() != n_levels {
                    return Err(ConfigurationError::LengthMismatch {
                        what: "level counts",
                        expected: n_levels,
                        actual: counts.len(),
                    });
                }
                if counts.iter().any(|&c| c == 0) {
                    return Err(ConfigurationError::NonPositive {
                        what: "agents per level".to_string(),
                        value: 0,
                    });
                }
                let total: usize = counts.iter().sum();
                if total != n_types {
                    return Err(ConfigurationError::CountMismatch {
                        expected: n_types,
                        actual: total,
                    });
                }
                Ok(counts.clone())
            }
            LevelSizing::SharedRange(lo, hi) => {
                validate_range(*lo, *hi)?;
                let n = rng.range_inclusive(*lo as i64, *hi as i64) as usize;
                Ok(vec![n; n_levels])
            }
            LevelSizing::PerLevelRange(lo, hi) => {
                validate_range(*lo, *hi)?;
                Ok((0..n_levels)
                    .map(|_| rng.range_inclusive(*lo as i64, *hi as i64) as usize)
                    .collect())
            }
            LevelSizing::Distributed { min_per_level } => {
                if *min_per_level == 0 {
                    return Err(ConfigurationError::NonPositive {
                        what: "minimum agents per level".to_string(),
                        value: 0,
                    });
                }
                integer_cut(n_types, n_levels, *min_per_level, rng)
            }
        }
    }

    /// Plan the full topology
    ///
    /// Specs are consumed in order, filling level 0 first.
    ///
    /// # Example
    /// ```
    /// use supply_chain_sim_core::topology::{LevelSizing, RangeFillPolicy, TopologyPlanner};
    /// use supply_chain_sim_core::{AgentSpec, RngManager};
    ///
    /// let specs: Vec<AgentSpec> = (0..6).map(|_| AgentSpec::new("greedy")).collect();
    /// let mut rng = RngManager::new(1);
    /// let topology = TopologyPlanner::plan(
    ///     specs,
    ///     3,
    ///     &LevelSizing::Exact(vec![2, 3, 1]),
    ///     &RangeFillPolicy::default(),
    ///     &mut rng,
    /// ).unwrap();
    /// assert_eq!(topology.counts(), &[2, 3, 1]);
    /// assert_eq!(topology.slots()[2].level, 1);
    /// ```
    pub fn plan(
        specs: Vec<AgentSpec>,
        n_levels: usize,
        sizing: &LevelSizing,
        policy: &RangeFillPolicy,
        rng: &mut RngManager,
    ) -> Result<Topology, ConfigurationError> {
        let counts = Self::level_counts(specs.len(), n_levels, sizing, rng)?;
        let n_slots: usize = counts.iter().sum();
        let n_types = specs.len();

        // Pair each slot with a spec, resolving any range-mode mismatch
        let mut filled: Vec<(AgentSpec, bool)> = Vec::with_capacity(n_slots);
        let last = specs.last().cloned();
        if n_types > n_slots {
            match policy.surplus {
                SurplusTypes::Truncate => {
                    debug!(dropped = n_types - n_slots, "truncating surplus agent types");
                }
                SurplusTypes::Error => {
                    return Err(ConfigurationError::SurplusAgentTypes(n_types - n_slots))
                }
            }
        }
        filled.extend(specs.into_iter().take(n_slots).map(|s| (s, false)));
        let missing = n_slots - filled.len();
        if missing > 0 {
            match (&policy.unfilled, last) {
                (UnfilledSlots::FillWithDefault(spec), _) => {
                    debug!(missing, type_name = %spec.type_name, "filling slots with default agents");
                    filled.extend((0..missing).map(|_| (spec.clone(), true)));
                }
                (UnfilledSlots::RepeatLast, Some(last)) => {
                    filled.extend((0..missing).map(|_| (last.clone(), false)));
                }
                (UnfilledSlots::RepeatLast, None) | (UnfilledSlots::Error, _) => {
                    return Err(ConfigurationError::UnfilledSlots(missing));
                }
            }
        }

        let mut filled = filled.into_iter();
        let mut slots = Vec::with_capacity(n_slots);
        for (level, &count) in counts.iter().enumerate() {
            for index_in_level in 0..count {
                if let Some((spec, is_default)) = filled.next() {
                    slots.push(AgentSlot {
                        level,
                        index_in_level,
                        spec,
                        is_default,
                    });
                }
            }
        }

        debug!(?counts, n_agents = slots.len(), "planned topology");
        Ok(Topology { counts, slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(n: usize) -> Vec<AgentSpec> {
        (0..n).map(|i| AgentSpec::new(format!("t{}", i))).collect()
    }

    #[test]
    fn test_exact_assigns_in_level_order() {
        let mut rng = RngManager::new(1);
        let topo = TopologyPlanner::plan(
            specs(6),
            3,
            &LevelSizing::Exact(vec![2, 3, 1]),
            &RangeFillPolicy::default(),
            &mut rng,
        )
        .unwrap();
        let placed: Vec<(usize, usize, &str)> = topo
            .slots()
            .iter()
            .map(|s| (s.level, s.index_in_level, s.spec.type_name.as_str()))
            .collect();
        assert_eq!(
            placed,
            vec![
                (0, 0, "t0"),
                (0, 1, "t1"),
                (1, 0, "t2"),
                (1, 1, "t3"),
                (1, 2, "t4"),
                (2, 0, "t5")
            ]
        );
    }

    #[test]
    fn test_exact_rejects_wrong_length_and_zero() {
        let mut rng = RngManager::new(1);
        let policy = RangeFillPolicy::default();
        let short = TopologyPlanner::plan(specs(3), 3, &LevelSizing::Exact(vec![3]), &policy, &mut rng);
        assert!(matches!(short, Err(ConfigurationError::LengthMismatch { .. })));
        let zero =
            TopologyPlanner::plan(specs(3), 2, &LevelSizing::Exact(vec![3, 0]), &policy, &mut rng);
        assert!(matches!(zero, Err(ConfigurationError::NonPositive { .. })));
    }

    #[test]
    fn test_surplus_types_policy() {
        let mut rng = RngManager::new(4);
        let truncate = RangeFillPolicy {
            surplus: SurplusTypes::Truncate,
            ..RangeFillPolicy::default()
        };
        let topo =
            TopologyPlanner::plan(specs(9), 2, &LevelSizing::SharedRange(2, 2), &truncate, &mut rng)
                .unwrap();
        assert_eq!(topo.n_agents(), 4);

        let strict = TopologyPlanner::plan(
            specs(9),
            2,
            &LevelSizing::SharedRange(2, 2),
            &RangeFillPolicy::default(),
            &mut rng,
        );
        assert_eq!(strict, Err(ConfigurationError::SurplusAgentTypes(5)));
    }

    #[test]
    fn test_unfilled_slots_policies() {
        let mut rng = RngManager::new(4);
        let topo = TopologyPlanner::plan(
            specs(1),
            2,
            &LevelSizing::SharedRange(2, 2),
            &RangeFillPolicy::default(),
            &mut rng,
        )
        .unwrap();
        let defaults: Vec<bool> = topo.slots().iter().map(|s| s.is_default).collect();
        assert_eq!(defaults, vec![false, true, true, true]);
        assert_eq!(topo.slots()[3].spec.type_name, "random");

        let repeat = RangeFillPolicy {
            unfilled: UnfilledSlots::RepeatLast,
            ..RangeFillPolicy::default()
        };
        let topo =
            TopologyPlanner::plan(specs(2), 2, &LevelSizing::SharedRange(2, 2), &repeat, &mut rng)
                .unwrap();
        assert!(topo.slots().iter().all(|s| !s.is_default));
        assert_eq!(topo.slots()[3].spec.type_name, "t1");

        let strict = RangeFillPolicy {
            unfilled: UnfilledSlots::Error,
            ..RangeFillPolicy::default()
        };
        let result =
            TopologyPlanner::plan(specs(2), 2, &LevelSizing::SharedRange(2, 2), &strict, &mut rng);
        assert_eq!(result, Err(ConfigurationError::UnfilledSlots(2)));
    }

    #[test]
    fn test_invalid_ranges() {
        let mut rng = RngManager::new(4);
        for sizing in [
            LevelSizing::SharedRange(0, 3),
            LevelSizing::PerLevelRange(5, 4),
        ] {
            let result = TopologyPlanner::level_counts(4, 2, &sizing, &mut rng);
            assert!(matches!(result, Err(ConfigurationError::InvalidRange { .. })));
        }
    }

    #[test]
    fn test_distributed_respects_minimum() {
        let mut rng = RngManager::new(21);
        let counts = TopologyPlanner::level_counts(
            10,
            4,
            &LevelSizing::Distributed { min_per_level: 2 },
            &mut rng,
        )
        .unwrap();
        assert_eq!(counts.iter().sum::<usize>(), 10);
        assert!(counts.iter().all(|&c| c >= 2));

        let too_few = TopologyPlanner::level_counts(
            5,
            3,
            &LevelSizing::Distributed { min_per_level: 2 },
            &mut rng,
        );
        assert!(too_few.is_err());
    }

    #[test]
    fn test_bounded_cut_stops_at_caps() {
        let mut rng = RngManager::new(8);
        let parts = integer_cut_bounded(100, &[1, 1, 1], Some(&[2, 5, 3]), &mut rng).unwrap();
        assert_eq!(parts, vec![2, 5, 3]);

        let parts = integer_cut_bounded(6, &[1, 1], Some(&[4, 4]), &mut rng).unwrap();
        assert_eq!(parts.iter().sum::<usize>(), 6);
        assert!(parts.iter().all(|&p| (1..=4).contains(&p)));
    }
}
