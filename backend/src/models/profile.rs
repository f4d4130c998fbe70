//! Production profile
//!
//! A profile is owned by exactly one agent and describes what it costs that
//! agent to run one unit of production:
//! - `costs[line][process]`: cost of one unit of `process` on `line`
//!   (`INFINITE_COST` when the line cannot run the process)
//! - shortfall penalty and disposal cost distributions (per unit, as a
//!   fraction of the relevant unit price)
//!
//! CRITICAL: All money values are i64

use crate::error::ConfigurationError;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Sentinel cost meaning "this line cannot run this process"
pub const INFINITE_COST: i64 = i64::MAX;

/// Normal distribution parameters for a per-unit penalty rate
///
/// Realized rates are clipped at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyDistribution {
    pub mean: f64,
    pub std_dev: f64,
}

impl PenaltyDistribution {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// A distribution that always realizes to zero
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Draw one non-negative rate
    pub fn sample(&self, rng: &mut RngManager) -> f64 {
        if self.std_dev <= 0.0 {
            return self.mean.max(0.0);
        }
        rng.normal(self.mean, self.std_dev).max(0.0)
    }
}

impl Default for PenaltyDistribution {
    fn default() -> Self {
        Self::zero()
    }
}

/// Per-agent production cost structure
///
/// # Example
/// ```
/// use supply_chain_sim_core::Profile;
///
/// // 3 lines, 2 processes, this agent runs process 1 at cost 12
/// let profile = Profile::single_process(3, 2, 1, 12).unwrap();
/// assert_eq!(profile.unit_cost(1), Some(12));
/// assert_eq!(profile.unit_cost(0), None);
/// assert_eq!(profile.capacity(1), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Cost table indexed by `[line][process]`
    costs: Vec<Vec<i64>>,

    /// Penalty per missing unit, as a fraction of the contract unit price
    shortfall_penalty: PenaltyDistribution,

    /// Cost per leftover unit, as a fraction of the catalog price
    disposal_cost: PenaltyDistribution,
}

impl Profile {
    /// Build a profile from an explicit cost table
    ///
    /// Every line must list a cost for each of `n_processes` processes and at
    /// least one entry must be finite and positive-or-zero.
    pub fn new(
        costs: Vec<Vec<i64>>,
        shortfall_penalty: PenaltyDistribution,
        disposal_cost: PenaltyDistribution,
    ) -> Result<Self, ConfigurationError> {
        let profile = Self {
            costs,
            shortfall_penalty,
            disposal_cost,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Re-check the cost table and penalty distributions
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let costs = &self.costs;
        if costs.is_empty() {
            return Err(ConfigurationError::NonPositive {
                what: "number of production lines".to_string(),
                value: 0,
            });
        }
        let n_processes = costs[0].len();
        for line in costs {
            if line.len() != n_processes {
                return Err(ConfigurationError::LengthMismatch {
                    what: "process costs per line",
                    expected: n_processes,
                    actual: line.len(),
                });
            }
            if let Some(&negative) = line.iter().find(|&&c| c < 0) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "production cost".to_string(),
                    reason: format!("negative cost {}", negative),
                });
            }
        }
        if !costs.iter().flatten().any(|&c| c != INFINITE_COST) {
            return Err(ConfigurationError::Invalid(
                "profile has no runnable (line, process) entry".to_string(),
            ));
        }
        for (name, dist) in [
            ("shortfall penalty", &self.shortfall_penalty),
            ("disposal cost", &self.disposal_cost),
        ] {
            let valid = |x: f64| x.is_finite() && x >= 0.0;
            if !valid(dist.mean) || !valid(dist.std_dev) {
                return Err(ConfigurationError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!(
                        "mean {} and std dev {} must be finite and non-negative",
                        dist.mean, dist.std_dev
                    ),
                });
            }
        }
        Ok(())
    }

    /// Profile where every line runs exactly `process` at `cost`
    pub fn single_process(
        n_lines: usize,
        n_processes: usize,
        process: usize,
        cost: i64,
    ) -> Result<Self, ConfigurationError> {
        if process >= n_processes {
            return Err(ConfigurationError::InvalidParameter {
                name: "process".to_string(),
                reason: format!("{} is not below {} processes", process, n_processes),
            });
        }
        let costs = (0..n_lines)
            .map(|_| {
                (0..n_processes)
                    .map(|p| if p == process { cost } else { INFINITE_COST })
                    .collect()
            })
            .collect();
        Self::new(costs, PenaltyDistribution::zero(), PenaltyDistribution::zero())
    }

    /// Replace the penalty distributions
    pub fn with_penalties(
        mut self,
        shortfall_penalty: PenaltyDistribution,
        disposal_cost: PenaltyDistribution,
    ) -> Self {
        self.shortfall_penalty = shortfall_penalty;
        self.disposal_cost = disposal_cost;
        self
    }

    pub fn n_lines(&self) -> usize {
        self.costs.len()
    }

    pub fn n_processes(&self) -> usize {
        self.costs.first().map(Vec::len).unwrap_or(0)
    }

    /// Raw cost table
    pub fn costs(&self) -> &[Vec<i64>] {
        &self.costs
    }

    /// Cost of `process` on `line`, `None` when not runnable
    pub fn cost(&self, line: usize, process: usize) -> Option<i64> {
        self.costs
            .get(line)
            .and_then(|l| l.get(process))
            .copied()
            .filter(|&c| c != INFINITE_COST)
    }

    /// Cheapest finite cost of `process` over all lines
    pub fn unit_cost(&self, process: usize) -> Option<i64> {
        (0..self.n_lines())
            .filter_map(|line| self.cost(line, process))
            .min()
    }

    /// Number of lines able to run `process` (one unit per line per step)
    pub fn capacity(&self, process: usize) -> usize {
        (0..self.n_lines())
            .filter(|&line| self.cost(line, process).is_some())
            .count()
    }

    /// Processes this profile can run at all
    pub fn runnable_processes(&self) -> Vec<usize> {
        (0..self.n_processes())
            .filter(|&p| self.capacity(p) > 0)
            .collect()
    }

    /// Total cost of producing `quantity` units of `process`, cheapest lines first
    ///
    /// Returns `None` when `quantity` exceeds the capacity.
    pub fn production_cost(&self, process: usize, quantity: usize) -> Option<i64> {
        let mut line_costs: Vec<i64> = (0..self.n_lines())
            .filter_map(|line| self.cost(line, process))
            .collect();
        if quantity > line_costs.len() {
            return None;
        }
        line_costs.sort_unstable();
        Some(line_costs.iter().take(quantity).sum())
    }

    pub fn shortfall_penalty(&self) -> PenaltyDistribution {
        self.shortfall_penalty
    }

    pub fn disposal_cost(&self) -> PenaltyDistribution {
        self.disposal_cost
    }
}
