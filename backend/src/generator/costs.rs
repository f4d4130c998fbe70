//! Production costs, catalog prices and the feasibility check

use super::{CostSpec, ProfitMargins};
use crate::error::{ConfigurationError, FeasibilityError};
use crate::rng::RngManager;
use crate::topology::AgentSlot;

/// Nominal cost of each slot, in slot order
///
/// Scalar and range costs are multiplied by `level + 1` when
/// `increases_with_level` is set; an explicit per-agent list is used as is.
pub fn resolve_costs(
    spec: &CostSpec,
    slots: &[AgentSlot],
    increases_with_level: bool,
    rng: &mut RngManager,
) -> Result<Vec<i64>, ConfigurationError> {
    let nominal: Vec<i64> = match spec {
        CostSpec::Fixed(cost) => {
            if *cost <= 0 {
                return Err(ConfigurationError::NonPositive {
                    what: "production cost".to_string(),
                    value: *cost,
                });
            }
            vec![*cost; slots.len()]
        }
        CostSpec::PerAgent(costs) => {
            if costs.len() != slots.len() {
                return Err(ConfigurationError::LengthMismatch {
                    what: "production costs",
                    expected: slots.len(),
                    actual: costs.len(),
                });
            }
            if let Some(&bad) = costs.iter().find(|&&c| c <= 0) {
                return Err(ConfigurationError::NonPositive {
                    what: "production cost".to_string(),
                    value: bad,
                });
            }
            return Ok(costs.clone());
        }
        CostSpec::Range(lo, hi) => {
            if *lo <= 0 || lo > hi {
                return Err(ConfigurationError::InvalidRange {
                    what: "production cost",
                    lo: *lo,
                    hi: *hi,
                });
            }
            slots.iter().map(|_| rng.range_inclusive(*lo, *hi)).collect()
        }
    };

    if !increases_with_level {
        return Ok(nominal);
    }
    Ok(nominal
        .into_iter()
        .zip(slots)
        .map(|(cost, slot)| cost * (slot.level as i64 + 1))
        .collect())
}

/// Cheapest cost found on each level
pub fn min_cost_per_level(costs: &[i64], slots: &[AgentSlot], n_levels: usize) -> Vec<i64> {
    let mut mins = vec![i64::MAX; n_levels];
    for (cost, slot) in costs.iter().zip(slots) {
        mins[slot.level] = mins[slot.level].min(*cost);
    }
    mins
}

fn mean_cost_per_level(costs: &[i64], slots: &[AgentSlot], n_levels: usize) -> Vec<f64> {
    let mut sums = vec![0i64; n_levels];
    let mut counts = vec![0usize; n_levels];
    for (cost, slot) in costs.iter().zip(slots) {
        sums[slot.level] += cost;
        counts[slot.level] += 1;
    }
    sums.iter()
        .zip(&counts)
        .map(|(&s, &n)| if n == 0 { 0.0 } else { s as f64 / n as f64 })
        .collect()
}

/// Validate explicit catalog prices or derive them from the costs
///
/// Derived prices start at `raw_material_price` and each product adds the
/// mean cost of the level producing it, marked up by the mean margin.
pub fn catalog_prices(
    explicit: Option<&[i64]>,
    raw_material_price: i64,
    costs: &[i64],
    slots: &[AgentSlot],
    n_processes: usize,
    margins: &ProfitMargins,
) -> Result<Vec<i64>, ConfigurationError> {
    if let Some(prices) = explicit {
        if prices.len() != n_processes + 1 {
            return Err(ConfigurationError::LengthMismatch {
                what: "catalog prices",
                expected: n_processes + 1,
                actual: prices.len(),
            });
        }
        if let Some(&bad) = prices.iter().find(|&&p| p <= 0) {
            return Err(ConfigurationError::NonPositive {
                what: "catalog price".to_string(),
                value: bad,
            });
        }
        return Ok(prices.to_vec());
    }

    if raw_material_price <= 0 {
        return Err(ConfigurationError::NonPositive {
            what: "raw material price".to_string(),
            value: raw_material_price,
        });
    }
    let markup = 1.0 + margins.mean();
    let means = mean_cost_per_level(costs, slots, n_processes);
    let mut prices = Vec::with_capacity(n_processes + 1);
    prices.push(raw_material_price);
    for mean in means {
        let last = prices[prices.len() - 1];
        prices.push(last + (mean * markup).ceil() as i64);
    }
    Ok(prices)
}

/// Sale price bounds that leave every agent a profitable path
///
/// An agent at level `i` needs the final product to sell above
/// `p0 + cost(a) + sum of the cheapest cost of every other level`. Returns the
/// inclusive `(lo, hi)` range for exogenous sale prices.
///
/// # Errors
///
/// `FeasibilityError::UnprofitableAgent` for the most demanding agent when
/// the margin ceiling does not exceed its requirement.
pub fn sale_price_bounds(
    names: &[String],
    costs: &[i64],
    slots: &[AgentSlot],
    catalog: &[i64],
    margins: &ProfitMargins,
) -> Result<(i64, i64), FeasibilityError> {
    let n_levels = catalog.len() - 1;
    let mins = min_cost_per_level(costs, slots, n_levels);
    let p0 = catalog[0];
    let p_last = catalog[n_levels];
    let ceiling = (p_last as f64 * (1.0 + margins.max)).floor() as i64;

    let mut worst: Option<(usize, i64)> = None;
    for (i, (cost, slot)) in costs.iter().zip(slots).enumerate() {
        let others: i64 = mins
            .iter()
            .enumerate()
            .filter(|&(level, _)| level != slot.level)
            .map(|(_, &c)| c)
            .sum();
        let required = p0 + cost + others;
        if worst.map_or(true, |(_, r)| required > r) {
            worst = Some((i, required));
        }
    }

    let max_required = match worst {
        Some((i, required)) if ceiling <= required => {
            return Err(FeasibilityError::UnprofitableAgent {
                agent_id: names[i].clone(),
                level: slots[i].level,
                required,
                ceiling,
            });
        }
        Some((_, required)) => required,
        None => p0,
    };
    let floor = (p_last as f64 * (1.0 + margins.min)).floor() as i64;
    Ok((floor.max(max_required + 1).min(ceiling), ceiling))
}
