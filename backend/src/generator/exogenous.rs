//! Exogenous supply and sale contracts

use super::RevelationPolicy;
use crate::error::ConfigurationError;
use crate::models::contract::{ExogenousContract, Party};
use crate::rng::RngManager;
use crate::topology::integer_cut_bounded;

/// The agents at both ends of the chain, with their capacities
pub struct ChainEnds<'a> {
    pub first_level: Vec<(&'a str, usize)>,
    pub last_level: Vec<(&'a str, usize)>,
    /// Product sold to the environment (`n_processes`)
    pub final_product: usize,
}

impl RevelationPolicy {
    /// Revelation step of a contract of the given side delivered at `delivery`
    pub fn revelation_step(&self, is_supply: bool, delivery: usize) -> usize {
        match self {
            RevelationPolicy::Default => {
                if is_supply {
                    0
                } else {
                    delivery.saturating_sub(1)
                }
            }
            RevelationPolicy::Lead { supply, sale } => {
                let lead = if is_supply { *supply } else { *sale };
                delivery.saturating_sub(lead)
            }
            RevelationPolicy::AtDelivery => delivery,
        }
    }
}

/// Generate every exogenous contract of the horizon
///
/// Each step, every first-level agent gets a supply of `U[1, capacity]` units
/// at `supply_price`. The step's total (at least one unit per last-level
/// agent) is split over the last-level agents, at least one unit each and at
/// most their capacity, as sales priced in `sale_prices`.
pub fn generate_contracts(
    ends: &ChainEnds<'_>,
    horizon: usize,
    supply_price: i64,
    sale_prices: (i64, i64),
    revelation: &RevelationPolicy,
    rng: &mut RngManager,
) -> Result<Vec<ExogenousContract>, ConfigurationError> {
    let mut contracts = Vec::new();
    let mut next_id = 0usize;
    let mut new_id = || {
        next_id += 1;
        format!("exo_{:06}", next_id)
    };

    let sale_mins = vec![1; ends.last_level.len()];
    let sale_caps: Vec<usize> = ends.last_level.iter().map(|&(_, cap)| cap).collect();

    for step in 0..horizon {
        let mut total = 0usize;
        for &(agent, capacity) in &ends.first_level {
            let quantity = rng.range_inclusive(1, capacity.max(1) as i64) as usize;
            total += quantity;
            contracts.push(ExogenousContract::new(
                new_id(),
                0,
                quantity,
                supply_price,
                step,
                revelation.revelation_step(true, step),
                Party::Environment,
                Party::agent(agent),
            )?);
        }

        let sale_total = total.max(ends.last_level.len());
        let split = integer_cut_bounded(sale_total, &sale_mins, Some(&sale_caps), rng)?;
        for (&(agent, _), quantity) in ends.last_level.iter().zip(split) {
            let unit_price = rng.range_inclusive(sale_prices.0, sale_prices.1);
            contracts.push(ExogenousContract::new(
                new_id(),
                ends.final_product,
                quantity,
                unit_price,
                step,
                revelation.revelation_step(false, step),
                Party::agent(agent),
                Party::Environment,
            )?);
        }
    }
    Ok(contracts)
}
