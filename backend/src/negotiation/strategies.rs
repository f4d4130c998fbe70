//! Reference strategies
//!
//! - **greedy**: asks for exactly what it still needs at the best price for
//!   its side, holds out until the last round, then takes any offer that does
//!   not exceed its needs
//! - **random**: proposes uniformly inside the issues, accepts with a fixed
//!   probability
//! - **do_nothing**: never trades

use super::{NegotiationContext, Negotiator, Offer, Proposer, Responder, Response, Role, SessionState};
use crate::error::ConfigurationError;
use crate::rng::RngManager;

/// Greedy one-shot strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyNegotiator;

impl GreedyNegotiator {
    pub fn new() -> Self {
        Self
    }
}

impl Proposer for GreedyNegotiator {
    fn propose(
        &mut self,
        ctx: &NegotiationContext,
        state: &SessionState,
        _rng: &mut RngManager,
    ) -> Option<Offer> {
        let needs = ctx.needs(state.role);
        if needs == 0 {
            return None;
        }
        let unit_price = match state.role {
            Role::Seller => state.issues.unit_price.1,
            Role::Buyer => state.issues.unit_price.0,
        };
        Some(Offer {
            quantity: needs,
            unit_price,
            delivery_step: state.issues.delivery_step.0,
        })
    }
}

impl Responder for GreedyNegotiator {
    fn respond(
        &mut self,
        ctx: &NegotiationContext,
        state: &SessionState,
        offer: &Offer,
        _rng: &mut RngManager,
    ) -> Response {
        let needs = ctx.needs(state.role);
        if needs == 0 {
            return Response::End;
        }
        if state.is_last_round() && offer.quantity <= needs {
            Response::Accept
        } else {
            Response::Reject
        }
    }
}

impl Negotiator for GreedyNegotiator {
    fn type_name(&self) -> &str {
        "greedy"
    }
}

/// Uniformly random strategy
#[derive(Debug, Clone, Copy)]
pub struct RandomNegotiator {
    p_accept: f64,
}

impl RandomNegotiator {
    pub const DEFAULT_P_ACCEPT: f64 = 0.15;

    /// # Errors
    ///
    /// `ConfigurationError::InvalidParameter` when `p_accept` is outside [0, 1]
    pub fn new(p_accept: f64) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&p_accept) {
            return Err(ConfigurationError::InvalidParameter {
                name: "p_accept".to_string(),
                reason: format!("{} is not a probability", p_accept),
            });
        }
        Ok(Self { p_accept })
    }

    pub fn p_accept(&self) -> f64 {
        self.p_accept
    }
}

impl Default for RandomNegotiator {
    fn default() -> Self {
        Self {
            p_accept: Self::DEFAULT_P_ACCEPT,
        }
    }
}

impl Proposer for RandomNegotiator {
    fn propose(
        &mut self,
        _ctx: &NegotiationContext,
        state: &SessionState,
        rng: &mut RngManager,
    ) -> Option<Offer> {
        let issues = &state.issues;
        let quantity =
            rng.range_inclusive(issues.quantity.0 as i64, issues.quantity.1 as i64) as usize;
        let unit_price = rng.range_inclusive(issues.unit_price.0, issues.unit_price.1);
        let delivery_step = rng.range_inclusive(
            issues.delivery_step.0 as i64,
            issues.delivery_step.1 as i64,
        ) as usize;
        Some(Offer {
            quantity,
            unit_price,
            delivery_step,
        })
    }
}

impl Responder for RandomNegotiator {
    fn respond(
        &mut self,
        _ctx: &NegotiationContext,
        _state: &SessionState,
        _offer: &Offer,
        rng: &mut RngManager,
    ) -> Response {
        if rng.next_f64() < self.p_accept {
            Response::Accept
        } else {
            Response::Reject
        }
    }
}

impl Negotiator for RandomNegotiator {
    fn type_name(&self) -> &str {
        "random"
    }
}

/// Ends every session immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct DoNothingNegotiator;

impl Proposer for DoNothingNegotiator {
    fn propose(&mut self, _: &NegotiationContext, _: &SessionState, _: &mut RngManager) -> Option<Offer> {
        None
    }
}

impl Responder for DoNothingNegotiator {
    fn respond(&mut self, _: &NegotiationContext, _: &SessionState, _: &Offer, _: &mut RngManager) -> Response {
        Response::End
    }
}

impl Negotiator for DoNothingNegotiator {
    fn type_name(&self) -> &str {
        "do_nothing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::tests::context;
    use crate::negotiation::Issues;

    fn state(role: Role, round: usize) -> SessionState {
        SessionState {
            session_id: "sess".to_string(),
            round,
            n_rounds: 5,
            issues: Issues::for_product(5, 20, 2, 4),
            product: 1,
            role,
            partner_id: "p".to_string(),
        }
    }

    #[test]
    fn test_greedy_asks_best_price_for_its_side() {
        let mut rng = RngManager::new(3);
        let mut seller_ctx = context(0, 2);
        seller_ctx.exogenous_input = 3;
        let offer = GreedyNegotiator
            .propose(&seller_ctx, &state(Role::Seller, 0), &mut rng)
            .unwrap();
        assert_eq!(
            offer,
            Offer {
                quantity: 3,
                unit_price: 40,
                delivery_step: 2
            }
        );

        let mut buyer_ctx = context(1, 2);
        buyer_ctx.exogenous_output = 2;
        let offer = GreedyNegotiator
            .propose(&buyer_ctx, &state(Role::Buyer, 1), &mut rng)
            .unwrap();
        assert_eq!(offer.unit_price, 10);
        assert_eq!(offer.quantity, 2);
    }

    #[test]
    fn test_greedy_holds_out_until_last_round() {
        let mut rng = RngManager::new(3);
        let mut ctx = context(1, 2);
        ctx.exogenous_output = 4;
        let offer = Offer {
            quantity: 4,
            unit_price: 30,
            delivery_step: 2,
        };
        let mut greedy = GreedyNegotiator::new();
        assert_eq!(greedy.respond(&ctx, &state(Role::Buyer, 0), &offer, &mut rng), Response::Reject);
        assert_eq!(greedy.respond(&ctx, &state(Role::Buyer, 4), &offer, &mut rng), Response::Accept);

        let too_much = Offer { quantity: 5, ..offer };
        assert_eq!(greedy.respond(&ctx, &state(Role::Buyer, 4), &too_much, &mut rng), Response::Reject);
    }

    #[test]
    fn test_greedy_ends_when_satisfied() {
        let mut rng = RngManager::new(3);
        let ctx = context(1, 2);
        let offer = Offer {
            quantity: 1,
            unit_price: 20,
            delivery_step: 2,
        };
        assert_eq!(
            GreedyNegotiator.respond(&ctx, &state(Role::Buyer, 0), &offer, &mut rng),
            Response::End
        );
        assert_eq!(GreedyNegotiator.propose(&ctx, &state(Role::Buyer, 0), &mut rng), None);
    }

    #[test]
    fn test_random_offers_stay_inside_issues() {
        let mut rng = RngManager::new(99);
        let ctx = context(0, 2);
        let s = state(Role::Seller, 0);
        let mut random = RandomNegotiator::default();
        for _ in 0..200 {
            let offer = random.propose(&ctx, &s, &mut rng).unwrap();
            assert!(s.issues.contains(&offer));
        }
    }

    #[test]
    fn test_random_acceptance_extremes() {
        let mut rng = RngManager::new(5);
        let ctx = context(0, 2);
        let s = state(Role::Seller, 0);
        let offer = Offer {
            quantity: 1,
            unit_price: 20,
            delivery_step: 2,
        };
        let mut always = RandomNegotiator::new(1.0).unwrap();
        let mut never = RandomNegotiator::new(0.0).unwrap();
        for _ in 0..50 {
            assert_eq!(always.respond(&ctx, &s, &offer, &mut rng), Response::Accept);
            assert_eq!(never.respond(&ctx, &s, &offer, &mut rng), Response::Reject);
        }
        assert!(RandomNegotiator::new(1.5).is_err());
    }
}
