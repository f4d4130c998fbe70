//! Bounded alternating-offers session
//!
//! Round `r` is proposed by the seller when `r` is even and by the buyer when
//! it is odd; the other side responds. The session ends on the first accepted
//! offer, on a withdrawal (no proposal, or an `End` response), or when the
//! round budget runs out.

use super::{Issues, NegotiationContext, Negotiator, Offer, Response, Role, SessionState};
use crate::error::NegotiationTimeoutError;
use crate::rng::RngManager;

/// One participant in a session
pub struct Participant<'a> {
    pub id: &'a str,
    pub negotiator: &'a mut dyn Negotiator,
    pub context: &'a NegotiationContext,
}

/// How a session concluded without running out of rounds
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Both sides agreed on `offer` after `rounds` rounds
    Agreed { offer: Offer, rounds: usize },
    /// A side walked away during `round`
    Withdrawn { round: usize },
}

/// Run one session to completion
///
/// Offers are clamped to `issues` before the partner sees them, so any
/// agreement lies within the issue bounds.
///
/// # Errors
///
/// `NegotiationTimeoutError` when `n_rounds` rounds pass without agreement.
pub fn run_session(
    session_id: &str,
    product: usize,
    issues: Issues,
    n_rounds: usize,
    seller: Participant<'_>,
    buyer: Participant<'_>,
    rng: &mut RngManager,
) -> Result<SessionOutcome, NegotiationTimeoutError> {
    let mut seller_state = SessionState {
        session_id: session_id.to_string(),
        round: 0,
        n_rounds,
        issues,
        product,
        role: Role::Seller,
        partner_id: buyer.id.to_string(),
    };
    let mut buyer_state = SessionState {
        role: Role::Buyer,
        partner_id: seller.id.to_string(),
        ..seller_state.clone()
    };

    for round in 0..n_rounds {
        seller_state.round = round;
        buyer_state.round = round;

        let seller_proposes = round % 2 == 0;
        let offer = if seller_proposes {
            seller
                .negotiator
                .propose(seller.context, &seller_state, rng)
        } else {
            buyer.negotiator.propose(buyer.context, &buyer_state, rng)
        };
        let offer = match offer {
            Some(offer) => issues.clamp(offer),
            None => return Ok(SessionOutcome::Withdrawn { round }),
        };

        let response = if seller_proposes {
            buyer
                .negotiator
                .respond(buyer.context, &buyer_state, &offer, rng)
        } else {
            seller
                .negotiator
                .respond(seller.context, &seller_state, &offer, rng)
        };
        match response {
            Response::Accept => {
                return Ok(SessionOutcome::Agreed {
                    offer,
                    rounds: round + 1,
                })
            }
            Response::End => return Ok(SessionOutcome::Withdrawn { round }),
            Response::Reject => {}
        }
    }

    Err(NegotiationTimeoutError {
        session_id: session_id.to_string(),
        rounds: n_rounds,
    })
}
