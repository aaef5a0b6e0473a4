//! Booking state machine.
//!
//! Pure decisions only: which edges exist, who may take them and what the
//! ledger has to do. The engine applies the outcome inside its database
//! transaction.
//!
//! ```text
//! PENDING ──accept──▶ ACCEPTED ──complete──▶ COMPLETED
//!    │                   │
//!    └──────cancel───────┴──────▶ CANCELLED
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Booking, BookingStatus, EngineError, ResultEngine};

/// When the customer's wallet is charged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargePolicy {
    /// The full price moves customer → provider when the booking completes.
    #[default]
    OnCompletion,
    /// The price is held in escrow from acceptance; completion pays the
    /// provider out of escrow and cancellation refunds the customer.
    OnAccept,
}

/// How the acting user relates to a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorRole {
    Customer,
    Provider,
    /// Operator allowed to close bookings on the provider's behalf.
    Closer,
}

/// Ledger work attached to a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerStep {
    None,
    /// Customer → escrow for the full price.
    Charge,
    /// Pay the provider their share; `from_escrow` when the price was already
    /// charged on accept.
    Settle { from_escrow: bool },
    /// Escrow → customer for the full price.
    Refund,
}

pub(crate) fn resolve_role(
    booking: &Booking,
    actor_id: &str,
    closers: &HashSet<String>,
) -> ResultEngine<ActorRole> {
    if actor_id == booking.provider_id {
        Ok(ActorRole::Provider)
    } else if actor_id == booking.user_id {
        Ok(ActorRole::Customer)
    } else if closers.contains(actor_id) {
        Ok(ActorRole::Closer)
    } else {
        Err(EngineError::Unauthorized(format!(
            "{actor_id} is not a party of booking {}",
            booking.id
        )))
    }
}

/// Check that `from -> to` is an edge of the lifecycle.
pub(crate) fn validate_edge(from: BookingStatus, to: BookingStatus) -> ResultEngine<()> {
    use BookingStatus::*;

    match (from, to) {
        (Pending, Accepted) | (Pending, Cancelled) | (Accepted, Completed) | (Accepted, Cancelled) => {
            Ok(())
        }
        _ => Err(EngineError::InvalidTransition { from, to }),
    }
}

/// Check that `role` may request a move into `to`.
pub(crate) fn authorize(role: ActorRole, to: BookingStatus) -> ResultEngine<()> {
    let allowed = match to {
        BookingStatus::Accepted => matches!(role, ActorRole::Provider),
        BookingStatus::Cancelled => matches!(role, ActorRole::Customer | ActorRole::Provider),
        BookingStatus::Completed => matches!(role, ActorRole::Provider | ActorRole::Closer),
        BookingStatus::Pending => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(EngineError::Unauthorized(format!(
            "{role:?} may not move a booking to {to}"
        )))
    }
}

/// Decide the ledger work for a validated edge.
///
/// `charged` and `refunded` describe what the ledger already holds for the
/// booking, read inside the same transaction.
pub(crate) fn plan(
    policy: ChargePolicy,
    from: BookingStatus,
    to: BookingStatus,
    charged: bool,
    refunded: bool,
) -> LedgerStep {
    use BookingStatus::*;

    match (from, to) {
        (Pending, Accepted) if policy == ChargePolicy::OnAccept && !charged => LedgerStep::Charge,
        (Accepted, Completed) => LedgerStep::Settle {
            from_escrow: charged,
        },
        (Accepted, Cancelled) if charged && !refunded => LedgerStep::Refund,
        _ => LedgerStep::None,
    }
}

/// Whether an edge can touch wallets at all under `policy`, before the
/// ledger has been read.
pub(crate) fn may_touch_ledger(
    policy: ChargePolicy,
    from: BookingStatus,
    to: BookingStatus,
) -> bool {
    use BookingStatus::*;

    match (from, to) {
        (Pending, Accepted) => policy == ChargePolicy::OnAccept,
        (Accepted, Completed) | (Accepted, Cancelled) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::BookingStatus::*;

    fn booking() -> Booking {
        Booking::new("cust".into(), "prov".into(), 1000, Utc::now())
    }

    #[test]
    fn only_four_edges_exist() {
        let mut allowed = Vec::new();
        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                if validate_edge(from, to).is_ok() {
                    allowed.push((from, to));
                }
            }
        }
        assert_eq!(
            allowed,
            vec![
                (Pending, Accepted),
                (Pending, Cancelled),
                (Accepted, Completed),
                (Accepted, Cancelled),
            ]
        );
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [Completed, Cancelled] {
            for to in BookingStatus::ALL {
                assert_eq!(
                    validate_edge(from, to),
                    Err(EngineError::InvalidTransition { from, to })
                );
            }
        }
    }

    #[test]
    fn roles_resolve_from_parties_then_closers() {
        let closers: HashSet<String> = ["ops".to_string()].into();
        let booking = booking();
        assert_eq!(
            resolve_role(&booking, "prov", &closers).unwrap(),
            ActorRole::Provider
        );
        assert_eq!(
            resolve_role(&booking, "cust", &closers).unwrap(),
            ActorRole::Customer
        );
        assert_eq!(
            resolve_role(&booking, "ops", &closers).unwrap(),
            ActorRole::Closer
        );
        assert!(matches!(
            resolve_role(&booking, "eve", &closers),
            Err(EngineError::Unauthorized(_))
        ));
    }

    #[test]
    fn edge_permissions() {
        assert!(authorize(ActorRole::Provider, Accepted).is_ok());
        assert!(authorize(ActorRole::Customer, Accepted).is_err());
        assert!(authorize(ActorRole::Closer, Accepted).is_err());

        assert!(authorize(ActorRole::Customer, Cancelled).is_ok());
        assert!(authorize(ActorRole::Provider, Cancelled).is_ok());
        assert!(authorize(ActorRole::Closer, Cancelled).is_err());

        assert!(authorize(ActorRole::Provider, Completed).is_ok());
        assert!(authorize(ActorRole::Closer, Completed).is_ok());
        assert!(authorize(ActorRole::Customer, Completed).is_err());
    }

    #[test]
    fn plan_on_completion_policy() {
        let policy = ChargePolicy::OnCompletion;
        assert_eq!(plan(policy, Pending, Accepted, false, false), LedgerStep::None);
        assert_eq!(
            plan(policy, Accepted, Completed, false, false),
            LedgerStep::Settle { from_escrow: false }
        );
        assert_eq!(plan(policy, Accepted, Cancelled, false, false), LedgerStep::None);
        assert_eq!(plan(policy, Pending, Cancelled, false, false), LedgerStep::None);
    }

    #[test]
    fn plan_on_accept_policy() {
        let policy = ChargePolicy::OnAccept;
        assert_eq!(plan(policy, Pending, Accepted, false, false), LedgerStep::Charge);
        assert_eq!(
            plan(policy, Accepted, Completed, true, false),
            LedgerStep::Settle { from_escrow: true }
        );
        assert_eq!(plan(policy, Accepted, Cancelled, true, false), LedgerStep::Refund);
        assert_eq!(plan(policy, Accepted, Cancelled, true, true), LedgerStep::None);
    }

    #[test]
    fn ledger_hint_covers_every_planned_step() {
        for policy in [ChargePolicy::OnCompletion, ChargePolicy::OnAccept] {
            for from in BookingStatus::ALL {
                for to in BookingStatus::ALL {
                    if validate_edge(from, to).is_err() {
                        continue;
                    }
                    for (charged, refunded) in [(false, false), (true, false), (true, true)] {
                        if plan(policy, from, to, charged, refunded) != LedgerStep::None {
                            assert!(may_touch_ledger(policy, from, to));
                        }
                    }
                }
            }
        }
    }
}
