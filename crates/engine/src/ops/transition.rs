//! Booking status transitions.
//!
//! Lock order, always: booking lock, then wallet locks (ascending user id),
//! then the database transaction. Nothing inside the transaction touches the
//! shared connection, so a single pooled connection cannot deadlock.

use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::Serialize;
use serde_json::json;

use crate::{
    Amount, Booking, BookingStatus, CreateBookingCmd, DispatchReport, Effect, EngineError,
    NotificationKind, ResultEngine, TransferCmd, TransitionCmd, TxSource, TxType,
    lifecycle::{self, ActorRole, LedgerStep},
    money::provider_split,
    util::normalize_required_id,
};

use super::{ESCROW_ACCOUNT, Engine, LedgerEffect, WalletLocks, with_tx};

/// Room receiving every status change, for dashboards.
const GLOBAL_ROOM: &str = "global";

/// Outcome of [`Engine::transition`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transition {
    pub booking: Booking,
    pub previous_status: BookingStatus,
    pub ledger: LedgerEffect,
    /// Effects to deliver now that the transition is committed.
    pub effects: Vec<Effect>,
    /// The booking already had the requested status; nothing was written.
    pub replayed: bool,
}

#[derive(Clone, Copy, Debug)]
struct Balances {
    customer: i64,
    provider: i64,
}

struct Committed {
    booking: Booking,
    previous_status: BookingStatus,
    ledger: LedgerEffect,
    balances: Option<Balances>,
    replayed: bool,
}

impl Committed {
    fn replay(booking: Booking) -> Self {
        Self {
            previous_status: booking.status,
            booking,
            ledger: LedgerEffect::None,
            balances: None,
            replayed: true,
        }
    }
}

impl Engine {
    pub async fn create_booking(&self, cmd: CreateBookingCmd) -> ResultEngine<Booking> {
        let booking = self.bookings.create(cmd).await?;
        tracing::info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            provider_id = %booking.provider_id,
            price = booking.price,
            "booking created"
        );
        Ok(booking)
    }

    /// Apply a status change and deliver its effects.
    ///
    /// Delivery failures are logged by the dispatcher and never turn a
    /// committed transition into an error.
    pub async fn apply_transition(&self, cmd: TransitionCmd) -> ResultEngine<Booking> {
        let transition = self.transition(cmd).await?;
        self.dispatch(&transition.effects).await;
        Ok(transition.booking)
    }

    pub async fn dispatch(&self, effects: &[Effect]) -> DispatchReport {
        let report = self.dispatcher.dispatch(effects).await;
        if report.failed > 0 {
            tracing::warn!(
                delivered = report.delivered,
                failed = report.failed,
                "some effects were not delivered"
            );
        }
        report
    }

    /// Validate and commit a status change.
    ///
    /// Ledger writes and the status write share one database transaction.
    /// The returned effects have not been delivered yet; pass them to
    /// [`Engine::dispatch`] or use [`Engine::apply_transition`].
    pub async fn transition(&self, cmd: TransitionCmd) -> ResultEngine<Transition> {
        let target = BookingStatus::try_from(cmd.status.as_str())?;
        let actor_id = normalize_required_id(&cmd.actor_id, "actor_id")?;

        let _booking_guard = self.booking_locks.lock(&cmd.booking_id.to_string()).await;

        // Parties never change, so this read is enough to authorize the actor
        // and pick the wallets to lock. Status is re-read in the transaction.
        let snapshot = self.bookings.load(&self.database, cmd.booking_id).await?;
        let role = lifecycle::resolve_role(&snapshot, &actor_id, &self.closers)?;
        if target == BookingStatus::Pending {
            return Err(EngineError::InvalidTransition {
                from: snapshot.status,
                to: target,
            });
        }

        let wallet_locks =
            if lifecycle::may_touch_ledger(self.charge_policy, snapshot.status, target) {
                Some(
                    self.wallets
                        .lock(&[
                            snapshot.user_id.as_str(),
                            snapshot.provider_id.as_str(),
                            ESCROW_ACCOUNT,
                        ])
                        .await,
                )
            } else {
                None
            };

        let committed: Committed = with_tx!(self, |db_tx| {
            self.transition_in_tx(&db_tx, wallet_locks.as_ref(), &cmd, target, role)
                .await
        })?;

        if committed.replayed {
            tracing::debug!(
                booking_id = %committed.booking.id,
                status = %committed.booking.status,
                actor = %actor_id,
                "transition replayed"
            );
        } else {
            tracing::info!(
                booking_id = %committed.booking.id,
                from = %committed.previous_status,
                to = %committed.booking.status,
                actor = %actor_id,
                "booking transitioned"
            );
        }

        let effects = if committed.replayed {
            Vec::new()
        } else {
            transition_effects(&committed, &actor_id)
        };

        Ok(Transition {
            booking: committed.booking,
            previous_status: committed.previous_status,
            ledger: committed.ledger,
            effects,
            replayed: committed.replayed,
        })
    }

    async fn transition_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        wallet_locks: Option<&WalletLocks>,
        cmd: &TransitionCmd,
        target: BookingStatus,
        role: ActorRole,
    ) -> ResultEngine<Committed> {
        let booking = self.bookings.load_for_update(db_tx, cmd.booking_id).await?;
        if booking.status == target {
            lifecycle::authorize(role, target)?;
            return Ok(Committed::replay(booking));
        }
        // A cancel without an observed status only applies to a pending booking.
        let expected = cmd
            .expected_status
            .or_else(|| (target == BookingStatus::Cancelled).then_some(BookingStatus::Pending));
        if let Some(expected) = expected
            && expected != booking.status
        {
            return Err(EngineError::InvalidTransition {
                from: booking.status,
                to: target,
            });
        }
        lifecycle::validate_edge(booking.status, target)?;
        lifecycle::authorize(role, target)?;

        let charged = self
            .wallets
            .has_entry(
                db_tx,
                booking.id,
                &booking.user_id,
                TxType::Debit,
                TxSource::BookingPayment,
            )
            .await?;
        let refunded = self
            .wallets
            .has_entry(
                db_tx,
                booking.id,
                &booking.user_id,
                TxType::Credit,
                TxSource::BookingRefund,
            )
            .await?;
        let step = lifecycle::plan(self.charge_policy, booking.status, target, charged, refunded);

        let ledger = self
            .apply_ledger_step(db_tx, wallet_locks, &booking, step)
            .await?;
        let balances = if ledger.is_none() {
            None
        } else {
            Some(Balances {
                customer: self
                    .wallets
                    .get_or_create(db_tx, &booking.user_id)
                    .await?
                    .balance,
                provider: self
                    .wallets
                    .get_or_create(db_tx, &booking.provider_id)
                    .await?
                    .balance,
            })
        };

        let updated = self.bookings.persist_status(db_tx, &booking, target).await?;
        Ok(Committed {
            booking: updated,
            previous_status: booking.status,
            ledger,
            balances,
            replayed: false,
        })
    }

    async fn apply_ledger_step(
        &self,
        db_tx: &DatabaseTransaction,
        wallet_locks: Option<&WalletLocks>,
        booking: &Booking,
        step: LedgerStep,
    ) -> ResultEngine<LedgerEffect> {
        if step == LedgerStep::None {
            return Ok(LedgerEffect::None);
        }
        let locks = wallet_locks.ok_or_else(|| {
            EngineError::Conflict(format!("wallets of booking {} are not locked", booking.id))
        })?;

        match step {
            LedgerStep::None => Ok(LedgerEffect::None),
            LedgerStep::Charge => {
                let cmd = TransferCmd::new(
                    &booking.user_id,
                    ESCROW_ACCOUNT,
                    booking.price,
                    TxSource::BookingPayment,
                )
                .booking_id(booking.id);
                let receipt = self.wallets.transfer(db_tx, locks, &cmd).await?;
                Ok(LedgerEffect::Charged(receipt))
            }
            LedgerStep::Settle { from_escrow } => {
                let split = provider_split(booking.price)?;
                let payer = if from_escrow {
                    ESCROW_ACCOUNT
                } else {
                    booking.user_id.as_str()
                };
                let cmd = TransferCmd::new(
                    payer,
                    &booking.provider_id,
                    booking.price,
                    TxSource::BookingCompletion,
                )
                .credit_amount(split.provider_share)
                .booking_id(booking.id);
                let receipt = self.wallets.transfer(db_tx, locks, &cmd).await?;
                Ok(LedgerEffect::Settled {
                    receipt,
                    provider_share: split.provider_share,
                    platform_fee: split.platform_fee,
                })
            }
            LedgerStep::Refund => {
                let receipt = self
                    .wallets
                    .refund(db_tx, locks, &booking.user_id, booking.price, booking.id)
                    .await?;
                Ok(LedgerEffect::Refunded(receipt))
            }
        }
    }
}

fn notify(user_id: &str, message: String, kind: NotificationKind) -> Effect {
    Effect::Notify {
        user_id: user_id.to_string(),
        message,
        kind,
    }
}

fn transition_effects(committed: &Committed, actor_id: &str) -> Vec<Effect> {
    let booking = &committed.booking;
    let id = booking.id;
    let price = Amount::new(booking.price);
    let mut effects = Vec::new();

    match booking.status {
        BookingStatus::Accepted => {
            effects.push(notify(
                &booking.user_id,
                format!("Your booking {id} has been accepted by the provider."),
                NotificationKind::Booking,
            ));
            if let (LedgerEffect::Charged(_), Some(balances)) =
                (&committed.ledger, committed.balances)
            {
                effects.push(notify(
                    &booking.user_id,
                    format!(
                        "{price} was charged for booking {id}. Wallet balance: {}.",
                        Amount::new(balances.customer)
                    ),
                    NotificationKind::Payment,
                ));
            }
        }
        BookingStatus::Completed => {
            if let (LedgerEffect::Settled { provider_share, .. }, Some(balances)) =
                (&committed.ledger, committed.balances)
            {
                effects.push(notify(
                    &booking.user_id,
                    format!(
                        "Booking {id} is complete. {price} was paid from your wallet. Wallet balance: {}.",
                        Amount::new(balances.customer)
                    ),
                    NotificationKind::Payment,
                ));
                effects.push(notify(
                    &booking.provider_id,
                    format!(
                        "Booking {id} is complete. {} was credited to your wallet. Wallet balance: {}.",
                        Amount::new(*provider_share),
                        Amount::new(balances.provider)
                    ),
                    NotificationKind::Payment,
                ));
            }
        }
        BookingStatus::Cancelled => {
            let message = format!("Booking {id} has been cancelled.");
            match booking.counterparty(actor_id) {
                Some(counterparty) if committed.previous_status == BookingStatus::Pending => {
                    effects.push(notify(counterparty, message, NotificationKind::Booking));
                }
                _ => {
                    effects.push(notify(
                        &booking.user_id,
                        message.clone(),
                        NotificationKind::Booking,
                    ));
                    effects.push(notify(
                        &booking.provider_id,
                        message,
                        NotificationKind::Booking,
                    ));
                }
            }
            if let (LedgerEffect::Refunded(_), Some(balances)) =
                (&committed.ledger, committed.balances)
            {
                effects.push(notify(
                    &booking.user_id,
                    format!(
                        "{price} was refunded for booking {id}. Wallet balance: {}.",
                        Amount::new(balances.customer)
                    ),
                    NotificationKind::Payment,
                ));
            }
        }
        BookingStatus::Pending => {}
    }

    effects.push(Effect::Broadcast {
        room: format!("booking-{id}"),
        event: "booking-status-changed".to_string(),
        payload: json!({
            "bookingId": id,
            "newStatus": booking.status,
            "updatedBy": actor_id,
            "timestamp": booking.updated_at.to_rfc3339(),
        }),
    });
    effects.push(Effect::Broadcast {
        room: GLOBAL_ROOM.to_string(),
        event: "global-booking-status-changed".to_string(),
        payload: json!({
            "bookingId": id,
            "status": booking.status,
            "userId": actor_id,
        }),
    });

    effects
}
