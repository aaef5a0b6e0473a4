//! Read side of the engine plus wallet and notification pass-throughs.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    Booking, BookingQuery, BookingStatus, EngineError, Notification, ResultEngine, Wallet,
    WalletTransaction, money::provider_split,
};

use super::{Engine, LedgerTotals};

/// Provider earnings derived from their bookings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    pub completed_jobs: u64,
    /// Provider share of every completed booking.
    pub total_earnings: i64,
    /// Provider share of accepted bookings not completed yet.
    pub pending_earnings: i64,
    /// `total_earnings / completed_jobs`, floored; 0 without completed jobs.
    pub average_job_value: i64,
}

impl Engine {
    /// A booking, visible to its parties and to closers.
    pub async fn booking(&self, id: Uuid, actor_id: &str) -> ResultEngine<Booking> {
        let booking = self.bookings.load(&self.database, id).await?;
        if !booking.is_party(actor_id) && !self.closers.contains(actor_id) {
            return Err(EngineError::Unauthorized(format!(
                "{actor_id} may not view booking {id}"
            )));
        }
        Ok(booking)
    }

    /// Current status, without access checks. Used to report the unchanged
    /// state after a failed transition.
    pub async fn booking_status(&self, id: Uuid) -> ResultEngine<BookingStatus> {
        Ok(self.bookings.load(&self.database, id).await?.status)
    }

    pub async fn list_bookings(&self, query: &BookingQuery) -> ResultEngine<Vec<Booking>> {
        self.bookings.list(query).await
    }

    /// Bookings placed by `user_id`, newest first.
    pub async fn user_bookings(
        &self,
        user_id: &str,
        status: Option<BookingStatus>,
    ) -> ResultEngine<Vec<Booking>> {
        let mut query = BookingQuery::customer(user_id);
        query.status = status;
        self.bookings.list(&query).await
    }

    /// Jobs assigned to `provider_id`, newest first.
    pub async fn provider_jobs(
        &self,
        provider_id: &str,
        status: Option<BookingStatus>,
    ) -> ResultEngine<Vec<Booking>> {
        let mut query = BookingQuery::provider(provider_id);
        query.status = status;
        self.bookings.list(&query).await
    }

    pub async fn earnings_summary(&self, provider_id: &str) -> ResultEngine<EarningsSummary> {
        let jobs = self.provider_jobs(provider_id, None).await?;

        let add = |sum: i64, share: i64| {
            sum.checked_add(share).ok_or_else(|| {
                EngineError::InvalidAmount(format!("earnings of {provider_id} overflow"))
            })
        };

        let mut summary = EarningsSummary::default();
        for job in &jobs {
            match job.status {
                BookingStatus::Completed => {
                    summary.completed_jobs += 1;
                    summary.total_earnings = add(
                        summary.total_earnings,
                        provider_split(job.price)?.provider_share,
                    )?;
                }
                BookingStatus::Accepted => {
                    summary.pending_earnings = add(
                        summary.pending_earnings,
                        provider_split(job.price)?.provider_share,
                    )?;
                }
                BookingStatus::Pending | BookingStatus::Cancelled => {}
            }
        }
        if summary.completed_jobs > 0 {
            summary.average_job_value = summary.total_earnings / summary.completed_jobs as i64;
        }
        Ok(summary)
    }

    pub async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        self.wallets.wallet(user_id).await
    }

    pub async fn top_up(&self, user_id: &str, amount: i64) -> ResultEngine<WalletTransaction> {
        let tx = self.wallets.top_up(user_id, amount).await?;
        tracing::info!(user_id = %tx.user_id, amount, "wallet topped up");
        Ok(tx)
    }

    pub async fn wallet_transactions(&self, user_id: &str) -> ResultEngine<Vec<WalletTransaction>> {
        self.wallets.list_transactions(user_id).await
    }

    /// Every ledger row of a booking, oldest first.
    pub async fn booking_ledger(&self, id: Uuid) -> ResultEngine<Vec<WalletTransaction>> {
        self.wallets.booking_transactions(&self.database, id).await
    }

    pub async fn ledger_totals(&self) -> ResultEngine<LedgerTotals> {
        self.wallets.totals().await
    }

    pub async fn notifications(&self, user_id: &str) -> ResultEngine<Vec<Notification>> {
        self.notifications.list(user_id).await
    }

    pub async fn mark_notification_read(&self, user_id: &str, id: Uuid) -> ResultEngine<()> {
        self.notifications.mark_read(user_id, id).await
    }
}
