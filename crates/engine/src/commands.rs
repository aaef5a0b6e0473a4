//! Command structs for engine operations.
//!
//! These types group parameters for write and list operations, keeping call
//! sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{BookingStatus, TxSource};

/// Create a booking in `PENDING`.
#[derive(Clone, Debug)]
pub struct CreateBookingCmd {
    pub user_id: String,
    pub provider_id: String,
    pub price: i64,
    pub date_time: DateTime<Utc>,
}

impl CreateBookingCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        provider_id: impl Into<String>,
        price: i64,
        date_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            provider_id: provider_id.into(),
            price,
            date_time,
        }
    }
}

/// Request a booking status change on behalf of `actor_id`.
///
/// `status` is kept as the raw requested value so unknown states surface as
/// [`EngineError::InvalidStatus`](crate::EngineError::InvalidStatus) from the
/// engine itself.
#[derive(Clone, Debug)]
pub struct TransitionCmd {
    pub booking_id: Uuid,
    pub status: String,
    pub actor_id: String,
    /// Status the caller last observed. When set, the transition is refused
    /// if the booking moved on in the meantime. A `CANCELLED` request
    /// without one is treated as expecting `PENDING`, so cancelling an
    /// accepted booking has to name `ACCEPTED` explicitly.
    pub expected_status: Option<BookingStatus>,
}

impl TransitionCmd {
    #[must_use]
    pub fn new(booking_id: Uuid, status: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            booking_id,
            status: status.into(),
            actor_id: actor_id.into(),
            expected_status: None,
        }
    }

    #[must_use]
    pub fn expecting(mut self, status: BookingStatus) -> Self {
        self.expected_status = Some(status);
        self
    }
}

/// Move `amount` from one wallet to another.
///
/// `credit_amount` defaults to `amount`; a smaller credit leaves the
/// difference with the platform (the fee).
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub debit_user_id: String,
    pub credit_user_id: String,
    pub amount: i64,
    pub credit_amount: i64,
    pub booking_id: Option<Uuid>,
    pub debit_source: TxSource,
    pub credit_source: TxSource,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        debit_user_id: impl Into<String>,
        credit_user_id: impl Into<String>,
        amount: i64,
        source: TxSource,
    ) -> Self {
        Self {
            debit_user_id: debit_user_id.into(),
            credit_user_id: credit_user_id.into(),
            amount,
            credit_amount: amount,
            booking_id: None,
            debit_source: source,
            credit_source: source,
        }
    }

    #[must_use]
    pub fn credit_amount(mut self, credit_amount: i64) -> Self {
        self.credit_amount = credit_amount;
        self
    }

    #[must_use]
    pub fn booking_id(mut self, booking_id: Uuid) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    #[must_use]
    pub fn credit_source(mut self, source: TxSource) -> Self {
        self.credit_source = source;
        self
    }
}

/// Which side of a booking a listing is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Party {
    Customer(String),
    Provider(String),
}

/// List bookings for one party, newest first.
#[derive(Clone, Debug)]
pub struct BookingQuery {
    pub party: Party,
    pub status: Option<BookingStatus>,
}

impl BookingQuery {
    #[must_use]
    pub fn customer(user_id: impl Into<String>) -> Self {
        Self {
            party: Party::Customer(user_id.into()),
            status: None,
        }
    }

    #[must_use]
    pub fn provider(provider_id: impl Into<String>) -> Self {
        Self {
            party: Party::Provider(provider_id.into()),
            status: None,
        }
    }

    #[must_use]
    pub fn status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }
}
