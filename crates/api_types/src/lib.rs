use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod booking {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BookingNew {
        pub provider_id: String,
        /// Price in minor units.
        pub price: i64,
        pub date_time: DateTime<Utc>,
    }

    /// Body of `PUT /booking/{id}/status`.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BookingStatusUpdate {
        pub status: String,
        /// Status the client last saw. The change is refused if the booking
        /// has moved on since.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub expected_status: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BookingView {
        pub id: Uuid,
        pub user_id: String,
        pub provider_id: String,
        pub price: i64,
        pub status: String,
        pub date_time: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BookingList {
        pub bookings: Vec<BookingView>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Earnings {
        pub completed_jobs: u64,
        pub total_earnings: i64,
        pub pending_earnings: i64,
        pub average_job_value: i64,
    }
}

pub mod wallet {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TopUp {
        /// Minor units; must be positive.
        pub amount: i64,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WalletBalance {
        pub user_id: String,
        pub balance: i64,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WalletTransactionView {
        pub id: Uuid,
        pub amount: i64,
        /// `CREDIT` or `DEBIT`.
        #[serde(rename = "type")]
        pub kind: String,
        pub source: String,
        pub booking_id: Option<Uuid>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletTransactionList {
        pub transactions: Vec<WalletTransactionView>,
    }
}

pub mod notification {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NotificationView {
        pub id: Uuid,
        pub message: String,
        #[serde(rename = "type")]
        pub kind: String,
        pub read: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationList {
        pub notifications: Vec<NotificationView>,
    }
}

pub mod error {
    use super::*;

    /// Error body returned by every endpoint.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ErrorBody {
        pub error: String,
        /// Stable machine-readable code, e.g. `INVALID_TRANSITION`.
        pub kind: String,
        /// Unchanged status of the booking after a refused transition.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub current_status: Option<String>,
    }
}
