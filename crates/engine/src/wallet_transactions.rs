//! Wallet ledger rows.
//!
//! Rows are append-only: the store inserts them next to the balance update
//! they describe and never edits or deletes them afterwards.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// Direction of a ledger row. `amount` is always a positive magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxType {
    Credit,
    Debit,
}

impl TxType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }
}

impl TryFrom<&str> for TxType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// Why money moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxSource {
    /// Customer charged when the booking is accepted (charge-on-accept).
    BookingPayment,
    /// Settlement of a completed booking.
    BookingCompletion,
    BookingRefund,
    Topup,
}

impl TxSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookingPayment => "BOOKING_PAYMENT",
            Self::BookingCompletion => "BOOKING_COMPLETION",
            Self::BookingRefund => "BOOKING_REFUND",
            Self::Topup => "TOPUP",
        }
    }
}

impl TryFrom<&str> for TxSource {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "BOOKING_PAYMENT" => Ok(Self::BookingPayment),
            "BOOKING_COMPLETION" => Ok(Self::BookingCompletion),
            "BOOKING_REFUND" => Ok(Self::BookingRefund),
            "TOPUP" => Ok(Self::Topup),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction source: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: String,
    pub wallet_id: Uuid,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TxType,
    pub source: TxSource,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn new(
        user_id: String,
        wallet_id: Uuid,
        amount: i64,
        kind: TxType,
        source: TxSource,
        booking_id: Option<Uuid>,
    ) -> Self {
        Self {
            // v7 ids sort by creation time, which keeps "newest first"
            // stable for rows sharing a timestamp.
            id: Uuid::now_v7(),
            user_id,
            wallet_id,
            amount,
            kind,
            source,
            booking_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    pub amount: i64,
    #[sea_orm(column_name = "type")]
    pub kind: String,
    pub source: String,
    pub booking_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&WalletTransaction> for ActiveModel {
    fn from(tx: &WalletTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            wallet_id: ActiveValue::Set(tx.wallet_id.to_string()),
            amount: ActiveValue::Set(tx.amount),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            source: ActiveValue::Set(tx.source.as_str().to_string()),
            booking_id: ActiveValue::Set(tx.booking_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for WalletTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            kind: TxType::try_from(model.kind.as_str())?,
            source: TxSource::try_from(model.source.as_str())?,
            booking_id: model
                .booking_id
                .as_deref()
                .map(|id| parse_uuid(id, "booking"))
                .transpose()?,
            user_id: model.user_id,
            amount: model.amount,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_strings_match_storage_values() {
        for source in [
            TxSource::BookingPayment,
            TxSource::BookingCompletion,
            TxSource::BookingRefund,
            TxSource::Topup,
        ] {
            assert_eq!(TxSource::try_from(source.as_str()).unwrap(), source);
        }
        assert!(TxSource::try_from("GIFT").is_err());
    }

    #[test]
    fn serializes_kind_as_type() {
        let tx = WalletTransaction::new(
            "alice".to_string(),
            Uuid::new_v4(),
            500,
            TxType::Credit,
            TxSource::Topup,
            None,
        );
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "CREDIT");
        assert_eq!(json["source"], "TOPUP");
    }
}
