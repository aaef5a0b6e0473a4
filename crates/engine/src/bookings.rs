//! Booking primitives.
//!
//! A `Booking` ties a customer to a provider for a priced service. Its parties
//! and price never change after creation; only `status` moves, and only along
//! the edges the lifecycle allows.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        Self::Pending,
        Self::Accepted,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Terminal bookings never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BookingStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(EngineError::InvalidStatus(value.to_string())),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// The customer who placed the booking.
    pub user_id: String,
    pub provider_id: String,
    /// Price in minor units.
    pub price: i64,
    pub status: BookingStatus,
    /// When the service takes place; informational only.
    pub date_time: DateTime<Utc>,
    /// Bumped by every status write; used as a compare-and-set guard.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user_id: String,
        provider_id: String,
        price: i64,
        date_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            provider_id,
            price,
            status: BookingStatus::Pending,
            date_time,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if `actor_id` is the customer or the provider.
    pub fn is_party(&self, actor_id: &str) -> bool {
        self.user_id == actor_id || self.provider_id == actor_id
    }

    /// The other party of the booking, as seen from `actor_id`.
    pub fn counterparty(&self, actor_id: &str) -> Option<&str> {
        if actor_id == self.user_id {
            Some(&self.provider_id)
        } else if actor_id == self.provider_id {
            Some(&self.user_id)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub provider_id: String,
    pub price: i64,
    pub status: String,
    pub date_time: DateTimeUtc,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Booking> for ActiveModel {
    fn from(booking: &Booking) -> Self {
        Self {
            id: ActiveValue::Set(booking.id.to_string()),
            user_id: ActiveValue::Set(booking.user_id.clone()),
            provider_id: ActiveValue::Set(booking.provider_id.clone()),
            price: ActiveValue::Set(booking.price),
            status: ActiveValue::Set(booking.status.as_str().to_string()),
            date_time: ActiveValue::Set(booking.date_time),
            version: ActiveValue::Set(booking.version),
            created_at: ActiveValue::Set(booking.created_at),
            updated_at: ActiveValue::Set(booking.updated_at),
        }
    }
}

impl TryFrom<Model> for Booking {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "booking")?,
            status: BookingStatus::try_from(model.status.as_str())?,
            user_id: model.user_id,
            provider_id: model.provider_id,
            price: model.price,
            date_time: model.date_time,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
