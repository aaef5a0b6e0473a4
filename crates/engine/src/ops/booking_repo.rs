use chrono::Utc;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, QueryFilter, QueryOrder,
    QuerySelect, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Booking, BookingQuery, BookingStatus, CreateBookingCmd, EngineError, MIN_PRICE, Party,
    ResultEngine, bookings, util::normalize_required_id,
};

use super::ESCROW_ACCOUNT;

/// Storage for booking records.
#[derive(Clone, Debug)]
pub struct BookingRepository {
    database: DatabaseConnection,
}

impl BookingRepository {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    /// Insert a new `PENDING` booking.
    pub async fn create(&self, cmd: CreateBookingCmd) -> ResultEngine<Booking> {
        let user_id = normalize_required_id(&cmd.user_id, "user_id")?;
        let provider_id = normalize_required_id(&cmd.provider_id, "provider_id")?;
        if cmd.price < MIN_PRICE {
            return Err(EngineError::InvalidAmount(format!(
                "price must be at least {MIN_PRICE}"
            )));
        }
        if user_id == provider_id {
            return Err(EngineError::InvalidInput(
                "a user cannot book themselves".to_string(),
            ));
        }
        if user_id == ESCROW_ACCOUNT || provider_id == ESCROW_ACCOUNT {
            return Err(EngineError::InvalidInput(format!(
                "{ESCROW_ACCOUNT} is reserved"
            )));
        }

        let booking = Booking::new(user_id, provider_id, cmd.price, cmd.date_time);
        bookings::Entity::insert(bookings::ActiveModel::from(&booking))
            .exec_without_returning(&self.database)
            .await?;
        Ok(booking)
    }

    pub async fn load<C: ConnectionTrait>(&self, conn: &C, id: Uuid) -> ResultEngine<Booking> {
        bookings::Entity::find_by_id(id.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))
            .and_then(Booking::try_from)
    }

    /// Load inside `db_tx`, locking the row on backends that support it.
    pub async fn load_for_update(
        &self,
        db_tx: &DatabaseTransaction,
        id: Uuid,
    ) -> ResultEngine<Booking> {
        bookings::Entity::find_by_id(id.to_string())
            .lock_exclusive()
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))
            .and_then(Booking::try_from)
    }

    /// Write `status` if the row still carries `booking.version`.
    ///
    /// A concurrent writer that got there first makes this fail with
    /// [`EngineError::Conflict`] and the surrounding transaction rolls back.
    pub async fn persist_status(
        &self,
        db_tx: &DatabaseTransaction,
        booking: &Booking,
        status: BookingStatus,
    ) -> ResultEngine<Booking> {
        let now = Utc::now();
        let result = bookings::Entity::update_many()
            .col_expr(bookings::Column::Status, Expr::value(status.as_str()))
            .col_expr(bookings::Column::Version, Expr::value(booking.version + 1))
            .col_expr(bookings::Column::UpdatedAt, Expr::value(now))
            .filter(bookings::Column::Id.eq(booking.id.to_string()))
            .filter(bookings::Column::Version.eq(booking.version))
            .exec(db_tx)
            .await?;

        if result.rows_affected == 0 {
            return Err(EngineError::Conflict(format!(
                "booking {} changed concurrently",
                booking.id
            )));
        }

        Ok(Booking {
            status,
            version: booking.version + 1,
            updated_at: now,
            ..booking.clone()
        })
    }

    /// Bookings of one party, newest first.
    pub async fn list(&self, query: &BookingQuery) -> ResultEngine<Vec<Booking>> {
        let mut select = match &query.party {
            Party::Customer(user_id) => {
                bookings::Entity::find().filter(bookings::Column::UserId.eq(user_id.as_str()))
            }
            Party::Provider(provider_id) => bookings::Entity::find()
                .filter(bookings::Column::ProviderId.eq(provider_id.as_str())),
        };
        if let Some(status) = query.status {
            select = select.filter(bookings::Column::Status.eq(status.as_str()));
        }

        select
            .order_by_desc(bookings::Column::CreatedAt)
            .order_by_desc(bookings::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }
}
