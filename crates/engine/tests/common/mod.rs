#![allow(dead_code)]

use std::time::Duration;

use chrono::Utc;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use engine::{Booking, BookingStatus, CreateBookingCmd, Engine, EngineBuilder, TransitionCmd};
use migration::MigratorTrait;

pub const CUSTOMER: &str = "alice";
pub const PROVIDER: &str = "bob";

pub async fn database() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(120))
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with(|builder| builder).await
}

pub async fn engine_with(
    configure: impl FnOnce(EngineBuilder) -> EngineBuilder,
) -> (Engine, DatabaseConnection) {
    let db = database().await;
    let engine = configure(Engine::builder().database(db.clone()))
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn pending_booking(engine: &Engine, price: i64) -> Booking {
    engine
        .create_booking(CreateBookingCmd::new(CUSTOMER, PROVIDER, price, Utc::now()))
        .await
        .unwrap()
}

pub async fn accepted_booking(engine: &Engine, price: i64) -> Booking {
    let booking = pending_booking(engine, price).await;
    let booking = engine
        .apply_transition(TransitionCmd::new(booking.id, "ACCEPTED", PROVIDER))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Accepted);
    booking
}

pub async fn balance(engine: &Engine, user_id: &str) -> i64 {
    engine.wallet(user_id).await.unwrap().balance
}
