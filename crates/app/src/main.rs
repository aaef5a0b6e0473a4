use std::sync::Arc;

use engine::RoomBroadcaster;
use migration::{Migrator, MigratorTrait};
use sea_orm::ConnectOptions;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "servicehub={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let Some(server) = settings.server else {
        tracing::warn!("no server settings found, nothing to run");
        return Ok(());
    };
    let ledger = settings.ledger;

    tasks.spawn(async move {
        tracing::info!("Found server settings...");
        let db = match connect(&server).await {
            Ok(db) => db,
            Err(err) => {
                tracing::error!("failed to initialize database: {err}");
                return;
            }
        };

        let broadcaster = ledger
            .broadcast_capacity
            .map(RoomBroadcaster::new)
            .unwrap_or_default();
        spawn_room_logger(&broadcaster);

        let engine = match engine::Engine::builder()
            .database(db)
            .broadcaster(Arc::new(broadcaster))
            .charge_policy(ledger.charge_policy)
            .closers(ledger.closers)
            .build()
            .await
        {
            Ok(engine) => engine,
            Err(err) => {
                tracing::error!("failed to build engine from database: {err}");
                return;
            }
        };
        tracing::info!(
            charge_policy = ?engine.charge_policy(),
            "engine ready"
        );

        let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
        let addr = format!("{}:{}", bind, server.port);
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!("failed to bind server listener: {err}");
                return;
            }
        };
        if let Err(err) = server::run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn connect(
    config: &settings::Server,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = ConnectOptions::new(config.database.url());
    // An in-memory database exists once per connection.
    let max_connections = if config.database.is_memory() {
        1
    } else {
        config.max_connections.unwrap_or(1)
    };
    options.max_connections(max_connections).sqlx_logging(false);

    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

/// Mirror realtime room events into the log at debug level.
fn spawn_room_logger(broadcaster: &RoomBroadcaster) {
    let mut receiver = broadcaster.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => tracing::debug!(
                    room = %event.room,
                    event = %event.event,
                    payload = %event.payload,
                    "room event"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "room logger lagged behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
