use std::{collections::HashSet, sync::Arc};

use sea_orm::DatabaseConnection;

use crate::{
    Broadcaster, ChargePolicy, EffectDispatcher, KeyedLocks, NotificationSink, ResultEngine,
    RoomBroadcaster,
};

mod booking_repo;
mod notification_store;
mod queries;
mod transition;
mod wallet_store;

pub use booking_repo::BookingRepository;
pub use notification_store::NotificationStore;
pub use queries::EarningsSummary;
pub use transition::Transition;
pub use wallet_store::{
    ESCROW_ACCOUNT, LedgerEffect, LedgerTotals, TransferReceipt, WalletLocks, WalletStore,
};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The booking lifecycle engine.
///
/// Owns the booking repository and the wallet store, serializes transitions
/// per booking and hands committed effects to its dispatcher.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    bookings: BookingRepository,
    wallets: WalletStore,
    notifications: NotificationStore,
    booking_locks: KeyedLocks,
    dispatcher: EffectDispatcher,
    charge_policy: ChargePolicy,
    closers: HashSet<String>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn wallet_store(&self) -> &WalletStore {
        &self.wallets
    }

    pub fn booking_repository(&self) -> &BookingRepository {
        &self.bookings
    }

    pub fn notification_store(&self) -> &NotificationStore {
        &self.notifications
    }

    pub fn charge_policy(&self) -> ChargePolicy {
        self.charge_policy
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    charge_policy: ChargePolicy,
    closers: HashSet<String>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Where notifications go. Defaults to the database backed
    /// [`NotificationStore`].
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> EngineBuilder {
        self.notification_sink = Some(sink);
        self
    }

    /// Where realtime events go. Defaults to a [`RoomBroadcaster`] nobody
    /// listens to.
    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> EngineBuilder {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn charge_policy(mut self, policy: ChargePolicy) -> EngineBuilder {
        self.charge_policy = policy;
        self
    }

    /// Allow `actor_id` to complete bookings it is not a party of.
    pub fn closer(mut self, actor_id: impl Into<String>) -> EngineBuilder {
        self.closers.insert(actor_id.into());
        self
    }

    pub fn closers<I, S>(mut self, actor_ids: I) -> EngineBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.closers.extend(actor_ids.into_iter().map(Into::into));
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let notifications = NotificationStore::new(self.database.clone());
        let sink = self
            .notification_sink
            .unwrap_or_else(|| Arc::new(notifications.clone()));
        let broadcaster = self
            .broadcaster
            .unwrap_or_else(|| Arc::new(RoomBroadcaster::default()));

        Ok(Engine {
            bookings: BookingRepository::new(self.database.clone()),
            wallets: WalletStore::new(self.database.clone()),
            notifications,
            booking_locks: KeyedLocks::new(),
            dispatcher: EffectDispatcher::new(sink, broadcaster),
            charge_policy: self.charge_policy,
            closers: self.closers,
            database: self.database,
        })
    }
}
