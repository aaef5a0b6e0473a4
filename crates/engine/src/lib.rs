//! Booking lifecycle and wallet ledger engine.
//!
//! The [`Engine`] moves a booking through its status states and, on the
//! transitions that carry money, settles the closed-loop wallet ledger in the
//! same database transaction as the status write. Notifications and realtime
//! broadcasts are produced as [`Effect`]s and delivered after commit.

pub use bookings::{Booking, BookingStatus};
pub use broadcast::{RoomBroadcaster, RoomEvent, RoomSubscription};
pub use commands::{BookingQuery, CreateBookingCmd, Party, TransferCmd, TransitionCmd};
pub use effects::{
    Broadcaster, DispatchReport, Effect, EffectDispatcher, NotificationSink, SinkError,
};
pub use error::{EngineError, ErrorKind};
pub use lifecycle::{ActorRole, ChargePolicy, LedgerStep};
pub use locks::{KeyGuard, KeyedLocks};
pub use money::{Amount, MIN_PRICE, PROVIDER_SHARE_PERCENT, Split, provider_split};
pub use notifications::{Notification, NotificationKind};
pub use ops::{
    BookingRepository, EarningsSummary, Engine, EngineBuilder, ESCROW_ACCOUNT, LedgerEffect,
    LedgerTotals, NotificationStore, Transition, TransferReceipt, WalletLocks, WalletStore,
};
pub use wallet_transactions::{TxSource, TxType, WalletTransaction};
pub use wallets::Wallet;

mod bookings;
mod broadcast;
mod commands;
mod effects;
mod error;
mod lifecycle;
mod locks;
mod money;
mod notifications;
mod ops;
mod util;
mod wallet_transactions;
mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
