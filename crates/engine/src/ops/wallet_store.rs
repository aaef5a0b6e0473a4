//! The wallet store: the only code that mutates a balance.
//!
//! Balances move through conditional `UPDATE`s (`balance >= amount` for
//! debits), so the database refuses an overdraft even if a caller got the
//! locking wrong. On top of that every mutating call takes a [`WalletLocks`]
//! proof, which serializes work per wallet inside this process.

use chrono::Utc;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, QueryFilter, QueryOrder, SqlErr,
    Statement, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    EngineError, KeyGuard, KeyedLocks, ResultEngine, TransferCmd, TxSource, TxType, Wallet,
    WalletTransaction,
    util::{ensure_positive, normalize_required_id},
    wallet_transactions, wallets,
};

use super::with_tx;

/// Platform account holding customer money between charge and payout.
pub const ESCROW_ACCOUNT: &str = "platform:escrow";

/// Both rows written by a transfer and the balances right after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub debit: WalletTransaction,
    pub credit: WalletTransaction,
    pub debit_balance: i64,
    pub credit_balance: i64,
}

/// Ledger work performed by a committed transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum LedgerEffect {
    None,
    /// Customer charged into escrow on accept.
    Charged(TransferReceipt),
    /// Provider paid for a completed booking.
    Settled {
        receipt: TransferReceipt,
        provider_share: i64,
        platform_fee: i64,
    },
    /// Customer refunded out of escrow.
    Refunded(TransferReceipt),
}

impl LedgerEffect {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Proof that the holder serializes mutations on a set of wallets.
///
/// Obtained from [`WalletStore::lock`]; released on drop.
#[derive(Debug)]
pub struct WalletLocks {
    guards: Vec<KeyGuard>,
}

impl WalletLocks {
    pub fn covers(&self, user_id: &str) -> bool {
        self.guards.iter().any(|guard| guard.key() == user_id)
    }

    fn require(&self, user_id: &str) -> ResultEngine<()> {
        if self.covers(user_id) {
            Ok(())
        } else {
            Err(EngineError::Conflict(format!(
                "wallet lock for {user_id} is not held"
            )))
        }
    }
}

#[derive(Clone, Debug)]
pub struct WalletStore {
    database: DatabaseConnection,
    locks: KeyedLocks,
}

impl WalletStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self {
            database,
            locks: KeyedLocks::new(),
        }
    }

    /// Lock the wallets of `user_ids` in ascending user id order.
    ///
    /// Take wallet locks before opening the database transaction that uses
    /// them.
    pub async fn lock(&self, user_ids: &[&str]) -> WalletLocks {
        WalletLocks {
            guards: self.locks.lock_many(user_ids.iter().copied()).await,
        }
    }

    /// Return the user's wallet, creating an empty one on first use.
    pub async fn get_or_create<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> ResultEngine<Wallet> {
        let user_id = normalize_required_id(user_id, "user_id")?;
        if let Some(model) = find_wallet(conn, &user_id).await? {
            return Wallet::try_from(model);
        }

        let wallet = Wallet::new(user_id.clone());
        // A concurrent creator may win the race; the unique user_id index
        // turns our insert into a no-op and the re-read returns theirs.
        wallets::Entity::insert(wallets::ActiveModel::from(&wallet))
            .on_conflict(
                OnConflict::column(wallets::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        let model = find_wallet(conn, &user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet for {user_id}")))?;
        Wallet::try_from(model)
    }

    /// Wallet for `user_id` on the store's own connection.
    pub async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        self.get_or_create(&self.database, user_id).await
    }

    /// Move money between two wallets inside `db_tx`.
    ///
    /// Fails with [`EngineError::InsufficientFunds`] when the debit side
    /// cannot cover `cmd.amount`; nothing is written in that case.
    pub async fn transfer(
        &self,
        db_tx: &DatabaseTransaction,
        locks: &WalletLocks,
        cmd: &TransferCmd,
    ) -> ResultEngine<TransferReceipt> {
        ensure_positive(cmd.amount, "amount")?;
        if cmd.credit_amount <= 0 || cmd.credit_amount > cmd.amount {
            return Err(EngineError::InvalidAmount(format!(
                "credit amount {} must be within 1..={}",
                cmd.credit_amount, cmd.amount
            )));
        }
        if cmd.debit_user_id == cmd.credit_user_id {
            return Err(EngineError::InvalidInput(
                "debit and credit wallets must differ".to_string(),
            ));
        }
        locks.require(&cmd.debit_user_id)?;
        locks.require(&cmd.credit_user_id)?;

        let debit_wallet = self.get_or_create(db_tx, &cmd.debit_user_id).await?;
        let credit_wallet = self.get_or_create(db_tx, &cmd.credit_user_id).await?;

        let debit_balance = debit_balance(db_tx, &debit_wallet, cmd.amount).await?;
        let credit_balance = credit_balance(db_tx, &credit_wallet, cmd.credit_amount).await?;

        let debit = insert_row(
            db_tx,
            WalletTransaction::new(
                debit_wallet.user_id.clone(),
                debit_wallet.id,
                cmd.amount,
                TxType::Debit,
                cmd.debit_source,
                cmd.booking_id,
            ),
        )
        .await?;
        let credit = insert_row(
            db_tx,
            WalletTransaction::new(
                credit_wallet.user_id.clone(),
                credit_wallet.id,
                cmd.credit_amount,
                TxType::Credit,
                cmd.credit_source,
                cmd.booking_id,
            ),
        )
        .await?;

        Ok(TransferReceipt {
            debit,
            credit,
            debit_balance,
            credit_balance,
        })
    }

    /// Return `amount` for `booking_id` from escrow to `user_id`.
    ///
    /// A booking is refunded at most once; a second call fails with
    /// [`EngineError::Conflict`].
    pub async fn refund(
        &self,
        db_tx: &DatabaseTransaction,
        locks: &WalletLocks,
        user_id: &str,
        amount: i64,
        booking_id: Uuid,
    ) -> ResultEngine<TransferReceipt> {
        if self
            .has_entry(db_tx, booking_id, user_id, TxType::Credit, TxSource::BookingRefund)
            .await?
        {
            return Err(EngineError::Conflict(format!(
                "booking {booking_id} already refunded"
            )));
        }
        let cmd = TransferCmd::new(ESCROW_ACCOUNT, user_id, amount, TxSource::BookingRefund)
            .booking_id(booking_id);
        self.transfer(db_tx, locks, &cmd).await
    }

    /// [`transfer`](Self::transfer) in its own lock scope and transaction.
    pub async fn transfer_atomic(&self, cmd: &TransferCmd) -> ResultEngine<TransferReceipt> {
        let locks = self
            .lock(&[cmd.debit_user_id.as_str(), cmd.credit_user_id.as_str()])
            .await;
        with_tx!(self, |db_tx| self.transfer(&db_tx, &locks, cmd).await)
    }

    /// [`refund`](Self::refund) in its own lock scope and transaction.
    pub async fn refund_atomic(
        &self,
        user_id: &str,
        amount: i64,
        booking_id: Uuid,
    ) -> ResultEngine<TransferReceipt> {
        let locks = self.lock(&[ESCROW_ACCOUNT, user_id]).await;
        with_tx!(self, |db_tx| {
            self.refund(&db_tx, &locks, user_id, amount, booking_id)
                .await
        })
    }

    /// Credit `amount` to the user's wallet from outside the ledger.
    pub async fn top_up(&self, user_id: &str, amount: i64) -> ResultEngine<WalletTransaction> {
        ensure_positive(amount, "amount")?;
        let user_id = normalize_required_id(user_id, "user_id")?;
        if user_id == ESCROW_ACCOUNT {
            return Err(EngineError::InvalidInput(
                "the escrow account cannot be topped up".to_string(),
            ));
        }

        let _locks = self.lock(&[user_id.as_str()]).await;
        with_tx!(self, |db_tx| {
            let wallet = self.get_or_create(&db_tx, &user_id).await?;
            credit_balance(&db_tx, &wallet, amount).await?;
            insert_row(
                &db_tx,
                WalletTransaction::new(
                    user_id.clone(),
                    wallet.id,
                    amount,
                    TxType::Credit,
                    TxSource::Topup,
                    None,
                ),
            )
            .await
        })
    }

    /// Ledger rows of a user, newest first.
    pub async fn list_transactions(&self, user_id: &str) -> ResultEngine<Vec<WalletTransaction>> {
        wallet_transactions::Entity::find()
            .filter(wallet_transactions::Column::UserId.eq(user_id))
            .order_by_desc(wallet_transactions::Column::CreatedAt)
            .order_by_desc(wallet_transactions::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(WalletTransaction::try_from)
            .collect()
    }

    /// Ledger rows referencing a booking, oldest first.
    pub async fn booking_transactions<C: ConnectionTrait>(
        &self,
        conn: &C,
        booking_id: Uuid,
    ) -> ResultEngine<Vec<WalletTransaction>> {
        wallet_transactions::Entity::find()
            .filter(wallet_transactions::Column::BookingId.eq(booking_id.to_string()))
            .order_by_asc(wallet_transactions::Column::CreatedAt)
            .order_by_asc(wallet_transactions::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(WalletTransaction::try_from)
            .collect()
    }

    /// Whether a row with this shape exists for the booking.
    pub async fn has_entry<C: ConnectionTrait>(
        &self,
        conn: &C,
        booking_id: Uuid,
        user_id: &str,
        kind: TxType,
        source: TxSource,
    ) -> ResultEngine<bool> {
        let found = wallet_transactions::Entity::find()
            .filter(wallet_transactions::Column::BookingId.eq(booking_id.to_string()))
            .filter(wallet_transactions::Column::UserId.eq(user_id))
            .filter(wallet_transactions::Column::Kind.eq(kind.as_str()))
            .filter(wallet_transactions::Column::Source.eq(source.as_str()))
            .one(conn)
            .await?;
        Ok(found.is_some())
    }
}

async fn find_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> ResultEngine<Option<wallets::Model>> {
    Ok(wallets::Entity::find()
        .filter(wallets::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn current_balance<C: ConnectionTrait>(conn: &C, wallet: &Wallet) -> ResultEngine<i64> {
    wallets::Entity::find_by_id(wallet.id.to_string())
        .one(conn)
        .await?
        .map(|model| model.balance)
        .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet.id)))
}

/// Subtract `amount`, refusing to go below zero. Returns the new balance.
async fn debit_balance<C: ConnectionTrait>(
    conn: &C,
    wallet: &Wallet,
    amount: i64,
) -> ResultEngine<i64> {
    let result = wallets::Entity::update_many()
        .col_expr(
            wallets::Column::Balance,
            Expr::col(wallets::Column::Balance).sub(amount),
        )
        .col_expr(wallets::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallets::Column::Id.eq(wallet.id.to_string()))
        .filter(wallets::Column::Balance.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let balance = current_balance(conn, wallet).await?;
        return Err(EngineError::InsufficientFunds(format!(
            "{} has {balance}, needs {amount}",
            wallet.user_id
        )));
    }
    current_balance(conn, wallet).await
}

/// Add `amount`. Returns the new balance.
async fn credit_balance<C: ConnectionTrait>(
    conn: &C,
    wallet: &Wallet,
    amount: i64,
) -> ResultEngine<i64> {
    let result = wallets::Entity::update_many()
        .col_expr(
            wallets::Column::Balance,
            Expr::col(wallets::Column::Balance).add(amount),
        )
        .col_expr(wallets::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallets::Column::Id.eq(wallet.id.to_string()))
        .filter(wallets::Column::Balance.lte(i64::MAX - amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(EngineError::InvalidAmount(format!(
            "crediting {amount} would overflow the wallet of {}",
            wallet.user_id
        )));
    }
    current_balance(conn, wallet).await
}

async fn insert_row<C: ConnectionTrait>(
    conn: &C,
    row: WalletTransaction,
) -> ResultEngine<WalletTransaction> {
    wallet_transactions::Entity::insert(wallet_transactions::ActiveModel::from(&row))
        .exec_without_returning(conn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => EngineError::Conflict(format!(
                "{} {} already recorded for booking {}",
                row.source.as_str(),
                row.kind.as_str(),
                row.booking_id
                    .map(|id| id.to_string())
                    .unwrap_or_default()
            )),
            _ => EngineError::Database(err),
        })?;
    Ok(row)
}

/// Ledger-wide sums used to audit conservation of money.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LedgerTotals {
    /// Sum of every wallet balance, escrow included.
    pub wallet_balances: i64,
    pub escrow_balance: i64,
    /// Completion debits minus completion credits.
    pub platform_fees: i64,
    pub top_ups: i64,
}

impl LedgerTotals {
    /// Money is only ever created by top-ups and only ever leaves as fees.
    pub fn is_balanced(&self) -> bool {
        self.wallet_balances + self.platform_fees == self.top_ups
    }
}

impl WalletStore {
    pub async fn totals(&self) -> ResultEngine<LedgerTotals> {
        let stmt = Statement::from_sql_and_values(
            self.database.get_database_backend(),
            "SELECT \
               (SELECT COALESCE(SUM(balance), 0) FROM wallets) AS wallet_balances, \
               (SELECT COALESCE(SUM(balance), 0) FROM wallets WHERE user_id = ?) AS escrow_balance, \
               (SELECT COALESCE(SUM(CASE WHEN type = ? THEN amount ELSE -amount END), 0) \
                  FROM wallet_transactions WHERE source = ?) AS platform_fees, \
               (SELECT COALESCE(SUM(amount), 0) \
                  FROM wallet_transactions WHERE source = ?) AS top_ups",
            vec![
                ESCROW_ACCOUNT.into(),
                TxType::Debit.as_str().into(),
                TxSource::BookingCompletion.as_str().into(),
                TxSource::Topup.as_str().into(),
            ],
        );
        let Some(row) = self.database.query_one(stmt).await? else {
            return Ok(LedgerTotals::default());
        };
        Ok(LedgerTotals {
            wallet_balances: row.try_get("", "wallet_balances")?,
            escrow_balance: row.try_get("", "escrow_balance")?,
            platform_fees: row.try_get("", "platform_fees")?,
            top_ups: row.try_get("", "top_ups")?,
        })
    }
}
