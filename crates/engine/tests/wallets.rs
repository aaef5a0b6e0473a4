mod common;

use std::sync::Arc;

use sea_orm::TransactionTrait;

use common::{balance, engine_with_db};
use engine::{EngineError, ESCROW_ACCOUNT, TransferCmd, TxSource, TxType};

#[tokio::test]
async fn wallets_are_created_lazily_and_once() {
    let (engine, _db) = engine_with_db().await;

    let first = engine.wallet("carol").await.unwrap();
    let second = engine.wallet("carol").await.unwrap();

    assert_eq!(first.balance, 0);
    assert_eq!(first.id, second.id);
    assert!(matches!(
        engine.wallet("   ").await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn top_up_validates_amount_and_target() {
    let (engine, _db) = engine_with_db().await;

    assert!(matches!(
        engine.top_up("carol", 0).await,
        Err(EngineError::InvalidAmount(_))
    ));
    assert!(matches!(
        engine.top_up("carol", -5).await,
        Err(EngineError::InvalidAmount(_))
    ));
    assert!(matches!(
        engine.top_up(ESCROW_ACCOUNT, 100).await,
        Err(EngineError::InvalidInput(_))
    ));

    let tx = engine.top_up("carol", 750).await.unwrap();
    assert_eq!(tx.kind, TxType::Credit);
    assert_eq!(tx.source, TxSource::Topup);
    assert_eq!(tx.booking_id, None);
    assert_eq!(balance(&engine, "carol").await, 750);
}

#[tokio::test]
async fn transactions_are_listed_newest_first() {
    let (engine, _db) = engine_with_db().await;
    let first = engine.top_up("carol", 100).await.unwrap();
    let second = engine.top_up("carol", 200).await.unwrap();
    let third = engine.top_up("carol", 300).await.unwrap();

    let ids: Vec<_> = engine
        .wallet_transactions("carol")
        .await
        .unwrap()
        .into_iter()
        .map(|tx| tx.id)
        .collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
    assert!(engine.wallet_transactions("dave").await.unwrap().is_empty());
}

#[tokio::test]
async fn transfer_rejects_bad_commands() {
    let (engine, _db) = engine_with_db().await;
    let store = engine.wallet_store();
    engine.top_up("carol", 1000).await.unwrap();

    let zero = store
        .transfer_atomic(&TransferCmd::new("carol", "dave", 0, TxSource::Topup))
        .await;
    assert!(matches!(zero, Err(EngineError::InvalidAmount(_))));

    let inflated = store
        .transfer_atomic(
            &TransferCmd::new("carol", "dave", 100, TxSource::BookingCompletion)
                .credit_amount(101),
        )
        .await;
    assert!(matches!(inflated, Err(EngineError::InvalidAmount(_))));

    let same = store
        .transfer_atomic(&TransferCmd::new("carol", "carol", 100, TxSource::Topup))
        .await;
    assert!(matches!(same, Err(EngineError::InvalidInput(_))));

    let overdraft = store
        .transfer_atomic(&TransferCmd::new(
            "carol",
            "dave",
            1001,
            TxSource::BookingCompletion,
        ))
        .await;
    assert!(matches!(overdraft, Err(EngineError::InsufficientFunds(_))));

    assert_eq!(balance(&engine, "carol").await, 1000);
    assert_eq!(balance(&engine, "dave").await, 0);
}

#[tokio::test]
async fn transfer_requires_the_wallet_locks() {
    let (engine, db) = engine_with_db().await;
    let store = engine.wallet_store();
    engine.top_up("carol", 1000).await.unwrap();

    let locks = store.lock(&["carol"]).await;
    let db_tx = db.begin().await.unwrap();
    let result = store
        .transfer(
            &db_tx,
            &locks,
            &TransferCmd::new("carol", "dave", 10, TxSource::BookingCompletion),
        )
        .await;
    db_tx.rollback().await.unwrap();
    drop(locks);

    assert!(matches!(result, Err(EngineError::Conflict(_))));
    assert_eq!(balance(&engine, "carol").await, 1000);
}

#[tokio::test]
async fn transfer_with_fee_writes_both_rows() {
    let (engine, _db) = engine_with_db().await;
    let store = engine.wallet_store();
    engine.top_up("carol", 1000).await.unwrap();

    let receipt = store
        .transfer_atomic(
            &TransferCmd::new("carol", "dave", 1000, TxSource::BookingCompletion)
                .credit_amount(850),
        )
        .await
        .unwrap();

    assert_eq!(receipt.debit.amount, 1000);
    assert_eq!(receipt.credit.amount, 850);
    assert_eq!(receipt.debit_balance, 0);
    assert_eq!(receipt.credit_balance, 850);
    let totals = engine.ledger_totals().await.unwrap();
    assert_eq!(totals.platform_fees, 150);
    assert!(totals.is_balanced());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_top_ups_are_not_lost() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 1..=50 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.top_up("carol", i).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(balance(&engine, "carol").await, (1..=50).sum::<i64>());
    assert_eq!(engine.wallet_transactions("carol").await.unwrap().len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_overdraw() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);
    engine.top_up("carol", 1000).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let target = format!("payee-{i}");
            engine
                .wallet_store()
                .transfer_atomic(&TransferCmd::new(
                    "carol",
                    target,
                    100,
                    TxSource::BookingCompletion,
                ))
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EngineError::InsufficientFunds(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(balance(&engine, "carol").await, 0);
}
