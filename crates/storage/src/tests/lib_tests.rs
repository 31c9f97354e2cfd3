use super::*;
use processor::{HandlerError, MarblesHandler, TransactionRequest};
use shared::{address::Namespace, domain::Marble, error::ErrorCode};

fn marbles() -> (MarblesHandler, Vec<String>) {
    let handler = MarblesHandler::new(Namespace::marbles());
    let namespaces = handler.namespaces();
    (handler, namespaces)
}

fn request(payload: &str) -> TransactionRequest {
    TransactionRequest::new(SignerPublicKey("02feed".into()), payload.as_bytes())
}

fn receipt(status: TransactionStatus, error: Option<ApiError>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_id: TransactionId::new(),
        family_name: "marbles".into(),
        family_version: "1.0".into(),
        signer_public_key: SignerPublicKey("02feed".into()),
        status,
        error,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("ledger.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn committed_transaction_is_visible_and_reports_changes() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let (handler, namespaces) = marbles();

    let mut tx = storage
        .begin_state_transaction(&namespaces)
        .await
        .expect("begin");
    handler
        .apply(&request("initMarble,alice_marble,blue,12,alice"), &mut tx)
        .await
        .expect("init");
    let changes = tx.commit().await.expect("commit");

    let address = handler
        .namespace()
        .address_for("alice_marble")
        .expect("address");
    assert_eq!(
        changes,
        vec![StoredChange {
            address: address.clone(),
            data: Some(b"alice_marble,blue,12,alice".to_vec()),
        }]
    );
    assert_eq!(
        storage.load_state(&address).await.expect("load"),
        Some(b"alice_marble,blue,12,alice".to_vec())
    );
}

#[tokio::test]
async fn rolled_back_transaction_leaves_no_trace() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let (handler, namespaces) = marbles();

    let mut tx = storage
        .begin_state_transaction(&namespaces)
        .await
        .expect("begin");
    handler
        .apply(&request("initMarble,m1,red,3,carol"), &mut tx)
        .await
        .expect("init");
    tx.rollback().await.expect("rollback");

    assert_eq!(storage.count_state_entries().await.expect("count"), 0);
}

#[tokio::test]
async fn duplicate_init_across_transactions_is_rejected() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let (handler, namespaces) = marbles();

    for attempt in 0..2 {
        let mut tx = storage
            .begin_state_transaction(&namespaces)
            .await
            .expect("begin");
        let outcome = handler
            .apply(&request("initMarble,m1,red,3,carol"), &mut tx)
            .await;
        if attempt == 0 {
            outcome.expect("first init");
            tx.commit().await.expect("commit");
        } else {
            assert_eq!(
                outcome.expect_err("duplicate"),
                HandlerError::DuplicateEntity { name: "m1".into() }
            );
            tx.rollback().await.expect("rollback");
        }
    }

    assert_eq!(storage.count_state_entries().await.expect("count"), 1);
}

#[tokio::test]
async fn transfer_and_delete_run_against_sqlite_state() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let (handler, namespaces) = marbles();

    for payload in [
        "initMarble,m1,red,3,carol",
        "transferMarble,m1,dave",
    ] {
        let mut tx = storage
            .begin_state_transaction(&namespaces)
            .await
            .expect("begin");
        handler.apply(&request(payload), &mut tx).await.expect(payload);
        tx.commit().await.expect("commit");
    }

    let mut tx = storage
        .begin_state_transaction(&namespaces)
        .await
        .expect("begin");
    let marble = handler
        .read_marble(&mut tx, "m1")
        .await
        .expect("read")
        .expect("exists");
    assert_eq!(marble, Marble::new("m1", "red", 3, "dave"));

    handler
        .apply(&request("deleteMarble,m1"), &mut tx)
        .await
        .expect("delete");
    let changes = tx.commit().await.expect("commit");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].data, None);
    assert_eq!(storage.count_state_entries().await.expect("count"), 0);
}

#[tokio::test]
async fn writes_outside_the_namespace_are_refused() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut tx = storage
        .begin_state_transaction(&["b98f57".to_string()])
        .await
        .expect("begin");

    let foreign = Namespace::new("intkey", "1.0")
        .address_for("m1")
        .expect("address");
    let err = tx
        .set_state(HashMap::from([(foreign.clone(), b"x".to_vec())]))
        .await
        .expect_err("outside namespace");
    assert_eq!(err, ContextError::OutsideNamespace(foreign));

    let err = tx
        .get_state(&["not-an-address".to_string()])
        .await
        .expect_err("bad address");
    assert!(matches!(err, ContextError::InvalidAddress(_)));
}

#[tokio::test]
async fn stores_and_loads_receipts() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let committed = receipt(TransactionStatus::Committed, None);
    let mut tx = storage
        .begin_state_transaction(&[])
        .await
        .expect("begin");
    tx.record_receipt(&committed, b"deleteMarble,m1")
        .await
        .expect("record in tx");
    tx.commit().await.expect("commit");

    let rejected = receipt(
        TransactionStatus::Invalid,
        Some(ApiError::new(ErrorCode::EntityNotFound, "marble \"m1\" does not exist")),
    );
    storage
        .record_receipt(&rejected, b"transferMarble,m1,bob")
        .await
        .expect("record");

    let loaded = storage
        .load_receipt(committed.transaction_id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(loaded.status, TransactionStatus::Committed);
    assert!(loaded.error.is_none());

    let loaded = storage
        .load_receipt(rejected.transaction_id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(loaded.status, TransactionStatus::Invalid);
    assert_eq!(
        loaded.error.map(|error| error.code),
        Some(ErrorCode::EntityNotFound)
    );

    assert!(storage
        .load_receipt(TransactionId::new())
        .await
        .expect("load")
        .is_none());
}

#[tokio::test]
async fn receipt_recorded_in_rolled_back_transaction_is_discarded() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let receipt = receipt(TransactionStatus::Committed, None);

    let mut tx = storage
        .begin_state_transaction(&[])
        .await
        .expect("begin");
    tx.record_receipt(&receipt, b"deleteMarble,m1")
        .await
        .expect("record");
    tx.rollback().await.expect("rollback");

    assert!(storage
        .load_receipt(receipt.transaction_id)
        .await
        .expect("load")
        .is_none());
}
