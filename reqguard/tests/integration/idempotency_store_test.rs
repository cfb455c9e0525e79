//! 冪等キーストアの統合テスト（ファイルDB、複数接続）

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqguard::common::error::GuardError;
use reqguard::db::idempotency::IdempotencyStorage;
use reqguard::db::traits::IdempotencyRepository;
use reqguard::idempotency::guard::{BeginOutcome, IdempotencyGuard, IdempotentRequest};
use reqguard::idempotency::types::IdempotencyRecord;

use crate::support::TestDatabase;

#[tokio::test]
async fn test_concurrent_begin_across_connections_has_single_executor() {
    let db = TestDatabase::new();
    let pool = db.pool().await;
    let guard = IdempotencyGuard::new(Arc::new(IdempotencyStorage::new(pool)));
    let executed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let guard = guard.clone();
        let executed = Arc::clone(&executed);
        handles.push(tokio::spawn(async move {
            let request = IdempotentRequest::new("order-42", "POST", "/api/checkout")
                .with_body(br#"{"amount":1000}"#);
            match guard.begin(&request).await {
                Ok(BeginOutcome::Execute(reservation)) => {
                    executed.fetch_add(1, Ordering::SeqCst);
                    guard
                        .finish(reservation, 201, r#"{"id":"pay_42"}"#, Some("pay_42".to_string()))
                        .await
                        .unwrap();
                }
                Ok(BeginOutcome::Replay(cached)) => {
                    assert_eq!(cached.status_code, 201);
                }
                Err(GuardError::KeyInProgress(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(executed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_records_survive_reconnect() {
    let db = TestDatabase::new();
    {
        let storage = IdempotencyStorage::new(db.pool().await);
        let mut record =
            IdempotencyRecord::completed("persist-1", "POST", "/api/checkout", 201, "created");
        record.payment_ref = Some("pay_1".to_string());
        storage.store(&record).await.unwrap();
    }

    let storage = IdempotencyStorage::new(db.pool().await);
    let fetched = storage.get("persist-1").await.unwrap();
    assert_eq!(fetched.response_body, "created");
    assert_eq!(fetched.payment_ref.as_deref(), Some("pay_1"));
    assert!(fetched.created_at.is_some());
}

#[tokio::test]
async fn test_completed_record_cannot_be_overwritten_by_sql() {
    let db = TestDatabase::new();
    let pool = db.pool().await;
    let storage = IdempotencyStorage::new(pool.clone());
    storage
        .store(&IdempotencyRecord::completed("fixed", "POST", "/api/checkout", 200, "original"))
        .await
        .unwrap();

    let result = sqlx::query("UPDATE idempotency_records SET response_body = 'changed' WHERE key = 'fixed'")
        .execute(&pool)
        .await;
    assert!(result.is_err());
    assert_eq!(storage.get("fixed").await.unwrap().response_body, "original");
}
