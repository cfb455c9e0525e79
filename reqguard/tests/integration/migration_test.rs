//! マイグレーションの統合テスト

use reqguard::db::migrations::{initialize_database, run_migrations};

use crate::support::TestDatabase;

#[tokio::test]
async fn test_migrations_create_tables() {
    let db = TestDatabase::new();
    let pool = db.pool().await;

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '_sqlx%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
    assert!(names.contains(&"idempotency_records"));
    assert!(names.contains(&"audit_log_entries"));
}

#[tokio::test]
async fn test_migrations_are_rerunnable() {
    let db = TestDatabase::new();
    let pool = db.pool().await;
    run_migrations(&pool).await.unwrap();
    pool.close().await;

    // 既存ファイルに対する再初期化
    assert!(initialize_database(&db.url).await.is_ok());
}

#[tokio::test]
async fn test_initialize_creates_nested_directory() {
    let db = TestDatabase::new();
    let nested = db.dir.path().join("nested").join("dir").join("guard.db");
    let url = format!("sqlite:{}", nested.display());
    initialize_database(&url).await.unwrap();
    assert!(nested.exists());
}
