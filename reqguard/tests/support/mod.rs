//! 統合テスト共通ヘルパー

use reqguard::config::Config;
use reqguard::db::migrations::initialize_database;
use reqguard::Ledgers;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// 一時ディレクトリ上のSQLiteデータベース
///
/// `TempDir`がdropされるとファイルも削除されるため、テスト中は保持しておく。
pub struct TestDatabase {
    pub dir: TempDir,
    pub url: String,
}

impl TestDatabase {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite:{}", dir.path().join("reqguard.db").display());
        Self { dir, url }
    }

    pub async fn pool(&self) -> SqlitePool {
        initialize_database(&self.url)
            .await
            .expect("Failed to initialize test database")
    }

    pub async fn ledgers(&self) -> Ledgers {
        let mut config = Config::default();
        config.database.url = self.url.clone();
        Ledgers::connect(&config)
            .await
            .expect("Failed to connect ledgers")
    }
}
