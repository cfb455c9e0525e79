//! reqguard
//!
//! リクエスト完全性と説明責任のレイヤー。
//! 冪等キーによる「高々1回実行」と、改ざん検知可能な追記専用監査証跡を提供する。

#![warn(missing_docs)]

/// 共通型定義（エラー・時計・IPアドレス）
pub mod common;

/// 冪等キーストア
pub mod idempotency;

/// 監査証跡
pub mod audit;

/// データベースアクセス
pub mod db;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// ロギング初期化ユーティリティ
pub mod logging;

/// Shutdown controller
pub mod shutdown;

/// 定期メンテナンスタスク
pub mod maintenance;

/// CLIインターフェース
pub mod cli;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::audit::trail::AuditTrail;
use crate::common::error::GuardResult;
use crate::config::Config;
use crate::db::audit_log::AuditLogStorage;
use crate::db::idempotency::IdempotencyStorage;
use crate::db::memory::{MemoryAuditLog, MemoryIdempotencyStore};
use crate::idempotency::guard::IdempotencyGuard;
use crate::shutdown::ShutdownController;

/// 冪等キーストアと監査証跡
///
/// 起動時に一度だけ構築し、利用者へ参照（クローン）で渡す。
#[derive(Clone)]
pub struct Ledgers {
    /// 冪等ガード
    pub idempotency: IdempotencyGuard,
    /// 監査証跡
    pub audit: Arc<AuditTrail>,
    /// データベース接続プール（インメモリ構成では`None`）
    pub db_pool: Option<sqlx::SqlitePool>,
}

impl Ledgers {
    /// インメモリ実装で構築
    pub fn in_memory() -> Self {
        Self {
            idempotency: IdempotencyGuard::new(Arc::new(MemoryIdempotencyStore::new())),
            audit: Arc::new(AuditTrail::new(Arc::new(MemoryAuditLog::new()))),
            db_pool: None,
        }
    }

    /// SQLiteに接続し、マイグレーションを適用して構築
    pub async fn connect(config: &Config) -> GuardResult<Self> {
        let pool = db::migrations::initialize_database(&config.database.url).await?;
        Ok(Self::from_pool(pool, config))
    }

    /// 既存のプールから構築
    pub fn from_pool(pool: sqlx::SqlitePool, config: &Config) -> Self {
        let idempotency = IdempotencyGuard::new(Arc::new(IdempotencyStorage::new(pool.clone())));
        let audit = AuditTrail::new(Arc::new(AuditLogStorage::new(pool.clone())))
            .with_retention_days(config.audit.ip_retention_days);
        Self {
            idempotency,
            audit: Arc::new(audit),
            db_pool: Some(pool),
        }
    }

    /// 期限切れ削除と匿名化のタスクを起動
    pub fn spawn_maintenance(
        &self,
        config: &Config,
        shutdown: &ShutdownController,
    ) -> Vec<JoinHandle<()>> {
        vec![
            maintenance::spawn_idempotency_cleanup(
                self.idempotency.clone(),
                config.idempotency,
                shutdown.clone(),
            ),
            maintenance::spawn_ip_anonymization(
                Arc::clone(&self.audit),
                config.audit,
                shutdown.clone(),
            ),
        ]
    }

    /// 接続プールを閉じる
    pub async fn close(&self) {
        if let Some(pool) = &self.db_pool {
            pool.close().await;
        }
    }
}
