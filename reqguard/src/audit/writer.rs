//! 監査ログの非同期ライター（fail-open）
//!
//! 監査ログの失敗で業務処理を止めたくない呼び出し元向けの前段。
//! mpscチャネルでエントリを受信し、バックグラウンドタスクが順に`AuditTrail`へ追記する。
//! 失敗はログに記録するだけで、呼び出し元には返さない。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audit::trail::AuditTrail;
use crate::audit::types::LogEntry;
use crate::config::get_env_with_fallback_parse;

/// 監査ログライター設定
pub struct AuditLogWriterConfig {
    /// チャネル上限エントリ数。デフォルト: 10000
    pub buffer_capacity: usize,
}

impl Default for AuditLogWriterConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: get_env_with_fallback_parse(
                "REQGUARD_AUDIT_BUFFER_CAPACITY",
                "AUDIT_BUFFER_CAPACITY",
                10_000,
            )
            .max(1),
        }
    }
}

/// 監査ログの非同期ライター
///
/// Clone可能（senderのクローン）。全クローンがdropされると
/// 残りのエントリを書き込んでからタスクが終了する。
#[derive(Clone)]
pub struct AuditLogWriter {
    sender: mpsc::Sender<LogEntry>,
}

impl AuditLogWriter {
    /// 新しいAuditLogWriterを作成し、バックグラウンドタスクを起動
    pub fn new(trail: Arc<AuditTrail>, config: AuditLogWriterConfig) -> Self {
        Self::spawn(trail, config).0
    }

    /// ライターとバックグラウンドタスクのハンドルを返す
    pub fn spawn(trail: Arc<AuditTrail>, config: AuditLogWriterConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.buffer_capacity);
        let handle = tokio::spawn(Self::background_task(rx, trail));
        (Self { sender: tx }, handle)
    }

    /// エントリを送信（ブロックしない）
    ///
    /// チャネルが満杯または閉じている場合は破棄して`false`を返す。
    pub fn send(&self, entry: LogEntry) -> bool {
        match self.sender.try_send(entry) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send audit log entry: {}", e);
                false
            }
        }
    }

    async fn background_task(mut rx: mpsc::Receiver<LogEntry>, trail: Arc<AuditTrail>) {
        let mut written = 0u64;
        let mut failed = 0u64;

        // チャネルが閉じても、受信済みのエントリはすべて取り出してから終了する
        while let Some(entry) = rx.recv().await {
            let action = entry.action.clone();
            match trail.log_access(entry).await {
                Ok(_) => written += 1,
                Err(e) => {
                    failed += 1;
                    warn!(action = %action, error = %e, "Failed to write audit log entry");
                }
            }
        }

        info!(written, failed, "Audit log writer background task stopped");
    }
}
