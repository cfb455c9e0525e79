//! 監査証跡
//!
//! 追記（ハッシュチェーン付与）、ユーザー単位のエクスポート、IPアドレス匿名化、
//! チェーン検証をまとめる。追記は「末尾読み取り → ハッシュ計算 → 追記」を
//! 1つのクリティカルセクションとして実行する。

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::anonymize::{
    ip_anonymization_cutoff_at, ANONYMIZATION_BATCH_SIZE, IP_ANONYMIZATION_RETENTION_DAYS,
};
use crate::audit::export::serialize_entries;
use crate::audit::hash_chain::{self, compute_entry_hash, ChainVerificationResult, GENESIS_HASH};
use crate::audit::types::{AuditLogFilter, ExportFormat, ExportOptions, LogEntry};
use crate::common::clock::{truncate_to_micros, Clock, SystemClock};
use crate::common::error::{GuardError, GuardResult};
use crate::common::ip::anonymize_ip;
use crate::db::traits::AuditLogRepository;

/// 他プロセスとの追記競合時の再試行回数
const MAX_APPEND_ATTEMPTS: usize = 3;

/// 監査証跡
pub struct AuditTrail {
    repo: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock>,
    retention_days: i64,
    append_lock: Mutex<()>,
}

impl AuditTrail {
    /// システム時計で作成
    pub fn new(repo: Arc<dyn AuditLogRepository>) -> Self {
        Self::with_clock(repo, Arc::new(SystemClock))
    }

    /// 時計を指定して作成
    pub fn with_clock(repo: Arc<dyn AuditLogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            retention_days: IP_ANONYMIZATION_RETENTION_DAYS,
            append_lock: Mutex::new(()),
        }
    }

    /// IPアドレス保持日数を変更
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// 保存先リポジトリ
    pub fn repository(&self) -> Arc<dyn AuditLogRepository> {
        Arc::clone(&self.repo)
    }

    /// エントリを確定してチェーン末尾に追記
    ///
    /// `id`と`timestamp`が未設定なら付与し、連番と`previous_hash`を計算する。
    /// 確定したエントリのコピーを返す。
    pub async fn log_access(&self, entry: LogEntry) -> GuardResult<LogEntry> {
        let _guard = self.append_lock.lock().await;

        let mut finalized = entry;
        finalized.id.get_or_insert_with(Uuid::new_v4);
        let timestamp = finalized.timestamp.unwrap_or_else(|| self.clock.now());
        finalized.timestamp = Some(truncate_to_micros(timestamp));
        finalized.ip_anonymized_at = None;

        let mut last_sequence = 0;
        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let tail = self.repo.latest().await?;
            let previous = tail
                .as_ref()
                .map(|e| e.previous_hash.as_str())
                .unwrap_or(GENESIS_HASH);

            finalized.sequence_number = tail.as_ref().map_or(1, |e| e.sequence_number + 1);
            finalized.previous_hash = compute_entry_hash(previous, &finalized);
            last_sequence = finalized.sequence_number;

            match self.repo.append(&finalized).await {
                Ok(()) => {
                    debug!(
                        sequence = finalized.sequence_number,
                        user_did = %finalized.user_did,
                        action = %finalized.action,
                        "Audit log entry appended"
                    );
                    return Ok(finalized);
                }
                Err(GuardError::ChainConflict(seq)) => {
                    warn!(
                        sequence = seq,
                        attempt,
                        "Audit chain tail moved during append, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(GuardError::ChainConflict(last_sequence))
    }

    /// ユーザー単位で監査ログをエクスポート
    ///
    /// ユーザー指定がない場合は`MissingUserScope`、未対応形式は`InvalidFormat`。
    pub async fn export(&self, options: &ExportOptions) -> GuardResult<Vec<u8>> {
        let user_did = options
            .user_did
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(GuardError::MissingUserScope)?;
        let format: ExportFormat = options.format.parse()?;

        let filter = AuditLogFilter {
            user_did: Some(user_did.to_string()),
            time_from: options.from,
            time_to: options.to,
            limit: options.limit,
        };
        let entries = self.repo.query(&filter).await?;

        info!(
            user_did = %user_did,
            format = ?format,
            count = entries.len(),
            "Exporting audit log"
        );
        serialize_entries(&entries, format)
    }

    /// 保持期間を過ぎたエントリのIPアドレスを匿名化
    ///
    /// 匿名化済みのエントリはスキップするため、何度実行してもよい。
    /// 今回匿名化した件数を返す。
    pub async fn anonymize_expired_ips(&self) -> GuardResult<u64> {
        let now = self.clock.now();
        let cutoff = ip_anonymization_cutoff_at(now, self.retention_days);
        let mut anonymized = 0u64;

        loop {
            let batch = self
                .repo
                .list_pending_anonymization(cutoff, ANONYMIZATION_BATCH_SIZE)
                .await?;
            let batch_len = batch.len();

            for entry in batch {
                let Some(id) = entry.id else {
                    continue;
                };
                let coarse = anonymize_ip(&entry.ip_address);
                if self.repo.mark_ip_anonymized(id, &coarse, now).await? {
                    anonymized += 1;
                }
            }

            if batch_len < ANONYMIZATION_BATCH_SIZE {
                break;
            }
        }

        if anonymized > 0 {
            info!(count = anonymized, cutoff = %cutoff, "Anonymized expired IP addresses");
        }
        Ok(anonymized)
    }

    /// ハッシュチェーンを検証（読み取り専用）
    pub async fn verify(&self) -> GuardResult<ChainVerificationResult> {
        hash_chain::verify_chain(self.repo.as_ref()).await
    }
}
