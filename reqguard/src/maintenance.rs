//! 定期メンテナンスタスク
//!
//! 冪等レコードの期限切れ削除とIPアドレス匿名化を独立した間隔で実行する。
//! 停止要求を受けても実行中のスイープは最後まで完了させ、その後は次のtickを待たない。
//! スイープの失敗はログに記録し、次のtickで再試行する。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::audit::trail::AuditTrail;
use crate::common::error::GuardResult;
use crate::config::{AuditConfig, IdempotencyConfig};
use crate::idempotency::guard::IdempotencyGuard;
use crate::shutdown::ShutdownController;

/// 冪等レコードの期限切れ削除タスクを起動
pub fn spawn_idempotency_cleanup(
    guard: IdempotencyGuard,
    config: IdempotencyConfig,
    shutdown: ShutdownController,
) -> JoinHandle<()> {
    let expiry = config.expiry_chrono();
    tokio::spawn(run_periodic(
        "idempotency-cleanup",
        config.cleanup_interval,
        shutdown,
        move || {
            let guard = guard.clone();
            async move { guard.purge_expired(expiry).await }
        },
    ))
}

/// IPアドレス匿名化タスクを起動
pub fn spawn_ip_anonymization(
    trail: Arc<AuditTrail>,
    config: AuditConfig,
    shutdown: ShutdownController,
) -> JoinHandle<()> {
    tokio::spawn(run_periodic(
        "ip-anonymization",
        config.anonymize_interval,
        shutdown,
        move || {
            let trail = Arc::clone(&trail);
            async move { trail.anonymize_expired_ips().await }
        },
    ))
}

/// `period`ごとに`sweep`を実行する（初回は即時）
pub(crate) async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: ShutdownController,
    mut sweep: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = GuardResult<u64>> + Send,
{
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(task = name, period_secs = period.as_secs(), "Maintenance task started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = interval.tick() => {}
        }

        // スイープ自体は停止要求で中断しない
        // 件数は各スイープ側でログ出力する
        if let Err(e) = sweep().await {
            error!(task = name, error = %e, "Maintenance sweep failed");
        }

        if shutdown.is_shutdown_requested() {
            break;
        }
    }

    info!(task = name, "Maintenance task stopped");
}
