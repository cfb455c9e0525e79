//! cleanup サブコマンド
//!
//! 期限切れの冪等レコードを削除します。

use clap::Args;

use crate::config::IdempotencyConfig;
use crate::Ledgers;

/// cleanup サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Delete records older than this many seconds (default: configured expiry)
    #[arg(long)]
    pub older_than_secs: Option<u64>,
}

/// cleanup コマンドを実行
pub async fn execute(
    args: &CleanupArgs,
    config: &IdempotencyConfig,
    ledgers: &Ledgers,
) -> Result<(), anyhow::Error> {
    let expiry = match args.older_than_secs {
        Some(secs) => chrono::Duration::seconds(i64::try_from(secs)?),
        None => config.expiry_chrono(),
    };
    let removed = ledgers.idempotency.purge_expired(expiry).await?;
    println!("Removed {} expired idempotency records", removed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::guard::{BeginOutcome, IdempotentRequest};

    #[tokio::test]
    async fn test_cleanup_with_zero_age_removes_everything() {
        let ledgers = Ledgers::in_memory();
        let outcome = ledgers
            .idempotency
            .begin(&IdempotentRequest::new("k1", "POST", "/api/orders"))
            .await
            .unwrap();
        let BeginOutcome::Execute(reservation) = outcome else {
            panic!("expected Execute");
        };
        ledgers
            .idempotency
            .finish(reservation, 200, "ok", None)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        execute(
            &CleanupArgs {
                older_than_secs: Some(0),
            },
            &IdempotencyConfig::default(),
            &ledgers,
        )
        .await
        .unwrap();

        let outcome = ledgers
            .idempotency
            .begin(&IdempotentRequest::new("k1", "POST", "/api/orders"))
            .await
            .unwrap();
        assert!(matches!(outcome, BeginOutcome::Execute(_)));
    }
}
