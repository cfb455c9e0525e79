//! run サブコマンド
//!
//! 期限切れ削除と匿名化の定期タスクをCtrl-Cまで実行します。

use clap::Args;
use tracing::{info, warn};

use crate::config::Config;
use crate::shutdown::ShutdownController;
use crate::Ledgers;

/// run サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Skip the audit chain verification at startup
    #[arg(long)]
    pub skip_verify: bool,
}

/// run コマンドを実行
pub async fn execute(
    args: &RunArgs,
    config: &Config,
    ledgers: &Ledgers,
) -> Result<(), anyhow::Error> {
    if config.audit.verify_on_start && !args.skip_verify {
        let result = ledgers.audit.verify().await?;
        if result.valid {
            info!(
                entries_checked = result.entries_checked,
                "Audit log hash chain verification passed"
            );
        } else {
            warn!(
                tampered_sequence = ?result.tampered_sequence,
                message = ?result.message,
                "Audit log hash chain verification FAILED"
            );
        }
    }

    let shutdown = ShutdownController::new();
    let handles = ledgers.spawn_maintenance(config, &shutdown);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, waiting for maintenance tasks");
    shutdown.request_shutdown();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Maintenance task ended abnormally: {}", e);
        }
    }
    Ok(())
}
