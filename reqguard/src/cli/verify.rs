//! verify サブコマンド
//!
//! 監査ログのハッシュチェーンを検証します（読み取りのみ）。

use anyhow::bail;
use clap::Args;

use crate::Ledgers;

/// verify サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// verify コマンドを実行
pub async fn execute(args: &VerifyArgs, ledgers: &Ledgers) -> Result<(), anyhow::Error> {
    let result = ledgers.audit.verify().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.valid {
        println!("OK: {} entries verified", result.entries_checked);
    } else {
        println!(
            "FAILED at sequence {}: {}",
            result
                .tampered_sequence
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            result.message.as_deref().unwrap_or("hash chain broken")
        );
    }

    if !result.valid {
        bail!("audit log hash chain verification failed");
    }
    Ok(())
}
