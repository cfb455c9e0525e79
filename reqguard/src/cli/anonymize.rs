//! anonymize サブコマンド
//!
//! 保持期間を過ぎた監査ログのIPアドレスを匿名化します。

use clap::Args;

use crate::Ledgers;

/// anonymize サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct AnonymizeArgs {}

/// anonymize コマンドを実行
pub async fn execute(_args: &AnonymizeArgs, ledgers: &Ledgers) -> Result<(), anyhow::Error> {
    let count = ledgers.audit.anonymize_expired_ips().await?;
    println!("Anonymized {} IP addresses", count);
    Ok(())
}
