//! export サブコマンド
//!
//! 指定ユーザーの監査ログをCSVまたはJSONで出力します。

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;

use crate::audit::types::ExportOptions;
use crate::Ledgers;

/// export サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// User DID to export (required)
    #[arg(short, long)]
    pub user: String,

    /// Output format (csv or json)
    #[arg(short, long, default_value = "csv")]
    pub format: String,

    /// Start of the range, inclusive (RFC 3339)
    #[arg(long, value_parser = super::parse_datetime)]
    pub from: Option<DateTime<Utc>>,

    /// End of the range, exclusive (RFC 3339)
    #[arg(long, value_parser = super::parse_datetime)]
    pub to: Option<DateTime<Utc>>,

    /// Maximum number of entries
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    fn to_options(&self) -> ExportOptions {
        ExportOptions {
            format: self.format.clone(),
            user_did: Some(self.user.clone()),
            from: self.from,
            to: self.to,
            limit: self.limit,
        }
    }
}

/// export コマンドを実行
pub async fn execute(args: &ExportArgs, ledgers: &Ledgers) -> Result<(), anyhow::Error> {
    let bytes = ledgers.audit.export(&args.to_options()).await?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            eprintln!("Exported {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            if args.format.eq_ignore_ascii_case("json") {
                writeln!(stdout)?;
            }
            stdout.flush()?;
        }
    }
    Ok(())
}
