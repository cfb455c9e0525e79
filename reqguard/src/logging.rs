//! ログ初期化
//!
//! 標準エラーへのfmt出力に加え、`REQGUARD_LOG_DIR`が設定されていれば
//! 日次ローテーションのファイル出力を追加する。

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::common::error::{GuardError, GuardResult};
use crate::config::get_env_with_fallback;

/// ログファイル名の接頭辞
pub const LOG_FILE_PREFIX: &str = "reqguard.log";

const DEFAULT_LOG_LEVEL: &str = "info";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// ログレベル指定（`REQGUARD_LOG_LEVEL` → `RUST_LOG` → `info`）
fn log_directive() -> String {
    get_env_with_fallback("REQGUARD_LOG_LEVEL", "RUST_LOG")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// フィルタを構築（不正な指定は`info`にフォールバック）
pub fn build_filter() -> EnvFilter {
    let directive = log_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!(
            "Invalid log filter '{}': {}, falling back to '{}'",
            directive, e, DEFAULT_LOG_LEVEL
        );
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    })
}

/// グローバルsubscriberを初期化する
///
/// 2回目以降の呼び出しは何もしない。
pub fn init() -> GuardResult<()> {
    let filter = build_filter();
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let result = match get_env_with_fallback("REQGUARD_LOG_DIR", "LOG_DIR") {
        Some(dir) => {
            std::fs::create_dir_all(&dir).map_err(|e| {
                GuardError::Config(format!("Failed to create log directory {}: {}", dir, e))
            })?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
            let result = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            if result.is_ok() {
                let _ = FILE_GUARD.set(guard);
            }
            result
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
    Ok(())
}
