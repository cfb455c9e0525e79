//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to deprecated variable names with warning logs.

use std::time::Duration;

use crate::audit::anonymize::IP_ANONYMIZATION_RETENTION_DAYS;
use crate::common::error::{GuardError, GuardResult};

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Example
/// ```
/// use reqguard::config::get_env_with_fallback;
///
/// let url = get_env_with_fallback("REQGUARD_DATABASE_URL", "DATABASE_URL");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Returns `default` if neither is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// 真偽値の環境変数（`true/1/yes/on`で有効）
pub fn get_env_flag(new_name: &str, old_name: &str, default: bool) -> bool {
    get_env_with_fallback(new_name, old_name)
        .map(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

/// 冪等キーストア設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyConfig {
    /// レコードの保持期間
    pub expiry: Duration,
    /// 期限切れ削除の実行間隔
    pub cleanup_interval: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl IdempotencyConfig {
    /// Load idempotency configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            expiry: Duration::from_secs(get_env_with_fallback_parse(
                "REQGUARD_IDEMPOTENCY_EXPIRY_SECS",
                "IDEMPOTENCY_EXPIRY_SECS",
                defaults.expiry.as_secs(),
            )),
            cleanup_interval: Duration::from_secs(get_env_with_fallback_parse(
                "REQGUARD_IDEMPOTENCY_CLEANUP_INTERVAL_SECS",
                "IDEMPOTENCY_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval.as_secs(),
            )),
        }
    }

    /// 保持期間を`chrono::Duration`で返す
    pub fn expiry_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.expiry).unwrap_or_else(|_| chrono::Duration::days(36_500))
    }
}

/// 監査証跡設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditConfig {
    /// IPアドレスの保持日数
    pub ip_retention_days: i64,
    /// 匿名化スイープの実行間隔
    pub anonymize_interval: Duration,
    /// 起動時にハッシュチェーンを検証するか
    pub verify_on_start: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ip_retention_days: IP_ANONYMIZATION_RETENTION_DAYS,
            anonymize_interval: Duration::from_secs(24 * 60 * 60),
            verify_on_start: true,
        }
    }
}

impl AuditConfig {
    /// Load audit configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ip_retention_days: get_env_with_fallback_parse(
                "REQGUARD_AUDIT_IP_RETENTION_DAYS",
                "AUDIT_IP_RETENTION_DAYS",
                defaults.ip_retention_days,
            ),
            anonymize_interval: Duration::from_secs(get_env_with_fallback_parse(
                "REQGUARD_AUDIT_ANONYMIZE_INTERVAL_SECS",
                "AUDIT_ANONYMIZE_INTERVAL_SECS",
                defaults.anonymize_interval.as_secs(),
            )),
            verify_on_start: get_env_flag(
                "REQGUARD_AUDIT_VERIFY_ON_START",
                "AUDIT_VERIFY_ON_START",
                defaults.verify_on_start,
            ),
        }
    }
}

/// データベース設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLite接続URL
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:reqguard.db".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: get_env_with_fallback_or(
                "REQGUARD_DATABASE_URL",
                "DATABASE_URL",
                &Self::default().url,
            ),
        }
    }
}

/// 全体設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// 冪等キーストア
    pub idempotency: IdempotencyConfig,
    /// 監査証跡
    pub audit: AuditConfig,
    /// データベース
    pub database: DatabaseConfig,
}

impl Config {
    /// 環境変数から読み込み、値を検証する
    pub fn from_env() -> GuardResult<Self> {
        let config = Self {
            idempotency: IdempotencyConfig::from_env(),
            audit: AuditConfig::from_env(),
            database: DatabaseConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// 0の間隔・保持期間を拒否する
    pub fn validate(&self) -> GuardResult<()> {
        if self.idempotency.expiry.is_zero() {
            return Err(GuardError::Config(
                "idempotency expiry must be greater than zero".to_string(),
            ));
        }
        if self.idempotency.cleanup_interval.is_zero() {
            return Err(GuardError::Config(
                "idempotency cleanup interval must be greater than zero".to_string(),
            ));
        }
        if self.audit.ip_retention_days <= 0 {
            return Err(GuardError::Config(format!(
                "ip retention days must be positive, got {}",
                self.audit.ip_retention_days
            )));
        }
        if self.audit.anonymize_interval.is_zero() {
            return Err(GuardError::Config(
                "anonymization interval must be greater than zero".to_string(),
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(GuardError::Config("database url must not be empty".to_string()));
        }
        Ok(())
    }
}
