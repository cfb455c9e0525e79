//! CLI module for reqguard
//!
//! Provides maintenance and compliance commands for the idempotency store
//! and the audit trail.

pub mod anonymize;
pub mod cleanup;
pub mod export;
pub mod run;
pub mod verify;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// reqguard - Idempotency store and tamper-evident audit trail
#[derive(Parser, Debug)]
#[command(name = "reqguard")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    REQGUARD_DATABASE_URL                       Database URL (default: sqlite:reqguard.db)
    REQGUARD_LOG_LEVEL                          Log level (default: info)
    REQGUARD_LOG_DIR                            Directory for daily rotated log files
    REQGUARD_IDEMPOTENCY_EXPIRY_SECS            Idempotency record expiry (default: 86400)
    REQGUARD_IDEMPOTENCY_CLEANUP_INTERVAL_SECS  Cleanup interval (default: 3600)
    REQGUARD_AUDIT_IP_RETENTION_DAYS            Days before IP anonymization (default: 90)
    REQGUARD_AUDIT_ANONYMIZE_INTERVAL_SECS      Anonymization interval (default: 86400)
    REQGUARD_AUDIT_VERIFY_ON_START              Verify the audit chain on start (default: true)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify the audit log hash chain
    Verify(verify::VerifyArgs),
    /// Export a user's audit log entries
    Export(export::ExportArgs),
    /// Delete expired idempotency records
    Cleanup(cleanup::CleanupArgs),
    /// Anonymize IP addresses past the retention period
    Anonymize(anonymize::AnonymizeArgs),
    /// Run the maintenance loops until Ctrl-C
    Run(run::RunArgs),
}

/// RFC 3339形式の日時引数をUTCに変換
pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected RFC 3339 timestamp: {}", e))
}
