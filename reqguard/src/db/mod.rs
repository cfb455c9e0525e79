//! データベースアクセス層
//!
//! Repository traitと、そのインメモリ実装・SQLite実装

/// Repository traitパターン（ストレージ非依存の契約）
pub mod traits;

/// インメモリ参照実装
pub mod memory;

/// 冪等キーストア（SQLite）
pub mod idempotency;

/// 監査ログストレージ（SQLite）
pub mod audit_log;

/// データベースマイグレーション
pub mod migrations;
