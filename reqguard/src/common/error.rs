//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! # HTTP境界でのマッピング
//!
//! `GuardError`は`error_type()`と`status_code()`メソッドを提供し、
//! 外側のHTTP層がそのままレスポンスへ変換できるようにする。
//! バリデーション系は4xx、ストレージ系は5xxに対応する。

use axum::http::StatusCode;
use thiserror::Error;

/// reqguardのエラー型
#[derive(Debug, Error)]
pub enum GuardError {
    /// 冪等キーが空
    #[error("Invalid idempotency key: key must not be empty")]
    InvalidKey,

    /// 冪等キーが長すぎる
    #[error("Idempotency key too long: {len} characters (max {max})")]
    KeyTooLong {
        /// 実際の文字数
        len: usize,
        /// 許容される最大文字数
        max: usize,
    },

    /// 冪等キーが存在しない
    #[error("Idempotency key not found: {0}")]
    KeyNotFound(String),

    /// 冪等キーが既に存在する
    #[error("Idempotency key already exists: {0}")]
    KeyExists(String),

    /// 他のリクエストが同じキーを処理中
    #[error("Idempotency key is being processed by another request: {0}")]
    KeyInProgress(String),

    /// 同じキーで異なるリクエストが送られた
    #[error("Idempotency key {key} was reused for a different request: {reason}")]
    KeyConflict {
        /// 冪等キー
        key: String,
        /// 不一致の内容
        reason: String,
    },

    /// キャッシュ済みレスポンスのハッシュが一致しない
    #[error("Cached response for idempotency key {0} failed integrity check")]
    ResponseIntegrity(String),

    /// 未対応のエクスポート形式
    #[error("Unsupported export format: '{0}'")]
    InvalidFormat(String),

    /// エクスポートにユーザースコープが指定されていない
    #[error("Export requires a user_did scope")]
    MissingUserScope,

    /// ハッシュチェーンの分岐（同じ連番への二重追記）
    #[error("Audit chain conflict at sequence {0}")]
    ChainConflict(i64),

    /// バックエンドストレージのエラー
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// シリアライズ失敗
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    Config(String),
}

/// reqguard共通のResult型
pub type GuardResult<T> = Result<T, GuardError>;

impl GuardError {
    /// Returns a safe error message for external clients.
    ///
    /// Storage details (paths, SQL) only appear in the `Display` output,
    /// which belongs in server logs.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::InvalidKey => "Invalid idempotency key",
            Self::KeyTooLong { .. } => "Idempotency key too long",
            Self::KeyNotFound(_) => "Idempotency key not found",
            Self::KeyExists(_) => "Idempotency key already used",
            Self::KeyInProgress(_) => "Request with this idempotency key is in progress",
            Self::KeyConflict { .. } => "Idempotency key reused for a different request",
            Self::ResponseIntegrity(_) => "Internal server error",
            Self::InvalidFormat(_) => "Unsupported export format",
            Self::MissingUserScope => "user_did is required",
            Self::ChainConflict(_) => "Resource conflict",
            Self::StorageUnavailable(_) => "Service temporarily unavailable",
            Self::Serialization(_) => "Internal server error",
            Self::Config(_) => "Internal server error",
        }
    }

    /// Returns the error type string used in error response bodies.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidKey
            | Self::KeyTooLong { .. }
            | Self::InvalidFormat(_)
            | Self::MissingUserScope => "invalid_request_error",
            Self::KeyNotFound(_) => "not_found_error",
            Self::KeyExists(_)
            | Self::KeyInProgress(_)
            | Self::KeyConflict { .. }
            | Self::ChainConflict(_) => "conflict_error",
            Self::StorageUnavailable(_) => "service_unavailable",
            Self::ResponseIntegrity(_) | Self::Serialization(_) | Self::Config(_) => {
                "server_error"
            }
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidKey
            | Self::KeyTooLong { .. }
            | Self::InvalidFormat(_)
            | Self::MissingUserScope => StatusCode::BAD_REQUEST,
            Self::KeyNotFound(_) => StatusCode::NOT_FOUND,
            Self::KeyExists(_)
            | Self::KeyInProgress(_)
            | Self::KeyConflict { .. }
            | Self::ChainConflict(_) => StatusCode::CONFLICT,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ResponseIntegrity(_) | Self::Serialization(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 呼び出し側の入力ミス（副作用なしで同期的に返すべきエラー）か
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey | Self::KeyTooLong { .. } | Self::InvalidFormat(_) | Self::MissingUserScope
        )
    }

    /// バックエンドストレージ起因のエラーか
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<sqlx::Error> for GuardError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<csv::Error> for GuardError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_too_long_display() {
        let error = GuardError::KeyTooLong { len: 65, max: 64 };
        assert_eq!(
            error.to_string(),
            "Idempotency key too long: 65 characters (max 64)"
        );
    }

    #[test]
    fn test_validation_errors_map_to_bad_request() {
        for error in [
            GuardError::InvalidKey,
            GuardError::KeyTooLong { len: 65, max: 64 },
            GuardError::InvalidFormat("xml".to_string()),
            GuardError::MissingUserScope,
        ] {
            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(error.error_type(), "invalid_request_error");
            assert!(error.is_validation());
            assert!(!error.is_storage());
        }
    }

    #[test]
    fn test_conflict_errors_map_to_409() {
        assert_eq!(
            GuardError::KeyExists("k".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GuardError::KeyInProgress("k".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GuardError::KeyConflict {
                key: "k".to_string(),
                reason: "route".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_storage_error_maps_to_5xx() {
        let error = GuardError::StorageUnavailable("disk full".to_string());
        assert!(error.status_code().is_server_error());
        assert!(error.is_storage());
        // 内部情報は外部メッセージに含めない
        assert!(!error.external_message().contains("disk"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let error: GuardError = json_error.into();
        assert!(matches!(error, GuardError::Serialization(_)));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let error: GuardError = sqlx::Error::RowNotFound.into();
        assert!(error.is_storage());
    }
}
