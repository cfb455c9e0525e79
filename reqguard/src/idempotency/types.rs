//! 冪等レコードの型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 冪等レコードの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// 予約済み・処理中
    Processing,
    /// レスポンス確定済み
    Completed,
}

impl IdempotencyStatus {
    /// 文字列からIdempotencyStatusに変換
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// IdempotencyStatusを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 冪等レコード
///
/// 一度確定したレコードは期限切れ削除以外で変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    /// 冪等キー（1〜64文字）
    pub key: String,
    /// HTTPメソッド
    pub method: String,
    /// ルート
    pub route: String,
    /// 初回保存時刻（未設定なら保存時に付与）
    pub created_at: Option<DateTime<Utc>>,
    /// 外部参照（決済IDなど）
    pub payment_ref: Option<String>,
    /// レスポンスボディのSHA-256（16進64文字）
    pub response_hash: String,
    /// 状態
    pub status: IdempotencyStatus,
    /// キャッシュ済みレスポンスボディ
    pub response_body: String,
    /// キャッシュ済みHTTPステータスコード
    pub response_status_code: u16,
    /// リクエストボディのSHA-256（同一キー再利用の検出用）
    pub request_hash: Option<String>,
    /// 予約ごとの識別子（`complete`/`release`はこれが一致する予約にのみ作用する）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<Uuid>,
}

impl IdempotencyRecord {
    /// 確定済みレコードを作成（ハッシュはボディから計算）
    pub fn completed(
        key: impl Into<String>,
        method: impl Into<String>,
        route: impl Into<String>,
        response_status_code: u16,
        response_body: impl Into<String>,
    ) -> Self {
        let response_body = response_body.into();
        Self {
            key: key.into(),
            method: method.into(),
            route: route.into(),
            created_at: None,
            payment_ref: None,
            response_hash: super::key::compute_response_hash(response_body.as_bytes()),
            status: IdempotencyStatus::Completed,
            response_body,
            response_status_code,
            request_hash: None,
            reservation_id: None,
        }
    }

    /// 処理中（予約）レコードを作成
    pub fn processing(
        key: impl Into<String>,
        method: impl Into<String>,
        route: impl Into<String>,
        request_hash: Option<String>,
    ) -> Self {
        Self {
            key: key.into(),
            method: method.into(),
            route: route.into(),
            created_at: None,
            payment_ref: None,
            response_hash: String::new(),
            status: IdempotencyStatus::Processing,
            response_body: String::new(),
            response_status_code: 0,
            request_hash,
            reservation_id: Some(Uuid::new_v4()),
        }
    }

    /// キャッシュ済みレスポンスを取り出す
    pub fn cached_response(&self) -> CachedResponse {
        CachedResponse {
            status_code: self.response_status_code,
            body: self.response_body.clone(),
            payment_ref: self.payment_ref.clone(),
            created_at: self.created_at,
        }
    }
}

/// 処理完了時に確定させるレスポンス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedResponse {
    /// HTTPステータスコード
    pub status_code: u16,
    /// レスポンスボディ
    pub body: String,
    /// ボディのSHA-256
    pub response_hash: String,
    /// 外部参照
    pub payment_ref: Option<String>,
}

/// 再送時に返すキャッシュ済みレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTPステータスコード
    pub status_code: u16,
    /// レスポンスボディ
    pub body: String,
    /// 外部参照
    pub payment_ref: Option<String>,
    /// 初回実行時刻
    pub created_at: Option<DateTime<Utc>>,
}
