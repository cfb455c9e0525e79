//! 監査ログの型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 操作結果
pub mod outcome {
    /// 成功
    pub const SUCCESS: &str = "success";
    /// 失敗
    pub const FAILURE: &str = "failure";
    /// 拒否
    pub const DENIED: &str = "denied";
}

/// 監査ログエントリ
///
/// 追記後に許される変更は`ip_address`の匿名化と`ip_anonymized_at`の記録のみ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// エントリID（追記時に付与）
    pub id: Option<Uuid>,
    /// グローバル追記順の連番（1始まり、追記時に付与）
    pub sequence_number: i64,
    /// タイムスタンプ（追記時に付与）
    pub timestamp: Option<DateTime<Utc>>,
    /// 操作したユーザーのDID
    pub user_did: String,
    /// 対象エンティティ種別
    pub entity_type: String,
    /// 対象エンティティID
    pub entity_id: String,
    /// 操作
    pub action: String,
    /// 結果（success / failure など）
    pub outcome: String,
    /// リクエストID
    pub request_id: String,
    /// クライアントIPアドレス
    pub ip_address: String,
    /// User-Agent
    pub user_agent: String,
    /// チェーンハッシュ: `SHA-256(直前エントリのハッシュ || canonical(このエントリ))`
    pub previous_hash: String,
    /// IPアドレス匿名化時刻
    pub ip_anonymized_at: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// 内容フィールドのみを指定してエントリを作成
    pub fn new(
        user_did: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            sequence_number: 0,
            timestamp: None,
            user_did: user_did.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            outcome: outcome.into(),
            request_id: String::new(),
            ip_address: String::new(),
            user_agent: String::new(),
            previous_hash: String::new(),
            ip_anonymized_at: None,
        }
    }

    /// リクエストIDを設定
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// クライアント情報を設定
    pub fn with_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent.into();
        self
    }
}

/// エクスポート形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// CSV
    Csv,
    /// JSON配列
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = crate::common::error::GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(crate::common::error::GuardError::InvalidFormat(s.to_string())),
        }
    }
}

/// エクスポート条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    /// 出力形式（csv / json）
    pub format: String,
    /// 対象ユーザー（必須）
    pub user_did: Option<String>,
    /// 開始日時（含む）
    pub from: Option<DateTime<Utc>>,
    /// 終了日時（含まない）
    pub to: Option<DateTime<Utc>>,
    /// 最大件数
    pub limit: Option<usize>,
}

/// 監査ログ検索フィルタ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogFilter {
    /// ユーザーDIDでフィルタ
    pub user_did: Option<String>,
    /// 開始日時（含む）
    pub time_from: Option<DateTime<Utc>>,
    /// 終了日時（含まない）
    pub time_to: Option<DateTime<Utc>>,
    /// 最大件数
    pub limit: Option<usize>,
}

impl AuditLogFilter {
    /// エントリが条件に一致するか
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(ref user_did) = self.user_did {
            if &entry.user_did != user_did {
                return false;
            }
        }
        let Some(ts) = entry.timestamp else {
            return self.time_from.is_none() && self.time_to.is_none();
        };
        if let Some(from) = self.time_from {
            if ts < from {
                return false;
            }
        }
        if let Some(to) = self.time_to {
            if ts >= to {
                return false;
            }
        }
        true
    }
}
