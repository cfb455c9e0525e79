//! Repository traitパターン定義
//!
//! 冪等キーストアと監査ログの保存先を抽象化する。
//! インメモリ実装（テスト・参照実装）とSQLite実装が同じ契約を満たす。
//! 境界を越える値はすべて独立したコピーで、内部状態への参照は返さない。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::audit::types::{AuditLogFilter, LogEntry};
use crate::common::error::GuardResult;
use crate::idempotency::types::{CompletedResponse, IdempotencyRecord};

// ---------------------------------------------------------------------------
// IdempotencyRepository
// ---------------------------------------------------------------------------

/// 冪等レコード操作のRepository trait
///
/// 同一キーに対する`get`/`store`/`reserve`/`complete`/`delete_older_than`は
/// 互いに直列化され、書きかけのレコードが読まれることはない。
#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// キーでレコードを取得（存在しなければ`KeyNotFound`）
    async fn get(&self, key: &str) -> GuardResult<IdempotencyRecord>;

    /// レコードを保存
    ///
    /// キーを検証し、既存キーなら`KeyExists`（上書きしない）。
    /// `created_at`が未設定なら現在時刻を付与する。
    async fn store(&self, record: &IdempotencyRecord) -> GuardResult<()>;

    /// キーが存在しない場合のみ処理中レコードを挿入（予約）
    ///
    /// 既存キーなら`KeyExists`。保存されたレコードのコピーを返す。
    async fn reserve(&self, record: &IdempotencyRecord) -> GuardResult<IdempotencyRecord>;

    /// 処理中レコードを確定させる
    ///
    /// `reservation_id`が一致する予約がなければ`KeyNotFound`
    /// （期限切れ削除後に別の呼び出し元が同じキーを予約した場合も含む）。
    /// その予約が確定済みなら`KeyExists`。
    async fn complete(
        &self,
        key: &str,
        reservation_id: Uuid,
        response: &CompletedResponse,
    ) -> GuardResult<IdempotencyRecord>;

    /// 処理中の予約を解除（確定済みレコードや他の予約は削除しない）
    async fn release(&self, key: &str, reservation_id: Uuid) -> GuardResult<bool>;

    /// `created_at`が`now - age`より古いレコードを削除し、削除件数を返す
    async fn delete_older_than(&self, age: Duration) -> GuardResult<u64>;
}

// ---------------------------------------------------------------------------
// AuditLogRepository
// ---------------------------------------------------------------------------

/// 監査ログ操作のRepository trait
///
/// 追記専用。内容の変更はIPアドレスの匿名化のみ許される。
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// チェーン末尾（最大連番）のエントリを取得
    async fn latest(&self) -> GuardResult<Option<LogEntry>>;

    /// 確定済みエントリを追記
    ///
    /// 連番が末尾+1でなければ`ChainConflict`（分岐を作らない）。
    async fn append(&self, entry: &LogEntry) -> GuardResult<()>;

    /// 条件に一致するエントリを時刻順（同時刻は連番順）で取得
    async fn query(&self, filter: &AuditLogFilter) -> GuardResult<Vec<LogEntry>>;

    /// 全エントリを連番順で取得（チェーン検証用）
    async fn list_chain(&self) -> GuardResult<Vec<LogEntry>>;

    /// `cutoff`より古く、未匿名化のエントリを取得
    async fn list_pending_anonymization(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> GuardResult<Vec<LogEntry>>;

    /// IPアドレスを匿名化済みに更新
    ///
    /// 既に匿名化済みの場合は何もせず`false`を返す。
    async fn mark_ip_anonymized(
        &self,
        id: Uuid,
        anonymized_ip: &str,
        anonymized_at: DateTime<Utc>,
    ) -> GuardResult<bool>;
}
