//! 監査ログストレージ（SQLite）
//!
//! `sequence_number`の一意制約により、同じ末尾に対する二重追記（チェーンの分岐）は
//! 別プロセスからの書き込みであっても失敗する。削除と内容変更はトリガーで拒否される。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::audit::types::{AuditLogFilter, LogEntry};
use crate::common::clock::format_timestamp;
use crate::common::error::{GuardError, GuardResult};
use crate::db::traits::AuditLogRepository;

/// 監査ログのDB操作
#[derive(Clone)]
pub struct AuditLogStorage {
    pool: SqlitePool,
}

/// sqlx::FromRow用の行構造体
#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: String,
    sequence_number: i64,
    timestamp: String,
    user_did: String,
    entity_type: String,
    entity_id: String,
    action: String,
    outcome: String,
    request_id: String,
    ip_address: String,
    user_agent: String,
    previous_hash: String,
    ip_anonymized_at: Option<String>,
}

fn parse_timestamp(value: &str, column: &str) -> GuardResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GuardError::StorageUnavailable(format!("Failed to parse {}: {}", column, e)))
}

impl TryFrom<AuditLogRow> for LogEntry {
    type Error = GuardError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| GuardError::StorageUnavailable(format!("Invalid entry id: {}", e)))?;
        let timestamp = parse_timestamp(&row.timestamp, "timestamp")?;
        let ip_anonymized_at = row
            .ip_anonymized_at
            .as_deref()
            .map(|v| parse_timestamp(v, "ip_anonymized_at"))
            .transpose()?;

        Ok(LogEntry {
            id: Some(id),
            sequence_number: row.sequence_number,
            timestamp: Some(timestamp),
            user_did: row.user_did,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            outcome: row.outcome,
            request_id: row.request_id,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            previous_hash: row.previous_hash,
            ip_anonymized_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, sequence_number, timestamp, user_did, entity_type, \
     entity_id, action, outcome, request_id, ip_address, user_agent, previous_hash, \
     ip_anonymized_at FROM audit_log_entries";

fn rows_to_entries(rows: Vec<AuditLogRow>) -> GuardResult<Vec<LogEntry>> {
    rows.into_iter()
        .map(LogEntry::try_from)
        .collect::<Result<Vec<_>, _>>()
}

/// フィルタ条件からWHERE句とバインド値を組み立てる
fn build_where_clause(filter: &AuditLogFilter) -> (String, Vec<String>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_values: Vec<String> = Vec::new();

    if let Some(ref user_did) = filter.user_did {
        conditions.push("user_did = ?".to_string());
        bind_values.push(user_did.clone());
    }

    if let Some(ref time_from) = filter.time_from {
        conditions.push("timestamp >= ?".to_string());
        bind_values.push(format_timestamp(time_from));
    }

    if let Some(ref time_to) = filter.time_to {
        conditions.push("timestamp < ?".to_string());
        bind_values.push(format_timestamp(time_to));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values)
}

impl AuditLogStorage {
    /// 新しいAuditLogStorageを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// エントリ総数
    pub async fn count(&self) -> GuardResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_log_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GuardError::StorageUnavailable(format!("Failed to count audit logs: {}", e)))
    }
}

#[async_trait]
impl AuditLogRepository for AuditLogStorage {
    async fn latest(&self) -> GuardResult<Option<LogEntry>> {
        let row = sqlx::query_as::<_, AuditLogRow>(&format!(
            "{} ORDER BY sequence_number DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GuardError::StorageUnavailable(format!("Failed to get latest entry: {}", e)))?;

        row.map(LogEntry::try_from).transpose()
    }

    async fn append(&self, entry: &LogEntry) -> GuardResult<()> {
        let id = entry
            .id
            .ok_or_else(|| GuardError::StorageUnavailable("Entry id is not assigned".to_string()))?;
        let timestamp = entry.timestamp.ok_or_else(|| {
            GuardError::StorageUnavailable("Entry timestamp is not assigned".to_string())
        })?;

        // 末尾+1以外の連番は分岐になるため、末尾の確認と挿入を1文で行う
        let result = sqlx::query(
            r#"INSERT INTO audit_log_entries (
                id, sequence_number, timestamp, user_did, entity_type, entity_id,
                action, outcome, request_id, ip_address, user_agent, previous_hash,
                ip_anonymized_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE (SELECT COALESCE(MAX(sequence_number), 0) FROM audit_log_entries) = ?"#,
        )
        .bind(id.to_string())
        .bind(entry.sequence_number)
        .bind(format_timestamp(&timestamp))
        .bind(&entry.user_did)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.action)
        .bind(&entry.outcome)
        .bind(&entry.request_id)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.previous_hash)
        .bind(entry.ip_anonymized_at.as_ref().map(format_timestamp))
        .bind(entry.sequence_number - 1)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => {}
            Ok(_) => return Err(GuardError::ChainConflict(entry.sequence_number)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(GuardError::ChainConflict(entry.sequence_number));
            }
            Err(e) => {
                return Err(GuardError::StorageUnavailable(format!(
                    "Failed to insert audit log: {}",
                    e
                )));
            }
        }

        Ok(())
    }

    async fn query(&self, filter: &AuditLogFilter) -> GuardResult<Vec<LogEntry>> {
        let (where_clause, bind_values) = build_where_clause(filter);
        let sql = format!(
            "{} {} ORDER BY timestamp ASC, sequence_number ASC LIMIT ?",
            SELECT_COLUMNS, where_clause
        );

        let mut query = sqlx::query_as::<_, AuditLogRow>(&sql);
        for val in &bind_values {
            query = query.bind(val.as_str());
        }
        // LIMIT -1 はSQLiteで無制限
        let limit = filter
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        query = query.bind(limit);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GuardError::StorageUnavailable(format!("Failed to query audit logs: {}", e)))?;

        rows_to_entries(rows)
    }

    async fn list_chain(&self) -> GuardResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(&format!(
            "{} ORDER BY sequence_number ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GuardError::StorageUnavailable(format!("Failed to list audit chain: {}", e)))?;

        rows_to_entries(rows)
    }

    async fn list_pending_anonymization(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> GuardResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(&format!(
            "{} WHERE ip_anonymized_at IS NULL AND timestamp < ? \
             ORDER BY sequence_number ASC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(format_timestamp(&cutoff))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            GuardError::StorageUnavailable(format!("Failed to list entries for anonymization: {}", e))
        })?;

        rows_to_entries(rows)
    }

    async fn mark_ip_anonymized(
        &self,
        id: Uuid,
        anonymized_ip: &str,
        anonymized_at: DateTime<Utc>,
    ) -> GuardResult<bool> {
        let result = sqlx::query(
            "UPDATE audit_log_entries SET ip_address = ?, ip_anonymized_at = ? \
             WHERE id = ? AND ip_anonymized_at IS NULL",
        )
        .bind(anonymized_ip)
        .bind(format_timestamp(&anonymized_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| GuardError::StorageUnavailable(format!("Failed to anonymize ip: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
