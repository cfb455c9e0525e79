//! 冪等キーストア（SQLite）
//!
//! キーの一意性は`PRIMARY KEY`制約で保証する。
//! 重複挿入は一意制約違反として`KeyExists`に変換され、既存レコードは上書きされない。

use async_trait::async_trait;
use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::common::clock::{format_timestamp, truncate_to_micros, Clock, SystemClock};
use crate::common::error::{GuardError, GuardResult};
use crate::db::traits::IdempotencyRepository;
use crate::idempotency::key::validate_key;
use crate::idempotency::types::{CompletedResponse, IdempotencyRecord, IdempotencyStatus};

/// 冪等レコードのDB CRUD操作
#[derive(Clone)]
pub struct IdempotencyStorage {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

/// sqlx::FromRow用の行構造体
#[derive(Debug, sqlx::FromRow)]
struct IdempotencyRow {
    key: String,
    method: String,
    route: String,
    created_at: String,
    payment_ref: Option<String>,
    response_hash: String,
    status: String,
    response_body: String,
    response_status_code: i64,
    request_hash: Option<String>,
    reservation_id: Option<String>,
}

impl TryFrom<IdempotencyRow> for IdempotencyRecord {
    type Error = GuardError;

    fn try_from(row: IdempotencyRow) -> Result<Self, Self::Error> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| GuardError::StorageUnavailable(format!("Failed to parse created_at: {}", e)))?;
        let status = IdempotencyStatus::parse(&row.status).ok_or_else(|| {
            GuardError::StorageUnavailable(format!("Invalid idempotency status: {}", row.status))
        })?;
        let response_status_code = u16::try_from(row.response_status_code).map_err(|e| {
            GuardError::StorageUnavailable(format!("Invalid response_status_code: {}", e))
        })?;
        let reservation_id = row
            .reservation_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| GuardError::StorageUnavailable(format!("Invalid reservation_id: {}", e)))?;

        Ok(IdempotencyRecord {
            key: row.key,
            method: row.method,
            route: row.route,
            created_at: Some(created_at),
            payment_ref: row.payment_ref,
            response_hash: row.response_hash,
            status,
            response_body: row.response_body,
            response_status_code,
            request_hash: row.request_hash,
            reservation_id,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT key, method, route, created_at, payment_ref, response_hash, \
     status, response_body, response_status_code, request_hash, reservation_id \
     FROM idempotency_records";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl IdempotencyStorage {
    /// 新しいIdempotencyStorageを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// 時計を指定して作成
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn insert_if_absent(&self, record: &IdempotencyRecord) -> GuardResult<IdempotencyRecord> {
        validate_key(&record.key)?;

        let mut stored = record.clone();
        let created_at = truncate_to_micros(stored.created_at.unwrap_or_else(|| self.clock.now()));
        stored.created_at = Some(created_at);

        let result = sqlx::query(
            r#"INSERT INTO idempotency_records (
                key, method, route, created_at, payment_ref, response_hash,
                status, response_body, response_status_code, request_hash, reservation_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&stored.key)
        .bind(&stored.method)
        .bind(&stored.route)
        .bind(format_timestamp(&created_at))
        .bind(&stored.payment_ref)
        .bind(&stored.response_hash)
        .bind(stored.status.as_str())
        .bind(&stored.response_body)
        .bind(stored.response_status_code as i64)
        .bind(&stored.request_hash)
        .bind(stored.reservation_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(stored),
            Err(e) if is_unique_violation(&e) => Err(GuardError::KeyExists(record.key.clone())),
            Err(e) => Err(GuardError::StorageUnavailable(format!(
                "Failed to insert idempotency record: {}",
                e
            ))),
        }
    }

    async fn fetch_optional(&self, key: &str) -> GuardResult<Option<IdempotencyRecord>> {
        let row = sqlx::query_as::<_, IdempotencyRow>(&format!("{} WHERE key = ?", SELECT_COLUMNS))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                GuardError::StorageUnavailable(format!("Failed to get idempotency record: {}", e))
            })?;
        row.map(IdempotencyRecord::try_from).transpose()
    }
}

#[async_trait]
impl IdempotencyRepository for IdempotencyStorage {
    async fn get(&self, key: &str) -> GuardResult<IdempotencyRecord> {
        self.fetch_optional(key)
            .await?
            .ok_or_else(|| GuardError::KeyNotFound(key.to_string()))
    }

    async fn store(&self, record: &IdempotencyRecord) -> GuardResult<()> {
        self.insert_if_absent(record).await.map(|_| ())
    }

    async fn reserve(&self, record: &IdempotencyRecord) -> GuardResult<IdempotencyRecord> {
        let mut reservation = record.clone();
        reservation.status = IdempotencyStatus::Processing;
        reservation.reservation_id.get_or_insert_with(Uuid::new_v4);
        self.insert_if_absent(&reservation).await
    }

    async fn complete(
        &self,
        key: &str,
        reservation_id: Uuid,
        response: &CompletedResponse,
    ) -> GuardResult<IdempotencyRecord> {
        let reservation = reservation_id.to_string();
        let result = sqlx::query(
            r#"UPDATE idempotency_records
               SET status = 'completed', response_status_code = ?, response_body = ?,
                   response_hash = ?, payment_ref = ?
               WHERE key = ? AND reservation_id = ? AND status = 'processing'"#,
        )
        .bind(response.status_code as i64)
        .bind(&response.body)
        .bind(&response.response_hash)
        .bind(&response.payment_ref)
        .bind(key)
        .bind(&reservation)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            GuardError::StorageUnavailable(format!("Failed to complete idempotency record: {}", e))
        })?;

        if result.rows_affected() == 0 {
            // 自分の予約が確定済みか、予約自体が失われたかを区別する
            return match self.fetch_optional(key).await? {
                Some(record) if record.reservation_id == Some(reservation_id) => {
                    Err(GuardError::KeyExists(key.to_string()))
                }
                _ => Err(GuardError::KeyNotFound(key.to_string())),
            };
        }

        self.get(key).await
    }

    async fn release(&self, key: &str, reservation_id: Uuid) -> GuardResult<bool> {
        let result = sqlx::query(
            "DELETE FROM idempotency_records \
             WHERE key = ? AND reservation_id = ? AND status = 'processing'",
        )
        .bind(key)
        .bind(reservation_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| GuardError::StorageUnavailable(format!("Failed to release reservation: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_older_than(&self, age: Duration) -> GuardResult<u64> {
        let cutoff = self.clock.now() - age;
        let result = sqlx::query("DELETE FROM idempotency_records WHERE created_at < ?")
            .bind(format_timestamp(&cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                GuardError::StorageUnavailable(format!(
                    "Failed to delete expired idempotency records: {}",
                    e
                ))
            })?;
        Ok(result.rows_affected())
    }
}
