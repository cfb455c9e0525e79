//! インメモリストレージ
//!
//! テストおよび単一プロセス構成向けの参照実装。
//! すべての操作はロック内で完結し、値はクローンで受け渡す。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audit::types::{AuditLogFilter, LogEntry};
use crate::common::clock::{truncate_to_micros, Clock, SystemClock};
use crate::common::error::{GuardError, GuardResult};
use crate::db::traits::{AuditLogRepository, IdempotencyRepository};
use crate::idempotency::key::validate_key;
use crate::idempotency::types::{CompletedResponse, IdempotencyRecord, IdempotencyStatus};

/// インメモリ冪等キーストア
#[derive(Clone)]
pub struct MemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<String, IdempotencyRecord>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdempotencyStore {
    /// システム時計で作成
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 時計を指定して作成
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// 保持しているレコード数
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// レコードが空か
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn insert_if_absent(&self, record: &IdempotencyRecord) -> GuardResult<IdempotencyRecord> {
        validate_key(&record.key)?;

        let mut records = self.records.write().await;
        match records.entry(record.key.clone()) {
            Entry::Occupied(_) => Err(GuardError::KeyExists(record.key.clone())),
            Entry::Vacant(slot) => {
                let mut stored = record.clone();
                let created_at = stored.created_at.unwrap_or_else(|| self.clock.now());
                stored.created_at = Some(truncate_to_micros(created_at));
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }
}

#[async_trait]
impl IdempotencyRepository for MemoryIdempotencyStore {
    async fn get(&self, key: &str) -> GuardResult<IdempotencyRecord> {
        self.records
            .read()
            .await
            .get(key)
            .cloned()
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
        let mut records = self.records.write().await;
        let record = records
            .get_mut(key)
            .filter(|record| record.reservation_id == Some(reservation_id))
            .ok_or_else(|| GuardError::KeyNotFound(key.to_string()))?;
        if record.status == IdempotencyStatus::Completed {
            return Err(GuardError::KeyExists(key.to_string()));
        }
        record.status = IdempotencyStatus::Completed;
        record.response_status_code = response.status_code;
        record.response_body = response.body.clone();
        record.response_hash = response.response_hash.clone();
        record.payment_ref = response.payment_ref.clone();
        Ok(record.clone())
    }

    async fn release(&self, key: &str, reservation_id: Uuid) -> GuardResult<bool> {
        let mut records = self.records.write().await;
        match records.get(key) {
            Some(record)
                if record.status == IdempotencyStatus::Processing
                    && record.reservation_id == Some(reservation_id) =>
            {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_older_than(&self, age: Duration) -> GuardResult<u64> {
        let cutoff = self.clock.now() - age;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.created_at.map_or(true, |ts| ts >= cutoff));
        Ok((before - records.len()) as u64)
    }
}

/// インメモリ監査ログ
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl MemoryAuditLog {
    /// 空の監査ログを作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogRepository for MemoryAuditLog {
    async fn latest(&self) -> GuardResult<Option<LogEntry>> {
        Ok(self.entries.read().await.last().cloned())
    }

    async fn append(&self, entry: &LogEntry) -> GuardResult<()> {
        let mut entries = self.entries.write().await;
        let expected = entries.last().map_or(1, |e| e.sequence_number + 1);
        if entry.sequence_number != expected {
            return Err(GuardError::ChainConflict(entry.sequence_number));
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditLogFilter) -> GuardResult<Vec<LogEntry>> {
        let entries = self.entries.read().await;
        let mut matched: Vec<LogEntry> = entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.sequence_number.cmp(&b.sequence_number))
        });
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn list_chain(&self) -> GuardResult<Vec<LogEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn list_pending_anonymization(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> GuardResult<Vec<LogEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.ip_anonymized_at.is_none() && e.timestamp.is_some_and(|ts| ts < cutoff))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_ip_anonymized(
        &self,
        id: Uuid,
        anonymized_ip: &str,
        anonymized_at: DateTime<Utc>,
    ) -> GuardResult<bool> {
        let mut entries = self.entries.write().await;
        match entries
            .iter_mut()
            .find(|e| e.id == Some(id) && e.ip_anonymized_at.is_none())
        {
            Some(entry) => {
                entry.ip_address = anonymized_ip.to_string();
                entry.ip_anonymized_at = Some(anonymized_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
