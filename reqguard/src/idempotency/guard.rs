//! 予約→実行→確定プロトコル
//!
//! `begin`はキーが未使用なら処理中レコードを原子的に挿入して実行権を返し、
//! 確定済みならキャッシュ済みレスポンスを返す。同じキーで同時に`begin`しても
//! 実行権を得るのは1つだけで、残りは`KeyInProgress`かリプレイになる。

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::error::{GuardError, GuardResult};
use crate::db::traits::IdempotencyRepository;
use crate::idempotency::key::{compute_request_hash, compute_response_hash, validate_key};
use crate::idempotency::types::{
    CachedResponse, CompletedResponse, IdempotencyRecord, IdempotencyStatus,
};

/// 冪等キー付きリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotentRequest {
    /// 冪等キー
    pub key: String,
    /// HTTPメソッド
    pub method: String,
    /// ルート
    pub route: String,
    /// リクエストボディのSHA-256
    pub request_hash: Option<String>,
}

impl IdempotentRequest {
    /// キー・メソッド・ルートを指定して作成
    pub fn new(key: impl Into<String>, method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            method: method.into(),
            route: route.into(),
            request_hash: None,
        }
    }

    /// リクエストボディの指紋を設定
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.request_hash = Some(compute_request_hash(body));
        self
    }
}

/// 実行権（`finish`か`abandon`で消費する）
///
/// 予約ごとに固有のIDを持つ。期限切れ削除後に同じキーが別の呼び出し元に
/// 予約されても、古い実行権では新しい予約を確定・解除できない。
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    key: String,
    id: Uuid,
}

impl Reservation {
    /// 予約した冪等キー
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 予約ID
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// `begin`の結果
#[derive(Debug, PartialEq, Eq)]
pub enum BeginOutcome {
    /// 初回リクエスト。業務処理を実行して`finish`する
    Execute(Reservation),
    /// 確定済み。キャッシュ済みレスポンスをそのまま返す
    Replay(CachedResponse),
}

/// 冪等ガード
#[derive(Clone)]
pub struct IdempotencyGuard {
    repo: Arc<dyn IdempotencyRepository>,
}

impl IdempotencyGuard {
    /// 新しいガードを作成
    pub fn new(repo: Arc<dyn IdempotencyRepository>) -> Self {
        Self { repo }
    }

    /// 保存先リポジトリ
    pub fn repository(&self) -> Arc<dyn IdempotencyRepository> {
        Arc::clone(&self.repo)
    }

    /// キーを予約するか、確定済みレスポンスを取得する
    ///
    /// 他のリクエストが処理中なら`KeyInProgress`。
    /// メソッド・ルート・リクエストボディのいずれかが元のリクエストと異なれば`KeyConflict`。
    pub async fn begin(&self, request: &IdempotentRequest) -> GuardResult<BeginOutcome> {
        validate_key(&request.key)?;

        let reservation = IdempotencyRecord::processing(
            request.key.as_str(),
            request.method.as_str(),
            request.route.as_str(),
            request.request_hash.clone(),
        );

        // 予約と取得の間に相手が解放・期限切れ削除された場合は予約をやり直す
        for _ in 0..2 {
            match self.repo.reserve(&reservation).await {
                Ok(stored) => {
                    let id = stored.reservation_id.ok_or_else(|| {
                        GuardError::StorageUnavailable(format!(
                            "Reservation for {} was stored without an id",
                            request.key
                        ))
                    })?;
                    debug!(key = %request.key, reservation = %id, "Idempotency key reserved");
                    return Ok(BeginOutcome::Execute(Reservation {
                        key: request.key.clone(),
                        id,
                    }));
                }
                Err(GuardError::KeyExists(_)) => {}
                Err(e) => return Err(e),
            }

            match self.repo.get(&request.key).await {
                Ok(existing) => return check_existing(request, &existing),
                Err(GuardError::KeyNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(GuardError::KeyInProgress(request.key.clone()))
    }

    /// 業務処理の結果を確定して保存する
    pub async fn finish(
        &self,
        reservation: Reservation,
        status_code: u16,
        body: impl Into<String>,
        payment_ref: Option<String>,
    ) -> GuardResult<CachedResponse> {
        let body = body.into();
        let response = CompletedResponse {
            status_code,
            response_hash: compute_response_hash(body.as_bytes()),
            body,
            payment_ref,
        };
        let record = match self.repo.complete(&reservation.key, reservation.id, &response).await {
            Ok(record) => record,
            Err(e @ GuardError::KeyNotFound(_)) => {
                warn!(
                    key = %reservation.key,
                    reservation = %reservation.id,
                    "Reservation expired before the response was stored"
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        debug!(key = %reservation.key, status_code, "Idempotency key completed");
        Ok(record.cached_response())
    }

    /// 業務処理が失敗した場合に予約を解除する（同じキーで再試行可能になる）
    pub async fn abandon(&self, reservation: Reservation) -> GuardResult<bool> {
        let released = self.repo.release(&reservation.key, reservation.id).await?;
        if !released {
            warn!(key = %reservation.key, "Reservation was already gone when abandoning");
        }
        Ok(released)
    }

    /// 期限切れレコード（処理中のまま残った予約を含む）を削除する
    pub async fn purge_expired(&self, expiry: Duration) -> GuardResult<u64> {
        let removed = self.repo.delete_older_than(expiry).await?;
        if removed > 0 {
            info!(removed, "Removed expired idempotency records");
        }
        Ok(removed)
    }
}

fn check_existing(
    request: &IdempotentRequest,
    existing: &IdempotencyRecord,
) -> GuardResult<BeginOutcome> {
    if existing.method != request.method || existing.route != request.route {
        return Err(GuardError::KeyConflict {
            key: request.key.clone(),
            reason: format!(
                "originally used for {} {}",
                existing.method, existing.route
            ),
        });
    }
    if let (Some(original), Some(current)) = (&existing.request_hash, &request.request_hash) {
        if original != current {
            return Err(GuardError::KeyConflict {
                key: request.key.clone(),
                reason: "request body differs from the original request".to_string(),
            });
        }
    }

    match existing.status {
        IdempotencyStatus::Processing => Err(GuardError::KeyInProgress(request.key.clone())),
        IdempotencyStatus::Completed => {
            if compute_response_hash(existing.response_body.as_bytes()) != existing.response_hash {
                warn!(key = %request.key, "Cached response hash mismatch");
                return Err(GuardError::ResponseIntegrity(request.key.clone()));
            }
            debug!(key = %request.key, "Replaying cached response");
            Ok(BeginOutcome::Replay(existing.cached_response()))
        }
    }
}
