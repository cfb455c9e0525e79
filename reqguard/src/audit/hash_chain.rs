//! SHA-256エントリハッシュチェーン
//!
//! 監査ログの改ざん検知のためのハッシュチェーン実装。
//! `entry_hash(i) = SHA-256(entry_hash(i-1) || canonical(entry(i)))`、
//! `entry_hash(0) = GENESIS_HASH`。各エントリの`previous_hash`に`entry_hash(i)`を保存する。
//!
//! 検証は読み取り専用で、ログを変更しない。

use crate::audit::types::LogEntry;
use crate::common::clock::format_timestamp;
use crate::common::error::GuardResult;
use crate::common::ip::anonymize_ip;
use crate::db::traits::AuditLogRepository;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

/// ジェネシスエントリの直前ハッシュ（ゼロハッシュ）
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// チェーン検証結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerificationResult {
    /// 検証が成功したか
    pub valid: bool,
    /// 検証したエントリ数
    pub entries_checked: i64,
    /// 最初に改ざんが検出されたエントリ連番（該当する場合）
    pub tampered_sequence: Option<i64>,
    /// エラーメッセージ（該当する場合）
    pub message: Option<String>,
}

fn push_field(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(value.as_bytes());
    buf.push(b';');
}

/// エントリの正規エンコーディング
///
/// 長さ接頭辞付きで固定順に連結する。`ip_address`は匿名化後の形（IPv4は/24、
/// IPv6は/48）で含めるため、匿名化スイープの前後でハッシュは変わらず、
/// 保持されるプレフィックスやアドレスファミリーの書き換えは検出される。
/// `ip_anonymized_at`と、ハッシュ自身である`previous_hash`は含めない。
pub fn canonical_encoding(entry: &LogEntry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    let id = entry.id.map(|id| id.to_string()).unwrap_or_default();
    let timestamp = entry
        .timestamp
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_default();

    push_field(&mut buf, &id);
    push_field(&mut buf, &entry.sequence_number.to_string());
    push_field(&mut buf, &timestamp);
    push_field(&mut buf, &entry.user_did);
    push_field(&mut buf, &entry.entity_type);
    push_field(&mut buf, &entry.entity_id);
    push_field(&mut buf, &entry.action);
    push_field(&mut buf, &entry.outcome);
    push_field(&mut buf, &entry.request_id);
    push_field(&mut buf, &entry.user_agent);
    push_field(&mut buf, &anonymize_ip(&entry.ip_address));
    buf
}

/// チェーンハッシュを計算
///
/// `SHA-256(previous_hash || canonical(entry))`
pub fn compute_entry_hash(previous_hash: &str, entry: &LogEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(canonical_encoding(entry));
    format!("{:x}", hasher.finalize())
}

/// 連番順に並んだエントリ列のハッシュチェーンを検証
///
/// 最初の不一致で停止し、そのエントリの連番を返す。
pub fn verify_entries(entries: &[LogEntry]) -> ChainVerificationResult {
    let mut expected_previous_hash = GENESIS_HASH.to_string();
    let mut expected_sequence = 1i64;

    for entry in entries {
        if entry.sequence_number != expected_sequence {
            warn!(
                sequence = entry.sequence_number,
                expected = expected_sequence,
                "Hash chain broken: sequence gap or fork"
            );
            return ChainVerificationResult {
                valid: false,
                entries_checked: expected_sequence - 1,
                tampered_sequence: Some(entry.sequence_number),
                message: Some(format!(
                    "Sequence mismatch: expected {}, found {}",
                    expected_sequence, entry.sequence_number
                )),
            };
        }

        let recomputed = compute_entry_hash(&expected_previous_hash, entry);
        if recomputed != entry.previous_hash {
            warn!(
                sequence = entry.sequence_number,
                expected = %entry.previous_hash,
                recomputed = %recomputed,
                "Hash chain broken: entry hash mismatch"
            );
            return ChainVerificationResult {
                valid: false,
                entries_checked: entry.sequence_number,
                tampered_sequence: Some(entry.sequence_number),
                message: Some(format!(
                    "Entry hash mismatch at sequence {}",
                    entry.sequence_number
                )),
            };
        }

        expected_previous_hash = entry.previous_hash.clone();
        expected_sequence += 1;
    }

    ChainVerificationResult {
        valid: true,
        entries_checked: entries.len() as i64,
        tampered_sequence: None,
        message: if entries.is_empty() {
            Some("No entries to verify".to_string())
        } else {
            None
        },
    }
}

/// リポジトリ内の全エントリのハッシュチェーンを検証
pub async fn verify_chain(storage: &dyn AuditLogRepository) -> GuardResult<ChainVerificationResult> {
    let entries = storage.list_chain().await?;
    Ok(verify_entries(&entries))
}
