//! 監査ログのエクスポート（CSV / JSON）
//!
//! 列順とヘッダ文字列は外部互換の一部なので変更しない。

use crate::audit::types::{ExportFormat, LogEntry};
use crate::common::clock::format_timestamp;
use crate::common::error::{GuardError, GuardResult};

/// CSVヘッダ（固定）
pub const CSV_HEADER: [&str; 11] = [
    "ID",
    "Timestamp (UTC)",
    "User DID",
    "Entity Type",
    "Entity ID",
    "Action",
    "Outcome",
    "Request ID",
    "IP Address",
    "User Agent",
    "Previous Hash",
];

/// 指定形式でエントリ列をシリアライズ
pub fn serialize_entries(entries: &[LogEntry], format: ExportFormat) -> GuardResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => to_csv(entries),
        ExportFormat::Json => to_json(entries),
    }
}

/// CSVに変換（引用符・カンマ・改行はcsvクレートがエスケープする）
pub fn to_csv(entries: &[LogEntry]) -> GuardResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for entry in entries {
        let id = entry.id.map(|id| id.to_string()).unwrap_or_default();
        let timestamp = entry
            .timestamp
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default();
        writer.write_record([
            id.as_str(),
            timestamp.as_str(),
            entry.user_did.as_str(),
            entry.entity_type.as_str(),
            entry.entity_id.as_str(),
            entry.action.as_str(),
            entry.outcome.as_str(),
            entry.request_id.as_str(),
            entry.ip_address.as_str(),
            entry.user_agent.as_str(),
            entry.previous_hash.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| GuardError::Serialization(format!("Failed to finish CSV export: {}", e)))
}

/// JSON配列に変換
pub fn to_json(entries: &[LogEntry]) -> GuardResult<Vec<u8>> {
    Ok(serde_json::to_vec(entries)?)
}
