//! IPアドレス匿名化の保持期間

use chrono::{DateTime, Duration, Utc};

use crate::common::clock::{Clock, SystemClock};

/// IPアドレスを保持する日数
pub const IP_ANONYMIZATION_RETENTION_DAYS: i64 = 90;

/// 匿名化スイープで1回に処理する件数
pub const ANONYMIZATION_BATCH_SIZE: usize = 500;

/// 現在時刻から保持期間を引いた匿名化カットオフ（UTC）
pub fn ip_anonymization_cutoff() -> DateTime<Utc> {
    ip_anonymization_cutoff_with(&SystemClock)
}

/// 指定した時計の現在時刻から保持期間を引いたカットオフ
pub fn ip_anonymization_cutoff_with(clock: &dyn Clock) -> DateTime<Utc> {
    ip_anonymization_cutoff_at(clock.now(), IP_ANONYMIZATION_RETENTION_DAYS)
}

/// 基準時刻と保持日数からカットオフを計算
pub fn ip_anonymization_cutoff_at(now: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    now - Duration::days(retention_days)
}
