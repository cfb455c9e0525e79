//! 時刻ソースの抽象化
//!
//! ストアと監査ログは現在時刻を直接参照せず、`Clock`経由で取得する。
//! テストでは`ManualClock`で時刻を固定・前進させる。

use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::{Arc, Mutex};

/// 現在時刻を返すトレイト
pub trait Clock: Send + Sync {
    /// 現在のUTC時刻
    fn now(&self) -> DateTime<Utc>;
}

/// OSの壁時計
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_micros(Utc::now())
    }
}

/// テスト用の手動時計
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// 指定時刻で開始する時計を作成
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(truncate_to_micros(start))),
        }
    }

    /// 時計を進める
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// 時刻を設定する
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = truncate_to_micros(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// タイムスタンプをマイクロ秒精度に切り詰める
///
/// 保存形式（RFC 3339、マイクロ秒）と往復しても値が変わらないようにする。
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond();
    ts.with_nanosecond(nanos - nanos % 1_000).unwrap_or(ts)
}

/// 固定幅のRFC 3339文字列（UTC、マイクロ秒、`Z`終端）に変換
///
/// 辞書順と時刻順が一致するため、SQLiteの文字列比較で範囲検索できる。
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_to_micros_drops_nanos() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
            + Duration::nanoseconds(123_456_789);
        let truncated = truncate_to_micros(ts);
        assert_eq!(truncated.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_format_timestamp_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + Duration::microseconds(1);
        assert_eq!(format_timestamp(&a), "2026-01-02T03:04:05.000000Z");
        assert_eq!(format_timestamp(&a).len(), format_timestamp(&b).len());
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(25));
        assert_eq!(clock.now(), start + Duration::hours(25));
    }

    #[test]
    fn test_system_clock_is_utc_and_truncated() {
        let now = SystemClock.now();
        assert_eq!(now.nanosecond() % 1_000, 0);
    }
}
