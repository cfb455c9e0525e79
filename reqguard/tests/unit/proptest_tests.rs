//! Property-based tests using proptest

use proptest::prelude::*;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{Duration, TimeZone, Utc};
use reqguard::audit::hash_chain::{compute_entry_hash, verify_entries, GENESIS_HASH};
use reqguard::audit::types::LogEntry;
use reqguard::common::error::GuardError;
use reqguard::common::ip::anonymize_ip;
use reqguard::idempotency::key::{compute_response_hash, validate_key, MAX_KEY_LENGTH};
use uuid::Uuid;

fn build_chain(actions: &[String]) -> Vec<LogEntry> {
    let base = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
    let mut previous = GENESIS_HASH.to_string();
    actions
        .iter()
        .enumerate()
        .map(|(i, action)| {
            let mut entry = LogEntry::new("did:example:p", "payment", "pay", action.as_str(), "success");
            entry.id = Some(Uuid::new_v4());
            entry.sequence_number = i as i64 + 1;
            entry.timestamp = Some(base + Duration::seconds(i as i64));
            entry.previous_hash = compute_entry_hash(&previous, &entry);
            previous = entry.previous_hash.clone();
            entry
        })
        .collect()
}

// ---------------------------------------------------------------------------
// validate_key
// ---------------------------------------------------------------------------

proptest! {
    /// 1〜64文字のキーは常に有効
    #[test]
    fn keys_within_limit_are_valid(key in "[a-zA-Z0-9_-]{1,64}") {
        prop_assert!(validate_key(&key).is_ok());
    }

    /// 65文字以上は常にKeyTooLong
    #[test]
    fn keys_over_limit_are_rejected(key in "[a-z]{65,128}") {
        let result = validate_key(&key);
        let is_too_long = matches!(
            result,
            Err(GuardError::KeyTooLong { max: MAX_KEY_LENGTH, .. })
        );
        prop_assert!(is_too_long);
    }

    /// マルチバイト文字もバイト数ではなく文字数で数える
    #[test]
    fn multibyte_keys_count_characters(len in 1usize..=64) {
        let key = "鍵".repeat(len);
        prop_assert!(validate_key(&key).is_ok());
    }
}

// ---------------------------------------------------------------------------
// compute_response_hash
// ---------------------------------------------------------------------------

proptest! {
    /// 決定的で、常に16進64文字
    #[test]
    fn response_hash_is_deterministic_hex(body in prop::collection::vec(any::<u8>(), 0..512)) {
        let first = compute_response_hash(&body);
        prop_assert_eq!(first.len(), 64);
        prop_assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        prop_assert_eq!(first, compute_response_hash(&body));
    }

    /// 異なるボディは異なるハッシュ
    #[test]
    fn distinct_bodies_hash_differently(a in "[a-z]{1,32}", b in "[a-z]{1,32}") {
        prop_assume!(a != b);
        prop_assert_ne!(compute_response_hash(a.as_bytes()), compute_response_hash(b.as_bytes()));
    }
}

// ---------------------------------------------------------------------------
// anonymize_ip
// ---------------------------------------------------------------------------

proptest! {
    /// IPv4は最終オクテットのみゼロになる
    #[test]
    fn ipv4_keeps_first_three_octets(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
        let ip = Ipv4Addr::new(a, b, c, d).to_string();
        prop_assert_eq!(anonymize_ip(&ip), Ipv4Addr::new(a, b, c, 0).to_string());
    }

    /// IPv6は上位48ビットのみ残る
    #[test]
    fn ipv6_keeps_first_48_bits(segments in prop::array::uniform8(any::<u16>())) {
        let addr = Ipv6Addr::from(segments);
        // IPv4-mapped範囲はIPv4として扱われるため除外
        prop_assume!(addr.to_ipv4_mapped().is_none());
        let expected = Ipv6Addr::new(segments[0], segments[1], segments[2], 0, 0, 0, 0, 0).to_string();
        prop_assert_eq!(anonymize_ip(&addr.to_string()), expected);
    }

    /// 匿名化は冪等
    #[test]
    fn anonymization_is_idempotent(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
        let once = anonymize_ip(&Ipv4Addr::new(a, b, c, d).to_string());
        prop_assert_eq!(anonymize_ip(&once), once.clone());
    }
}

// ---------------------------------------------------------------------------
// hash chain
// ---------------------------------------------------------------------------

proptest! {
    /// 正しく構築したチェーンは常に検証を通る
    #[test]
    fn built_chain_verifies(actions in prop::collection::vec("[a-z]{1,8}", 1..30)) {
        let entries = build_chain(&actions);
        let result = verify_entries(&entries);
        prop_assert!(result.valid);
        prop_assert_eq!(result.entries_checked, entries.len() as i64);
    }

    /// 任意の位置の内容改ざんは、その位置から再計算しても検出される
    #[test]
    fn tampering_is_detected(
        actions in prop::collection::vec("[a-z]{1,8}", 2..30),
        index in any::<prop::sample::Index>(),
    ) {
        let mut entries = build_chain(&actions);
        let i = index.index(entries.len());
        entries[i].action.push_str("-tampered");

        // 改ざん位置以降のハッシュを付け替えない場合
        let result = verify_entries(&entries);
        prop_assert!(!result.valid);
        prop_assert_eq!(result.tampered_sequence, Some(i as i64 + 1));

        // 改ざん位置のハッシュだけ付け替えた場合は、次のリンクで検出される
        let previous = if i == 0 { GENESIS_HASH.to_string() } else { entries[i - 1].previous_hash.clone() };
        entries[i].previous_hash = compute_entry_hash(&previous, &entries[i]);
        let result = verify_entries(&entries);
        if i + 1 < entries.len() {
            prop_assert!(!result.valid);
            prop_assert_eq!(result.tampered_sequence, Some(i as i64 + 2));
        } else {
            // 末尾エントリは後続がないため、ハッシュごと付け替えられると鎖だけでは検出できない
            prop_assert!(result.valid);
        }
    }
}
