//! IPアドレス正規化・匿名化ユーティリティ
//!
//! IPv4-mapped IPv6アドレスのIPv4への正規化と、
//! 保持期限を過ぎたIPアドレスの粗視化を提供する。

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// IPアドレスを正規化する
///
/// IPv4-mapped IPv6（::ffff:x.x.x.x）をIPv4に変換。
/// それ以外はそのまま返す。
pub fn normalize_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                IpAddr::V4(v4)
            } else {
                IpAddr::V6(v6)
            }
        }
        v4 => v4,
    }
}

/// IPアドレスを匿名化する
///
/// - IPv4: 最終オクテットをゼロにする（`192.168.1.100` → `192.168.1.0`）
/// - IPv6: 上位48ビットのみ残し、圧縮表記で返す（`2001:db8:85a3::`）
/// - 空文字列・解析不能な入力: 空文字列
pub fn anonymize_ip(ip: &str) -> String {
    let parsed = match ip.trim().parse::<IpAddr>() {
        Ok(addr) => normalize_ip(addr),
        Err(_) => return String::new(),
    };

    match parsed {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            Ipv4Addr::new(a, b, c, 0).to_string()
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            Ipv6Addr::new(segments[0], segments[1], segments[2], 0, 0, 0, 0, 0).to_string()
        }
    }
}
