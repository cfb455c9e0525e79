// IPアドレス匿名化のユニットテスト

#[cfg(test)]
mod anonymize_ip_tests {
    use reqguard::common::ip::anonymize_ip;

    #[test]
    fn test_ipv4_last_octet_zeroed() {
        assert_eq!(anonymize_ip("192.168.1.100"), "192.168.1.0");
        assert_eq!(anonymize_ip("172.16.254.255"), "172.16.254.0");
    }

    #[test]
    fn test_ipv6_truncated_to_48_bits() {
        assert_eq!(
            anonymize_ip("2001:0db8:85a3:0000:0000:8a2e:0370:7334"),
            "2001:db8:85a3::"
        );
    }

    #[test]
    fn test_ipv6_loopback() {
        assert_eq!(anonymize_ip("::1"), "::");
    }

    #[test]
    fn test_ipv4_mapped_ipv6_is_treated_as_ipv4() {
        assert_eq!(anonymize_ip("::ffff:10.1.2.3"), "10.1.2.0");
    }

    #[test]
    fn test_invalid_input_yields_empty() {
        assert_eq!(anonymize_ip(""), "");
        assert_eq!(anonymize_ip("not-an-ip"), "");
        assert_eq!(anonymize_ip("256.1.1.1"), "");
        assert_eq!(anonymize_ip("10.0.0.1:443"), "");
    }
}
