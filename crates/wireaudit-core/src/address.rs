use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Where an endpoint address sits relative to the private/reserved ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Private,
    Public,
    /// Absent or not an IP literal. Never satisfies a "known" requirement.
    Unknown,
}

impl AddressClass {
    pub fn is_known(self) -> bool {
        self != AddressClass::Unknown
    }
}

pub fn classify_address(addr: Option<&str>) -> AddressClass {
    let Some(ip) = addr.and_then(parse_ip) else {
        return AddressClass::Unknown;
    };
    let private = match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    };
    if private {
        AddressClass::Private
    } else {
        AddressClass::Public
    }
}

/// True only for a parseable address inside 10/8, 172.16/12, 127/8,
/// 169.254/16 or 192.168/16 (or the IPv6 loopback/link-local/ULA ranges).
pub fn is_private(addr: &str) -> bool {
    classify_address(Some(addr)) == AddressClass::Private
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed.parse::<IpAddr>().ok()
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    match a {
        10 | 127 => true,
        172 => (16..=31).contains(&b),
        169 => b == 254,
        192 => b == 168,
        _ => false,
    }
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback() || (first & 0xffc0) == 0xfe80 || (first & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ranges() {
        for addr in ["10.0.0.5", "172.16.0.1", "172.31.255.255", "127.0.0.1", "169.254.10.10", "192.168.1.1"] {
            assert!(is_private(addr), "{addr} should be private");
        }
    }

    #[test]
    fn test_public_edges() {
        for addr in ["8.8.8.8", "172.15.255.255", "172.32.0.1", "169.253.0.1", "192.169.0.1", "11.0.0.1"] {
            assert!(!is_private(addr), "{addr} should not be private");
            assert_eq!(classify_address(Some(addr)), AddressClass::Public);
        }
    }

    #[test]
    fn test_unknown_addresses() {
        assert_eq!(classify_address(None), AddressClass::Unknown);
        assert_eq!(classify_address(Some("")), AddressClass::Unknown);
        assert_eq!(classify_address(Some("db.internal")), AddressClass::Unknown);
        assert_eq!(classify_address(Some("10.0.0")), AddressClass::Unknown);
        assert!(!is_private("not-an-ip"));
    }

    #[test]
    fn test_ipv6() {
        assert_eq!(classify_address(Some("::1")), AddressClass::Private);
        assert_eq!(classify_address(Some("fe80::1")), AddressClass::Private);
        assert_eq!(classify_address(Some("[fd00::10]")), AddressClass::Private);
        assert_eq!(classify_address(Some("::ffff:192.168.0.4")), AddressClass::Private);
        assert_eq!(classify_address(Some("2001:4860:4860::8888")), AddressClass::Public);
    }
}
