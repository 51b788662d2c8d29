//! URL safety checks applied before any outbound page fetch.
//!
//! [`validate_url`] is pure: it only parses and classifies the literal URL.
//! [`check_resolved`] applies the same address rules to a DNS answer set so
//! the fetcher can refuse hosts that resolve into internal networks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use url::{Host, Url};

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];
const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".localhost"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlRejection {
    #[error("Invalid URL: {0}")]
    Malformed(String),

    #[error("Invalid URL scheme: only http and https are allowed, got '{0}'")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("Localhost access denied")]
    Loopback,

    #[error("Access to private/internal IPs not allowed: {0}")]
    ReservedAddress(IpAddr),

    #[error("Access to local/internal domains not allowed: {0}")]
    InternalDomain(String),

    #[error("Host '{host}' resolved to private/internal IP {addr}")]
    ResolvedToReserved { host: String, addr: IpAddr },

    #[error("Host '{0}' did not resolve to any address")]
    Unresolved(String),
}

/// Parse `raw` and reject anything that is not safe to fetch server-side.
pub fn validate_url(raw: &str) -> Result<Url, UrlRejection> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlRejection::Malformed(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::UnsupportedScheme(other.to_string())),
    }

    match url.host() {
        None => Err(UrlRejection::MissingHost),
        Some(Host::Ipv4(addr)) => check_ip(IpAddr::V4(addr)),
        Some(Host::Ipv6(addr)) => check_ip(IpAddr::V6(addr)),
        Some(Host::Domain(domain)) => check_domain(domain),
    }?;

    Ok(url)
}

/// Validate every address a host resolved to and return the one to pin the
/// connection to. A single reserved address rejects the whole host.
pub fn check_resolved<I>(host: &str, addrs: I) -> Result<SocketAddr, UrlRejection>
where
    I: IntoIterator<Item = SocketAddr>,
{
    let mut pinned = None;
    for addr in addrs {
        if is_reserved_ip(addr.ip()) {
            return Err(UrlRejection::ResolvedToReserved {
                host: host.to_string(),
                addr: addr.ip(),
            });
        }
        pinned.get_or_insert(addr);
    }
    pinned.ok_or_else(|| UrlRejection::Unresolved(host.to_string()))
}

fn check_ip(ip: IpAddr) -> Result<(), UrlRejection> {
    if ip.is_loopback() {
        return Err(UrlRejection::Loopback);
    }
    if is_reserved_ip(ip) {
        return Err(UrlRejection::ReservedAddress(ip));
    }
    Ok(())
}

fn check_domain(domain: &str) -> Result<(), UrlRejection> {
    let host = domain.trim_end_matches('.').to_ascii_lowercase();

    if LOOPBACK_HOSTS.contains(&host.as_str()) {
        return Err(UrlRejection::Loopback);
    }
    if INTERNAL_SUFFIXES.iter().any(|suffix| host.ends_with(suffix)) {
        return Err(UrlRejection::InternalDomain(host));
    }
    Ok(())
}

/// True for any address that must never be the target of a server-side fetch.
pub fn is_reserved_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => is_reserved_ipv4(addr),
        IpAddr::V6(addr) => is_reserved_ipv6(addr),
    }
}

fn is_reserved_ipv4(addr: Ipv4Addr) -> bool {
    let [a, b, c, _] = addr.octets();

    addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_documentation()
        || addr.is_unspecified()
        || addr.is_multicast()
        || a == 0
        // shared address space (carrier-grade NAT)
        || (a == 100 && (b & 0xc0) == 64)
        // benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // IETF protocol assignments
        || (a == 192 && b == 0 && c == 0)
        // reserved for future use
        || a >= 240
}

fn is_reserved_ipv6(addr: Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_reserved_ipv4(v4);
    }

    let segments = addr.segments();
    let first = segments[0];

    // NAT64 well-known prefix 64:ff9b::/96 embeds an IPv4 address in the low 32 bits.
    if first == 0x0064 && segments[1] == 0xff9b && segments[2..6].iter().all(|s| *s == 0) {
        return is_reserved_ipv4(embedded_ipv4(segments[6], segments[7]));
    }
    // 6to4 2002::/16 carries it right after the prefix.
    if first == 0x2002 {
        return is_reserved_ipv4(embedded_ipv4(segments[1], segments[2]));
    }

    addr.is_loopback()
        || addr.is_unspecified()
        || addr.is_multicast()
        // ::/8, including the deprecated IPv4-compatible form
        || (first & 0xff00) == 0x0000
        // discard-only 100::/64
        || (first == 0x0100 && segments[1..4].iter().all(|s| *s == 0))
        // IETF protocol assignments 2001::/23, Teredo included
        || (first == 0x2001 && (segments[1] & 0xfe00) == 0)
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
        || (first & 0xffc0) == 0xfec0
        || (first == 0x2001 && segments[1] == 0x0db8)
}

fn embedded_ipv4(hi: u16, lo: u16) -> Ipv4Addr {
    let [a, b] = hi.to_be_bytes();
    let [c, d] = lo.to_be_bytes();
    Ipv4Addr::new(a, b, c, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(raw: &str) -> UrlRejection {
        validate_url(raw).expect_err(raw)
    }

    #[test]
    fn accepts_public_http_and_https() {
        assert!(validate_url("https://example.com/article").is_ok());
        assert!(validate_url("http://93.184.216.34/page").is_ok());
        assert!(validate_url("  https://news.example.org/a?b=c  ").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        for raw in ["file:///etc/passwd", "ftp://example.com/x", "gopher://example.com", "javascript:alert(1)"] {
            assert!(
                matches!(rejected(raw), UrlRejection::UnsupportedScheme(_)),
                "{raw} should be rejected by scheme"
            );
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(rejected("not a url"), UrlRejection::Malformed(_)));
        assert!(matches!(rejected("/relative/path"), UrlRejection::Malformed(_)));
    }

    #[test]
    fn rejects_loopback_tokens() {
        assert_eq!(rejected("http://localhost:8080/"), UrlRejection::Loopback);
        assert_eq!(rejected("http://LOCALHOST./"), UrlRejection::Loopback);
        assert_eq!(rejected("http://127.0.0.1/admin"), UrlRejection::Loopback);
        assert_eq!(rejected("http://127.8.0.1/"), UrlRejection::Loopback);
        assert_eq!(rejected("http://[::1]:9000/"), UrlRejection::Loopback);
    }

    #[test]
    fn rejects_private_and_reserved_literals() {
        for raw in [
            "http://10.0.0.5/page",
            "http://172.16.3.4/",
            "http://192.168.1.2/",
            "http://169.254.169.254/latest/meta-data/",
            "http://0.0.0.0/",
            "http://100.64.0.1/",
            "http://198.18.0.1/",
            "http://240.0.0.1/",
            "http://255.255.255.255/",
            "http://[fe80::1]/",
            "http://[fd00::1]/",
            "http://[::ffff:10.0.0.1]/",
            "http://[64:ff9b::a00:1]/",
            "http://[::a00:1]/",
            "http://[100::1]/",
            "http://[2001::1]/",
            "http://[2001:1ff::1]/",
            "http://[2002:a00:1::]/",
            "http://[2002:a9fe:a9fe::1]/",
        ] {
            assert!(
                matches!(rejected(raw), UrlRejection::ReservedAddress(_)),
                "{raw} should be rejected as reserved"
            );
        }
    }

    #[test]
    fn decimal_encoded_loopback_is_caught() {
        // WHATWG parsing turns 2130706433 into 127.0.0.1.
        assert_eq!(rejected("http://2130706433/"), UrlRejection::Loopback);
    }

    #[test]
    fn rejects_internal_suffixes() {
        assert!(matches!(rejected("http://printer.local/"), UrlRejection::InternalDomain(_)));
        assert!(matches!(rejected("https://metadata.google.internal/"), UrlRejection::InternalDomain(_)));
        assert!(matches!(rejected("http://app.localhost/"), UrlRejection::InternalDomain(_)));
    }

    #[test]
    fn public_ipv6_is_allowed() {
        assert!(validate_url("http://[2606:4700:4700::1111]/").is_ok());
        // 6to4 wrapping a public IPv4 (93.184.216.34)
        assert!(validate_url("http://[2002:5db8:d822::1]/").is_ok());
        // just past 2001::/23
        assert!(validate_url("http://[2001:200::1]/").is_ok());
    }

    #[test]
    fn resolved_set_with_any_reserved_address_is_rejected() {
        let addrs: Vec<SocketAddr> = vec![
            "93.184.216.34:443".parse().unwrap(),
            "10.1.2.3:443".parse().unwrap(),
        ];
        let err = check_resolved("rebind.example", addrs).unwrap_err();
        assert_eq!(
            err,
            UrlRejection::ResolvedToReserved {
                host: "rebind.example".into(),
                addr: "10.1.2.3".parse().unwrap(),
            }
        );
    }

    #[test]
    fn resolved_set_pins_first_public_address() {
        let addrs: Vec<SocketAddr> = vec![
            "93.184.216.34:443".parse().unwrap(),
            "93.184.216.35:443".parse().unwrap(),
        ];
        let pinned = check_resolved("example.com", addrs).unwrap();
        assert_eq!(pinned, "93.184.216.34:443".parse().unwrap());
    }

    #[test]
    fn empty_resolution_is_rejected() {
        let err = check_resolved("void.example", Vec::new()).unwrap_err();
        assert_eq!(err, UrlRejection::Unresolved("void.example".into()));
    }
}
