//! URL safety validation
//!
//! Decides, before any network access, whether a URL may be dereferenced
//! from inside the hosting environment. [`UrlSafetyValidator::check`] is a
//! pure function of the input string. [`UrlSafetyValidator::resolve`] is the
//! optional second stage that looks the host up and applies the same address
//! rules to every resolved address.
//!
//! Address rules use [`std::net`] types and numeric range checks, so
//! spellings such as `0177.0.0.1`, `2130706433` or `[::ffff:7f00:1]` are
//! judged by the address they denote, not by how they are written.

use crate::config::ValidatorConfig;
use crate::error::FetchError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::warn;
use url::{Host, Url};

/// Why a URL was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Not parseable as an absolute URL with a host
    MalformedUrl(String),
    /// Scheme other than the permitted one
    InsecureScheme(String),
    /// Host is loopback, link-local, private or internal-only
    BlockedTarget(String),
}

/// Outcome of validating a candidate URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allowed,
    Denied(DenyReason),
}

impl SafetyVerdict {
    /// True if the URL may be fetched
    pub fn is_allowed(&self) -> bool {
        matches!(self, SafetyVerdict::Allowed)
    }

    /// Convert into a `Result`, mapping denials onto [`FetchError`]
    pub fn into_result(self) -> Result<(), FetchError> {
        match self {
            SafetyVerdict::Allowed => Ok(()),
            SafetyVerdict::Denied(reason) => Err(reason.into()),
        }
    }
}

impl From<DenyReason> for FetchError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::MalformedUrl(detail) => FetchError::MalformedUrl(detail),
            DenyReason::InsecureScheme(scheme) => FetchError::InsecureScheme(scheme),
            DenyReason::BlockedTarget(host) => FetchError::BlockedTarget(host),
        }
    }
}

/// Host after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetHost {
    Name(String),
    Ip(IpAddr),
}

impl fmt::Display for TargetHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetHost::Name(name) => f.write_str(name),
            TargetHost::Ip(ip) => write!(f, "{}", ip),
        }
    }
}

impl TargetHost {
    fn from_url_host(host: Host<&str>) -> Self {
        match host {
            Host::Ipv4(v4) => TargetHost::Ip(IpAddr::V4(v4)),
            Host::Ipv6(v6) => TargetHost::Ip(IpAddr::V6(v6)),
            Host::Domain(domain) => {
                let name = normalize_name(domain);
                // A domain that spells an address after normalization is that address
                match name.parse::<IpAddr>() {
                    Ok(ip) => TargetHost::Ip(ip),
                    Err(_) => TargetHost::Name(name),
                }
            }
        }
    }
}

/// Lower-case, strip IPv6 brackets and trailing dots
fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Validator for candidate URLs
///
/// Holds an immutable [`ValidatorConfig`]; every call is independent.
#[derive(Debug, Clone, Default)]
pub struct UrlSafetyValidator {
    config: ValidatorConfig,
}

impl UrlSafetyValidator {
    /// Create a validator with the given rules
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// The rules this validator applies
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Judge an untrusted URL string
    ///
    /// Never panics and performs no I/O.
    pub fn check(&self, url: &str) -> SafetyVerdict {
        match Url::parse(url) {
            Ok(parsed) => self.check_url(&parsed),
            Err(e) => SafetyVerdict::Denied(DenyReason::MalformedUrl(e.to_string())),
        }
    }

    /// Judge an already parsed URL (used for redirect targets)
    pub fn check_url(&self, url: &Url) -> SafetyVerdict {
        if !url
            .scheme()
            .eq_ignore_ascii_case(&self.config.permitted_scheme)
        {
            return SafetyVerdict::Denied(DenyReason::InsecureScheme(url.scheme().to_string()));
        }

        let Some(host) = url.host() else {
            return SafetyVerdict::Denied(DenyReason::MalformedUrl(
                "URL has no host".to_string(),
            ));
        };

        let target = TargetHost::from_url_host(host);
        let name = target.to_string();
        if name.is_empty() {
            return SafetyVerdict::Denied(DenyReason::MalformedUrl(
                "URL has an empty host".to_string(),
            ));
        }

        if self.is_trusted(&name) {
            return SafetyVerdict::Allowed;
        }

        if self.is_blocked_target(&target) {
            return SafetyVerdict::Denied(DenyReason::BlockedTarget(name));
        }

        SafetyVerdict::Allowed
    }

    /// Resolve the URL's host and re-check every resolved address
    ///
    /// IP-literal hosts are returned as is. Domains are looked up when
    /// `resolve_dns` is enabled; a failed lookup fails closed. The returned
    /// addresses are the ones the caller should connect to.
    pub async fn resolve(&self, url: &Url) -> Result<Vec<SocketAddr>, FetchError> {
        let host = url
            .host()
            .ok_or_else(|| FetchError::MalformedUrl("URL has no host".to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| FetchError::MalformedUrl("URL has no port".to_string()))?;

        let target = TargetHost::from_url_host(host);
        let name = target.to_string();

        let addrs: Vec<SocketAddr> = match &target {
            TargetHost::Ip(ip) => vec![SocketAddr::new(*ip, port)],
            TargetHost::Name(domain) => {
                if !self.config.resolve_dns {
                    return Ok(Vec::new());
                }
                tokio::net::lookup_host((domain.as_str(), port))
                    .await
                    .map_err(|e| {
                        FetchError::Request(format!("could not resolve host {}: {}", domain, e))
                    })?
                    .collect()
            }
        };

        if addrs.is_empty() {
            return Err(FetchError::Request(format!(
                "host {} resolved to no addresses",
                name
            )));
        }

        if !self.is_trusted(&name) {
            if let Some(addr) = addrs.iter().find(|addr| is_internal_ip(addr.ip())) {
                warn!(host = %name, ip = %addr.ip(), "Host resolves to an internal address");
                return Err(FetchError::BlockedTarget(format!(
                    "{} (resolves to {})",
                    name,
                    addr.ip()
                )));
            }
        }

        Ok(addrs)
    }

    fn is_trusted(&self, name: &str) -> bool {
        self.config
            .trusted_hosts
            .iter()
            .any(|trusted| normalize_name(trusted) == name)
    }

    fn is_blocked_target(&self, target: &TargetHost) -> bool {
        let name = target.to_string();
        if self
            .config
            .blocked_hosts
            .iter()
            .any(|blocked| normalize_name(blocked) == name)
        {
            return true;
        }

        match target {
            TargetHost::Ip(ip) => is_internal_ip(*ip),
            TargetHost::Name(name) => self.config.blocked_suffixes.iter().any(|suffix| {
                let suffix = suffix.to_ascii_lowercase();
                name.ends_with(&suffix) || name == suffix.trim_start_matches('.')
            }),
        }
    }
}

/// True if the address is loopback, link-local, private or otherwise internal
pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_ipv4(v4),
        IpAddr::V6(v6) => is_internal_ipv6(v6),
    }
}

fn is_internal_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    a == 10
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
        || a == 127
        || (a == 169 && b == 254)
        || a == 0
        || (a == 100 && (64..=127).contains(&b)) // CGNAT
        || ip.is_broadcast()
}

fn is_internal_ipv6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }

    let segments = ip.segments();
    // fe80::/10 link-local, fc00::/7 unique local
    if segments[0] & 0xffc0 == 0xfe80 || segments[0] & 0xfe00 == 0xfc00 {
        return true;
    }

    // 64:ff9b::/96 NAT64 carries an IPv4 address in the low 32 bits
    if segments[0] == 0x64 && segments[1] == 0xff9b && segments[2..6].iter().all(|&s| s == 0) {
        let [.., hi, lo] = segments;
        let embedded = Ipv4Addr::from((u32::from(hi) << 16) | u32::from(lo));
        return is_internal_ipv4(embedded);
    }

    // IPv4-mapped and IPv4-compatible
    match ip.to_ipv4() {
        Some(v4) => is_internal_ipv4(v4),
        None => false,
    }
}
