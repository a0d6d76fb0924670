//! Immutable configuration shared by the validator and the pipeline

use std::time::Duration;

/// Default hard cap on extracted text, in characters
pub const DEFAULT_MAX_LENGTH: usize = 30_000;

/// Default bound on the whole fetch (all redirect hops plus body)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of redirect hops that will be validated and followed
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default cap on raw response bytes read from the wire
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Hostnames that are always denied
const DEFAULT_BLOCKED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Internal-only suffixes that are always denied
const DEFAULT_BLOCKED_SUFFIXES: &[&str] = &[".local", ".localhost"];

/// Rules for [`UrlSafetyValidator`](crate::UrlSafetyValidator)
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// The single scheme a URL may use (lower-case)
    pub permitted_scheme: String,
    /// Exact hostnames that are denied
    pub blocked_hosts: Vec<String>,
    /// Hostname suffixes that are denied (with leading dot)
    pub blocked_suffixes: Vec<String>,
    /// Hostnames exempt from the host and address rules
    pub trusted_hosts: Vec<String>,
    /// Resolve domain names and re-check the resolved addresses
    pub resolve_dns: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            permitted_scheme: "https".to_string(),
            blocked_hosts: DEFAULT_BLOCKED_HOSTS.iter().map(|s| s.to_string()).collect(),
            blocked_suffixes: DEFAULT_BLOCKED_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trusted_hosts: Vec::new(),
            resolve_dns: true,
        }
    }
}

/// Configuration for the whole fetch tool
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum length of returned text, in characters
    pub max_length: usize,
    /// Bound on the whole fetch
    pub timeout: Duration,
    /// Redirect hops to follow; 0 disables redirects
    pub max_redirects: usize,
    /// Cap on raw body bytes
    pub max_body_bytes: usize,
    /// Retries for connect-level failures only
    pub max_retries: usize,
    /// Custom User-Agent
    pub user_agent: Option<String>,
    /// URL safety rules
    pub validator: ValidatorConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_retries: 0,
            user_agent: None,
            validator: ValidatorConfig::default(),
        }
    }
}
