//! Error types for SafeFetch

use thiserror::Error;

/// Errors that can occur while validating, fetching or converting a URL
///
/// Every variant is terminal for the invocation. [`crate::Tool::execute`]
/// turns them into the uniform `"Error: ..."` string.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Tool input did not have the expected shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or has no host
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// URL scheme is not the permitted one
    #[error("Insecure or disallowed URL scheme: {0}")]
    InsecureScheme(String),

    /// URL points at loopback, link-local or private network space
    #[error("Blocked URL: {0} is an internal or private target")]
    BlockedTarget(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Could not fetch url: {0}")]
    FetchFailed(u16),

    /// Fetch did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Redirect chain is longer than allowed
    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// Redirect response without a usable Location header
    #[error("Redirect with missing or invalid Location header")]
    MissingRedirectLocation,

    /// Response body could not be turned into text
    #[error("Content conversion failed: {0}")]
    ConversionFailed(String),

    /// TCP or TLS connection to the server could not be established
    #[error("Could not connect to server: {0}")]
    Connect(String),

    /// Transport-level failure (DNS, body read, protocol)
    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }

    /// True for connect-level transport failures worth a bounded retry
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, FetchError::Connect(_))
    }
}
