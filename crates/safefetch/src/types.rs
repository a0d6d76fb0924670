//! Core types for SafeFetch

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input object for the fetch tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Input object containing the HTTPS URL for the web page to fetch.")]
pub struct FetchUrlInput {
    /// A valid HTTPS URL to fetch, e.g. "https://example.com".
    pub url: String,
}

impl FetchUrlInput {
    /// Create a new input with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Bounded plain-text result of a successful fetch
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDocument {
    /// The requested URL
    pub url: String,

    /// URL the content was finally read from, after redirects
    pub final_url: String,

    /// HTTP status code of the final response
    pub status_code: u16,

    /// Content-Type header value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Normalized, truncated text
    pub text: String,

    /// Length of the normalized text before truncation, in characters
    pub original_length: usize,

    /// True if the text was cut to the configured maximum
    pub truncated: bool,
}
