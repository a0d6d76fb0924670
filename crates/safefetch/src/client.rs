//! Free-function entry points
//!
//! Thin wrappers around [`Tool`] for callers that only need the string
//! contract.

use crate::config::FetchConfig;
use crate::tool::Tool;
use crate::types::FetchUrlInput;

/// Fetch a URL with the default configuration
///
/// Returns the extracted text, or a string starting with `"Error: "`.
pub async fn fetch_safe_content(url: &str) -> String {
    Tool::default().execute(FetchUrlInput::new(url)).await
}

/// Fetch a URL with a custom configuration
pub async fn fetch_safe_content_with_config(url: &str, config: FetchConfig) -> String {
    Tool::from_config(config)
        .execute(FetchUrlInput::new(url))
        .await
}
