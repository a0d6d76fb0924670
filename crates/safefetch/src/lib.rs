//! SafeFetch - SSRF-guarded web content fetching for LLM tools
//!
//! This crate fetches a caller-supplied URL only after proving it does not
//! point at loopback, link-local or private network space, and returns the
//! page as bounded, whitespace-normalized plain text.
//!
//! ## Components
//!
//! - [`UrlSafetyValidator`] - pure allow/deny decision for a URL, plus an
//!   optional resolve-and-recheck stage
//! - [`ContentExtractionPipeline`] - fetch with validated redirects, convert
//!   HTML to text, normalize, truncate
//! - [`Tool`] - orchestrator whose [`Tool::execute`] always returns a string
//!
//! ```no_run
//! # async fn run() {
//! let text = safefetch::fetch_safe_content("https://example.com").await;
//! if text.starts_with(safefetch::ERROR_PREFIX) {
//!     eprintln!("{}", text);
//! }
//! # }
//! ```

pub mod client;
pub mod config;
mod convert;
mod error;
mod pipeline;
mod tool;
mod types;
mod validator;

pub use client::{fetch_safe_content, fetch_safe_content_with_config};
pub use config::{FetchConfig, ValidatorConfig};
pub use convert::{html_to_text, normalize_whitespace};
pub use error::FetchError;
pub use pipeline::ContentExtractionPipeline;
pub use tool::{Tool, ToolBuilder, ERROR_PREFIX, TOOL_NAME};
pub use types::{ExtractedDocument, FetchUrlInput};
pub use validator::{is_internal_ip, DenyReason, SafetyVerdict, UrlSafetyValidator};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "SafeFetch/1.0";

/// Tool description for LLM consumption
pub const TOOL_DESCRIPTION: &str = r#"Fetches the content of a public web page from a given HTTPS URL and returns its text content.

Input must be an object containing a { url } field with a valid, public HTTPS URL (e.g., "https://example.com").

Do NOT provide URLs that are:
- not HTTPS
- local/internal (e.g., localhost, 127.0.0.1, private IPs)
- suspected to be unsafe or not publicly accessible

Returns only the text of the page body, truncated for length if necessary."#;

/// Extended documentation for LLM consumption (llmtxt)
pub const TOOL_LLMTXT: &str = r#"# fetchurl Tool

Fetches a public web page over HTTPS and returns its body text.

## Capabilities
- Refuses non-HTTPS URLs
- Refuses localhost, loopback, link-local, private and `.local` targets
- Re-checks DNS answers and every redirect hop against the same rules
- Strips markup, scripts and styles
- Collapses whitespace runs into single newlines
- Truncates output to 30000 characters
- Strict timeout

## Input Parameters
- `url` (required): The HTTPS URL to fetch

## Output
Plain text on success. On failure a single line starting with `Error: `.

## Examples

### Fetch a page
```json
{"url": "https://en.wikipedia.org/wiki/OpenAI"}
```

### Rejected input
```json
{"url": "http://127.0.0.1/admin"}
```
returns `Error: Insecure or disallowed URL scheme: Only HTTPS URLs are allowed.`

## Error Handling
- Invalid or non-HTTPS URLs return an error
- Internal targets (including via redirect or DNS) return `Error: Blocked URL: ...`
- Non-success status returns `Error: Could not fetch url: <status>`
- Binary content returns `Error: Content conversion failed: ...`
- Slow servers return `Error: Request timed out`
"#;
