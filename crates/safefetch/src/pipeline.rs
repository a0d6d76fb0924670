//! Bounded fetch and text extraction
//!
//! Given a URL that already passed [`UrlSafetyValidator::check`], the
//! pipeline fetches it, converts the body to plain text, normalizes
//! whitespace and truncates the result.
//!
//! Redirects are never followed by the HTTP client. Each `Location` is
//! validated with the same rules as the original URL before the next hop is
//! requested, and every hop connects only to addresses that passed the
//! resolved-address check.

use crate::config::FetchConfig;
use crate::convert::{
    html_to_text, is_binary_content_type, is_html, looks_binary, normalize_whitespace,
    truncate_chars,
};
use crate::error::FetchError;
use crate::types::ExtractedDocument;
use crate::validator::{SafetyVerdict, UrlSafetyValidator};
use crate::DEFAULT_USER_AGENT;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use std::future::Future;
use std::net::SocketAddr;
use tracing::{debug, error, warn};
use url::Url;

/// Accept header preferring HTML and text
const ACCEPT_TEXT: &str = "text/html, application/xhtml+xml, text/plain;q=0.9, */*;q=0.1";

/// Fetch, convert, normalize and truncate
#[derive(Debug, Clone, Default)]
pub struct ContentExtractionPipeline {
    config: FetchConfig,
    validator: UrlSafetyValidator,
}

impl ContentExtractionPipeline {
    /// Create a pipeline; redirect hops are judged by `config.validator`
    pub fn new(config: FetchConfig) -> Self {
        let validator = UrlSafetyValidator::new(config.validator.clone());
        Self { config, validator }
    }

    /// Fetch `url` and return its bounded text
    ///
    /// The whole call, including redirect hops and the body, is bounded by
    /// the configured timeout. Dropping the returned future releases the
    /// connection.
    pub async fn run(&self, url: &Url) -> Result<ExtractedDocument, FetchError> {
        match tokio::time::timeout(self.config.timeout, self.fetch_and_extract(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %url, timeout = ?self.config.timeout, "Fetch timed out");
                Err(FetchError::Timeout)
            }
        }
    }

    async fn fetch_and_extract(&self, url: &Url) -> Result<ExtractedDocument, FetchError> {
        let (final_url, response) = self.fetch_following_redirects(url).await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %final_url, status = status.as_u16(), "Non-success status");
            return Err(FetchError::FetchFailed(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(ref ct) = content_type {
            if is_binary_content_type(ct) {
                return Err(FetchError::ConversionFailed(format!(
                    "unsupported content type {}",
                    ct
                )));
            }
        }

        let body = read_body_capped(response, self.config.max_body_bytes).await?;
        if looks_binary(&body) {
            return Err(FetchError::ConversionFailed(
                "response body is binary data".to_string(),
            ));
        }

        let content = String::from_utf8_lossy(&body);
        let raw_text = if is_html(content_type.as_deref(), &content) {
            html_to_text(&content)
        } else {
            content.into_owned()
        };

        let normalized = normalize_whitespace(&raw_text);
        let original_length = normalized.chars().count();
        let (text, truncated) = truncate_chars(normalized, self.config.max_length);
        if truncated {
            debug!(original_length, max_length = self.config.max_length, "Text truncated");
        }

        Ok(ExtractedDocument {
            url: url.to_string(),
            final_url: final_url.to_string(),
            status_code: status.as_u16(),
            content_type,
            text,
            original_length,
            truncated,
        })
    }

    /// Send GET requests, validating and following redirects by hand
    async fn fetch_following_redirects(
        &self,
        url: &Url,
    ) -> Result<(Url, reqwest::Response), FetchError> {
        let mut current = url.clone();
        let mut hops = 0usize;

        loop {
            let response = self.send(&current).await?;
            let status = response.status().as_u16();
            if !matches!(status, 301 | 302 | 303 | 307 | 308) {
                return Ok((current, response));
            }

            if hops >= self.config.max_redirects {
                warn!(url = %current, limit = self.config.max_redirects, "Redirect limit reached");
                return Err(FetchError::TooManyRedirects(self.config.max_redirects));
            }
            hops += 1;

            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| current.join(location).ok())
                .ok_or(FetchError::MissingRedirectLocation)?;

            if let SafetyVerdict::Denied(reason) = self.validator.check_url(&next) {
                warn!(from = %current, to = %next, ?reason, "Redirect target denied");
                return Err(reason.into());
            }

            debug!(from = %current, to = %next, hop = hops, "Following redirect");
            current = next;
        }
    }

    /// One GET to `url`, pinned to its vetted addresses
    async fn send(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let addrs = self.validator.resolve(url).await?;
        let client = &self.build_client(url, &addrs)?;

        retry_connect_failures(self.config.max_retries, move || async move {
            debug!(url = %url, "Sending request");
            client
                .get(url.as_str())
                .send()
                .await
                .map_err(FetchError::from_reqwest)
        })
        .await
    }

    fn build_client(&self, url: &Url, addrs: &[SocketAddr]) -> Result<reqwest::Client, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .config
            .user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_TEXT));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(Policy::none())
            .connect_timeout(self.config.timeout)
            .timeout(self.config.timeout);

        // Connect only to the addresses that were checked
        if let Some(domain) = url.domain() {
            if !addrs.is_empty() {
                builder = builder.resolve_to_addrs(domain, addrs);
            }
        }

        builder.build().map_err(FetchError::ClientBuild)
    }
}

/// Run `op`, retrying up to `max_retries` more times on connect failures
async fn retry_connect_failures<T, F, Fut>(max_retries: usize, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0usize;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(attempt, error = %e, "Transient failure, retrying");
            }
            result => return result,
        }
    }
}

/// Read the response body, keeping at most `max_bytes`
async fn read_body_capped(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<Bytes, FetchError> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| {
            error!("Error reading body chunk: {}", e);
            FetchError::from_reqwest(e)
        })?;

        let remaining = max_bytes - body.len();
        if bytes.len() > remaining {
            body.extend_from_slice(&bytes[..remaining]);
            trim_partial_char(&mut body);
            warn!(max_bytes, "Body size cap reached, discarding the rest");
            break;
        }
        body.extend_from_slice(&bytes);
    }

    Ok(Bytes::from(body))
}

/// Drop a UTF-8 sequence cut off at the end of `body`
///
/// Bytes that are invalid on their own are left for lossy decoding.
fn trim_partial_char(body: &mut Vec<u8>) {
    let tail_start = body.len().saturating_sub(3);
    let lead = (tail_start..body.len())
        .rev()
        .find(|&i| body[i] & 0xC0 != 0x80);

    if let Some(lead) = lead {
        if let Err(e) = std::str::from_utf8(&body[lead..]) {
            if e.error_len().is_none() {
                body.truncate(lead + e.valid_up_to());
            }
        }
    }
}
