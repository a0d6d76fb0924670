//! Tool builder and contract for SafeFetch
//!
//! [`Tool::execute`] is the public boundary: every failure, from a bad input
//! object to a timed out fetch, comes back as a string starting with
//! [`ERROR_PREFIX`]. Internal callers that want the typed outcome use
//! [`Tool::try_execute`].

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::pipeline::ContentExtractionPipeline;
use crate::types::{ExtractedDocument, FetchUrlInput};
use crate::validator::{SafetyVerdict, UrlSafetyValidator};
use crate::{TOOL_DESCRIPTION, TOOL_LLMTXT};
use schemars::schema_for;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Tool name used in LLM tool-calling integrations
pub const TOOL_NAME: &str = "fetchurl";

/// Marker every failure string starts with
pub const ERROR_PREFIX: &str = "Error: ";

/// Builder for configuring the fetch tool
#[derive(Debug, Clone, Default)]
pub struct ToolBuilder {
    config: FetchConfig,
}

impl ToolBuilder {
    /// Create a new tool builder with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum length of returned text, in characters
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.config.max_length = max_length;
        self
    }

    /// Bound on the whole fetch
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Redirect hops to validate and follow; 0 disables redirects
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    /// Cap on raw response bytes
    pub fn max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.config.max_body_bytes = max_body_bytes;
        self
    }

    /// Retries for connect-level failures
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    /// Replace the single permitted scheme
    pub fn permitted_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.validator.permitted_scheme = scheme.into().to_ascii_lowercase();
        self
    }

    /// Exempt a host from the host and address rules
    pub fn trusted_host(mut self, host: impl Into<String>) -> Self {
        self.config.validator.trusted_hosts.push(host.into());
        self
    }

    /// Deny an additional exact hostname
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.config.validator.blocked_hosts.push(host.into());
        self
    }

    /// Deny an additional hostname suffix, e.g. `.internal`
    pub fn block_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.validator.blocked_suffixes.push(suffix.into());
        self
    }

    /// Resolve hostnames and re-check the resolved addresses
    pub fn resolve_dns(mut self, enable: bool) -> Self {
        self.config.validator.resolve_dns = enable;
        self
    }

    /// Build the tool
    pub fn build(self) -> Tool {
        Tool::from_config(self.config)
    }
}

/// Configured fetch tool
#[derive(Debug, Clone)]
pub struct Tool {
    config: FetchConfig,
    validator: UrlSafetyValidator,
    pipeline: ContentExtractionPipeline,
}

impl Default for Tool {
    fn default() -> Self {
        ToolBuilder::new().build()
    }
}

impl Tool {
    /// Create a new tool builder
    pub fn builder() -> ToolBuilder {
        ToolBuilder::new()
    }

    /// Create a tool from an explicit configuration
    pub fn from_config(config: FetchConfig) -> Self {
        Self {
            validator: UrlSafetyValidator::new(config.validator.clone()),
            pipeline: ContentExtractionPipeline::new(config.clone()),
            config,
        }
    }

    /// The configuration this tool was built with
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Get tool name
    pub fn name(&self) -> &'static str {
        TOOL_NAME
    }

    /// Get tool description
    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    /// Get full documentation (llmtxt)
    pub fn llmtxt(&self) -> &'static str {
        TOOL_LLMTXT
    }

    /// Get input schema as JSON
    pub fn input_schema(&self) -> serde_json::Value {
        let schema = schema_for!(FetchUrlInput);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        if let Some(url) = value
            .get_mut("properties")
            .and_then(|p| p.get_mut("url"))
            .and_then(|u| u.as_object_mut())
        {
            url.insert("format".to_string(), json!("uri"));
            url.insert(
                "pattern".to_string(),
                json!(format!("^{}://", self.config.validator.permitted_scheme)),
            );
        }

        value
    }

    /// Judge a URL without fetching it
    pub fn check(&self, url: &str) -> SafetyVerdict {
        self.validator.check(url)
    }

    /// Run the tool and return its uniform string result
    ///
    /// Never fails: errors become `"Error: <cause>"`.
    pub async fn execute(&self, input: FetchUrlInput) -> String {
        match self.try_execute(input).await {
            Ok(document) => document.text,
            Err(e) => format!("{}{}", ERROR_PREFIX, e),
        }
    }

    /// Run the tool on a raw JSON arguments object
    pub async fn execute_json(&self, arguments: serde_json::Value) -> String {
        match serde_json::from_value::<FetchUrlInput>(arguments) {
            Ok(input) => self.execute(input).await,
            Err(e) => format!("{}{}", ERROR_PREFIX, FetchError::InvalidInput(e.to_string())),
        }
    }

    /// Run the tool and return the typed outcome
    pub async fn try_execute(&self, input: FetchUrlInput) -> Result<ExtractedDocument, FetchError> {
        let url = self.check_input_shape(&input.url)?;

        if let SafetyVerdict::Denied(reason) = self.validator.check_url(&url) {
            warn!(url = %input.url, ?reason, "URL denied");
            return Err(reason.into());
        }

        debug!(url = %url, "URL allowed, fetching");
        self.pipeline.run(&url).await
    }

    /// Input-level checks that run before the validator
    ///
    /// The scheme prefix is matched as written, so `HTTPS://` is refused here.
    fn check_input_shape(&self, raw: &str) -> Result<Url, FetchError> {
        let url = Url::parse(raw)
            .map_err(|_| FetchError::MalformedUrl("Must be a valid URL.".to_string()))?;

        let scheme = &self.config.validator.permitted_scheme;
        if !raw.starts_with(&format!("{}://", scheme)) {
            return Err(FetchError::InsecureScheme(format!(
                "Only {} URLs are allowed.",
                scheme.to_uppercase()
            )));
        }

        Ok(url)
    }
}
