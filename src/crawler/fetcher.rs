//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - GET requests with the configured `Referer`
//! - Content-Type checks
//! - Classification of HTTP and transport failures into page codes

use crate::config::IndexingConfig;
use reqwest::{header, redirect::Policy, Client, StatusCode};
use std::error::Error as StdError;
use std::time::Duration;

/// Code stored for pages whose failure has no dedicated mapping
pub const UNKNOWN_FAILURE: i32 = -1;

/// Code stored for pages served with an unsupported Content-Type
pub const UNSUPPORTED_MEDIA_TYPE: i32 = 415;

/// Code stored for pages whose TLS handshake failed
pub const TLS_FAILURE: i32 = 525;

/// HTTP statuses that are stored as-is when a fetch fails
const PASSTHROUGH_STATUSES: &[u16] = &[401, 403, 404, 500, 503];

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value, if the server sent one
        content_type: Option<String>,
        /// Page body content
        body: String,
    },

    /// The page could not be fetched
    Failure {
        /// The code stored for the page
        code: i32,
        /// Human-readable cause, for logging
        reason: String,
    },
}

impl FetchResult {
    fn failure(code: i32, reason: impl Into<String>) -> Self {
        FetchResult::Failure {
            code,
            reason: reason.into(),
        }
    }
}

/// Fetches pages of configured sites
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    referrer: String,
}

impl PageFetcher {
    /// Builds a fetcher from the indexing configuration
    ///
    /// # Arguments
    ///
    /// * `config` - User agent, referrer and timeout settings
    ///
    /// # Returns
    ///
    /// * `Ok(PageFetcher)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - Failed to build client
    pub fn new(config: &IndexingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            referrer: config.referrer.clone(),
        })
    }

    /// Fetches a URL and classifies the outcome
    ///
    /// # Failure Codes
    ///
    /// | Condition | Code |
    /// |-----------|------|
    /// | Unsupported Content-Type | 415 |
    /// | HTTP 401 or unknown host | 401 |
    /// | HTTP 403 | 403 |
    /// | HTTP 404 | 404 |
    /// | HTTP 500 or connection refused | 500 |
    /// | TLS failure | 525 |
    /// | HTTP 503 | 503 |
    /// | Anything else | -1 |
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to fetch
    ///
    /// # Returns
    ///
    /// A FetchResult indicating success or the code to store for the page
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let response = match self
            .client
            .get(url)
            .header(header::REFERER, self.referrer.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let code = classify_transport_error(&e);
                return FetchResult::failure(code, describe_error(&e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::failure(
                map_status(status),
                format!("HTTP {}", status.as_u16()),
            );
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        if let Some(content_type) = &content_type {
            if !is_supported_content_type(content_type) {
                return FetchResult::failure(
                    UNSUPPORTED_MEDIA_TYPE,
                    format!("Unsupported Content-Type: {}", content_type),
                );
            }
        }

        match response.text().await {
            Ok(body) => FetchResult::Success {
                status_code: status.as_u16(),
                content_type,
                body,
            },
            Err(e) => FetchResult::failure(classify_transport_error(&e), describe_error(&e)),
        }
    }
}

/// Maps a non-success HTTP status to the code stored for the page
pub fn map_status(status: StatusCode) -> i32 {
    let code = status.as_u16();
    if PASSTHROUGH_STATUSES.contains(&code) {
        i32::from(code)
    } else {
        UNKNOWN_FAILURE
    }
}

/// Returns true for textual and XML media types
pub fn is_supported_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || mime == "application/xml"
        || (mime.starts_with("application/") && mime.ends_with("+xml"))
}

/// Classifies a transport error by inspecting its source chain
///
/// reqwest does not expose DNS or TLS failures as distinct kinds, so the
/// chain's messages are matched instead.
pub fn classify_transport_error(error: &reqwest::Error) -> i32 {
    if let Some(status) = error.status() {
        return map_status(status);
    }
    classify_message(&describe_error(error))
}

fn classify_message(message: &str) -> i32 {
    let message = message.to_ascii_lowercase();

    if message.contains("dns error")
        || message.contains("failed to lookup")
        || message.contains("no such host")
        || message.contains("name or service not known")
    {
        401
    } else if message.contains("certificate")
        || message.contains("tls")
        || message.contains("ssl")
        || message.contains("handshake")
    {
        TLS_FAILURE
    } else if message.contains("connection refused") {
        500
    } else {
        UNKNOWN_FAILURE
    }
}

/// Joins an error and all of its sources into one line
fn describe_error(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
