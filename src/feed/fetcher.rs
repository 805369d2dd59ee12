use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("driftfeed/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching a target document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Limits and retry behaviour for [`fetch_document`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for each attempt, covering both the response headers and
    /// the body.
    pub timeout: Duration,
    /// Retries after the first attempt for 429, 5xx and short reads.
    pub max_retries: u32,
    /// Responses larger than this are rejected.
    pub max_bytes: usize,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub backoff_base: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: DEFAULT_MAX_RETRIES,
            max_bytes: DEFAULT_MAX_DOCUMENT_SIZE,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl FetchOptions {
    fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Build the HTTP client used for all targets in a run.
pub fn build_client(options: &FetchOptions) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(options.timeout)
        .build()
        .map_err(FetchError::Network)
}

fn network_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e)
    }
}

/// Fetches a target document and returns its body as text.
///
/// Invalid UTF-8 sequences are replaced with U+FFFD so the normalizer always
/// receives text.
///
/// # Behavior
///
/// - Each attempt, body included, is bounded by `options.timeout`
/// - 429 and 5xx responses are retried with exponential backoff, up to
///   `options.max_retries` times
/// - Other non-2xx responses fail immediately
/// - Response bodies are limited to `options.max_bytes`
/// - A body shorter than its `Content-Length` is retried like a 5xx
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Headers or body did not arrive in time
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::RateLimited`] - 429 response after max retries
/// - [`FetchError::ResponseTooLarge`] - Response exceeded the size limit
/// - [`FetchError::IncompleteResponse`] - Short read after max retries
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<String, FetchError> {
    let mut retry_count = 0;

    let bytes = loop {
        let deadline = tokio::time::Instant::now() + options.timeout;
        let response = tokio::time::timeout_at(deadline, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(network_error)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= options.max_retries {
                return Err(FetchError::RateLimited(options.max_retries));
            }

            let delay = options.backoff(retry_count);
            tracing::warn!(
                url = %url,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, backing off"
            );

            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if status.is_server_error() {
            if retry_count >= options.max_retries {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let delay = options.backoff(retry_count);
            tracing::warn!(
                url = %url,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Server error, retrying after delay"
            );

            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let read = read_limited_bytes(response, options.max_bytes);
        let body = tokio::time::timeout_at(deadline, read)
            .await
            .map_err(|_| FetchError::Timeout)?;

        match body {
            Ok(bytes) => break bytes,
            Err(FetchError::IncompleteResponse { expected, received }) => {
                if retry_count >= options.max_retries {
                    return Err(FetchError::IncompleteResponse { expected, received });
                }

                let delay = options.backoff(retry_count);
                tracing::debug!(
                    url = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying incomplete download"
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
    };

    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched document");
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(network_error)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
