//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default User-Agent sent with every request.
const DEFAULT_USER_AGENT: &str = concat!("topokort/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from a single HTTP request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        /// Delay requested by a `Retry-After` header, if any
        retry_after: Option<Duration>,
    },

    /// Connection, timeout or other transport failure.
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl HttpError {
    /// Whether a retry has a chance of succeeding: 408, 429, any 5xx, or a
    /// transport failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            HttpError::Network { .. } => true,
            HttpError::Client(_) => false,
        }
    }

    /// Server-requested retry delay.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HttpError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// HTTP basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

/// Trait for async HTTP GET.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request, optionally with basic auth.
    ///
    /// # Returns
    ///
    /// The response body, or an error carrying the status and any
    /// `Retry-After` delay.
    fn get(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
    ) -> impl Future<Output = Result<Bytes, HttpError>> + Send;
}

/// Parses a `Retry-After` header: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        // Oversized delays saturate; the retry policy caps them anyway.
        return (secs.is_finite() && secs >= 0.0)
            .then(|| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let millis = (date.with_timezone(&Utc) - now).num_milliseconds();
    Some(Duration::from_millis(millis.max(0) as u64))
}

/// Async HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(16)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, auth: Option<&BasicAuth>) -> Result<Bytes, HttpError> {
        trace!(url = url, "HTTP GET request starting");
        let mut request = self.client.get(url).header("Accept", "image/png,image/*,*/*");
        if let Some(auth) = auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }

        let response = request.send().await.map_err(|e| {
            warn!(
                url = url,
                error = %e,
                is_timeout = e.is_timeout(),
                is_connect = e.is_connect(),
                "HTTP request failed"
            );
            HttpError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            debug!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                retry_after,
            });
        }

        response.bytes().await.map_err(|e| HttpError::Network {
            url: url.to_string(),
            message: format!("Failed to read response: {e}"),
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Arc;

    use image::{ImageFormat, Rgba, RgbaImage};
    use parking_lot::Mutex;

    type Responder = dyn Fn(&str) -> Result<Bytes, HttpError> + Send + Sync;

    /// Mock async HTTP client that answers through a closure and records
    /// every requested URL.
    #[derive(Clone)]
    pub struct MockHttpClient {
        responder: Arc<Responder>,
        calls: Arc<Mutex<Vec<String>>>,
        delay: Option<Duration>,
    }

    impl MockHttpClient {
        pub fn new(responder: impl Fn(&str) -> Result<Bytes, HttpError> + Send + Sync + 'static) -> Self {
            Self {
                responder: Arc::new(responder),
                calls: Arc::new(Mutex::new(Vec::new())),
                delay: None,
            }
        }

        /// Answers every request with the same body.
        pub fn always(body: Bytes) -> Self {
            Self::new(move |_| Ok(body.clone()))
        }

        /// Sleeps before answering, so concurrent requests overlap.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        /// Number of requests per URL.
        pub fn calls_by_url(&self) -> HashMap<String, usize> {
            let mut out = HashMap::new();
            for url in self.calls.lock().iter() {
                *out.entry(url.clone()).or_insert(0) += 1;
            }
            out
        }
    }

    impl HttpClient for MockHttpClient {
        async fn get(&self, url: &str, _auth: Option<&BasicAuth>) -> Result<Bytes, HttpError> {
            self.calls.lock().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.responder)(url)
        }
    }

    /// PNG bytes of a solid-colour image.
    pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png)
            .expect("encode test png");
        Bytes::from(buf.into_inner())
    }

    pub fn status_error(url: &str, status: u16) -> HttpError {
        HttpError::Status {
            status,
            url: url.to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 429, 500, 502, 503, 599] {
            assert!(status_error("u", status).is_retryable(), "{status}");
        }
        for status in [400, 401, 403, 404, 410] {
            assert!(!status_error("u", status).is_retryable(), "{status}");
        }
        let network = HttpError::Network {
            url: "u".into(),
            message: "timeout".into(),
        };
        assert!(network.is_retryable());
        assert!(!HttpError::Client("x".into()).is_retryable());
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("2", now), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("-1", now), None);
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_parse_retry_after_out_of_range_values() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("1e30", now), Some(Duration::MAX));
        assert_eq!(parse_retry_after("-1e30", now), None);
        assert_eq!(parse_retry_after("NaN", now), None);
        assert_eq!(parse_retry_after("inf", now), None);
        assert_eq!(parse_retry_after("-inf", now), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2026 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2026 07:28:03 GMT", now),
            Some(Duration::from_secs(3))
        );
        // A date in the past means "now".
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2026 07:27:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[tokio::test]
    async fn test_mock_client_records_calls() {
        let mock = MockHttpClient::always(Bytes::from_static(b"abc"));
        let body = mock.get("http://example.com/a", None).await.unwrap();
        assert_eq!(&body[..], b"abc");
        mock.get("http://example.com/a", None).await.unwrap();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.calls_by_url()["http://example.com/a"], 2);
    }

    #[test]
    fn test_solid_png_decodes() {
        let png = solid_png(4, 3, [1, 2, 3, 255]);
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }
}
