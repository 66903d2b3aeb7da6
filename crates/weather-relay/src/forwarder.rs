//! Delivery of decoded records to the downstream weather API.
//!
//! The relay loop only sees the [`Forwarder`] trait; [`HttpForwarder`] is the
//! production implementation posting JSON to `{api_url}/api/weather`.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::record::WeatherRecord;

/// Path of the ingestion endpoint, relative to the API base URL.
pub const WEATHER_PATH: &str = "/api/weather";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a record could not be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    /// May succeed if the same record is sent again later.
    #[error("transient forward failure: {0}")]
    Transient(String),

    /// Will never succeed for this record.
    #[error("permanent forward failure: {0}")]
    Permanent(String),
}

impl ForwardError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ForwardError::Transient(_))
    }
}

/// Sends one record downstream.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, record: &WeatherRecord) -> std::result::Result<(), ForwardError>;
}

/// Map an API response status to a forward outcome.
///
/// 2xx is success, 5xx is transient. 408 and 429 are transient since the API
/// is asking us to come back later. Other 4xx responses are permanent unless
/// `retry_client_errors` is set, in which case every non-2xx status is retried.
pub fn classify_status(
    status: StatusCode,
    retry_client_errors: bool,
) -> std::result::Result<(), ForwardError> {
    if status.is_success() {
        return Ok(());
    }

    let retryable_client_error =
        status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS;

    if status.is_client_error() && !retryable_client_error && !retry_client_errors {
        Err(ForwardError::Permanent(format!("API rejected record: {status}")))
    } else {
        Err(ForwardError::Transient(format!("API returned {status}")))
    }
}

/// Posts records as JSON to the weather API.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: String,
    retry_client_errors: bool,
}

impl HttpForwarder {
    /// Build a forwarder for `api_url` with a bounded per-request timeout.
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", api_url.trim_end_matches('/'), WEATHER_PATH),
            retry_client_errors: false,
        })
    }

    /// Treat every non-2xx response as transient, 4xx included.
    pub fn with_retry_client_errors(mut self, retry: bool) -> Self {
        self.retry_client_errors = retry;
        self
    }

    /// Full URL records are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, record: &WeatherRecord) -> std::result::Result<(), ForwardError> {
        // Connection refused, DNS failure and timeout all land here.
        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(record)
            .send()
            .await
            .map_err(|e| ForwardError::Transient(format!("request failed: {e}")))?;

        classify_status(response.status(), self.retry_client_errors)?;

        log::info!("Forwarded: {} | {:.1}C", record.city, record.temperature);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Location;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gotham() -> WeatherRecord {
        WeatherRecord {
            location: Location {
                lat: "-10".to_string(),
                lon: "-20".to_string(),
            },
            timestamp: "2025-01-01T12:00:00Z".to_string(),
            temperature: 20.0,
            humidity: 80,
            wind_speed: 5.5,
            condition_code: 200,
            rain_probability: 30,
            city: "Gotham".to_string(),
        }
    }

    async fn server_returning(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(WEATHER_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn classify_success_range() {
        assert!(classify_status(StatusCode::OK, false).is_ok());
        assert!(classify_status(StatusCode::CREATED, false).is_ok());
        assert!(classify_status(StatusCode::NO_CONTENT, false).is_ok());
    }

    #[test]
    fn classify_server_errors_as_transient() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = classify_status(status, false).unwrap_err();
            assert!(err.is_transient(), "{status} should be transient");
        }
    }

    #[test]
    fn classify_client_errors() {
        let err = classify_status(StatusCode::BAD_REQUEST, false).unwrap_err();
        assert!(matches!(err, ForwardError::Permanent(_)));

        let err = classify_status(StatusCode::UNPROCESSABLE_ENTITY, false).unwrap_err();
        assert!(matches!(err, ForwardError::Permanent(_)));

        // The API is asking to be retried
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, false)
            .unwrap_err()
            .is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, false)
            .unwrap_err()
            .is_transient());
    }

    #[test]
    fn classify_client_errors_when_retrying_everything() {
        assert!(classify_status(StatusCode::BAD_REQUEST, true)
            .unwrap_err()
            .is_transient());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let forwarder = HttpForwarder::new("http://backend:3000", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(forwarder.endpoint(), "http://backend:3000/api/weather");

        let forwarder = HttpForwarder::new("http://backend:3000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(forwarder.endpoint(), "http://backend:3000/api/weather");
    }

    #[tokio::test]
    async fn forward_posts_json_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(WEATHER_PATH))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "city": "Gotham",
                "temperature": 20.0,
                "location": {"lat": "-10", "lon": "-20"}
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = HttpForwarder::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        forwarder.forward(&gotham()).await.unwrap();
    }

    #[tokio::test]
    async fn forward_server_error_is_transient() {
        let server = server_returning(500).await;
        let forwarder = HttpForwarder::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();

        let err = forwarder.forward(&gotham()).await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn forward_bad_request_is_permanent_by_default() {
        let server = server_returning(400).await;
        let forwarder = HttpForwarder::new(&server.uri(), DEFAULT_TIMEOUT).unwrap();
        let err = forwarder.forward(&gotham()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Permanent(_)), "got {err:?}");

        let forwarder = forwarder.with_retry_client_errors(true);
        let err = forwarder.forward(&gotham()).await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn forward_unreachable_api_is_transient() {
        // Nothing listens on the discard port.
        let forwarder = HttpForwarder::new("http://127.0.0.1:9", DEFAULT_TIMEOUT).unwrap();
        let err = forwarder.forward(&gotham()).await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn forward_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(WEATHER_PATH))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let forwarder = HttpForwarder::new(&server.uri(), Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();
        let err = forwarder.forward(&gotham()).await.unwrap_err();

        assert!(err.is_transient(), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
