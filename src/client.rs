//! HTTP transport for OpenAI-compatible chat-completion providers.
//!
//! The session core only sees the [`Transport`] trait; [`OpenAi`] is the
//! production implementation on top of `reqwest`.

use std::env;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::types::{ChatCompletion, ChatRequest, Delta};

/// Default endpoint root for the OpenAI API.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";

/// Environment variable consulted when no credential is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A finite, single-consumer sequence of deltas.
///
/// Dropping the stream releases the underlying connection.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<Delta>> + Send>>;

/// The provider collaborator consumed by the dispatcher.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single blocking request and return the complete answer.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;

    /// Issue a streaming request and return the sequence of deltas.
    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        (**self).complete(request).await
    }

    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream> {
        (**self).stream(request).await
    }
}

/// Client for OpenAI-compatible chat-completion APIs.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    proxy: Option<String>,
    timeout: Duration,
}

impl OpenAi {
    /// Create a new client against the default endpoint.
    ///
    /// The API key can be provided directly or read from the `OPENAI_API_KEY`
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `proxy` accepts `http://`, `https://` and `socks5://` URLs.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        proxy: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };

        let base_url = parse_base_url(base_url.as_deref().unwrap_or(DEFAULT_API_BASE))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        // The total timeout is applied per blocking request; streams get an idle timeout.
        let mut builder = ReqwestClient::builder().connect_timeout(timeout);
        if let Some(proxy) = proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| {
                Error::http_client(format!("Invalid proxy {proxy}: {e}"), Some(Box::new(e)))
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            proxy,
            timeout,
        })
    }

    /// The endpoint root requests are sent to.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// The configured proxy, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::authentication("API key contains invalid characters"))?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn endpoint(&self) -> Result<Url> {
        Ok(self.base_url.join("chat/completions")?)
    }

    /// Post a request body and map transport failures onto our error type.
    ///
    /// `timeout` bounds the whole exchange, body included; `None` leaves only the connect timeout.
    async fn post(
        &self,
        request: &ChatRequest,
        headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        CLIENT_REQUESTS.click();
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "sending chat completion request"
        );
        let mut builder = self.client.post(self.endpoint()?).headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .json(request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            warn!(error = %err, "provider returned an error");
            return Err(err);
        }
        Ok(response)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            param: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|parsed| parsed.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_message = detail
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| error_body.clone());
        let error_param = detail.as_ref().and_then(|e| e.param.clone());

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message, request_id),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message, request_id),
        }
    }
}

#[async_trait::async_trait]
impl Transport for OpenAi {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let mut request = request.clone();
        request.stream = false;

        let start = Instant::now();
        let response = self
            .post(&request, self.default_headers()?, Some(self.timeout))
            .await?;
        let completion = response.json::<ChatCompletion>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        });
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        completion
    }

    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream> {
        let mut request = request.clone();
        request.stream = true;

        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let response = self.post(&request, headers, None).await?;
        let bytes = idle_timeout(response.bytes_stream(), self.timeout);
        Ok(Box::pin(process_sse(bytes)))
    }
}

/// Fail a body stream that stays silent for longer than `idle`.
///
/// A slow but steady stream never times out, however long it runs in total.
fn idle_timeout<S>(byte_stream: S, idle: Duration) -> impl Stream<Item = Result<Bytes>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let stream = Box::pin(byte_stream);
    stream::unfold((stream, false), move |(mut stream, done)| async move {
        if done {
            return None;
        }
        match tokio::time::timeout(idle, stream.next()).await {
            Ok(Some(Ok(bytes))) => Some((Ok(bytes), (stream, false))),
            Ok(Some(Err(e))) => {
                let err = Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)));
                Some((Err(err), (stream, true)))
            }
            Ok(None) => None,
            Err(_) => {
                warn!(idle_secs = idle.as_secs_f64(), "stream stalled");
                let err = Error::timeout(
                    "no data received from the stream",
                    Some(idle.as_secs_f64()),
                );
                Some((Err(err), (stream, true)))
            }
        }
    })
}

/// Parse an endpoint root, making sure relative joins keep its last segment.
fn parse_base_url(base: &str) -> Result<Url> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    Ok(Url::parse(&base)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = OpenAi::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.base_url(), DEFAULT_API_BASE);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert!(client.proxy().is_none());

        let client = OpenAi::with_options(
            Some("test-key".to_string()),
            Some("http://localhost:8080/v1".to_string()),
            Some("socks5://127.0.0.1:1080".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1/");
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(client.proxy(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = OpenAi::with_options(
            Some("test-key".to_string()),
            Some("not a url".to_string()),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn invalid_key_is_rejected_before_sending() {
        let client = OpenAi::new(Some("bad\nkey".to_string())).unwrap();
        assert!(client.default_headers().unwrap_err().is_authentication());
    }

    fn paced(
        parts: usize,
        every: Duration,
    ) -> impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static {
        stream::iter(0..parts).then(move |i| async move {
            tokio::time::sleep(every).await;
            Ok(Bytes::from(format!("part {i}\n")))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stream_outlives_the_timeout() {
        let idle = Duration::from_secs(1);
        let parts = idle_timeout(paced(5, Duration::from_millis(600)), idle)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(parts.len(), 5);
        assert!(parts.iter().all(|part| part.is_ok()));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_times_out() {
        let stalled = paced(1, Duration::ZERO).chain(stream::pending());
        let parts = idle_timeout(stalled, Duration::from_secs(1))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(parts.len(), 2);
        assert!(parts[0].is_ok());
        assert!(matches!(parts[1], Err(Error::Timeout { .. })));
    }
}
