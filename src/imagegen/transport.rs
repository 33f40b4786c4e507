use crate::{
    error::{GenerationError, Result, TransportError, TransportResult},
    models::GenerationRequest,
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use std::time::Duration;

pub const OPERATION_LOCATION: &str = "operation-location";

/// HTTP seam of the generation client. Every call is already authorized;
/// implementations only move bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageTransport: Send + Sync {
    /// POST the generation request and return the `operation-location`
    /// header value, if any.
    async fn submit(&self, url: &str, request: &GenerationRequest)
        -> TransportResult<Option<String>>;

    /// GET the operation URL and return the raw response body.
    async fn poll(&self, operation_url: &str) -> TransportResult<String>;
}

pub fn build_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|e| GenerationError::ConfigError(format!("Invalid API key: {}", e)))?;
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// `reqwest` backed transport with bearer auth and a per-request timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    headers: HeaderMap,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(api_key: &str, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            headers: build_headers(api_key)?,
            request_timeout,
        })
    }
}

#[async_trait]
impl ImageTransport for HttpTransport {
    async fn submit(
        &self,
        url: &str,
        request: &GenerationRequest,
    ) -> TransportResult<Option<String>> {
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from))
    }

    async fn poll(&self, operation_url: &str) -> TransportResult<String> {
        let response = self
            .client
            .get(operation_url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        response.text().await.map_err(TransportError::from)
    }
}
