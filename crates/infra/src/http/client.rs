use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use stellwerk_domain::AdapterResult;
use tracing::debug;

use crate::errors::InfraError;

/// HTTP client with shared timeout and header configuration.
///
/// Deliberately retry-free: adapters wrap their calls in a retry executor, so
/// a second retry layer here would multiply attempts.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> AdapterResult<Self> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// Transport failures map into the adapter taxonomy; any HTTP status is
    /// returned as a response for the caller to interpret.
    pub async fn send(&self, builder: RequestBuilder) -> AdapterResult<Response> {
        let request = builder.build().map_err(InfraError::from)?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.client.execute(request).await.map_err(InfraError::from)?;
        debug!(%method, %url, status = %response.status(), "received HTTP response");

        Ok(response)
    }

    /// Execute the request and require a success status.
    pub async fn send_checked(&self, builder: RequestBuilder) -> AdapterResult<Response> {
        let response = self.send(builder).await?;
        Ok(response.error_for_status().map_err(InfraError::from)?)
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
    accept_invalid_certs: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: None,
            accept_invalid_certs: false,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> AdapterResult<HttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(InfraError::from)?;

        Ok(HttpClient { client })
    }
}
