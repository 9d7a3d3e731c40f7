use std::future::Future;
use std::time::Instant;

use bytes::Bytes;
use http::{Method, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::TransportError;

/// An outgoing request: a GET, or a POST with a urlencoded form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            form: Vec::new(),
        }
    }

    pub fn post_form<K, V>(url: Url, form: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::POST,
            url,
            form: form.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// The form as an `application/x-www-form-urlencoded` body.
    pub fn encoded_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form.iter())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Pluggable HTTP client used for discovery, JWKS and the code exchange.
///
/// Implementations must not retry on their own: a token request carries a
/// single-use code.
pub trait HttpTransport: Send + Sync + 'static {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let client = self.client.clone();
        async move {
            let mut builder = client.request(request.method, request.url);
            if !request.form.is_empty() {
                builder = builder.form(&request.form);
            }
            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;
            Ok(HttpResponse { status, body })
        }
    }
}

/// Wraps another transport and logs every round trip.
///
/// Only method, URL, status, body size and latency are recorded; bodies carry
/// codes, secrets and tokens and are never logged.
#[derive(Clone, Default)]
pub struct TracingTransport<T> {
    inner: T,
}

impl<T: HttpTransport> TracingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: HttpTransport> HttpTransport for TracingTransport<T> {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let method = request.method.clone();
        let url = request.url.clone();
        async move {
            let started = Instant::now();
            let result = self.inner.execute(request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(response) => debug!(
                    %method,
                    %url,
                    status = response.status.as_u16(),
                    bytes = response.body.len(),
                    elapsed_ms,
                    "HTTP round trip"
                ),
                Err(err) => warn!(%method, %url, elapsed_ms, error = %err, "HTTP round trip failed"),
            }
            result
        }
    }
}
