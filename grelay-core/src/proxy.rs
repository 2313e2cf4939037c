//! # Gateway Integration
//!
//! The types shared with the gateway that dispatches HTTP requests to backends.
//!
//! A backend is served by a [`Proxy`]: one [`ProxyRequest`] in, one [`ProxyResponse`] out.
//! Proxies are produced by [`BackendFactory`]s, and the gateway tries its factories in order
//! through a [`FactoryChain`] until one of them accepts the backend. A factory declines a
//! backend by returning an error, which is logged and never surfaces to the gateway.
use crate::{
    BoxError,
    config::BackendConfig,
    error::{JSON_CONTENT_TYPE, RequestError},
    message::json::JsonObject,
};
use futures_util::future::BoxFuture;
use http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::io::AsyncRead;

/// Body stream of an inbound request.
pub type RequestBody = Box<dyn AsyncRead + Send + Unpin>;

/// An inbound request, as routed by the gateway to one backend.
#[derive(Default)]
pub struct ProxyRequest {
    pub body: Option<RequestBody>,
    pub headers: HeaderMap,
    /// Query string parameters, all values in arrival order.
    pub query: HashMap<String, Vec<String>>,
    /// Parameters captured by the route template.
    pub params: HashMap<String, String>,
    /// Time left for this request, if the caller set a deadline.
    pub timeout: Option<Duration>,
}

impl ProxyRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn with_header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(key.into()).or_default().push(value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("body", &self.body.as_ref().map(|_| ".."))
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("params", &self.params)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMetadata {
    pub headers: HeaderMap,
    pub status_code: StatusCode,
}

/// The response of a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub data: JsonObject,
    /// Whether `data` is the whole response. Always true for unary calls.
    pub is_complete: bool,
    pub metadata: ResponseMetadata,
}

impl ProxyResponse {
    /// A complete `200 OK` response with a JSON content type.
    pub fn json(data: JsonObject) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        Self {
            data,
            is_complete: true,
            metadata: ResponseMetadata {
                headers,
                status_code: StatusCode::OK,
            },
        }
    }
}

/// Serves requests for one backend.
pub trait Proxy: Send + Sync {
    fn call(&self, request: ProxyRequest) -> BoxFuture<'_, Result<ProxyResponse, RequestError>>;
}

pub type BoxProxy = Arc<dyn Proxy>;

/// Builds the proxy of a backend, or declines it.
pub trait BackendFactory: Send + Sync {
    /// Name used when logging the outcome of [`build`](Self::build).
    fn name(&self) -> &str;

    fn build<'a>(&'a self, backend: &'a BackendConfig) -> BoxFuture<'a, Result<BoxProxy, BoxError>>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("No backend factory accepted backend '{backend}'")]
    Exhausted { backend: String },
}

/// An ordered list of factories, the first one able to build a backend wins.
#[derive(Default)]
pub struct FactoryChain {
    factories: Vec<Box<dyn BackendFactory>>,
}

impl FactoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `factory`, to be tried after the ones already in the chain.
    pub fn with(mut self, factory: impl BackendFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    pub async fn build(&self, backend: &BackendConfig) -> Result<BoxProxy, ChainError> {
        for factory in &self.factories {
            match factory.build(backend).await {
                Ok(proxy) => {
                    tracing::info!(
                        backend = %backend.url_pattern,
                        factory = factory.name(),
                        "backend configured"
                    );
                    return Ok(proxy);
                }
                Err(err) => {
                    tracing::debug!(
                        backend = %backend.url_pattern,
                        factory = factory.name(),
                        error = %err,
                        "factory declined backend, falling back"
                    );
                }
            }
        }

        Err(ChainError::Exhausted {
            backend: backend.url_pattern.clone(),
        })
    }
}

impl fmt::Debug for FactoryChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|factory| factory.name()))
            .finish()
    }
}
