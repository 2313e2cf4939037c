//! # Backend Adapter
//!
//! Wires the descriptor loader, the resolver, the parameter codec and the invoker together
//! for one configured backend.
//!
//! ## Lifecycle
//!
//! 1. **Configuring** ([`GrpcBackendFactory::configure`]): the `plugins/grpc` block is
//!    validated, the descriptor set loaded, the method resolved and a lazy channel created.
//!    [`ReflectionBackendFactory::configure`] does the same for a server reflection block,
//!    fetching the schema from the endpoint instead of reading a descriptor file.
//!    Any failure makes the factory decline the backend, so the next factory of the
//!    [`FactoryChain`](crate::proxy::FactoryChain) gets a chance to serve it.
//! 2. **Serving** ([`GrpcProxy`]): every request reads its body, builds the input message
//!    (body first, then path and query parameters), forwards the declared headers as
//!    metadata and performs one unary call. The response message is returned as JSON.
use crate::{
    BoxError,
    config::{BackendConfig, ConfigError, GrpcConfig, ReflectionConfig},
    descriptor::{self, DescriptorLoadError},
    error::RequestError,
    grpc::invoker::{GrpcInvoker, UnaryInvoker},
    message::{
        json::{decode_body, to_json_object},
        params::{ParameterBag, extract_headers},
        populate::populate,
    },
    proxy::{BackendFactory, BoxProxy, Proxy, ProxyRequest, ProxyResponse},
    reflection::{ReflectionClient, ReflectionError},
    resolver::{self, MethodSignature, ResolveError},
};
use futures_util::future::BoxFuture;
use prost_reflect::DescriptorPool;
use std::{sync::Arc, time::Duration};
use tokio::io::AsyncReadExt;
use tonic::transport::{Channel, Endpoint};

/// Reasons for a backend not to be served over gRPC.
#[derive(Debug, thiserror::Error)]
pub enum ConfigureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorLoadError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("Failed to set up channel: '{0}'")]
    ChannelSetup(#[source] tonic::transport::Error),
    #[error("Server reflection failed: '{0}'")]
    Reflection(#[from] ReflectionError),
}

impl ConfigureError {
    /// Whether the backend simply does not carry the block the factory looks for.
    pub fn is_missing_config(&self) -> bool {
        matches!(self, ConfigureError::Config(ConfigError::MissingConfig(_)))
    }
}

/// Bounds connection attempts made while fetching a schema over reflection.
pub const REFLECTION_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The proxy of a backend bound to one unary gRPC method.
pub struct GrpcProxy<I> {
    invoker: I,
    signature: MethodSignature,
    headers_to_pass: Vec<String>,
    query_strings_to_pass: Vec<String>,
}

impl<I: UnaryInvoker> GrpcProxy<I> {
    pub fn new(invoker: I, signature: MethodSignature, backend: &BackendConfig) -> Self {
        Self {
            invoker,
            signature,
            headers_to_pass: backend.headers_to_pass.clone(),
            query_strings_to_pass: backend.query_strings_to_pass.clone(),
        }
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Serves one request.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, RequestError> {
        let result = self.try_handle(request).await;

        if let Err(err) = &result {
            tracing::warn!(
                method = %self.signature.path(),
                status = %err.status_code(),
                error = %err,
                "gRPC request failed"
            );
        }

        result
    }

    async fn try_handle(&self, request: ProxyRequest) -> Result<ProxyResponse, RequestError> {
        let ProxyRequest {
            body,
            headers,
            query,
            params,
            timeout,
        } = request;

        let mut raw = Vec::new();
        if let Some(mut body) = body {
            body.read_to_end(&mut raw)
                .await
                .map_err(RequestError::BodyRead)?;
        }

        let mut message =
            decode_body(self.signature.input(), &raw).map_err(RequestError::BodyDecode)?;

        let bag = ParameterBag::from_request(&params, &query, &self.query_strings_to_pass);
        populate(&mut message, &bag)?;

        let metadata = extract_headers(&headers, &self.headers_to_pass);

        let output = self
            .invoker
            .unary(&self.signature, message, metadata, timeout)
            .await?;

        let data = to_json_object(&output).map_err(RequestError::ResponseEncode)?;
        Ok(ProxyResponse::json(data))
    }
}

impl<I: UnaryInvoker + 'static> Proxy for GrpcProxy<I> {
    fn call(&self, request: ProxyRequest) -> BoxFuture<'_, Result<ProxyResponse, RequestError>> {
        Box::pin(self.handle(request))
    }
}

/// Loads the descriptor set named by `config` and resolves its method.
///
/// No channel is involved, this is all that is needed to inspect a backend.
pub async fn resolve_method(config: &GrpcConfig) -> Result<MethodSignature, ConfigureError> {
    let pool = descriptor::load(config.descriptor_path()?).await?;
    Ok(resolver::resolve(&pool, &config.method)?)
}

/// Serves backends carrying a `plugins/grpc` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcBackendFactory;

impl GrpcBackendFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the proxy for `backend`.
    ///
    /// The channel connects on first use, so an unreachable host is only reported by the
    /// requests themselves.
    pub async fn configure(
        &self,
        backend: &BackendConfig,
    ) -> Result<GrpcProxy<GrpcInvoker<Channel>>, ConfigureError> {
        let config = GrpcConfig::from_backend(backend)?;
        let signature = resolve_method(&config).await?;

        let target = backend.grpc_target()?;
        let channel = Endpoint::from_shared(target.clone())
            .map_err(ConfigureError::ChannelSetup)?
            .connect_lazy();

        tracing::info!(
            method = %signature.path(),
            host = %target,
            descriptor = %config.descriptor_path()?.display(),
            "gRPC backend configured"
        );

        Ok(GrpcProxy::new(GrpcInvoker::new(channel), signature, backend))
    }
}

impl BackendFactory for GrpcBackendFactory {
    fn name(&self) -> &str {
        "grpc"
    }

    fn build<'a>(&'a self, backend: &'a BackendConfig) -> BoxFuture<'a, Result<BoxProxy, BoxError>> {
        Box::pin(async move {
            match self.configure(backend).await {
                Ok(proxy) => Ok(Arc::new(proxy) as BoxProxy),
                Err(err) => {
                    if err.is_missing_config() {
                        tracing::debug!(backend = %backend.url_pattern, "no gRPC config");
                    } else {
                        tracing::error!(
                            backend = %backend.url_pattern,
                            error = %err,
                            "invalid gRPC backend"
                        );
                    }
                    Err(BoxError::from(err))
                }
            }
        })
    }
}

/// Serves backends carrying a server reflection block.
///
/// The schema is fetched from the backend's own endpoint once, while configuring, and the
/// same channel then carries every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectionBackendFactory;

impl ReflectionBackendFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the proxy for `backend`, asking its endpoint for the schema of the method.
    pub async fn configure(
        &self,
        backend: &BackendConfig,
    ) -> Result<GrpcProxy<GrpcInvoker<Channel>>, ConfigureError> {
        let config = ReflectionConfig::from_backend(backend)?;
        let (service, _) = resolver::parse_method(&config.method)?;

        let target = config.target();
        let channel = Endpoint::from_shared(target.clone())
            .map_err(ConfigureError::ChannelSetup)?
            .connect_timeout(REFLECTION_CONNECT_TIMEOUT)
            .connect_lazy();

        let file_descriptor_set = ReflectionClient::new(channel.clone())
            .file_descriptor_set_by_symbol(service)
            .await?;
        let pool = DescriptorPool::from_file_descriptor_set(file_descriptor_set)
            .map_err(DescriptorLoadError::Registry)?;
        let signature = resolver::resolve(&pool, &config.method)?;

        tracing::info!(
            method = %signature.path(),
            host = %target,
            "gRPC backend configured through server reflection"
        );

        Ok(GrpcProxy::new(GrpcInvoker::new(channel), signature, backend))
    }
}

impl BackendFactory for ReflectionBackendFactory {
    fn name(&self) -> &str {
        "grpc-reflection"
    }

    fn build<'a>(&'a self, backend: &'a BackendConfig) -> BoxFuture<'a, Result<BoxProxy, BoxError>> {
        Box::pin(async move {
            match self.configure(backend).await {
                Ok(proxy) => Ok(Arc::new(proxy) as BoxProxy),
                Err(err) => {
                    if err.is_missing_config() {
                        tracing::debug!(
                            backend = %backend.url_pattern,
                            "no server reflection config"
                        );
                    } else {
                        tracing::error!(
                            backend = %backend.url_pattern,
                            error = %err,
                            "invalid server reflection backend"
                        );
                    }
                    Err(BoxError::from(err))
                }
            }
        })
    }
}
