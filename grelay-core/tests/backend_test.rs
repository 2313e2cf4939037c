use futures_util::future::BoxFuture;
use greeter_service::{GreeterServer, SAY_HELLO, SAY_HELLO_STREAM};
use grelay_core::{
    BoxError,
    backend::{ConfigureError, GrpcBackendFactory, GrpcProxy},
    config::BackendConfig,
    error::{HttpResponseError, RequestError},
    grpc::invoker::GrpcInvoker,
    message::json::JsonObject,
    proxy::{BackendFactory, BoxProxy, FactoryChain, Proxy, ProxyRequest, ProxyResponse},
    resolver::{ResolveError, resolve},
};
use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::json;
use std::{io::Write, sync::Arc};
use tempfile::NamedTempFile;

fn descriptor_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&greeter_service::encoded_file_descriptor_set())
        .unwrap();
    file
}

fn backend(method: &str, descriptor: &NamedTempFile) -> BackendConfig {
    serde_json::from_value(json!({
        "url_pattern": "/hello/{name}",
        "host": ["localhost:50051"],
        "headers_to_pass": ["X-Request-Id"],
        "query_strings_to_pass": ["tags", "address.city"],
        "extra_config": {
            "plugins/grpc": {
                "method": method,
                "descriptor_file": descriptor.path(),
            }
        }
    }))
    .unwrap()
}

/// Stands in for the gateway's plain HTTP backend.
struct StaticFactory;

struct StaticProxy;

impl Proxy for StaticProxy {
    fn call(&self, _: ProxyRequest) -> BoxFuture<'_, Result<ProxyResponse, RequestError>> {
        let mut data = JsonObject::new();
        data.insert("backend".to_string(), json!("static"));
        Box::pin(async move { Ok::<_, RequestError>(ProxyResponse::json(data)) })
    }
}

impl BackendFactory for StaticFactory {
    fn name(&self) -> &str {
        "static"
    }

    fn build<'a>(&'a self, _: &'a BackendConfig) -> BoxFuture<'a, Result<BoxProxy, BoxError>> {
        Box::pin(async { Ok::<BoxProxy, BoxError>(Arc::new(StaticProxy)) })
    }
}

fn chain() -> FactoryChain {
    FactoryChain::new()
        .with(GrpcBackendFactory::new())
        .with(StaticFactory)
}

async fn served_by(chain: &FactoryChain, backend: &BackendConfig) -> JsonObject {
    let proxy = chain.build(backend).await.unwrap();
    proxy.call(ProxyRequest::new()).await.unwrap().data
}

#[tokio::test]
async fn test_configure_valid_backend() {
    let descriptor = descriptor_file();
    let backend = backend(SAY_HELLO, &descriptor);

    let proxy = GrpcBackendFactory::new().configure(&backend).await.unwrap();

    assert_eq!(proxy.signature().path(), "/pkg.Greeter/SayHello");
    assert_eq!(proxy.signature().input().full_name(), "pkg.HelloRequest");
    assert_eq!(proxy.signature().output().full_name(), "pkg.HelloReply");
}

#[tokio::test]
async fn test_bad_method_format_falls_back() {
    let descriptor = descriptor_file();
    let backend = backend("bad-format", &descriptor);

    let data = served_by(&chain(), &backend).await;

    assert_eq!(data["backend"], "static");
}

#[tokio::test]
async fn test_unknown_service_falls_back() {
    let descriptor = descriptor_file();
    let backend = backend("pkg.Nope/SayHello", &descriptor);

    let err = GrpcBackendFactory::new()
        .configure(&backend)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ConfigureError::Resolve(ResolveError::ServiceNotFound(_))
    ));

    assert_eq!(served_by(&chain(), &backend).await["backend"], "static");
}

#[tokio::test]
async fn test_streaming_method_falls_back() {
    let descriptor = descriptor_file();
    let backend = backend(SAY_HELLO_STREAM, &descriptor);

    assert_eq!(served_by(&chain(), &backend).await["backend"], "static");
}

#[tokio::test]
async fn test_garbage_descriptor_falls_back() {
    let mut descriptor = NamedTempFile::new().unwrap();
    descriptor.write_all(b"definitely not protobuf").unwrap();
    let backend = backend(SAY_HELLO, &descriptor);

    let err = GrpcBackendFactory::new()
        .configure(&backend)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ConfigureError::Descriptor(_)));

    assert_eq!(served_by(&chain(), &backend).await["backend"], "static");
}

#[tokio::test]
async fn test_backend_without_host_falls_back() {
    let descriptor = descriptor_file();
    let mut backend = backend(SAY_HELLO, &descriptor);
    backend.host.clear();

    let err = GrpcBackendFactory::new()
        .configure(&backend)
        .await
        .err()
        .unwrap();
    assert!(!err.is_missing_config());

    assert_eq!(served_by(&chain(), &backend).await["backend"], "static");
}

#[tokio::test]
async fn test_non_grpc_backend_is_left_alone() {
    let backend = BackendConfig {
        url_pattern: "/plain".to_string(),
        host: vec!["http://localhost:8080".to_string()],
        ..Default::default()
    };

    assert_eq!(served_by(&chain(), &backend).await["backend"], "static");
}

fn greeter_proxy(descriptor: &NamedTempFile) -> GrpcProxy<GrpcInvoker<GreeterServer>> {
    let backend = backend(SAY_HELLO, descriptor);
    let signature = resolve(&greeter_service::descriptor_pool(), SAY_HELLO).unwrap();
    GrpcProxy::new(GrpcInvoker::new(GreeterServer::new()), signature, &backend)
}

#[tokio::test]
async fn test_request_end_to_end() {
    let descriptor = descriptor_file();
    let proxy = greeter_proxy(&descriptor);

    let request = ProxyRequest::new()
        .with_param("name", "world")
        .with_query("tags", "a:1")
        .with_query("address.city", "Girona")
        .with_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-7"),
        );

    let response = proxy.call(request).await.unwrap();

    assert!(response.is_complete);
    assert_eq!(response.metadata.status_code, StatusCode::OK);
    assert_eq!(
        response.metadata.headers[http::header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(
        serde_json::Value::Object(response.data),
        json!({ "message": "hello world", "requestId": "req-7" })
    );
}

#[tokio::test]
async fn test_remote_error_is_generic_for_the_caller() {
    let descriptor = descriptor_file();
    let proxy = greeter_proxy(&descriptor);

    let err = proxy
        .call(ProxyRequest::new().with_body(&br#"{"name": "missing"}"#[..]))
        .await
        .unwrap_err();

    let response = HttpResponseError::from(&err);
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.body(), r#"{"errors":{"message":"Not Found"}}"#);
}

#[tokio::test]
async fn test_unsupported_field_kind() {
    let descriptor = descriptor_file();
    let mut backend = backend(SAY_HELLO, &descriptor);
    backend.query_strings_to_pass.push("address".to_string());

    let signature = resolve(&greeter_service::descriptor_pool(), SAY_HELLO).unwrap();
    let proxy = GrpcProxy::new(GrpcInvoker::new(GreeterServer::new()), signature, &backend);

    let err = proxy
        .call(ProxyRequest::new().with_query("address", "Girona"))
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Param(_)));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}
