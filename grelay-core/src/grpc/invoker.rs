//! # Dynamic Invoker
//!
//! Performs one unary gRPC call per request over a long lived, multiplexed connection.
//!
//! ## How it works
//!
//! [`GrpcInvoker`] wraps a `tonic::client::Grpc` built once for the backend. Every call
//! works on a cheap clone of it, so concurrent requests never wait on each other: they
//! only share the underlying channel. The request message is already schema-bound, the
//! [`DynamicCodec`] only has to know the output schema of the resolved method.
//!
//! The [`UnaryInvoker`] trait is the seam between the backend adapter and the network,
//! which lets the adapter be exercised without a server.
use super::codec::DynamicCodec;
use crate::{BoxError, resolver::MethodSignature};
use http_body::Body as HttpBody;
use prost_reflect::DynamicMessage;
use std::{future::Future, str::FromStr, time::Duration};
use tonic::{
    Status,
    client::GrpcService,
    codegen::Bytes,
    metadata::{
        MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

#[derive(thiserror::Error, Debug)]
pub enum InvokeError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
    #[error("gRPC call failed with status '{}': '{}'", .0.code(), .0.message())]
    Status(Status),
}

/// Sends a request message to a resolved method and waits for its single response.
pub trait UnaryInvoker: Send + Sync {
    /// Calls `method` with `message`, attaching `metadata` as ASCII gRPC metadata.
    ///
    /// When `timeout` is set it is sent along as the call deadline and also bounds the
    /// local wait.
    fn unary(
        &self,
        method: &MethodSignature,
        message: DynamicMessage,
        metadata: Vec<(String, String)>,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<DynamicMessage, InvokeError>> + Send;
}

/// A [`UnaryInvoker`] backed by a `tonic` gRPC client.
#[derive(Debug, Clone)]
pub struct GrpcInvoker<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcInvoker<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }
}

impl<S> UnaryInvoker for GrpcInvoker<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    async fn unary(
        &self,
        method: &MethodSignature,
        message: DynamicMessage,
        metadata: Vec<(String, String)>,
        timeout: Option<Duration>,
    ) -> Result<DynamicMessage, InvokeError> {
        let mut request = build_request(message, metadata)?;
        if let Some(timeout) = timeout {
            request.set_timeout(timeout);
        }

        let mut client = self.client.clone();
        let codec = DynamicCodec::new(method.output());
        let path = method.path().clone();

        // Readiness is part of the call: a backend that never connects must not outlive the
        // request deadline.
        let call = async move {
            client
                .ready()
                .await
                .map_err(|e| InvokeError::ClientNotReady(e.into()))?;

            client
                .unary(request, path, codec)
                .await
                .map(tonic::Response::into_inner)
                .map_err(InvokeError::Status)
        };

        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
                Err(InvokeError::Status(Status::deadline_exceeded(
                    "request deadline exceeded",
                )))
            }),
            None => call.await,
        }
    }
}

fn build_request<T>(
    payload: T,
    metadata: Vec<(String, String)>,
) -> Result<tonic::Request<T>, InvokeError> {
    let mut request = tonic::Request::new(payload);
    for (k, v) in metadata {
        let key = MetadataKey::from_str(&k).map_err(|source| InvokeError::InvalidMetadataKey {
            key: k.clone(),
            source,
        })?;
        let val = MetadataValue::from_str(&v)
            .map_err(|source| InvokeError::InvalidMetadataValue { key: k, source })?;
        request.metadata_mut().insert(key, val);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_metadata() {
        let request = build_request(
            (),
            vec![
                ("x-request-id".to_string(), "abc".to_string()),
                ("authorization".to_string(), "Bearer t".to_string()),
            ],
        )
        .unwrap();

        let metadata = request.metadata();
        assert_eq!(metadata.get("x-request-id").unwrap(), "abc");
        assert_eq!(metadata.get("authorization").unwrap(), "Bearer t");
    }

    #[test]
    fn rejects_invalid_metadata_key() {
        let err = build_request((), vec![("bad key".to_string(), "v".to_string())]).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidMetadataKey { key, .. } if key == "bad key"));
    }

    #[test]
    fn rejects_invalid_metadata_value() {
        let err = build_request((), vec![("x-k".to_string(), "line\nbreak".to_string())])
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidMetadataValue { key, .. } if key == "x-k"));
    }
}
