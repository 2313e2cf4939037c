//! # Server Reflection
//!
//! Fetches the schema of a service from the server that implements it, over the
//! `grpc.reflection.v1` protocol.
//!
//! The file declaring the requested symbol is asked for first. Every import of a received
//! file that has not been seen yet is then requested on the same stream, until the whole
//! dependency tree is known and a complete `FileDescriptorSet` can be assembled.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use http_body::Body as HttpBody;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Streaming, client::GrpcService, codegen::Bytes, transport::Channel};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error(
        "Failed to open the reflection stream, the server might not support reflection: '{0}'"
    )]
    StreamInit(#[source] tonic::Status),
    #[error("The reflection stream returned an error status: '{0}'")]
    Stream(#[source] tonic::Status),
    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,
    #[error("Failed to send a request on the reflection stream")]
    SendFailed,
    #[error("Reflection server returned error code {code}: '{message}'")]
    Server { code: i32, message: String },
    #[error("Unexpected reflection response: {0}")]
    UnexpectedResponse(String),
    #[error("Failed to decode file descriptor: '{0}'")]
    Decode(#[from] prost::DecodeError),
}

// The host field of reflection requests is optional and ignored by common servers.
const EMPTY_HOST: &str = "";

// Bounds the number of file requests queued ahead of the responses.
const REQUEST_BUFFER: usize = 64;

/// A client for the server reflection service.
pub struct ReflectionClient<S = Channel> {
    client: ServerReflectionClient<S>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
        }
    }

    /// Builds the descriptor set declaring `symbol` (e.g. `pkg.Greeter`), imports included.
    pub async fn file_descriptor_set_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionError> {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);

        let mut responses = self
            .client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionError::StreamInit)?
            .into_inner();

        send(&tx, MessageRequest::FileContainingSymbol(symbol.to_string())).await?;

        let files = collect_files(&mut responses, &tx).await?;

        Ok(FileDescriptorSet {
            file: files.into_values().collect(),
        })
    }
}

async fn send(
    tx: &mpsc::Sender<ServerReflectionRequest>,
    request: MessageRequest,
) -> Result<(), ReflectionError> {
    let request = ServerReflectionRequest {
        host: EMPTY_HOST.to_string(),
        message_request: Some(request),
    };

    tx.send(request)
        .await
        .map_err(|_| ReflectionError::SendFailed)
}

/// Reads responses until no request is left unanswered.
async fn collect_files(
    responses: &mut Streaming<ServerReflectionResponse>,
    tx: &mpsc::Sender<ServerReflectionRequest>,
) -> Result<HashMap<String, FileDescriptorProto>, ReflectionError> {
    let mut inflight = 1;
    let mut files = HashMap::new();
    let mut requested = HashSet::new();

    while inflight > 0 {
        let response = responses
            .message()
            .await
            .map_err(ReflectionError::Stream)?
            .ok_or(ReflectionError::StreamClosed)?;

        inflight -= 1;

        let batch = match response.message_response {
            Some(MessageResponse::FileDescriptorResponse(batch)) => batch,
            Some(MessageResponse::ErrorResponse(e)) => {
                return Err(ReflectionError::Server {
                    code: e.error_code,
                    message: e.error_message,
                });
            }
            Some(other) => return Err(ReflectionError::UnexpectedResponse(format!("{other:?}"))),
            None => return Err(ReflectionError::UnexpectedResponse("empty message".into())),
        };

        for raw in batch.file_descriptor_proto {
            let file = FileDescriptorProto::decode(raw.as_slice())?;
            let Some(name) = file.name.clone() else {
                continue;
            };
            if files.contains_key(&name) {
                continue;
            }

            for dependency in &file.dependency {
                if !files.contains_key(dependency) && requested.insert(dependency.clone()) {
                    send(tx, MessageRequest::FileByFilename(dependency.clone())).await?;
                    inflight += 1;
                }
            }

            files.insert(name, file);
        }
    }

    Ok(files)
}
