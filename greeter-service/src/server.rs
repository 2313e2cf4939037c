//! A hand-written equivalent of the server stub `tonic-prost-build` would generate for
//! `pkg.Greeter`, working on `DynamicMessage` instead of generated structs.
use crate::descriptor_pool;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value};
use std::{convert::Infallible, time::Duration};
use tonic::{
    Request, Response, Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
    codegen::{BoxFuture, Context, Poll, Service, StdError},
    server::{Grpc, NamedService, UnaryService},
};

const SAY_HELLO_PATH: &str = "/pkg.Greeter/SayHello";

/// Replies `hello <name>` and echoes the `x-request-id` metadata entry.
///
/// A few names trigger special behaviour: `missing` answers with `NOT_FOUND`, `slow`
/// waits 500ms before answering and `deadline` replies with the `grpc-timeout` it received.
#[derive(Debug, Clone)]
pub struct GreeterServer {
    pool: DescriptorPool,
}

impl GreeterServer {
    pub fn new() -> Self {
        Self {
            pool: descriptor_pool(),
        }
    }
}

impl Default for GreeterServer {
    fn default() -> Self {
        Self::new()
    }
}

impl NamedService for GreeterServer {
    const NAME: &'static str = crate::SERVICE;
}

impl<B> Service<http::Request<B>> for GreeterServer
where
    B: http_body::Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let request_desc = self.pool.get_message_by_name("pkg.HelloRequest");
        let reply_desc = self.pool.get_message_by_name("pkg.HelloReply");

        let is_say_hello = req.uri().path() == SAY_HELLO_PATH;

        match (is_say_hello, request_desc, reply_desc) {
            (true, Some(request_desc), Some(reply_desc)) => Box::pin(async move {
                let mut grpc = Grpc::new(ServerCodec(request_desc));
                Ok(grpc.unary(SayHello(reply_desc), req).await)
            }),
            _ => Box::pin(async move {
                let mut response = http::Response::new(tonic::body::Body::default());
                let headers = response.headers_mut();
                headers.insert(
                    Status::GRPC_STATUS,
                    (tonic::Code::Unimplemented as i32).into(),
                );
                headers.insert(
                    http::header::CONTENT_TYPE,
                    tonic::metadata::GRPC_CONTENT_TYPE,
                );
                Ok(response)
            }),
        }
    }
}

struct SayHello(MessageDescriptor);

impl UnaryService<DynamicMessage> for SayHello {
    type Response = DynamicMessage;
    type Future = BoxFuture<Response<DynamicMessage>, Status>;

    fn call(&mut self, request: Request<DynamicMessage>) -> Self::Future {
        let reply_desc = self.0.clone();
        Box::pin(async move { say_hello(reply_desc, request).await })
    }
}

async fn say_hello(
    reply_desc: MessageDescriptor,
    request: Request<DynamicMessage>,
) -> Result<Response<DynamicMessage>, Status> {
    let metadata_entry = |key: &str| {
        request
            .metadata()
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let request_id = metadata_entry("x-request-id");
    let deadline = metadata_entry("grpc-timeout").unwrap_or_default();

    let message = request.into_inner();
    let name = message
        .get_field_by_name("name")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    match name.as_str() {
        "missing" => return Err(Status::not_found("no greeting for 'missing'")),
        "slow" => tokio::time::sleep(Duration::from_millis(500)).await,
        _ => {}
    }

    let greeting = match name.as_str() {
        "deadline" => format!("deadline {deadline}"),
        _ => format!("hello {name}"),
    };

    let mut reply = DynamicMessage::new(reply_desc);
    reply.set_field_by_name("message", Value::String(greeting));
    if let Some(id) = request_id {
        reply.set_field_by_name("request_id", Value::String(id));
    }

    Ok(Response::new(reply))
}

/// Server side codec: decodes requests with the input schema, encodes replies as-is.
struct ServerCodec(MessageDescriptor);

impl Codec for ServerCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;

    type Encoder = ServerEncoder;
    type Decoder = ServerDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        ServerEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        ServerDecoder(self.0.clone())
    }
}

struct ServerEncoder;

impl Encoder for ServerEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("Failed to encode reply: {e}")))
    }
}

struct ServerDecoder(MessageDescriptor);

impl Decoder for ServerDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src)
            .map_err(|e| Status::internal(format!("Failed to decode request: {e}")))?;
        Ok(Some(msg))
    }
}
