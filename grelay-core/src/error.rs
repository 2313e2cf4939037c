//! # Request Errors
//!
//! [`RequestError`] gathers everything that can go wrong while serving one request, and
//! knows which HTTP status each failure deserves.
//!
//! Callers of the bridge never see these details: they receive an [`HttpResponseError`]
//! carrying the status code and a generic JSON body. The detailed error is logged
//! where it happens.
use crate::{grpc::invoker::InvokeError, message::populate::ParamError};
use http::StatusCode;
use serde_json::json;
use tonic::Code;

/// Content type of every response produced by the bridge.
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Failed to read request body: '{0}'")]
    BodyRead(#[source] std::io::Error),
    #[error("Failed to decode request body: '{0}'")]
    BodyDecode(#[source] serde_json::Error),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    #[error("Failed to encode response message as JSON: '{0}'")]
    ResponseEncode(#[source] serde_json::Error),
}

impl RequestError {
    /// The HTTP status code reported to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::BodyRead(_) | RequestError::BodyDecode(_) | RequestError::Param(_) => {
                StatusCode::BAD_REQUEST
            }
            RequestError::Invoke(InvokeError::InvalidMetadataKey { .. })
            | RequestError::Invoke(InvokeError::InvalidMetadataValue { .. }) => {
                StatusCode::BAD_REQUEST
            }
            RequestError::Invoke(InvokeError::ClientNotReady(_)) => StatusCode::SERVICE_UNAVAILABLE,
            RequestError::Invoke(InvokeError::Status(status)) => grpc_to_http(status.code()),
            RequestError::ResponseEncode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps a gRPC status code to the closest HTTP status.
pub fn grpc_to_http(code: Code) -> StatusCode {
    match code {
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Cancelled => client_closed_request(),
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Non-standard 499, used by proxies for requests the client gave up on.
fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// The failure handed to the end caller.
///
/// The body is `{"errors":{"message":"<reason phrase>"}}`, it says nothing about the
/// backend that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{body}")]
pub struct HttpResponseError {
    code: StatusCode,
    body: String,
    encoding: &'static str,
}

impl HttpResponseError {
    pub fn new(code: StatusCode) -> Self {
        let message = code.canonical_reason().unwrap_or("Client Closed Request");
        let body = json!({ "errors": { "message": message } }).to_string();

        Self {
            code,
            body,
            encoding: JSON_CONTENT_TYPE,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Content type of [`body`](Self::body).
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }
}

impl From<&RequestError> for HttpResponseError {
    fn from(err: &RequestError) -> Self {
        Self::new(err.status_code())
    }
}

impl From<RequestError> for HttpResponseError {
    fn from(err: RequestError) -> Self {
        Self::from(&err)
    }
}
