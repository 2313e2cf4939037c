//! # Backend Configuration
//!
//! The backend block handed over by the host gateway's configuration loader, and the
//! gRPC-specific blocks nested inside its `extra_config`. A backend bound through a
//! descriptor file carries a [`NAMESPACE`] block:
//!
//! ```json
//! {
//!   "url_pattern": "/hello/{name}",
//!   "host": ["http://localhost:50051"],
//!   "headers_to_pass": ["X-Request-Id"],
//!   "query_strings_to_pass": ["name"],
//!   "extra_config": {
//!     "plugins/grpc": {
//!       "method": "pkg.Greeter/SayHello",
//!       "descriptor_file": "greeter.pb"
//!     }
//!   }
//! }
//! ```
//!
//! A backend whose schema is fetched from the server through reflection carries a
//! [`REFLECTION_NAMESPACE`] block instead, naming its own endpoint:
//!
//! ```json
//! {
//!   "extra_config": {
//!     "github.com/devopsfaith/krakend/grpc": {
//!       "endpoint": "localhost:50051",
//!       "method": "pkg.Greeter/SayHello"
//!     }
//!   }
//! }
//! ```
use crate::resolver::parse_method;
use serde::{Deserialize, de::DeserializeOwned, de::Unexpected};
use std::path::PathBuf;

/// Key of the gRPC block inside a backend's `extra_config`.
pub const NAMESPACE: &str = "plugins/grpc";

/// Key of the server reflection block inside a backend's `extra_config`.
pub const REFLECTION_NAMESPACE: &str = "github.com/devopsfaith/krakend/grpc";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing '{0}' block in backend extra_config")]
    MissingConfig(&'static str),
    #[error("Invalid gRPC config block: '{0}'")]
    InvalidConfig(#[source] serde_json::Error),
    #[error("Invalid method '{0}', expected 'package.Service/Method'")]
    InvalidMethodFormat(String),
    #[error("Missing descriptor_file in 'plugins/grpc' block")]
    MissingDescriptor,
    #[error("Backend has no host to connect to")]
    MissingHost,
    #[error("Missing endpoint in server reflection block")]
    MissingEndpoint,
}

/// A backend as described by the host gateway.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Path template of the backend, only used to identify it in logs.
    pub url_pattern: String,
    /// Candidate hosts; the first one is the gRPC target.
    pub host: Vec<String>,
    /// Request headers forwarded as gRPC metadata.
    pub headers_to_pass: Vec<String>,
    /// Query string parameters merged into the request message.
    pub query_strings_to_pass: Vec<String>,
    /// Namespaced plugin configuration.
    pub extra_config: serde_json::Map<String, serde_json::Value>,
}

impl BackendConfig {
    /// The target URI of the gRPC channel.
    ///
    /// Hosts are often written without a scheme (`localhost:50051`); those are taken to be
    /// plaintext HTTP/2 endpoints.
    pub fn grpc_target(&self) -> Result<String, ConfigError> {
        let host = self
            .host
            .first()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;

        Ok(with_scheme(host))
    }
}

/// The `plugins/grpc` block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GrpcConfig {
    /// `package.Service/Method`.
    #[serde(default)]
    pub method: String,
    /// Path to the serialized `FileDescriptorSet`.
    #[serde(default)]
    pub descriptor_file: Option<PathBuf>,
}

impl GrpcConfig {
    /// Extracts and validates the gRPC block of `backend`.
    pub fn from_backend(backend: &BackendConfig) -> Result<Self, ConfigError> {
        let config: GrpcConfig = namespaced_block(backend, NAMESPACE)?;
        validate_method(&config.method)?;
        config.descriptor_path()?;
        Ok(config)
    }

    /// The validated descriptor file location.
    pub fn descriptor_path(&self) -> Result<&PathBuf, ConfigError> {
        self.descriptor_file
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingDescriptor)
    }
}

/// The server reflection block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReflectionConfig {
    /// Address of the server, which serves both the reflection service and the method.
    #[serde(default)]
    pub endpoint: String,
    /// `package.Service/Method`.
    #[serde(default)]
    pub method: String,
}

impl ReflectionConfig {
    /// Extracts and validates the server reflection block of `backend`.
    pub fn from_backend(backend: &BackendConfig) -> Result<Self, ConfigError> {
        let config: ReflectionConfig = namespaced_block(backend, REFLECTION_NAMESPACE)?;
        if config.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        validate_method(&config.method)?;
        Ok(config)
    }

    /// The target URI of the gRPC channel, see [`BackendConfig::grpc_target`].
    pub fn target(&self) -> String {
        with_scheme(self.endpoint.trim())
    }
}

fn namespaced_block<T: DeserializeOwned>(
    backend: &BackendConfig,
    namespace: &'static str,
) -> Result<T, ConfigError> {
    let raw = backend
        .extra_config
        .get(namespace)
        .ok_or(ConfigError::MissingConfig(namespace))?;

    // Structs also deserialize from sequences, the block must be an object.
    if !raw.is_object() {
        return Err(ConfigError::InvalidConfig(serde::de::Error::invalid_type(
            unexpected(raw),
            &"a JSON object",
        )));
    }

    serde_json::from_value(raw.clone()).map_err(ConfigError::InvalidConfig)
}

fn validate_method(method: &str) -> Result<(), ConfigError> {
    parse_method(method)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidMethodFormat(method.to_string()))
}

fn with_scheme(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn unexpected(value: &serde_json::Value) -> Unexpected<'_> {
    match value {
        serde_json::Value::Null => Unexpected::Unit,
        serde_json::Value::Bool(b) => Unexpected::Bool(*b),
        serde_json::Value::Number(_) => Unexpected::Other("number"),
        serde_json::Value::String(s) => Unexpected::Str(s),
        serde_json::Value::Array(_) => Unexpected::Seq,
        serde_json::Value::Object(_) => Unexpected::Map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend(extra_config: serde_json::Value) -> BackendConfig {
        serde_json::from_value(json!({
            "host": ["localhost:50051"],
            "extra_config": extra_config,
        }))
        .unwrap()
    }

    #[test]
    fn extracts_grpc_block() {
        let backend = backend(json!({
            "plugins/grpc": { "method": "pkg.Greeter/SayHello", "descriptor_file": "greeter.pb" }
        }));

        let config = GrpcConfig::from_backend(&backend).unwrap();

        assert_eq!(config.method, "pkg.Greeter/SayHello");
        assert_eq!(config.descriptor_path().unwrap(), &PathBuf::from("greeter.pb"));
    }

    #[test]
    fn missing_block() {
        let backend = backend(json!({ "qos/ratelimit": {} }));
        let err = GrpcConfig::from_backend(&backend).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfig(NAMESPACE)));
    }

    #[test]
    fn block_with_wrong_shape() {
        for block in [
            json!(["pkg.Greeter/SayHello", "greeter.pb"]),
            json!(["pkg.Greeter/SayHello"]),
            json!("pkg.Greeter/SayHello"),
            json!({ "method": 42, "descriptor_file": "greeter.pb" }),
        ] {
            let err = GrpcConfig::from_backend(&backend(json!({ "plugins/grpc": block.clone() })))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidConfig(_)), "{block}: {err}");
        }
    }

    #[test]
    fn malformed_method() {
        for block in [
            json!({ "method": "bad-format", "descriptor_file": "greeter.pb" }),
            json!({ "method": "", "descriptor_file": "greeter.pb" }),
            json!({ "descriptor_file": "greeter.pb" }),
        ] {
            let err = GrpcConfig::from_backend(&backend(json!({ "plugins/grpc": block }))).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidMethodFormat(_)));
        }
    }

    #[test]
    fn missing_descriptor_file() {
        for block in [
            json!({ "method": "pkg.Greeter/SayHello" }),
            json!({ "method": "pkg.Greeter/SayHello", "descriptor_file": "" }),
        ] {
            let err = GrpcConfig::from_backend(&backend(json!({ "plugins/grpc": block }))).unwrap_err();
            assert!(matches!(err, ConfigError::MissingDescriptor));
        }
    }

    #[test]
    fn grpc_target_defaults_to_plaintext() {
        let mut backend = BackendConfig::default();
        assert!(matches!(backend.grpc_target(), Err(ConfigError::MissingHost)));

        backend.host = vec!["localhost:50051".to_string()];
        assert_eq!(backend.grpc_target().unwrap(), "http://localhost:50051");

        backend.host = vec!["http://10.0.0.1:9000".to_string(), "ignored:1".to_string()];
        assert_eq!(backend.grpc_target().unwrap(), "http://10.0.0.1:9000");
    }

    #[test]
    fn extracts_reflection_block() {
        let backend = backend(json!({
            "github.com/devopsfaith/krakend/grpc": {
                "endpoint": "localhost:50051",
                "method": "pkg.Greeter/SayHello"
            }
        }));

        let config = ReflectionConfig::from_backend(&backend).unwrap();

        assert_eq!(config.method, "pkg.Greeter/SayHello");
        assert_eq!(config.target(), "http://localhost:50051");
        assert!(matches!(
            GrpcConfig::from_backend(&backend),
            Err(ConfigError::MissingConfig(NAMESPACE))
        ));
    }

    #[test]
    fn reflection_block_needs_endpoint_and_method() {
        let cases = [
            (json!({ "method": "pkg.Greeter/SayHello" }), "endpoint"),
            (json!({ "endpoint": " ", "method": "pkg.Greeter/SayHello" }), "endpoint"),
            (json!({ "endpoint": "localhost:50051" }), "method"),
            (json!({ "endpoint": "localhost:50051", "method": "a/b/c" }), "method"),
            (json!(["localhost:50051", "pkg.Greeter/SayHello"]), "shape"),
        ];

        for (block, missing) in cases {
            let backend = backend(json!({ REFLECTION_NAMESPACE: block.clone() }));
            let err = ReflectionConfig::from_backend(&backend).unwrap_err();
            let expected = match missing {
                "endpoint" => matches!(err, ConfigError::MissingEndpoint),
                "method" => matches!(err, ConfigError::InvalidMethodFormat(_)),
                _ => matches!(err, ConfigError::InvalidConfig(_)),
            };
            assert!(expected, "{block}: {err}");
        }

        let err = ReflectionConfig::from_backend(&BackendConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfig(REFLECTION_NAMESPACE)));
    }
}
