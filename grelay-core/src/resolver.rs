//! # Service/Method Resolver
//!
//! Turns a `package.Service/Method` identifier into a [`MethodSignature`]: the input and
//! output schemas of the method plus the HTTP/2 path used on the wire
//! (`/package.Service/Method`).
use http::uri::{InvalidUri, PathAndQuery};
use prost_reflect::{DescriptorPool, MessageDescriptor, MethodDescriptor, ServiceDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid method '{0}', expected 'package.Service/Method'")]
    InvalidMethodFormat(String),
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound { service: String, method: String },
    #[error("Method '{0}' is a streaming method, only unary methods can be bridged")]
    StreamingNotSupported(String),
    #[error("Method path '{path}' is not a valid URI path: '{source}'")]
    InvalidPath {
        path: String,
        #[source]
        source: InvalidUri,
    },
}

/// A resolved unary method.
///
/// Cloning is cheap: descriptors are reference counted views into the registry.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    method: MethodDescriptor,
    path: PathAndQuery,
}

impl MethodSignature {
    /// Fully qualified service name (e.g. `pkg.Greeter`).
    pub fn service_name(&self) -> &str {
        self.method.parent_service().full_name()
    }

    /// Short method name (e.g. `SayHello`).
    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    /// The wire path, `/<service-full-name>/<method-name>`.
    pub fn path(&self) -> &PathAndQuery {
        &self.path
    }

    pub fn input(&self) -> MessageDescriptor {
        self.method.input()
    }

    pub fn output(&self) -> MessageDescriptor {
        self.method.output()
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.method
    }
}

/// Splits `service/method` into its two parts.
///
/// Anything other than exactly two non-empty segments is rejected.
pub fn parse_method(identifier: &str) -> Result<(&str, &str), ResolveError> {
    let mut segments = identifier.split('/');

    match (segments.next(), segments.next(), segments.next()) {
        (Some(service), Some(method), None) if !service.is_empty() && !method.is_empty() => {
            Ok((service, method))
        }
        _ => Err(ResolveError::InvalidMethodFormat(identifier.to_string())),
    }
}

/// Looks up `identifier` in the registry.
///
/// Files are scanned in registry order and the first service with a matching fully
/// qualified name wins.
pub fn resolve(pool: &DescriptorPool, identifier: &str) -> Result<MethodSignature, ResolveError> {
    let (service_name, method_name) = parse_method(identifier)?;

    let service = find_service(pool, service_name)
        .ok_or_else(|| ResolveError::ServiceNotFound(service_name.to_string()))?;

    let method = service
        .methods()
        .find(|m| m.name() == method_name)
        .ok_or_else(|| ResolveError::MethodNotFound {
            service: service_name.to_string(),
            method: method_name.to_string(),
        })?;

    if method.is_client_streaming() || method.is_server_streaming() {
        return Err(ResolveError::StreamingNotSupported(identifier.to_string()));
    }

    let path = format!("/{}/{}", service.full_name(), method.name());
    let path = PathAndQuery::try_from(path.as_str())
        .map_err(|source| ResolveError::InvalidPath { path, source })?;

    Ok(MethodSignature { method, path })
}

fn find_service(pool: &DescriptorPool, full_name: &str) -> Option<ServiceDescriptor> {
    pool.files().find_map(|file| {
        file.services()
            .find(|service| service.full_name() == full_name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> DescriptorPool {
        greeter_service::descriptor_pool()
    }

    #[test]
    fn parses_service_and_method() {
        assert_eq!(
            parse_method("pkg.Greeter/SayHello").unwrap(),
            ("pkg.Greeter", "SayHello")
        );
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for identifier in ["bad-format", "", "/SayHello", "pkg.Greeter/", "a/b/c", "/"] {
            assert!(
                matches!(
                    parse_method(identifier),
                    Err(ResolveError::InvalidMethodFormat(_))
                ),
                "'{identifier}' should be rejected"
            );
        }
    }

    #[test]
    fn resolves_unary_method() {
        let signature = resolve(&pool(), "pkg.Greeter/SayHello").unwrap();

        assert_eq!(signature.path().as_str(), "/pkg.Greeter/SayHello");
        assert_eq!(signature.service_name(), "pkg.Greeter");
        assert_eq!(signature.method_name(), "SayHello");
        assert_eq!(signature.input().full_name(), "pkg.HelloRequest");
        assert_eq!(signature.output().full_name(), "pkg.HelloReply");
    }

    #[test]
    fn unknown_service() {
        let err = resolve(&pool(), "pkg.Ghost/SayHello").unwrap_err();
        assert!(matches!(err, ResolveError::ServiceNotFound(s) if s == "pkg.Ghost"));
    }

    #[test]
    fn service_short_name_is_not_enough() {
        let err = resolve(&pool(), "Greeter/SayHello").unwrap_err();
        assert!(matches!(err, ResolveError::ServiceNotFound(_)));
    }

    #[test]
    fn unknown_method() {
        let err = resolve(&pool(), "pkg.Greeter/SayGoodbye").unwrap_err();
        assert!(matches!(err, ResolveError::MethodNotFound { method, .. } if method == "SayGoodbye"));
    }

    #[test]
    fn streaming_methods_are_rejected() {
        let err = resolve(&pool(), greeter_service::SAY_HELLO_STREAM).unwrap_err();
        assert!(matches!(err, ResolveError::StreamingNotSupported(_)));
    }
}
