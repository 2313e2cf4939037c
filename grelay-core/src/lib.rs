//! # Grelay Core
//!
//! `grelay-core` bridges HTTP requests to unary gRPC calls without any generated client code.
//! Everything it needs to know about a backend comes from a compiled `FileDescriptorSet`
//! and a `package.Service/Method` identifier supplied in configuration.
//!
//! ## Key Components
//!
//! * **[`descriptor`]:** Reads a serialized descriptor set and builds the type registry.
//! * **[`resolver`]:** Finds a service and method in the registry and exposes its
//!   [`MethodSignature`](resolver::MethodSignature).
//! * **[`message`]:** Turns loosely typed request parameters and a JSON body into a
//!   `DynamicMessage`, and a response `DynamicMessage` back into JSON.
//! * **[`grpc`]:** A `tonic` codec for `DynamicMessage` plus the [`GrpcInvoker`](grpc::invoker::GrpcInvoker)
//!   performing one unary call per request over a shared channel.
//! * **[`reflection`]:** Fetches a schema from a running server over `grpc.reflection.v1`,
//!   for backends that ship no descriptor file.
//! * **[`backend`]:** The [`GrpcBackendFactory`](backend::GrpcBackendFactory) and
//!   [`ReflectionBackendFactory`](backend::ReflectionBackendFactory) wiring all of the above
//!   into a [`Proxy`](proxy::Proxy) for a configured backend.
//!
//! ## Host integration
//!
//! The surrounding gateway is modelled by the [`proxy`] module: a backend is built by an
//! ordered [`FactoryChain`](proxy::FactoryChain), and a backend that is not (or not correctly)
//! configured for gRPC simply falls through to the next factory.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod backend;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod grpc;
pub mod message;
pub mod proxy;
pub mod reflection;
pub mod resolver;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
