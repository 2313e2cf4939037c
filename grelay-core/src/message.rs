//! # Parameter Codec
//!
//! Everything needed to move data between the HTTP side and `DynamicMessage`s:
//!
//! * [`params`]: merges path and query parameters into a [`ParameterBag`](params::ParameterBag)
//!   and selects the headers forwarded as gRPC metadata.
//! * [`populate`]: writes a parameter bag into a message, field by field, driven by the schema.
//! * [`json`]: the canonical proto3 JSON mapping for request bodies and responses.
pub mod json;
pub mod params;
pub mod populate;
