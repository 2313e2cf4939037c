//! # Grelay CLI Entry Point
//!
//! Drives one request through a gRPC backend, the same way the gateway would:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs logging.
//! 2. **Configuration**: Reads a backend block from disk and builds it through a
//!    [`FactoryChain`] holding the server reflection and descriptor file backend factories.
//! 3. **Execution**: Hands a [`ProxyRequest`] assembled from the arguments to the proxy.
//! 4. **Presentation**: Prints the response data, or the error the caller would receive.

mod cli;
mod formatter;
mod logging;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use formatter::{FormattedString, GenericError};
use grelay_core::{
    backend::{GrpcBackendFactory, ReflectionBackendFactory, resolve_method},
    config::{BackendConfig, ConfigError, GrpcConfig},
    error::HttpResponseError,
    proxy::{FactoryChain, ProxyRequest},
};
use http::{HeaderName, HeaderValue};
use std::{io::Cursor, path::Path, process, time::Duration};

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    logging::init(args.log_level.as_deref());

    match args.command {
        Commands::Call {
            backend,
            params,
            query,
            headers,
            body,
            timeout,
        } => {
            let request = build_request_or_exit(params, query, headers, body, timeout);
            run_call(&backend, request).await;
        }
        Commands::Describe { backend } => describe(&backend).await,
    }
}

fn load_backend(path: &Path) -> anyhow::Result<BackendConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("'{}' does not hold a valid backend block", path.display()))
}

fn load_backend_or_exit(path: &Path) -> BackendConfig {
    match load_backend(path) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Invalid backend", format!("{err:#}")))
            );
            process::exit(1);
        }
    }
}

fn build_request(
    params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
) -> anyhow::Result<ProxyRequest> {
    let mut request = ProxyRequest::new();

    for (key, value) in params {
        request = request.with_param(key, value);
    }
    for (key, value) in query {
        request = request.with_query(key, value);
    }
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.to_lowercase().as_bytes())
            .with_context(|| format!("Invalid header name '{key}'"))?;
        let value = HeaderValue::from_str(&value)
            .with_context(|| format!("Invalid value for header '{key}'"))?;
        request = request.with_header(name, value);
    }
    if let Some(body) = body {
        request = request.with_body(Cursor::new(serde_json::to_vec(&body)?));
    }
    if let Some(timeout) = timeout {
        request = request.with_timeout(timeout);
    }

    Ok(request)
}

fn build_request_or_exit(
    params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
) -> ProxyRequest {
    match build_request(params, query, headers, body, timeout) {
        Ok(request) => request,
        Err(err) => {
            eprintln!(
                "{}",
                FormattedString::from(GenericError("Invalid request", format!("{err:#}")))
            );
            process::exit(1);
        }
    }
}

async fn run_call(path: &Path, request: ProxyRequest) {
    let backend = load_backend_or_exit(path);

    let chain = FactoryChain::new()
        .with(ReflectionBackendFactory::new())
        .with(GrpcBackendFactory::new());

    let proxy = match chain.build(&backend).await {
        Ok(proxy) => proxy,
        Err(err) => {
            eprintln!("{}", FormattedString::from(GenericError("Backend not served", err)));
            process::exit(1);
        }
    };

    match proxy.call(request).await {
        Ok(response) => println!("{}", FormattedString::from(response.data)),
        Err(err) => {
            eprintln!("{}", FormattedString::from(HttpResponseError::from(err)));
            process::exit(1);
        }
    }
}

async fn describe(path: &Path) {
    let backend = load_backend_or_exit(path);

    // A backend without descriptor file may still be described through server reflection.
    let signature = match GrpcConfig::from_backend(&backend) {
        Ok(config) => resolve_method(&config).await,
        Err(ConfigError::MissingConfig(_)) => ReflectionBackendFactory::new()
            .configure(&backend)
            .await
            .map(|proxy| proxy.signature().clone()),
        Err(err) => {
            eprintln!("{}", FormattedString::from(GenericError("Invalid gRPC config", err)));
            process::exit(1);
        }
    };

    match signature {
        Ok(signature) => println!("{}", FormattedString::from(signature)),
        Err(err) => {
            eprintln!("{}", FormattedString::from(GenericError("Unresolved method", err)));
            process::exit(1);
        }
    }
}
