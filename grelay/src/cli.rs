//! # CLI
//!
//! This module defines the command-line interface of `grelay` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring
//! parameters are `key=value` and headers are `key:value`).
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

#[derive(Parser)]
#[command(name = "grelay", version, about = "Serve one request through a gRPC backend")]
pub struct Cli {
    /// Log filter, overrides RUST_LOG (e.g. `debug` or `grelay_core=trace`)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one request to a backend
    ///
    /// The backend is read from a JSON file holding a gateway backend block, and the
    /// request goes through exactly the same steps a gateway request would.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grelay call backend.json --param name=world --query tags=a:1 -H x-request-id:42
    /// ```
    Call {
        /// Path to the backend block (JSON)
        backend: PathBuf,

        /// Path parameter, as captured by the route template
        #[arg(short = 'p', long = "param", value_parser = parse_kv)]
        params: Vec<(String, String)>,

        /// Query string parameter, may be repeated
        #[arg(short = 'q', long = "query", value_parser = parse_kv)]
        query: Vec<(String, String)>,

        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// JSON request body
        #[arg(long, value_parser = parse_body)]
        body: Option<serde_json::Value>,

        /// Request deadline in seconds
        #[arg(long, value_parser = parse_timeout)]
        timeout: Option<Duration>,
    },

    /// Show the method a backend is bound to
    Describe {
        /// Path to the backend block (JSON)
        backend: PathBuf,
    },
}

fn parse_kv(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| "Format must be 'key=value'".to_string())
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|e| format!("Invalid number of seconds: {e}"))?;

    Duration::try_from_secs_f64(secs).map_err(|e| format!("Invalid timeout: {e}"))
}
