//! toolgate: tool-orchestrated chat assistant core.
//!
//! Three coupled pieces: a bounded agent decision loop ([`agent`]), a
//! per-call process-isolated tool gateway ([`gateway`]), and a set of
//! policy-guarded capability handlers ([`tools`]). The same binary acts as
//! both sides of the gateway: the chat side spawns itself with `serve` as a
//! short-lived worker for every tool call.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

pub mod agent;
pub mod config;
pub mod docstore;
pub mod gateway;
pub mod inference;
pub mod tools;

/// Platform data directory for this application.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolgate")
}

/// Install the global tracing subscriber.
///
/// Everything logs to stderr: in the worker process stdout is the protocol
/// channel, and the chat command writes the answer there. `RUST_LOG`
/// controls the filter; `TOOLGATE_LOG_FORMAT=json` switches to structured
/// output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("TOOLGATE_LOG_FORMAT").is_ok_and(|v| v == "json");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber was already installed");
    }
}
