//! Per-call, process-isolated tool gateway.
//!
//! The client side spawns a fresh worker process for every call and talks
//! line-delimited JSON-RPC 2.0 over its stdio; the server side is the serve
//! loop that worker runs. A crashing or hanging tool can never take the
//! caller down with it.

pub mod client;
pub mod errors;
pub mod registry;
pub mod server;
pub mod transport;
pub mod types;

pub use client::GatewayClient;
pub use errors::GatewayError;
