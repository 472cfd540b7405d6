//! Caller-side gateway client.
//!
//! One worker per call: spawn, request, await under the configured timeout,
//! kill and reap. No pooling or reuse; isolation beats latency here.

use std::time::Duration;

use serde_json::json;

use crate::config::RuntimeConfig;
use crate::tools::ToolOutcome;

use super::errors::GatewayError;
use super::transport::WorkerConnection;
use super::types::{ToolDescriptor, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST};

#[derive(Debug, Clone)]
pub struct GatewayClient {
    call_timeout: Duration,
}

impl GatewayClient {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(Duration::from_millis(config.gateway_call_timeout_ms()))
    }

    async fn round_trip(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut worker = WorkerConnection::spawn()?;
        let timeout_ms = self.call_timeout.as_millis() as u64;

        let result = tokio::time::timeout(self.call_timeout, worker.request(method, params)).await;
        // the worker dies on every path, including timeout
        worker.shutdown().await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(GatewayError::Timeout { timeout_ms }),
        }
    }

    /// Call one tool through a fresh worker.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolOutcome, GatewayError> {
        let value = self
            .round_trip(
                METHOD_TOOLS_CALL,
                json!({ "name": name, "arguments": arguments }),
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| GatewayError::Protocol(format!("malformed tool result: {e}")))
    }

    /// Fetch the capability table through a fresh worker.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let value = self.round_trip(METHOD_TOOLS_LIST, serde_json::Value::Null).await?;
        serde_json::from_value(value["tools"].clone())
            .map_err(|e| GatewayError::Protocol(format!("malformed tool table: {e}")))
    }
}
