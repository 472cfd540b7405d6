//! Terminal failures of the decision loop.
//!
//! Tool failures are not here: those are fed back to the model as
//! recoverable context. Only losing the model endpoint ends a request.

use thiserror::Error;

use crate::inference::InferenceError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
