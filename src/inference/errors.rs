//! Model endpoint failures. All of these are terminal for a request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,

    #[error("request to model endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("model returned an empty response")]
    EmptyResponse,
}
