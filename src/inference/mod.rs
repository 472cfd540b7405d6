//! OpenAI-compatible model endpoint client.

pub mod client;
pub mod errors;
pub mod types;

pub use client::InferenceClient;
pub use errors::InferenceError;
pub use types::{ChatMessage, Role};
