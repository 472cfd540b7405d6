//! Bounded tool-using decision loop.

pub mod action;
pub mod errors;
pub mod events;
pub mod prompt;
pub mod runner;

pub use action::AgentAction;
pub use errors::AgentError;
pub use events::AgentEvent;
pub use runner::{stream_chat, AgentLoop, ChatTurn, TurnRole};
