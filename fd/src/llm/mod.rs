//! LLM client trait and Anthropic implementation

mod anthropic;
pub mod client;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use types::{ChatMessage, ChatResponse, Role, TokenUsage};
