//! Data models for the Chat Completions API.
//!
//! - `chat`: the request the relay sends upstream and the subset of the response it reads.

pub mod chat;

pub use chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, ChoiceMessage, Role,
};
