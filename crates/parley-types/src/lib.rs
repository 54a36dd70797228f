//! Shared domain types for Parley.
//!
//! Chats, turns, LLM request/response shapes, configuration, and the error
//! types shared by every other crate in the workspace.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
