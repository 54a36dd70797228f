//! Conversation orchestration and repository trait definitions for Parley.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements, plus the logic that drives a turn:
//! framing, the model call, persistence, and client-side reconciliation.
//! It depends only on `parley-types` -- never on `parley-infra` or any
//! database/IO crate.

pub mod chat;
pub mod llm;
pub mod prompt;
pub mod session;
pub mod turn;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
