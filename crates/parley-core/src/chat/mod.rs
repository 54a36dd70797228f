//! Chat persistence abstractions for Parley.
//!
//! This module defines the `ChatRepository` trait that the infrastructure
//! layer implements, an in-memory implementation for tests and ephemeral
//! runs, and `ChatService`, which pairs a repository with the turn
//! orchestrator.

pub mod memory;
pub mod recency;
pub mod repository;
pub mod service;
