//! Infrastructure layer for Parley.
//!
//! Contains implementations of the traits defined in `parley-core`: SQLite
//! chat storage and the Anthropic Messages API provider, plus loading of
//! `config.toml` and data directory resolution.

pub mod config;
pub mod llm;
pub mod sqlite;
