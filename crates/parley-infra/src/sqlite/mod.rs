//! SQLite storage: split reader/writer pool and the chat repository.

pub mod chat;
pub mod pool;
