//! HTTP/REST API layer for Parley.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format,
//! request tracing and CORS support.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

use std::sync::Arc;

use crate::state::ConcreteChatService;

/// State shared by all HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub chat_service: Arc<ConcreteChatService>,
    /// Owner used when a request does not name one.
    pub default_owner_id: String,
}

impl ApiState {
    pub fn owner_or_default<'a>(&'a self, owner_id: Option<&'a str>) -> &'a str {
        owner_id
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(&self.default_owner_id)
    }
}
