//! Envelope response format for all API responses.
//!
//! Every response is wrapped in a consistent envelope:
//! ```json
//! {
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 },
//!   "errors": [],
//!   "_links": { "self": "..." }
//! }
//! ```
//!
//! A response may carry both `data` and `errors`: a turn whose reply could
//! not be stored returns the reply with a `TURN_NOT_PERSISTED` entry.

use std::collections::HashMap;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

/// Envelope response wrapping all API data.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    pub meta: ApiMeta,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,

    /// HATEOAS-style links for discoverability.
    #[serde(rename = "_links", skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, String>,

    #[serde(skip)]
    status: StatusCode,
}

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ApiMeta {
    pub request_id: String,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    pub response_time_ms: u64,
}

impl ApiMeta {
    /// Metadata for a request that started at `start`.
    pub fn since(start: Instant) -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            response_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Individual error detail.
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    /// A 200 response with data.
    pub fn success(data: T, meta: ApiMeta) -> Self {
        Self {
            data: Some(data),
            meta,
            errors: Vec::new(),
            links: HashMap::new(),
            status: StatusCode::OK,
        }
    }

    /// Override the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_link(mut self, rel: &str, href: &str) -> Self {
        self.links.insert(rel.to_string(), href.to_string());
        self
    }

    /// Attach an error entry without changing the status code.
    pub fn with_error(mut self, code: &str, message: &str) -> Self {
        self.errors.push(ApiErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        });
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl ApiResponse<()> {
    /// An error response with no data.
    pub fn error(status: StatusCode, code: &str, message: &str, meta: ApiMeta) -> Self {
        Self {
            data: None,
            meta,
            errors: vec![ApiErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
            }],
            links: HashMap::new(),
            status,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });

        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let resp = ApiResponse::success(serde_json::json!({"chat_id": "abc"}), ApiMeta::since(Instant::now()))
            .with_link("self", "/api/v1/chats/abc");
        assert_eq!(resp.status(), StatusCode::OK);

        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["data"]["chat_id"], "abc");
        assert_eq!(value["_links"]["self"], "/api/v1/chats/abc");
        assert!(value.get("errors").is_none());
        assert!(value["meta"]["request_id"].as_str().is_some());
    }

    #[test]
    fn test_data_with_error_entry_keeps_status() {
        let resp = ApiResponse::success("hi", ApiMeta::since(Instant::now()))
            .with_error("TURN_NOT_PERSISTED", "reply was not stored");
        assert_eq!(resp.status(), StatusCode::OK);

        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["data"], "hi");
        assert_eq!(value["errors"][0]["code"], "TURN_NOT_PERSISTED");
    }

    #[test]
    fn test_error_envelope_has_no_data() {
        let resp = ApiResponse::error(
            StatusCode::NOT_FOUND,
            "CHAT_NOT_FOUND",
            "Chat not found",
            ApiMeta::since(Instant::now()),
        );
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("data").is_none());
        assert_eq!(value["errors"][0]["message"], "Chat not found");
    }
}
