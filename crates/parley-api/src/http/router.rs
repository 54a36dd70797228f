//! Axum router configuration with middleware.
//!
//! All chat routes are under `/api/v1/`; `/health` sits at the root.
//! Middleware: CORS and request tracing.

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::ApiState;
use crate::http::handlers;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/chats",
            post(handlers::chat::create_chat).get(handlers::chat::list_chats),
        )
        .route("/chats/{id}", delete(handlers::chat::delete_chat))
        .route(
            "/chats/{id}/turns",
            get(handlers::chat::load_history).post(handlers::chat::send_turn),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness probe.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parley_core::chat::service::ChatService;
    use parley_core::prompt::framer::PromptFramer;
    use parley_core::turn::orchestrator::{TurnOrchestrator, TurnSettings};
    use parley_infra::llm::create_provider;
    use parley_infra::sqlite::chat::SqliteChatRepository;
    use parley_infra::sqlite::pool::{DatabasePool, database_url};
    use parley_types::config::ModelSettings;

    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let axum::Json(body) = health_check().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_router_builds_with_real_state() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
        let provider = create_provider(
            &ModelSettings::default(),
            Some("sk-test-not-real".to_string().into()),
        )
        .unwrap();
        let service = ChatService::new(
            SqliteChatRepository::new(pool),
            TurnOrchestrator::new(provider, PromptFramer::default(), TurnSettings::default()),
        );

        let state = ApiState {
            chat_service: Arc::new(service),
            default_owner_id: "local".to_string(),
        };
        assert_eq!(state.owner_or_default(None), "local");
        assert_eq!(state.owner_or_default(Some("  ")), "local");
        assert_eq!(state.owner_or_default(Some("ana")), "ana");

        let _router = build_router(state);
    }
}
