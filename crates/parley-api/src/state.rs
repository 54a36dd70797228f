//! Application state wiring storage, configuration and the chat service.
//!
//! Storage-only commands (`new`, `list`, `history`, `delete`) work without
//! model credentials; the chat loop and the REST server build a
//! [`ConcreteChatService`] on demand, which needs an API key.

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::chat::service::ChatService;
use parley_core::prompt::framer::PromptFramer;
use parley_core::turn::orchestrator::{TurnOrchestrator, TurnSettings};
use parley_infra::config::{load_global_config, resolve_data_dir};
use parley_infra::llm::{api_key_from_env, create_provider};
use parley_infra::sqlite::chat::SqliteChatRepository;
use parley_infra::sqlite::pool::{DatabasePool, database_url};
use parley_types::config::GlobalConfig;
use parley_types::llm::LlmError;

/// The chat service pinned to the SQLite repository.
pub type ConcreteChatService = ChatService<SqliteChatRepository>;

/// Shared application state used by CLI commands and the REST server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub chat_repo: SqliteChatRepository,
}

impl AppState {
    /// Resolve the data directory, load `config.toml` and open the database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let chat_repo = SqliteChatRepository::new(db_pool.clone());

        tracing::debug!(data_dir = %data_dir.display(), "Application state initialized");

        Ok(Self {
            config: Arc::new(config),
            data_dir,
            db_pool,
            chat_repo,
        })
    }

    /// Build the chat service: provider from config and environment, framer
    /// from the `[framing]` section.
    pub fn chat_service(&self) -> anyhow::Result<Arc<ConcreteChatService>> {
        let settings = &self.config.model;
        let provider = create_provider(settings, api_key_from_env(settings.provider)).map_err(
            |e| match e {
                LlmError::AuthenticationFailed => anyhow::anyhow!(
                    "ANTHROPIC_API_KEY is not set. Export it before starting a chat or the server."
                ),
                other => anyhow::anyhow!(other),
            },
        )?;

        let orchestrator = TurnOrchestrator::new(
            provider,
            PromptFramer::new(&self.config.framing),
            TurnSettings::from(settings),
        );

        Ok(Arc::new(ChatService::new(self.chat_repo.clone(), orchestrator)))
    }
}
