//! Chat service: a repository paired with the turn orchestrator.
//!
//! This is the server-side entry point used by the HTTP handlers and the
//! CLI. It adds lifecycle logging around repository calls and routes turns
//! through the orchestrator against its own repository.

use parley_types::chat::{Chat, Turn, Utterance};
use parley_types::error::{RepositoryError, TurnError};
use tracing::info;
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::turn::orchestrator::{TurnOrchestrator, TurnOutcome};

/// Generic over `ChatRepository` so parley-core never depends on parley-infra.
pub struct ChatService<C: ChatRepository> {
    chat_repo: C,
    orchestrator: TurnOrchestrator,
}

impl<C: ChatRepository> ChatService<C> {
    pub fn new(chat_repo: C, orchestrator: TurnOrchestrator) -> Self {
        Self {
            chat_repo,
            orchestrator,
        }
    }

    pub async fn create_chat(&self, owner_id: &str) -> Result<Chat, RepositoryError> {
        let chat = self.chat_repo.create_chat(owner_id).await?;
        info!(chat_id = %chat.id, owner_id, "Chat created");
        Ok(chat)
    }

    pub async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        self.chat_repo.get_chat(chat_id).await
    }

    pub async fn list_chats(&self, owner_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        self.chat_repo.list_chats(owner_id).await
    }

    pub async fn load_history(&self, chat_id: &Uuid) -> Result<Vec<Turn>, RepositoryError> {
        self.chat_repo.load_history(chat_id).await
    }

    /// Delete a chat and its turns. Succeeds for chats that do not exist.
    pub async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        self.chat_repo.delete_chat(chat_id).await?;
        info!(chat_id = %chat_id, "Chat deleted");
        Ok(())
    }

    pub async fn send_turn(
        &self,
        chat_id: Uuid,
        prior_history: &[Utterance],
        utterance: &str,
    ) -> Result<TurnOutcome, TurnError> {
        self.orchestrator
            .execute_turn(&self.chat_repo, chat_id, prior_history, utterance)
            .await
    }
}
