//! In-memory `ChatRepository` for tests and throwaway sessions.

use std::collections::HashMap;

use chrono::Utc;
use parley_types::chat::{Chat, Role, Turn};
use parley_types::error::RepositoryError;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::ChatRepository;

#[derive(Debug)]
struct ChatEntry {
    chat: Chat,
    turns: Vec<Turn>,
}

/// Chats and turns kept in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryChatRepository {
    chats: RwLock<HashMap<Uuid, ChatEntry>>,
}

impl InMemoryChatRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatRepository for InMemoryChatRepository {
    async fn create_chat(&self, owner_id: &str) -> Result<Chat, RepositoryError> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            title: None,
            created_at: now,
            updated_at: now,
        };
        let mut chats = self.chats.write().await;
        chats.insert(
            chat.id,
            ChatEntry {
                chat: chat.clone(),
                turns: Vec::new(),
            },
        );
        Ok(chat)
    }

    async fn list_chats(&self, owner_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        let chats = self.chats.read().await;
        let mut owned: Vec<Chat> = chats
            .values()
            .map(|entry| &entry.chat)
            .filter(|chat| chat.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(owned)
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let chats = self.chats.read().await;
        Ok(chats.get(chat_id).map(|entry| entry.chat.clone()))
    }

    async fn load_history(&self, chat_id: &Uuid) -> Result<Vec<Turn>, RepositoryError> {
        let chats = self.chats.read().await;
        let mut turns = chats
            .get(chat_id)
            .map(|entry| entry.turns.clone())
            .unwrap_or_default();
        // Stable sort: equal timestamps keep append order.
        turns.sort_by_key(|turn| turn.created_at);
        Ok(turns)
    }

    async fn append_turn(
        &self,
        chat_id: &Uuid,
        role: Role,
        content: &str,
    ) -> Result<Turn, RepositoryError> {
        let mut chats = self.chats.write().await;
        let entry = chats.get_mut(chat_id).ok_or(RepositoryError::NotFound)?;

        // Never stamp a turn earlier than the chat's last activity, so time
        // order and append order agree even if the wall clock steps back.
        let stamp = entry.chat.updated_at.max(Utc::now());
        let turn = Turn {
            id: Uuid::now_v7(),
            chat_id: *chat_id,
            role,
            content: content.to_string(),
            created_at: stamp,
        };
        entry.chat.updated_at = stamp;
        entry.turns.push(turn.clone());
        Ok(turn)
    }

    async fn set_title_if_absent(
        &self,
        chat_id: &Uuid,
        title: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let mut chats = self.chats.write().await;
        let Some(chat) = chats.get_mut(chat_id).map(|entry| &mut entry.chat) else {
            return Ok(None);
        };
        if chat.title.is_none() {
            chat.title = Some(title.to_string());
        }
        Ok(chat.title.clone())
    }

    async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        let mut chats = self.chats.write().await;
        chats.remove(chat_id);
        Ok(())
    }
}
