//! ChatRepository trait definition.
//!
//! Provides the persistence operations for chats and their turns.

use parley_types::chat::{Chat, Role, Turn};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chat and turn persistence.
///
/// Implementations live in parley-infra (e.g., `SqliteChatRepository`) and in
/// [`crate::chat::memory::InMemoryChatRepository`].
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Create a new, untitled chat for `owner_id`.
    fn create_chat(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// List an owner's chats, most recently active first (`updated_at DESC`).
    fn list_chats(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;

    /// Get a chat by its unique ID.
    fn get_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Turns of a chat in append order.
    ///
    /// Returns an empty vector for unknown or deleted chats.
    fn load_history(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, RepositoryError>> + Send;

    /// Append a turn and bump the chat's `updated_at`, atomically.
    ///
    /// Fails with `RepositoryError::NotFound` when the chat does not exist.
    fn append_turn(
        &self,
        chat_id: &Uuid,
        role: Role,
        content: &str,
    ) -> impl std::future::Future<Output = Result<Turn, RepositoryError>> + Send;

    /// Set the chat title unless one is already stored.
    ///
    /// Returns the title stored after the call, or `None` if the chat does
    /// not exist.
    fn set_title_if_absent(
        &self,
        chat_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Delete a chat and all of its turns. Deleting a missing chat succeeds.
    fn delete_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
