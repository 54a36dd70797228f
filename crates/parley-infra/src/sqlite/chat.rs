//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `parley-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool and writes on the single writer connection.

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::chat::repository::ChatRepository;
use parley_types::chat::{Chat, Role, Turn};
use parley_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    id: String,
    owner_id: String,
    title: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        Ok(Chat {
            id: parse_uuid(&self.id, "chat id")?,
            owner_id: self.owner_id,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct TurnRow {
    id: String,
    chat_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl TurnRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_turn(self) -> Result<Turn, RepositoryError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Turn {
            id: parse_uuid(&self.id, "turn id")?,
            chat_id: parse_uuid(&self.chat_id, "chat_id")?,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width so that string comparison in SQL matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_chat(&self, owner_id: &str) -> Result<Chat, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let id = Uuid::now_v7();

        sqlx::query(
            "INSERT INTO chats (id, owner_id, title, created_at, updated_at) VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(id.to_string())
        .bind(owner_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        // Re-parse the stored string so the returned value matches what a
        // later read yields (microsecond precision).
        let stamp = parse_datetime(&now)?;
        Ok(Chat {
            id,
            owner_id: owner_id.to_string(),
            title: None,
            created_at: stamp,
            updated_at: stamp,
        })
    }

    async fn list_chats(&self, owner_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chats WHERE owner_id = ? ORDER BY updated_at DESC, rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            let chat_row = ChatRow::from_row(row).map_err(query_err)?;
            chats.push(chat_row.into_chat()?);
        }

        Ok(chats)
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let chat_row = ChatRow::from_row(&row).map_err(query_err)?;
                Ok(Some(chat_row.into_chat()?))
            }
            None => Ok(None),
        }
    }

    async fn load_history(&self, chat_id: &Uuid) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM turns WHERE chat_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            let turn_row = TurnRow::from_row(row).map_err(query_err)?;
            turns.push(turn_row.into_turn()?);
        }

        Ok(turns)
    }

    async fn append_turn(
        &self,
        chat_id: &Uuid,
        role: Role,
        content: &str,
    ) -> Result<Turn, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        // Bump first: a missing chat aborts before anything is written, and
        // the turn is never stamped earlier than the chat's last activity.
        let bumped = sqlx::query(
            "UPDATE chats SET updated_at = MAX(updated_at, ?) WHERE id = ? RETURNING updated_at",
        )
        .bind(&now)
        .bind(chat_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_err)?;

        let Some(bumped) = bumped else {
            return Err(RepositoryError::NotFound);
        };
        let stamp: String = bumped.try_get("updated_at").map_err(query_err)?;

        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO turns (id, chat_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(chat_id.to_string())
        .bind(role.to_string())
        .bind(content)
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;

        Ok(Turn {
            id,
            chat_id: *chat_id,
            role,
            content: content.to_string(),
            created_at: parse_datetime(&stamp)?,
        })
    }

    async fn set_title_if_absent(
        &self,
        chat_id: &Uuid,
        title: &str,
    ) -> Result<Option<String>, RepositoryError> {
        sqlx::query("UPDATE chats SET title = ? WHERE id = ? AND title IS NULL")
            .bind(title)
            .bind(chat_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        // Read back on the writer so the result reflects the update above.
        let row = sqlx::query("SELECT title FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => row.try_get("title").map_err(query_err),
            None => Ok(None),
        }
    }

    async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::database_url;
    use tempfile::TempDir;

    async fn test_repo() -> (TempDir, SqliteChatRepository) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
        (dir, SqliteChatRepository::new(pool))
    }

    #[tokio::test]
    async fn test_create_and_get_chat() {
        let (_dir, repo) = test_repo().await;

        let created = repo.create_chat("alice").await.unwrap();
        let fetched = repo.get_chat(&created.id).await.unwrap().unwrap();

        assert_eq!(fetched, created);
        assert!(fetched.title.is_none());
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn test_get_missing_chat() {
        let (_dir, repo) = test_repo().await;
        assert!(repo.get_chat(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_round_trips_in_append_order() {
        let (_dir, repo) = test_repo().await;
        let chat = repo.create_chat("alice").await.unwrap();

        let mut appended = Vec::new();
        for i in 0..12 {
            let role = if i % 2 == 0 { Role::Initiator } else { Role::Responder };
            appended.push(
                repo.append_turn(&chat.id, role, &format!("line {i}"))
                    .await
                    .unwrap(),
            );
        }

        let history = repo.load_history(&chat.id).await.unwrap();
        assert_eq!(history, appended);
        assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_append_bumps_updated_at() {
        let (_dir, repo) = test_repo().await;
        let chat = repo.create_chat("alice").await.unwrap();

        let turn = repo
            .append_turn(&chat.id, Role::Initiator, "hello")
            .await
            .unwrap();
        let after = repo.get_chat(&chat.id).await.unwrap().unwrap();

        assert!(after.updated_at >= chat.updated_at);
        assert!(after.updated_at >= turn.created_at);
    }

    #[tokio::test]
    async fn test_append_to_missing_chat_writes_nothing() {
        let (_dir, repo) = test_repo().await;
        let ghost = Uuid::now_v7();

        let err = repo
            .append_turn(&ghost, Role::Initiator, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        assert!(repo.load_history(&ghost).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_chats_most_recent_first() {
        let (_dir, repo) = test_repo().await;
        let first = repo.create_chat("alice").await.unwrap();
        let second = repo.create_chat("alice").await.unwrap();
        repo.create_chat("bob").await.unwrap();

        let listed = repo.list_chats("alice").await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        repo.append_turn(&first.id, Role::Initiator, "bump")
            .await
            .unwrap();
        let listed = repo.list_chats("alice").await.unwrap();
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn test_delete_cascades_and_is_idempotent() {
        let (_dir, repo) = test_repo().await;
        let chat = repo.create_chat("alice").await.unwrap();
        repo.append_turn(&chat.id, Role::Initiator, "hello")
            .await
            .unwrap();
        repo.append_turn(&chat.id, Role::Responder, "hi")
            .await
            .unwrap();

        repo.delete_chat(&chat.id).await.unwrap();
        repo.delete_chat(&chat.id).await.unwrap();

        assert!(repo.get_chat(&chat.id).await.unwrap().is_none());
        assert!(repo.load_history(&chat.id).await.unwrap().is_empty());

        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM turns")
            .fetch_one(&repo.pool.reader)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_set_title_if_absent() {
        let (_dir, repo) = test_repo().await;
        let chat = repo.create_chat("alice").await.unwrap();

        let first = repo.set_title_if_absent(&chat.id, "Trip plans").await.unwrap();
        let second = repo.set_title_if_absent(&chat.id, "Other").await.unwrap();
        assert_eq!(first.as_deref(), Some("Trip plans"));
        assert_eq!(second.as_deref(), Some("Trip plans"));

        let missing = repo
            .set_title_if_absent(&Uuid::now_v7(), "nope")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_datetime_format_is_fixed_width() {
        use chrono::Timelike;

        let whole_second = Utc::now().with_nanosecond(0).unwrap();
        let formatted = format_datetime(&whole_second);
        assert_eq!(formatted.len(), "2025-01-01T00:00:00.000000Z".len());
        assert!(formatted.ends_with(".000000Z"));
    }
}
