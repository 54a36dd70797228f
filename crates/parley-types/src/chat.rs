//! Chat, turn, and conversation-view types for Parley.
//!
//! A `Chat` is a persisted conversation thread; a `Turn` is one persisted
//! utterance inside it. `Utterance` is the role/content pair that makes up a
//! conversation view, whether it came from storage or from a client's
//! optimistic state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Which party spoke a turn.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('initiator', 'responder'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human user.
    Initiator,
    /// The model.
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initiator" => Ok(Role::Initiator),
            "responder" => Ok(Role::Responder),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

/// A conversation thread owned by a user.
///
/// `updated_at` never moves backwards and is always at or after the
/// `created_at` of the newest turn in the chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub owner_id: String,
    /// Derived from the first user utterance; `None` until the first turn.
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One persisted utterance within a chat. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A role/content pair: one line of a conversation view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,
    pub content: String,
}

impl Utterance {
    pub fn initiator(content: impl Into<String>) -> Self {
        Self {
            role: Role::Initiator,
            content: content.into(),
        }
    }

    pub fn responder(content: impl Into<String>) -> Self {
        Self {
            role: Role::Responder,
            content: content.into(),
        }
    }
}

impl From<&Turn> for Utterance {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

impl From<Turn> for Utterance {
    fn from(turn: Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Initiator, Role::Responder] {
            let s = role.to_string();
            let parsed: Role = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&Role::Responder).unwrap();
        assert_eq!(json, "\"responder\"");
        let parsed: Role = serde_json::from_str("\"initiator\"").unwrap();
        assert_eq!(parsed, Role::Initiator);
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert!("assistant".parse::<Role>().is_err());
    }

    #[test]
    fn test_utterance_from_turn() {
        let turn = Turn {
            id: Uuid::now_v7(),
            chat_id: Uuid::now_v7(),
            role: Role::Responder,
            content: "hi there".to_string(),
            created_at: Utc::now(),
        };
        let utterance = Utterance::from(&turn);
        assert_eq!(utterance, Utterance::responder("hi there"));
    }

    #[test]
    fn test_utterance_deserialize_client_payload() {
        let json = r#"[{"role":"initiator","content":"hello"},{"role":"responder","content":"hey"}]"#;
        let history: Vec<Utterance> = serde_json::from_str(json).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Responder);
    }
}
