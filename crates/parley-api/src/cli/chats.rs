//! Chat management commands: new, list, history, delete.
//!
//! These work straight against the repository and need no model
//! credentials.

use anyhow::{Result, bail};
use chrono::Utc;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use parley_core::chat::recency::recency_label;
use parley_core::chat::repository::ChatRepository;
use parley_core::prompt::framer::PromptFramer;
use parley_types::chat::{Chat, Role, Turn};

use crate::state::AppState;

/// Placeholder shown for chats that have no title yet.
pub const UNTITLED: &str = "(untitled)";

/// First eight characters of a chat id, enough to reference it.
pub fn short_id(chat: &Chat) -> String {
    chat.id.to_string().chars().take(8).collect()
}

pub fn display_title(chat: &Chat) -> &str {
    chat.title.as_deref().unwrap_or(UNTITLED)
}

/// Resolve a chat reference against a listing.
///
/// Accepts a 1-based list position, a full id, or a unique id prefix.
pub fn resolve_chat_ref<'a>(chats: &'a [Chat], reference: &str) -> Result<&'a Chat> {
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("no chat given");
    }

    // Positions never start with 0, ids often do.
    if !reference.starts_with('0') {
        if let Ok(position) = reference.parse::<usize>() {
            if (1..=chats.len()).contains(&position) {
                return Ok(&chats[position - 1]);
            }
        }
    }

    let needle = reference.to_lowercase();
    let matches: Vec<&Chat> = chats
        .iter()
        .filter(|c| c.id.to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [chat] => Ok(chat),
        [] => bail!("no chat matches '{reference}'"),
        many => bail!(
            "'{reference}' matches {} chats, use more of the id",
            many.len()
        ),
    }
}

/// Look up a chat owned by the configured owner.
pub async fn find_chat(state: &AppState, reference: &str) -> Result<Chat> {
    let chats = state.chat_repo.list_chats(&state.config.owner_id).await?;
    Ok(resolve_chat_ref(&chats, reference)?.clone())
}

/// Render chats as a table with recency labels.
pub fn chat_table(chats: &[Chat]) -> Table {
    let now = Utc::now();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Id").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Last Active").fg(Color::White),
    ]);

    for (i, chat) in chats.iter().enumerate() {
        let title_cell = match &chat.title {
            Some(title) => Cell::new(title).fg(Color::Cyan),
            None => Cell::new(UNTITLED).fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(short_id(chat)).fg(Color::White),
            title_cell,
            Cell::new(recency_label(chat.updated_at, now)).fg(Color::DarkGrey),
        ]);
    }

    table
}

/// Format one stored turn as `name: content`, using the framing names.
pub fn format_turn(framer: &PromptFramer, turn: &Turn) -> String {
    let name = format!("{}:", framer.display_name(turn.role));
    let label = match turn.role {
        Role::Initiator => style(name).green().bold(),
        Role::Responder => style(name).cyan().bold(),
    };
    format!("{label} {}", turn.content)
}

/// `parley new`
pub async fn new_chat(state: &AppState, json: bool) -> Result<()> {
    let chat = state.chat_repo.create_chat(&state.config.owner_id).await?;
    tracing::info!(chat_id = %chat.id, "Chat created");

    if json {
        println!("{}", serde_json::to_string_pretty(&chat)?);
    } else {
        println!(
            "  {} Chat {} created. Continue it with: {}",
            style("✓").green().bold(),
            style(short_id(&chat)).cyan(),
            style(format!("parley chat --chat {}", short_id(&chat))).yellow()
        );
    }
    Ok(())
}

/// `parley list`
pub async fn list_chats(state: &AppState, json: bool) -> Result<()> {
    let chats = state.chat_repo.list_chats(&state.config.owner_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!();
        println!(
            "  {} No chats yet. Start one with: {}",
            style("i").blue().bold(),
            style("parley chat").yellow()
        );
        println!();
        return Ok(());
    }

    println!("{}", chat_table(&chats));
    Ok(())
}

/// `parley history <chat>`
pub async fn show_history(state: &AppState, reference: &str, json: bool) -> Result<()> {
    let chat = find_chat(state, reference).await?;
    let turns = state.chat_repo.load_history(&chat.id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "chat": chat, "turns": turns })
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(display_title(&chat)).bold(),
        style(short_id(&chat)).dim()
    );
    println!();
    if turns.is_empty() {
        println!("  {}", style("No turns yet.").dim());
    }
    let framer = PromptFramer::new(&state.config.framing);
    for turn in &turns {
        println!("  {}", format_turn(&framer, turn));
    }
    println!();
    Ok(())
}

/// `parley delete <chat>`
pub async fn delete_chat(state: &AppState, reference: &str, json: bool) -> Result<()> {
    let chat = find_chat(state, reference).await?;
    state.chat_repo.delete_chat(&chat.id).await?;
    tracing::info!(chat_id = %chat.id, "Chat deleted");

    if json {
        println!("{}", serde_json::json!({ "deleted_chat_id": chat.id }));
    } else {
        println!(
            "  {} Chat '{}' deleted.",
            style("✓").red().bold(),
            display_title(&chat)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chat_with_id(id: &str, title: Option<&str>) -> Chat {
        let now = Utc::now();
        Chat {
            id: Uuid::parse_str(id).unwrap(),
            owner_id: "local".to_string(),
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn listing() -> Vec<Chat> {
        vec![
            chat_with_id("0192a1b2-0000-7000-8000-000000000001", Some("Weekend plans")),
            chat_with_id("0192a1b2-0000-7000-8000-000000000002", None),
            chat_with_id("0193ffff-0000-7000-8000-000000000003", Some("Books")),
        ]
    }

    #[test]
    fn test_resolve_by_position() {
        let chats = listing();
        assert_eq!(resolve_chat_ref(&chats, "1").unwrap().id, chats[0].id);
        assert_eq!(resolve_chat_ref(&chats, "3").unwrap().id, chats[2].id);
    }

    #[test]
    fn test_resolve_by_prefix_and_full_id() {
        let chats = listing();
        assert_eq!(resolve_chat_ref(&chats, "0193").unwrap().id, chats[2].id);
        let full = chats[1].id.to_string();
        assert_eq!(resolve_chat_ref(&chats, &full).unwrap().id, chats[1].id);
        assert_eq!(
            resolve_chat_ref(&chats, &full.to_uppercase()).unwrap().id,
            chats[1].id
        );
    }

    #[test]
    fn test_resolve_rejects_ambiguous_and_unknown() {
        let chats = listing();
        let err = resolve_chat_ref(&chats, "0192a1b2").unwrap_err();
        assert!(err.to_string().contains("matches 2 chats"));
        assert!(resolve_chat_ref(&chats, "ffff").is_err());
        assert!(resolve_chat_ref(&chats, "  ").is_err());
        // Out-of-range positions fall through to prefix matching.
        assert!(resolve_chat_ref(&chats, "9").is_err());
        // Leading zeros mean an id prefix, not a position.
        assert!(resolve_chat_ref(&chats, "01").is_err());
    }

    #[test]
    fn test_display_title_and_short_id() {
        let chats = listing();
        assert_eq!(display_title(&chats[0]), "Weekend plans");
        assert_eq!(display_title(&chats[1]), UNTITLED);
        assert_eq!(short_id(&chats[2]), "0193ffff");
    }

    #[test]
    fn test_chat_table_has_a_row_per_chat() {
        let rendered = chat_table(&listing()).to_string();
        assert!(rendered.contains("Weekend plans"));
        assert!(rendered.contains(UNTITLED));
        assert!(rendered.contains("Today"));
    }
}
