//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and control which chat is selected.

use std::io::Write;

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat loop.
    Exit,
    /// Deselect the current chat; the next message starts a new one.
    New,
    /// List chats.
    List,
    /// Show the current conversation view.
    History,
    /// Select another chat by position, id, or id prefix.
    Switch(String),
    /// Delete a chat; the selected one when no reference is given.
    Delete(Option<String>),
    /// Unknown command or missing argument.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), Some(arg.trim().to_string())),
        None => (trimmed.to_lowercase(), None),
    };
    let arg = arg.filter(|a| !a.is_empty());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/new" => Some(ChatCommand::New),
        "/list" | "/ls" => Some(ChatCommand::List),
        "/history" => Some(ChatCommand::History),
        "/switch" | "/sw" => match arg {
            Some(reference) => Some(ChatCommand::Switch(reference)),
            None => Some(ChatCommand::Unknown("/switch requires a chat".to_string())),
        },
        "/delete" | "/rm" => Some(ChatCommand::Delete(arg)),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Write the help text listing all available commands.
pub fn print_help(out: &mut impl Write) -> std::io::Result<()> {
    let rows = [
        ("/help", "Show this help message"),
        ("/new", "Start a new chat with your next message"),
        ("/list", "List your chats"),
        ("/switch <chat>", "Switch to a chat (position, id or id prefix)"),
        ("/history", "Show the current conversation"),
        ("/delete [chat]", "Delete a chat (default: the current one)"),
        ("/clear", "Clear the screen"),
        ("/exit", "Leave the chat"),
    ];

    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (cmd, help) in rows {
        writeln!(out, "  {:<16} {}", style(cmd).cyan(), help)?;
    }
    writeln!(out)?;
    writeln!(out, "  {}", style("Ctrl+D to exit").dim())?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_non_command() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("  not /a command"), None);
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
        assert_eq!(parse("/EXIT"), Some(ChatCommand::Exit));
        assert_eq!(parse("/q"), Some(ChatCommand::Exit));
        assert_eq!(parse("/new"), Some(ChatCommand::New));
        assert_eq!(parse("/ls"), Some(ChatCommand::List));
        assert_eq!(parse(" /history "), Some(ChatCommand::History));
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(
            parse("/switch 2"),
            Some(ChatCommand::Switch("2".to_string()))
        );
        assert_eq!(
            parse("/sw   0192a1b2"),
            Some(ChatCommand::Switch("0192a1b2".to_string()))
        );
        assert!(matches!(parse("/switch"), Some(ChatCommand::Unknown(_))));
        assert!(matches!(parse("/switch   "), Some(ChatCommand::Unknown(_))));
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(parse("/delete"), Some(ChatCommand::Delete(None)));
        assert_eq!(
            parse("/rm 3"),
            Some(ChatCommand::Delete(Some("3".to_string())))
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse("/foobar"),
            Some(ChatCommand::Unknown("/foobar".to_string()))
        );
    }

    #[test]
    fn test_print_help_lists_commands() {
        let mut out = Vec::new();
        print_help(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("/switch"));
        assert!(text.contains("/delete"));
    }
}
