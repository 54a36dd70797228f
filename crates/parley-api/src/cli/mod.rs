//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Chats are referenced by
//! full id, a unique id prefix, or their 1-based position in `parley list`.

pub mod chat;
pub mod chats;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Talk to a language model as if it were the other half of a conversation.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new, empty chat.
    New,

    /// List chats, most recently active first.
    #[command(alias = "ls")]
    List,

    /// Show the stored turns of a chat.
    History {
        /// Chat id, id prefix, or list position.
        chat: String,
    },

    /// Delete a chat and all of its turns.
    #[command(alias = "rm")]
    Delete {
        /// Chat id, id prefix, or list position.
        chat: String,
    },

    /// Start an interactive chat.
    Chat {
        /// Resume an existing chat instead of starting fresh.
        #[arg(long)]
        chat: Option<String>,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_with_resume() {
        let cli = Cli::parse_from(["parley", "chat", "--chat", "2"]);
        match cli.command {
            Commands::Chat { chat } => assert_eq!(chat.as_deref(), Some("2")),
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["parley", "-vv", "--json", "list"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::List));
    }
}
