//! Main chat loop.
//!
//! User input is read on the terminal while backend work (chat creation,
//! turns) runs on spawned tasks that report back over a channel. The
//! [`SessionController`] decides what each result means for the view; this
//! module only executes its actions and prints the outcome.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use console::style;
use rustyline_async::SharedWriter;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use parley_core::prompt::framer::PromptFramer;
use parley_core::session::controller::{
    ChatCreated, Reconciliation, RequestTicket, SessionController, SubmitAction, SubmitRejected,
    TurnRequest,
};
use parley_core::turn::orchestrator::TurnOutcome;
use parley_types::chat::{Chat, Role, Turn, Utterance};
use parley_types::error::{RepositoryError, TurnError};

use crate::cli::chats::{chat_table, display_title, format_turn, resolve_chat_ref, short_id};
use crate::state::{AppState, ConcreteChatService};

use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};

/// Shown when the loop exits with a turn in flight. The spawned task is
/// dropped with the runtime after the utterance was stored.
const PENDING_ON_EXIT: &str =
    "Leaving while a reply is pending. Your message is stored, but the reply will be lost.";

/// A backend result delivered to the loop.
#[derive(Debug)]
enum BackendEvent {
    ChatCreated {
        ticket: RequestTicket,
        result: Result<Uuid, RepositoryError>,
    },
    TurnResolved {
        ticket: RequestTicket,
        result: Result<TurnOutcome, TurnError>,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Run the interactive chat loop, optionally resuming an existing chat.
pub async fn run_chat_loop(state: &AppState, resume: Option<&str>) -> Result<()> {
    let service = state.chat_service()?;
    let framer = PromptFramer::new(&state.config.framing);

    let prompt = format!(
        "  {} ",
        style(format!("{} >", framer.display_name(Role::Initiator)))
            .green()
            .bold()
    );
    let (mut input, out) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    let (events, mut backend) = mpsc::unbounded_channel();
    let mut chat_loop = ChatLoop {
        service,
        owner_id: state.config.owner_id.clone(),
        model: state.config.model.model.clone(),
        framer,
        controller: SessionController::new(),
        events,
        out,
    };

    if let Some(reference) = resume {
        chat_loop.switch_to(reference).await?;
    }
    chat_loop.print_banner()?;

    loop {
        tokio::select! {
            event = input.read_line() => match event {
                InputEvent::Eof => break,
                InputEvent::Interrupted => {
                    writeln!(
                        chat_loop.out,
                        "  {}",
                        style("Press Ctrl+D to exit, or keep chatting.").dim()
                    )?;
                }
                InputEvent::Message(text) => {
                    if let Some(ChatCommand::Clear) = commands::parse(&text) {
                        input.clear();
                        continue;
                    }
                    if chat_loop.handle_line(&text).await? == Flow::Exit {
                        break;
                    }
                }
            },
            Some(event) = backend.recv() => chat_loop.handle_backend(event)?,
        }
    }

    if chat_loop.controller.is_busy() {
        writeln!(
            chat_loop.out,
            "  {}",
            style(PENDING_ON_EXIT).dim()
        )?;
    }
    writeln!(chat_loop.out, "\n  {}", style("Session ended.").dim())?;
    Ok(())
}

struct ChatLoop {
    service: Arc<ConcreteChatService>,
    owner_id: String,
    model: String,
    framer: PromptFramer,
    controller: SessionController,
    events: mpsc::UnboundedSender<BackendEvent>,
    out: SharedWriter,
}

impl ChatLoop {
    fn print_banner(&mut self) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "  {}", style("Parley").cyan().bold())?;
        writeln!(
            self.out,
            "  {}  {}",
            style("Model:").bold(),
            style(&self.model).dim()
        )?;
        let chat = match self.controller.selected_chat() {
            Some(id) => id.to_string().chars().take(8).collect(),
            None => "new chat".to_string(),
        };
        writeln!(self.out, "  {}   {}", style("Chat:").bold(), style(chat).dim())?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "  {}",
            style("Type /help for commands, Ctrl+D to exit").dim()
        )?;
        writeln!(self.out, "  {}", style("---").dim())?;
        writeln!(self.out)?;
        Ok(())
    }

    async fn handle_line(&mut self, text: &str) -> Result<Flow> {
        if text.is_empty() {
            return Ok(Flow::Continue);
        }

        let Some(command) = commands::parse(text) else {
            self.submit(text)?;
            return Ok(Flow::Continue);
        };

        match command {
            ChatCommand::Help => commands::print_help(&mut self.out)?,
            ChatCommand::Exit => return Ok(Flow::Exit),
            ChatCommand::Clear => {}
            ChatCommand::New => {
                self.controller.clear_selection();
                writeln!(
                    self.out,
                    "  {} Your next message starts a new chat.",
                    style("*").cyan().bold()
                )?;
            }
            ChatCommand::List => self.print_chats().await?,
            ChatCommand::History => self.print_view()?,
            ChatCommand::Switch(reference) => {
                if let Err(e) = self.switch_to(&reference).await {
                    self.print_error(&e.to_string())?;
                }
            }
            ChatCommand::Delete(reference) => {
                if let Err(e) = self.delete(reference.as_deref()).await {
                    self.print_error(&e.to_string())?;
                }
            }
            ChatCommand::Unknown(name) => {
                writeln!(
                    self.out,
                    "  {} Unknown command: {}. Type /help for available commands.",
                    style("?").yellow().bold(),
                    style(name).dim()
                )?;
            }
        }
        Ok(Flow::Continue)
    }

    fn submit(&mut self, text: &str) -> Result<()> {
        match self.controller.submit(text) {
            Ok(SubmitAction::CreateChat { ticket }) => {
                spawn_create_chat(
                    Arc::clone(&self.service),
                    self.owner_id.clone(),
                    ticket,
                    self.events.clone(),
                );
            }
            Ok(SubmitAction::SendTurn(request)) => {
                spawn_turn(Arc::clone(&self.service), request, self.events.clone());
            }
            Err(SubmitRejected::EmptyInput) => return Ok(()),
            Err(rejected @ SubmitRejected::RequestInFlight) => {
                writeln!(self.out, "  {} {rejected}", style("…").yellow())?;
                return Ok(());
            }
        }
        writeln!(self.out, "  {}", style("thinking...").dim())?;
        Ok(())
    }

    fn handle_backend(&mut self, event: BackendEvent) -> Result<()> {
        match event {
            BackendEvent::ChatCreated { ticket, result } => {
                match self.controller.chat_created(ticket, result) {
                    ChatCreated::Ignored => {}
                    ChatCreated::SendTurn(request) => {
                        debug!(chat_id = %request.chat_id, "Chat created for first message");
                        spawn_turn(Arc::clone(&self.service), request, self.events.clone());
                    }
                    ChatCreated::Failed(e) => {
                        self.print_error(&format!("Could not start a chat: {e}"))?;
                    }
                }
            }
            BackendEvent::TurnResolved { ticket, result } => {
                let title = result.as_ref().ok().and_then(|o| o.title.clone());
                let error = result.as_ref().err().map(ToString::to_string);
                let reconciliation = self.controller.turn_resolved(ticket, result);
                if let Some(text) =
                    render_reconciliation(&self.framer, &reconciliation, error.as_deref())
                {
                    writeln!(self.out, "{text}")?;
                }
                if let (Reconciliation::Appended { .. }, Some(title)) = (&reconciliation, title) {
                    writeln!(self.out, "  {} {}", style("Titled:").dim(), style(title).dim())?;
                }
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Chat>> {
        Ok(self.service.list_chats(&self.owner_id).await?)
    }

    async fn print_chats(&mut self) -> Result<()> {
        let chats = self.list().await?;
        if chats.is_empty() {
            writeln!(self.out, "  {}", style("No chats yet.").dim())?;
        } else {
            writeln!(self.out, "{}", chat_table(&chats))?;
        }
        Ok(())
    }

    /// Select a chat and print its stored history.
    async fn switch_to(&mut self, reference: &str) -> Result<()> {
        let chats = self.list().await?;
        let chat = resolve_chat_ref(&chats, reference)?.clone();
        let turns = self.service.load_history(&chat.id).await?;
        self.controller.select_chat(chat.id, &turns);

        writeln!(
            self.out,
            "\n  {} {} {}",
            style("Now in").dim(),
            style(display_title(&chat)).cyan().bold(),
            style(short_id(&chat)).dim()
        )?;
        self.print_turns(&turns)?;
        Ok(())
    }

    async fn delete(&mut self, reference: Option<&str>) -> Result<()> {
        let chat_id = match (reference, self.controller.selected_chat()) {
            (Some(reference), _) => resolve_chat_ref(&self.list().await?, reference)?.id,
            (None, Some(selected)) => selected,
            (None, None) => anyhow::bail!("no chat selected; use /delete <chat>"),
        };

        self.service.delete_chat(&chat_id).await?;
        self.controller.chat_deleted(chat_id);
        writeln!(self.out, "  {} Chat deleted.", style("✓").red().bold())?;
        Ok(())
    }

    fn print_view(&mut self) -> Result<()> {
        if self.controller.selected_chat().is_none() {
            writeln!(
                self.out,
                "  {}",
                style("No chat selected. Your next message starts a new one.").dim()
            )?;
            return Ok(());
        }
        let lines: Vec<String> = self
            .controller
            .view()
            .iter()
            .map(|u| format_utterance(&self.framer, u))
            .collect();
        writeln!(self.out)?;
        for line in lines {
            writeln!(self.out, "  {line}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn print_turns(&mut self, turns: &[Turn]) -> Result<()> {
        writeln!(self.out)?;
        for turn in turns {
            writeln!(self.out, "  {}", format_turn(&self.framer, turn))?;
        }
        if !turns.is_empty() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn print_error(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "  {} {message}", style("!").red().bold())?;
        Ok(())
    }
}

fn spawn_create_chat(
    service: Arc<ConcreteChatService>,
    owner_id: String,
    ticket: RequestTicket,
    events: mpsc::UnboundedSender<BackendEvent>,
) {
    tokio::spawn(async move {
        let result = service.create_chat(&owner_id).await.map(|chat| chat.id);
        let _ = events.send(BackendEvent::ChatCreated { ticket, result });
    });
}

fn spawn_turn(
    service: Arc<ConcreteChatService>,
    request: TurnRequest,
    events: mpsc::UnboundedSender<BackendEvent>,
) {
    tokio::spawn(async move {
        let result = service
            .send_turn(request.chat_id, &request.prior_history, &request.utterance)
            .await;
        let _ = events.send(BackendEvent::TurnResolved {
            ticket: request.ticket,
            result,
        });
    });
}

fn format_utterance(framer: &PromptFramer, utterance: &Utterance) -> String {
    let name = format!("{}:", framer.display_name(utterance.role));
    let label = match utterance.role {
        Role::Initiator => style(name).green().bold(),
        Role::Responder => style(name).cyan().bold(),
    };
    format!("{label} {}", utterance.content)
}

/// Text to print for a resolved turn, if any.
fn render_reconciliation(
    framer: &PromptFramer,
    reconciliation: &Reconciliation,
    error: Option<&str>,
) -> Option<String> {
    match reconciliation {
        Reconciliation::Ignored | Reconciliation::AlreadyShown { .. } => None,
        Reconciliation::Appended {
            reply, persisted, ..
        } => {
            let mut text = format!(
                "\n  {}\n",
                format_utterance(framer, &Utterance::responder(reply.clone()))
            );
            if !*persisted {
                text.push_str(&format!(
                    "  {} This reply could not be saved and will be missing when the chat is reloaded.\n",
                    style("!").yellow().bold()
                ));
            }
            Some(text)
        }
        Reconciliation::Discarded { chat_id } => Some(format!(
            "  {}",
            style(format!(
                "A reply arrived in chat {}. Switch back to read it.",
                short_uuid(chat_id)
            ))
            .dim()
        )),
        Reconciliation::NoReply { .. } => Some(format!(
            "  {}",
            style(format!(
                "{} had nothing to say.",
                framer.display_name(Role::Responder)
            ))
            .dim()
        )),
        Reconciliation::Failed {
            utterance_persisted,
            rolled_back,
            ..
        } => {
            let reason = error.unwrap_or("unknown error");
            let hint = match (*utterance_persisted, *rolled_back) {
                (true, _) => "Your message was saved; send another to continue.",
                (false, true) => "Your message was not sent.",
                (false, false) => "Your message was not saved.",
            };
            Some(format!(
                "  {} {reason}\n  {}",
                style("!").red().bold(),
                style(hint).dim()
            ))
        }
    }
}

fn short_uuid(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}
