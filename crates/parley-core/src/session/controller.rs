//! SessionController: the client side of a conversation.
//!
//! Keeps the optimistic view of the selected chat consistent with what the
//! server stores, while at most one request is outstanding. The controller
//! performs no I/O; callers execute the returned actions and feed the
//! results back in with the ticket they were issued.
//!
//! A reply is only shown if its chat is still selected when the reply
//! arrives. Switching chats never cancels the outstanding request; its
//! result is simply not shown, and the reply appears the next time that
//! chat's history is loaded.

use parley_types::chat::{Role, Turn, Utterance};
use parley_types::error::{RepositoryError, TurnError};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::turn::orchestrator::TurnOutcome;

/// Identifies one issued request. Results carrying an older ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTicket(u64);

/// A turn to send to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub ticket: RequestTicket,
    pub chat_id: Uuid,
    /// The view as it was before the new utterance was appended.
    pub prior_history: Vec<Utterance>,
    pub utterance: String,
}

/// What the caller must do after a successful submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAction {
    /// No chat is selected: create one, then report via
    /// [`SessionController::chat_created`].
    CreateChat { ticket: RequestTicket },
    /// Send the turn, then report via [`SessionController::turn_resolved`].
    SendTurn(TurnRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("nothing to send")]
    EmptyInput,
    #[error("still waiting for the previous reply")]
    RequestInFlight,
}

/// Result of reporting a chat creation.
#[derive(Debug)]
pub enum ChatCreated {
    /// The ticket was not the outstanding request.
    Ignored,
    /// Send the new chat's first turn. The chat is selected unless another
    /// chat was selected while it was being created.
    SendTurn(TurnRequest),
    /// Creation failed and the parked utterance was dropped.
    Failed(RepositoryError),
}

/// How a resolved turn changed the view.
#[derive(Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// The ticket was not the outstanding request.
    Ignored,
    /// The reply was appended to the view. `persisted` is false when the
    /// server could not store it.
    Appended {
        chat_id: Uuid,
        reply: String,
        persisted: bool,
    },
    /// Another chat is selected now; the reply was not shown.
    Discarded { chat_id: Uuid },
    /// The chat was reloaded after the reply was stored, so the view
    /// already ends with it.
    AlreadyShown { chat_id: Uuid },
    /// The model produced no text.
    NoReply { chat_id: Uuid },
    /// The turn failed. `utterance_persisted` says whether the server stored
    /// the utterance before failing; `rolled_back` is true when the
    /// optimistic utterance was removed from the view.
    Failed {
        chat_id: Uuid,
        utterance_persisted: bool,
        rolled_back: bool,
    },
}

#[derive(Debug, Clone)]
enum PendingRequest {
    CreatingChat {
        ticket: RequestTicket,
        utterance: String,
    },
    Turn {
        ticket: RequestTicket,
        chat_id: Uuid,
        /// Position of the optimistic utterance in the view, if one was shown.
        view_index: Option<usize>,
        utterance: String,
    },
}

/// Client-side conversation state machine.
#[derive(Debug, Default)]
pub struct SessionController {
    selected: Option<Uuid>,
    view: Vec<Utterance>,
    pending: Option<PendingRequest>,
    next_ticket: u64,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_chat(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn view(&self) -> &[Utterance] {
        &self.view
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Submit user input.
    ///
    /// With a chat selected the utterance is appended to the view before the
    /// request is issued.
    pub fn submit(&mut self, input: &str) -> Result<SubmitAction, SubmitRejected> {
        let utterance = input.trim();
        if utterance.is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }
        if self.pending.is_some() {
            return Err(SubmitRejected::RequestInFlight);
        }

        let ticket = self.issue_ticket();
        match self.selected {
            None => {
                self.pending = Some(PendingRequest::CreatingChat {
                    ticket,
                    utterance: utterance.to_string(),
                });
                Ok(SubmitAction::CreateChat { ticket })
            }
            Some(chat_id) => Ok(SubmitAction::SendTurn(
                self.begin_turn(ticket, chat_id, utterance.to_string()),
            )),
        }
    }

    /// Report the result of a `CreateChat` action.
    pub fn chat_created(
        &mut self,
        ticket: RequestTicket,
        result: Result<Uuid, RepositoryError>,
    ) -> ChatCreated {
        let utterance = match &self.pending {
            Some(PendingRequest::CreatingChat {
                ticket: pending,
                utterance,
            }) if *pending == ticket => utterance.clone(),
            _ => {
                debug!(?ticket, "Ignoring stale chat creation");
                return ChatCreated::Ignored;
            }
        };

        match result {
            Ok(chat_id) => {
                let ticket = self.issue_ticket();
                if self.selected.is_none() {
                    self.selected = Some(chat_id);
                    self.view.clear();
                    return ChatCreated::SendTurn(self.begin_turn(ticket, chat_id, utterance));
                }

                // The user moved to another chat meanwhile. Still store the
                // utterance in the new chat, without touching the view.
                debug!(%chat_id, "Chat created after navigating away");
                self.pending = Some(PendingRequest::Turn {
                    ticket,
                    chat_id,
                    view_index: None,
                    utterance: utterance.clone(),
                });
                ChatCreated::SendTurn(TurnRequest {
                    ticket,
                    chat_id,
                    prior_history: Vec::new(),
                    utterance,
                })
            }
            Err(e) => {
                self.pending = None;
                ChatCreated::Failed(e)
            }
        }
    }

    /// Report the result of a `SendTurn` action.
    pub fn turn_resolved(
        &mut self,
        ticket: RequestTicket,
        result: Result<TurnOutcome, TurnError>,
    ) -> Reconciliation {
        let (chat_id, view_index, utterance) = match self.pending.take() {
            Some(PendingRequest::Turn {
                ticket: pending,
                chat_id,
                view_index,
                utterance,
            }) if pending == ticket => (chat_id, view_index, utterance),
            other => {
                self.pending = other;
                debug!(?ticket, "Ignoring stale turn result");
                return Reconciliation::Ignored;
            }
        };

        let still_selected = self.selected == Some(chat_id);
        match result {
            Ok(outcome) => match outcome.reply {
                None => Reconciliation::NoReply { chat_id },
                Some(_) if !still_selected => Reconciliation::Discarded { chat_id },
                Some(reply) if self.view_ends_with_reply(&reply) => {
                    Reconciliation::AlreadyShown { chat_id }
                }
                Some(reply) => {
                    self.view.push(Utterance::responder(reply.clone()));
                    Reconciliation::Appended {
                        chat_id,
                        reply,
                        persisted: outcome.persistence_error.is_none(),
                    }
                }
            },
            Err(e) => {
                let utterance_persisted = e.utterance_persisted();
                let rolled_back = still_selected
                    && !utterance_persisted
                    && view_index.is_some_and(|index| self.roll_back(index, &utterance));
                Reconciliation::Failed {
                    chat_id,
                    utterance_persisted,
                    rolled_back,
                }
            }
        }
    }

    /// Select a chat, replacing the view with its stored history.
    ///
    /// An outstanding request keeps running; its result will not be shown
    /// unless this same chat is selected again by then.
    pub fn select_chat(&mut self, chat_id: Uuid, history: &[Turn]) {
        self.selected = Some(chat_id);
        self.view = history.iter().map(Utterance::from).collect();
    }

    /// Return to the "no chat selected" state.
    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.view.clear();
    }

    /// A chat was deleted. Clears the selection if it was the selected one.
    pub fn chat_deleted(&mut self, chat_id: Uuid) {
        if self.selected == Some(chat_id) {
            self.clear_selection();
        }
    }

    fn issue_ticket(&mut self) -> RequestTicket {
        self.next_ticket += 1;
        RequestTicket(self.next_ticket)
    }

    fn begin_turn(&mut self, ticket: RequestTicket, chat_id: Uuid, utterance: String) -> TurnRequest {
        let prior_history = self.view.clone();
        let view_index = self.view.len();
        self.view.push(Utterance::initiator(utterance.clone()));
        self.pending = Some(PendingRequest::Turn {
            ticket,
            chat_id,
            view_index: Some(view_index),
            utterance: utterance.clone(),
        });
        TurnRequest {
            ticket,
            chat_id,
            prior_history,
            utterance,
        }
    }

    /// Whether the view already ends with this reply, which happens when the
    /// chat was reloaded after the reply was stored.
    fn view_ends_with_reply(&self, reply: &str) -> bool {
        self.view
            .last()
            .is_some_and(|u| u.role == Role::Responder && u.content == reply)
    }

    /// Remove the optimistic utterance at `index` if the view still ends
    /// with it.
    fn roll_back(&mut self, index: usize, utterance: &str) -> bool {
        let is_last = index + 1 == self.view.len();
        let matches = self
            .view
            .get(index)
            .is_some_and(|u| u.role == Role::Initiator && u.content == utterance);
        if is_last && matches {
            self.view.pop();
            true
        } else {
            false
        }
    }
}
