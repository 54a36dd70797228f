//! TurnOrchestrator: one user utterance in, at most one model reply out.
//!
//! A turn persists the user's utterance, frames the conversation as a
//! transcript, makes a single non-streaming model call, and persists the
//! reply. The orchestrator holds no per-chat state, so one instance serves
//! every chat concurrently.
//!
//! Failure handling follows the order of side effects:
//! - the user turn cannot be stored: nothing else happens (no model cost)
//! - the model call fails: the user turn stays stored and unanswered
//! - the reply cannot be stored: the reply is still returned, together with
//!   the storage error

use std::fmt;

use parley_types::chat::{Role, Utterance};
use parley_types::config::ModelSettings;
use parley_types::error::{RepositoryError, TurnError};
use parley_types::llm::{CompletionRequest, Message, MessageRole};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use super::title::derive_title;
use crate::chat::repository::ChatRepository;
use crate::llm::box_provider::BoxLlmProvider;
use crate::prompt::framer::PromptFramer;

/// Model parameters for turn requests.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub max_tokens: u32,
}

impl From<&ModelSettings> for TurnSettings {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from(&ModelSettings::default())
    }
}

/// Progress of a single turn, logged at debug level on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    UserTurnPersisted,
    ModelInvoked,
    ReplyParsed,
    NoReply,
    ModelCallFailed,
    AssistantTurnPersisted,
    PersistFailed,
    Done,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::UserTurnPersisted => "user_turn_persisted",
            TurnPhase::ModelInvoked => "model_invoked",
            TurnPhase::ReplyParsed => "reply_parsed",
            TurnPhase::NoReply => "no_reply",
            TurnPhase::ModelCallFailed => "model_call_failed",
            TurnPhase::AssistantTurnPersisted => "assistant_turn_persisted",
            TurnPhase::PersistFailed => "persist_failed",
            TurnPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a turn that got past the model call.
#[derive(Debug)]
pub struct TurnOutcome {
    pub chat_id: Uuid,
    /// Trimmed reply text; `None` when the model produced no text.
    pub reply: Option<String>,
    /// The chat's title, when this turn was the chat's first.
    pub title: Option<String>,
    /// Set when the reply could not be stored. The reply is still valid for
    /// display but will be missing after a reload.
    pub persistence_error: Option<RepositoryError>,
}

impl TurnOutcome {
    pub fn is_partial(&self) -> bool {
        self.persistence_error.is_some()
    }
}

/// Stateless turn executor holding the injected model provider.
pub struct TurnOrchestrator {
    provider: BoxLlmProvider,
    framer: PromptFramer,
    settings: TurnSettings,
}

impl TurnOrchestrator {
    pub fn new(provider: BoxLlmProvider, framer: PromptFramer, settings: TurnSettings) -> Self {
        Self {
            provider,
            framer,
            settings,
        }
    }

    /// Execute one turn against `store`.
    ///
    /// `prior_history` is the conversation view as the caller saw it before
    /// this utterance; it is used for framing as-is and is not reloaded.
    #[tracing::instrument(
        name = "execute_turn",
        skip(self, store, prior_history, utterance),
        fields(chat_id = %chat_id, prior_turns = prior_history.len())
    )]
    pub async fn execute_turn<C: ChatRepository>(
        &self,
        store: &C,
        chat_id: Uuid,
        prior_history: &[Utterance],
        utterance: &str,
    ) -> Result<TurnOutcome, TurnError> {
        phase(TurnPhase::Idle);

        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(TurnError::InvalidInput(
                "utterance must not be empty".to_string(),
            ));
        }

        store
            .append_turn(&chat_id, Role::Initiator, utterance)
            .await?;
        phase(TurnPhase::UserTurnPersisted);

        let mut view = prior_history.to_vec();
        view.push(Utterance::initiator(utterance));
        let request = self.build_request(&view);

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
        );
        phase(TurnPhase::ModelInvoked);
        let response = match self.provider.complete(&request).instrument(span).await {
            Ok(response) => response,
            Err(e) => {
                phase(TurnPhase::ModelCallFailed);
                return Err(TurnError::ModelCall(e));
            }
        };

        let reply = response
            .first_text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        let mut persistence_error = None;
        match &reply {
            Some(text) => {
                phase(TurnPhase::ReplyParsed);
                match store.append_turn(&chat_id, Role::Responder, text).await {
                    Ok(_) => phase(TurnPhase::AssistantTurnPersisted),
                    Err(e) => {
                        phase(TurnPhase::PersistFailed);
                        warn!(error = %e, "Reply produced but not persisted");
                        persistence_error = Some(e);
                    }
                }
            }
            None => {
                phase(TurnPhase::NoReply);
                debug!(
                    blocks = response.content.len(),
                    stop_reason = %response.stop_reason,
                    "Model returned no text"
                );
            }
        }

        let title = if prior_history.is_empty() {
            self.assign_title(store, chat_id, utterance).await
        } else {
            None
        };

        phase(TurnPhase::Done);
        Ok(TurnOutcome {
            chat_id,
            reply,
            title,
            persistence_error,
        })
    }

    /// Build the single model request for a framed view: the transcript as
    /// system text and the responder cue as a trailing assistant message.
    ///
    /// `max_tokens` is capped at the provider's output limit. Stop markers
    /// are only sent to providers that accept stop sequences.
    fn build_request(&self, view: &[Utterance]) -> CompletionRequest {
        let directive = self.framer.frame(view);
        let capabilities = self.provider.capabilities();

        let max_tokens = self.settings.max_tokens.min(capabilities.max_output_tokens);
        if max_tokens < self.settings.max_tokens {
            debug!(
                configured = self.settings.max_tokens,
                limit = capabilities.max_output_tokens,
                "Capping max_tokens at provider limit"
            );
        }

        CompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![Message {
                role: MessageRole::Assistant,
                content: directive.cue,
            }],
            system: Some(directive.text),
            max_tokens,
            stop_sequences: capabilities
                .stop_sequences
                .then_some(directive.stop_markers),
        }
    }

    async fn assign_title<C: ChatRepository>(
        &self,
        store: &C,
        chat_id: Uuid,
        utterance: &str,
    ) -> Option<String> {
        let title = derive_title(utterance)?;
        match store.set_title_if_absent(&chat_id, &title).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to store chat title");
                None
            }
        }
    }
}

fn phase(phase: TurnPhase) {
    debug!(phase = %phase, "Turn phase");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use parley_types::llm::{ContentBlock, LlmError, ProviderCapabilities};

    use super::*;
    use crate::chat::memory::InMemoryChatRepository;
    use crate::test_support::{FlakyChatRepository, MockProvider};

    fn orchestrator(provider: MockProvider) -> TurnOrchestrator {
        TurnOrchestrator::new(
            BoxLlmProvider::new(provider),
            PromptFramer::default(),
            TurnSettings::default(),
        )
    }

    fn contents(turns: &[parley_types::chat::Turn]) -> Vec<(Role, &str)> {
        turns.iter().map(|t| (t.role, t.content.as_str())).collect()
    }

    #[tokio::test]
    async fn test_first_turn_persists_both_sides() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::replying("hi there"));

        let outcome = orch
            .execute_turn(&store, chat.id, &[], "hello")
            .await
            .unwrap();

        assert_eq!(outcome.reply.as_deref(), Some("hi there"));
        assert_eq!(outcome.title.as_deref(), Some("hello"));
        assert!(!outcome.is_partial());

        let history = store.load_history(&chat.id).await.unwrap();
        assert_eq!(
            contents(&history),
            vec![(Role::Initiator, "hello"), (Role::Responder, "hi there")]
        );
    }

    #[tokio::test]
    async fn test_request_shape() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let mock = MockProvider::replying("fine");
        let log = mock.request_log();
        let orch = orchestrator(mock);

        let prior = vec![Utterance::initiator("hello"), Utterance::responder("hi")];
        orch.execute_turn(&store, chat.id, &prior, "how are you?")
            .await
            .unwrap();

        let request = log.lock().unwrap().clone().unwrap();
        let system = request.system.unwrap();
        assert!(system.ends_with("friend 1: hello\nfriend 2: hi\nfriend 1: how are you?\n"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, MessageRole::Assistant);
        assert_eq!(request.messages[0].content, "friend 2:");
        assert_eq!(
            request.stop_sequences.unwrap(),
            vec!["friend 1:".to_string(), "friend 2:".to_string()]
        );
        assert_eq!(request.model, "claude-sonnet-4-20250514");
        assert_eq!(request.max_tokens, 1024);
    }

    #[tokio::test]
    async fn test_request_respects_provider_capabilities() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let mock = MockProvider::replying("fine").with_capabilities(ProviderCapabilities {
            stop_sequences: false,
            max_output_tokens: 256,
        });
        let log = mock.request_log();
        let orch = orchestrator(mock);

        orch.execute_turn(&store, chat.id, &[], "hello").await.unwrap();

        let request = log.lock().unwrap().clone().unwrap();
        assert_eq!(request.max_tokens, 256);
        assert!(request.stop_sequences.is_none());
        assert_eq!(request.messages[0].content, "friend 2:");
    }

    #[tokio::test]
    async fn test_reply_is_trimmed_first_text_block() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::with_blocks(vec![
            ContentBlock::Other,
            ContentBlock::Text {
                text: "  sure thing \n".to_string(),
            },
            ContentBlock::Text {
                text: "ignored".to_string(),
            },
        ]));

        let outcome = orch
            .execute_turn(&store, chat.id, &[], "can you help?")
            .await
            .unwrap();
        assert_eq!(outcome.reply.as_deref(), Some("sure thing"));
    }

    #[tokio::test]
    async fn test_no_text_block_means_no_reply() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::with_blocks(vec![]));

        let outcome = orch
            .execute_turn(&store, chat.id, &[], "hello")
            .await
            .unwrap();
        assert!(outcome.reply.is_none());

        let history = store.load_history(&chat.id).await.unwrap();
        assert_eq!(contents(&history), vec![(Role::Initiator, "hello")]);
    }

    #[tokio::test]
    async fn test_whitespace_reply_means_no_reply() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::replying(" \n "));

        let outcome = orch
            .execute_turn(&store, chat.id, &[], "hello")
            .await
            .unwrap();
        assert!(outcome.reply.is_none());
        assert_eq!(store.load_history(&chat.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_turn_storage_failure_skips_model() {
        let store = FlakyChatRepository::failing_appends_of(Role::Initiator);
        let chat = store.create_chat("alice").await.unwrap();
        let mock = MockProvider::replying("never sent");
        let calls = mock.call_counter();
        let orch = orchestrator(mock);

        let err = orch
            .execute_turn(&store, chat.id, &[], "hello")
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::Storage(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.load_history(&chat.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_chat_is_storage_not_found() {
        let store = InMemoryChatRepository::new();
        let mock = MockProvider::replying("never sent");
        let calls = mock.call_counter();
        let orch = orchestrator(mock);

        let err = orch
            .execute_turn(&store, Uuid::now_v7(), &[], "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Storage(RepositoryError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_utterance_rejected_without_side_effects() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let mock = MockProvider::replying("never sent");
        let calls = mock.call_counter();
        let orch = orchestrator(mock);

        let err = orch
            .execute_turn(&store, chat.id, &[], "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::InvalidInput(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.load_history(&chat.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_leaves_user_turn_unanswered() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::failing(|| LlmError::Provider {
            message: "HTTP 500: internal error".to_string(),
        }));

        let err = orch
            .execute_turn(&store, chat.id, &[], "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::ModelCall(LlmError::Provider { .. })));
        assert!(err.utterance_persisted());

        let history = store.load_history(&chat.id).await.unwrap();
        assert_eq!(contents(&history), vec![(Role::Initiator, "hello")]);
    }

    #[tokio::test]
    async fn test_reply_persist_failure_is_partial_success() {
        let store = FlakyChatRepository::failing_appends_of(Role::Responder);
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::replying("hi there"));

        let outcome = orch
            .execute_turn(&store, chat.id, &[], "hello")
            .await
            .unwrap();

        assert_eq!(outcome.reply.as_deref(), Some("hi there"));
        assert!(outcome.is_partial());
        let history = store.load_history(&chat.id).await.unwrap();
        assert_eq!(contents(&history), vec![(Role::Initiator, "hello")]);
    }

    #[tokio::test]
    async fn test_title_failure_does_not_fail_turn() {
        let store = FlakyChatRepository {
            fail_titles: true,
            ..Default::default()
        };
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::replying("hi there"));

        let outcome = orch
            .execute_turn(&store, chat.id, &[], "hello")
            .await
            .unwrap();
        assert_eq!(outcome.reply.as_deref(), Some("hi there"));
        assert!(outcome.title.is_none());
    }

    #[tokio::test]
    async fn test_later_turns_do_not_retitle() {
        let store = InMemoryChatRepository::new();
        let chat = store.create_chat("alice").await.unwrap();
        let orch = orchestrator(MockProvider::replying("ok"));

        orch.execute_turn(&store, chat.id, &[], "first topic")
            .await
            .unwrap();
        let prior = vec![Utterance::initiator("first topic"), Utterance::responder("ok")];
        let outcome = orch
            .execute_turn(&store, chat.id, &prior, "second topic")
            .await
            .unwrap();

        assert!(outcome.title.is_none());
        let stored = store.get_chat(&chat.id).await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("first topic"));
    }

    #[test]
    fn test_turn_phase_display() {
        assert_eq!(TurnPhase::UserTurnPersisted.to_string(), "user_turn_persisted");
        assert_eq!(TurnPhase::Done.to_string(), "done");
    }
}
