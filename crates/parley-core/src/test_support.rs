//! Test doubles for the orchestrator, service, and controller tests.
//!
//! Also exported behind the `test-support` feature so downstream crates can
//! drive a chat service without a real model.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use parley_types::chat::{Chat, Role, Turn};
use parley_types::error::RepositoryError;
use parley_types::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, ProviderCapabilities,
    StopReason, Usage,
};
use uuid::Uuid;

use crate::chat::memory::InMemoryChatRepository;
use crate::chat::repository::ChatRepository;
use crate::llm::provider::LlmProvider;

#[derive(Clone)]
enum MockOutcome {
    Blocks(Vec<ContentBlock>),
    Fail(fn() -> LlmError),
}

/// Provider returning a fixed response, counting calls and keeping the last
/// request it saw.
pub struct MockProvider {
    capabilities: ProviderCapabilities,
    outcome: MockOutcome,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl MockProvider {
    fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            capabilities: ProviderCapabilities {
                stop_sequences: true,
                max_output_tokens: 8_192,
            },
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with_outcome(MockOutcome::Blocks(vec![ContentBlock::Text {
            text: text.to_string(),
        }]))
    }

    pub fn with_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::with_outcome(MockOutcome::Blocks(blocks))
    }

    pub fn failing(error: fn() -> LlmError) -> Self {
        Self::with_outcome(MockOutcome::Fail(error))
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn request_log(&self) -> Arc<Mutex<Option<CompletionRequest>>> {
        Arc::clone(&self.last_request)
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        let outcome = self.outcome.clone();
        let model = request.model.clone();
        async move {
            match outcome {
                MockOutcome::Blocks(content) => Ok(CompletionResponse {
                    id: "msg_mock".to_string(),
                    content,
                    model,
                    stop_reason: StopReason::StopSequence,
                    usage: Usage {
                        input_tokens: 10,
                        output_tokens: 5,
                        ..Default::default()
                    },
                }),
                MockOutcome::Fail(make_error) => Err(make_error()),
            }
        }
    }
}

/// In-memory repository that can be told to fail specific writes.
#[derive(Default)]
pub struct FlakyChatRepository {
    pub inner: InMemoryChatRepository,
    /// Appends of this role fail with a query error.
    pub fail_append_role: Option<Role>,
    pub fail_titles: bool,
}

impl FlakyChatRepository {
    pub fn failing_appends_of(role: Role) -> Self {
        Self {
            fail_append_role: Some(role),
            ..Default::default()
        }
    }
}

impl ChatRepository for FlakyChatRepository {
    async fn create_chat(&self, owner_id: &str) -> Result<Chat, RepositoryError> {
        self.inner.create_chat(owner_id).await
    }

    async fn list_chats(&self, owner_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        self.inner.list_chats(owner_id).await
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        self.inner.get_chat(chat_id).await
    }

    async fn load_history(&self, chat_id: &Uuid) -> Result<Vec<Turn>, RepositoryError> {
        self.inner.load_history(chat_id).await
    }

    async fn append_turn(
        &self,
        chat_id: &Uuid,
        role: Role,
        content: &str,
    ) -> Result<Turn, RepositoryError> {
        if self.fail_append_role == Some(role) {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        self.inner.append_turn(chat_id, role, content).await
    }

    async fn set_title_if_absent(
        &self,
        chat_id: &Uuid,
        title: &str,
    ) -> Result<Option<String>, RepositoryError> {
        if self.fail_titles {
            return Err(RepositoryError::Query("database is locked".to_string()));
        }
        self.inner.set_title_if_absent(chat_id, title).await
    }

    async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        self.inner.delete_chat(chat_id).await
    }
}
