use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use core_types::{DEFAULT_MAX_CHUNKS, KnowledgeApi, Message, MessageId, MessageKind, QueryRequest};
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::ClientError;

pub type SessionId = Uuid;

/// Retrieval knobs sent with every question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub max_chunks: usize,
    pub include_metadata: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_chunks: DEFAULT_MAX_CHUNKS,
            include_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionRequestState {
    #[default]
    Idle,
    Awaiting,
}

/// Snapshot of the conversation.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    pub messages: Vec<Message>,
    pub request: SessionRequestState,
    generation: u64,
}

impl ChatLog {
    pub fn is_awaiting(&self) -> bool {
        self.request == SessionRequestState::Awaiting
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was appended.
    Empty,
    /// A previous question is still awaiting its answer; nothing was appended.
    Busy,
    Answered(Message),
    Failed(Message),
    /// The log was cleared while the question was in flight, so its answer was dropped.
    Discarded,
}

/// Ordered message log plus the single-flight question lifecycle.
///
/// `Idle --submit--> Awaiting --(answer | error)--> Idle`. Each accepted submission
/// appends the user's message immediately and exactly one derived message (assistant or
/// error) when the backend call resolves. `clear` starts a new generation; answers that
/// belong to an older generation are dropped instead of landing in the fresh log.
pub struct ChatSession {
    id: SessionId,
    api: Arc<dyn KnowledgeApi>,
    options: QueryOptions,
    next_message_id: AtomicU64,
    log: watch::Sender<ChatLog>,
}

impl ChatSession {
    pub fn new(api: Arc<dyn KnowledgeApi>) -> Self {
        Self {
            id: SessionId::new_v4(),
            api,
            options: QueryOptions::default(),
            next_message_id: AtomicU64::new(0),
            log: watch::Sender::new(ChatLog::default()),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = QueryOptions {
            max_chunks: options.max_chunks.max(1),
            ..options
        };
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatLog> {
        self.log.subscribe()
    }

    pub fn snapshot(&self) -> ChatLog {
        self.log.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.log.borrow().messages.clone()
    }

    pub fn request_state(&self) -> SessionRequestState {
        self.log.borrow().request
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Empty;
        }

        let mut issued = None;
        self.log.send_if_modified(|log| {
            if log.is_awaiting() {
                return false;
            }
            log.messages.push(Message::user(self.next_id(), text));
            log.request = SessionRequestState::Awaiting;
            issued = Some(log.generation);
            true
        });
        let Some(generation) = issued else {
            debug!(session = %self.id, "question ignored while another is awaiting an answer");
            return SubmitOutcome::Busy;
        };

        info!(session = %self.id, generation, "question submitted");
        let mut request = QueryRequest::new(text).with_max_chunks(self.options.max_chunks);
        request.include_metadata = self.options.include_metadata;
        let result = self.api.query(request).await;
        if let Err(err) = &result {
            let err = ClientError::Query(err.clone());
            error!(session = %self.id, error = %err, "question failed");
        }

        let mut appended = None;
        self.log.send_if_modified(|log| {
            if log.generation != generation {
                return false;
            }
            let message = match result {
                Ok(answer) => Message::assistant(self.next_id(), answer),
                Err(err) => Message::error(self.next_id(), &err),
            };
            log.messages.push(message.clone());
            log.request = SessionRequestState::Idle;
            appended = Some(message);
            true
        });

        match appended {
            Some(message) if message.kind == MessageKind::Error => SubmitOutcome::Failed(message),
            Some(message) => {
                debug!(
                    session = %self.id,
                    sources = message.sources.len(),
                    latency = message.latency_seconds,
                    "answer received"
                );
                SubmitOutcome::Answered(message)
            }
            None => {
                debug!(session = %self.id, generation, "dropping answer for a cleared log");
                SubmitOutcome::Discarded
            }
        }
    }

    pub fn clear(&self) {
        self.log.send_modify(|log| {
            log.messages = Vec::new();
            log.request = SessionRequestState::Idle;
            log.generation += 1;
        });
        info!(session = %self.id, "chat cleared");
    }

    fn next_id(&self) -> MessageId {
        self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}
