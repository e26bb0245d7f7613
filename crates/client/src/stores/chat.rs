//! Chat session and message store.
//!
//! Holds the cached session list, the current session and its messages.
//! Every backend call is made first; the local state only changes once the
//! call succeeded, through [`ChatState::reduce`].
//!
//! Failures never reach the caller: they are logged, recorded in
//! [`ChatState::error`], and the operation returns `None`, `false` or an empty
//! list.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use fnchat_shared::{
    ApiError, CreateMessageRequest, CreateSessionRequest, FunctionCall, GenerateTitleRequest,
    GeneratedTitle, MessageRecord, MessageType, Session, UpdateSessionRequest,
};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::backend::ChatBackend;
use crate::config::ClientConfig;
use crate::error::StoreError;

/// Longest title derived from a user message, in characters.
pub const MAX_DERIVED_TITLE_CHARS: usize = 50;

const DEFAULT_TITLE_DATE_FORMAT: &str = "%d.%m.%Y";

/// A message as shown in the conversation view.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Backend id, set once the message has been persisted.
    pub id: Option<String>,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Function invocations attached by the UI. Never persisted.
    pub functions: Vec<FunctionCall>,
}

impl ChatMessage {
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            id: None,
            message_type,
            content: content.into(),
            timestamp: Utc::now(),
            functions: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageType::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageType::Assistant, content)
    }
}

impl From<MessageRecord> for ChatMessage {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: Some(record.id),
            message_type: record.message_type,
            content: record.content,
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
            functions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub current_session_id: Option<String>,
    /// Newest first.
    pub sessions: Vec<Session>,
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// The user started a conversation that has no backend session yet.
    pub is_pending_new_chat: bool,
}

/// State transitions of the chat store.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    LoadStarted,
    SessionsLoaded(Vec<Session>),
    SessionCreated(Session),
    NewChatStarted,
    SessionSwitched {
        session_id: String,
        messages: Vec<ChatMessage>,
    },
    SessionUpdated(Session),
    SessionDeleted(String),
    MessageAppended(ChatMessage),
    Failed(String),
    ErrorCleared,
}

impl ChatState {
    /// Apply `action` to the state. Pure; performs no I/O.
    pub fn reduce(mut self, action: ChatAction) -> Self {
        match action {
            ChatAction::LoadStarted => {
                self.is_loading = true;
            }
            ChatAction::SessionsLoaded(sessions) => {
                self.sessions = sessions;
                self.is_loading = false;
                let current_is_stale = self
                    .current_session_id
                    .as_ref()
                    .is_some_and(|id| !self.sessions.iter().any(|s| &s.id == id));
                if current_is_stale {
                    self.current_session_id = None;
                    self.messages.clear();
                }
            }
            ChatAction::SessionCreated(session) => {
                self.current_session_id = Some(session.id.clone());
                self.sessions.insert(0, session);
                self.is_pending_new_chat = false;
            }
            ChatAction::NewChatStarted => {
                self.current_session_id = None;
                self.messages.clear();
                self.is_pending_new_chat = true;
                self.error = None;
            }
            ChatAction::SessionSwitched {
                session_id,
                messages,
            } => {
                // The current id always names a cached session.
                if self.sessions.iter().any(|s| s.id == session_id) {
                    self.current_session_id = Some(session_id);
                    self.messages = messages;
                    self.is_pending_new_chat = false;
                }
            }
            ChatAction::SessionUpdated(updated) => {
                if let Some(slot) = self.sessions.iter_mut().find(|s| s.id == updated.id) {
                    *slot = updated;
                }
            }
            ChatAction::SessionDeleted(session_id) => {
                self.sessions.retain(|s| s.id != session_id);
                if self.current_session_id.as_deref() == Some(session_id.as_str()) {
                    self.current_session_id = None;
                    self.messages.clear();
                    self.is_pending_new_chat = false;
                }
            }
            ChatAction::MessageAppended(message) => {
                self.messages.push(message);
            }
            ChatAction::Failed(message) => {
                self.is_loading = false;
                self.error = Some(message);
            }
            ChatAction::ErrorCleared => {
                self.error = None;
            }
        }
        self
    }

    /// The cached session matching `current_session_id`.
    pub fn current_session(&self) -> Option<&Session> {
        let id = self.current_session_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }
}

/// Derive a session title from the first user message: at most
/// [`MAX_DERIVED_TITLE_CHARS`] characters, with `...` appended when cut.
pub fn session_title_from_message(text: &str) -> String {
    match text.char_indices().nth(MAX_DERIVED_TITLE_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Title for the session created on first start, e.g. `Chat 05.03.2024`.
/// Falls back to the day-month-year format if `format` is not a valid
/// `chrono` format string.
pub fn default_session_title(date: NaiveDate, format: &str) -> String {
    let mut rendered = String::new();
    if write!(rendered, "{}", date.format(format)).is_err() {
        rendered = date.format(DEFAULT_TITLE_DATE_FORMAT).to_string();
    }
    format!("Chat {rendered}")
}

/// Store for chat sessions and the messages of the current session.
pub struct ChatStore {
    backend: Arc<dyn ChatBackend>,
    state: watch::Sender<ChatState>,
    title_date_format: String,
}

impl ChatStore {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            state: watch::Sender::new(ChatState::default()),
            title_date_format: DEFAULT_TITLE_DATE_FORMAT.to_string(),
        }
    }

    pub fn from_config(backend: Arc<dyn ChatBackend>, config: &ClientConfig) -> Self {
        let mut store = Self::new(backend);
        store.title_date_format = config.session_title_date_format.clone();
        store
    }

    /// Copy of the latest state.
    pub fn snapshot(&self) -> ChatState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    fn dispatch(&self, action: ChatAction) {
        self.state.send_modify(|state| {
            let previous = std::mem::take(state);
            *state = previous.reduce(action);
        });
    }

    fn fail(&self, err: &ApiError, fallback: &str) {
        error!("{}: {}", fallback, err);
        self.dispatch(ChatAction::Failed(err.user_message(fallback)));
    }

    // --- Sessions ---

    /// Fetch all sessions and replace the cached list.
    pub async fn load_sessions(&self) -> Vec<Session> {
        self.dispatch(ChatAction::LoadStarted);
        match self.backend.list_sessions().await {
            Ok(sessions) => {
                debug!("Loaded {} chat sessions", sessions.len());
                self.dispatch(ChatAction::SessionsLoaded(sessions.clone()));
                sessions
            }
            Err(e) => {
                self.fail(&e, "Failed to load sessions");
                Vec::new()
            }
        }
    }

    /// Create a session and make it the current one.
    pub async fn create_session(&self, title: &str, description: Option<&str>) -> Option<Session> {
        let req = CreateSessionRequest {
            title: title.to_string(),
            description: description.map(str::to_string),
        };
        match self.backend.create_session(&req).await {
            Ok(session) => {
                info!("Created chat session {}", session.id);
                self.dispatch(ChatAction::SessionCreated(session.clone()));
                Some(session)
            }
            Err(e) => {
                self.fail(&e, "Failed to create session");
                None
            }
        }
    }

    /// Show an empty conversation without creating a backend session yet.
    pub fn start_new_chat(&self) {
        self.dispatch(ChatAction::NewChatStarted);
    }

    /// Create the session for a pending new chat once the first exchange has
    /// completed: persist both messages, then try to replace the derived
    /// title with a generated one.
    pub async fn create_session_after_response(
        &self,
        user_text: &str,
        assistant_text: &str,
    ) -> Option<Session> {
        let title = session_title_from_message(user_text);
        let session = self.create_session(&title, None).await?;

        self.save_message(&ChatMessage::user(user_text)).await;
        self.save_message(&ChatMessage::assistant(assistant_text))
            .await;

        let req = GenerateTitleRequest {
            message: user_text.to_string(),
        };
        match self.backend.generate_title(&session.id, &req).await {
            Ok(GeneratedTitle {
                success: true,
                title: Some(generated),
                ..
            }) => {
                self.update_session_title(&session.id, &generated).await;
            }
            Ok(declined) => {
                debug!(
                    "No generated title for session {}: {:?}",
                    session.id, declined.error
                );
            }
            Err(e) => {
                error!("Failed to generate title: {}", e);
            }
        }

        Some(session)
    }

    /// Load the history of `session_id` and make it the current session.
    /// Sessions missing from the cached list are refused without a request.
    pub async fn switch_session(&self, session_id: &str) -> bool {
        let known = self
            .state
            .borrow()
            .sessions
            .iter()
            .any(|s| s.id == session_id);
        if !known {
            let err = StoreError::SessionNotFound(session_id.to_string());
            error!("Failed to switch session: {}", err);
            self.dispatch(ChatAction::Failed(err.to_string()));
            return false;
        }

        match self.backend.list_messages(session_id).await {
            Ok(records) => {
                let messages = records.into_iter().map(ChatMessage::from).collect();
                self.dispatch(ChatAction::SessionSwitched {
                    session_id: session_id.to_string(),
                    messages,
                });
                true
            }
            Err(e) => {
                self.fail(&e, "Failed to load session messages");
                false
            }
        }
    }

    pub async fn update_session_title(&self, session_id: &str, title: &str) -> Option<Session> {
        let req = UpdateSessionRequest {
            title: title.to_string(),
        };
        match self.backend.update_session(session_id, &req).await {
            Ok(session) => {
                self.dispatch(ChatAction::SessionUpdated(session.clone()));
                Some(session)
            }
            Err(e) => {
                self.fail(&e, "Failed to update session title");
                None
            }
        }
    }

    /// Delete a session. Deleting the current session also clears the
    /// conversation view.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        match self.backend.delete_session(session_id).await {
            Ok(()) => {
                info!("Deleted chat session {}", session_id);
                self.dispatch(ChatAction::SessionDeleted(session_id.to_string()));
                true
            }
            Err(e) => {
                self.fail(&e, "Failed to delete session");
                false
            }
        }
    }

    // --- Messages ---

    /// Persist `message` in the current session.
    ///
    /// Does not add the message to [`ChatState::messages`]; use
    /// [`ChatStore::append_message`] for that.
    pub async fn save_message(&self, message: &ChatMessage) -> Option<MessageRecord> {
        let current = self.state.borrow().current_session_id.clone();
        let Some(session_id) = current else {
            let err = StoreError::NoActiveSession;
            error!("{}", err);
            self.dispatch(ChatAction::Failed(err.to_string()));
            return None;
        };

        let req = CreateMessageRequest {
            content: message.content.clone(),
            message_type: message.message_type,
        };
        match self.backend.create_message(&session_id, &req).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                self.fail(&e, "Failed to save message");
                None
            }
        }
    }

    /// Add a message to the conversation view.
    pub fn append_message(&self, message: ChatMessage) {
        self.dispatch(ChatAction::MessageAppended(message));
    }

    // --- Queries ---

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().current_session().cloned()
    }

    /// True while the conversation view holds no messages.
    pub fn is_first_message(&self) -> bool {
        self.state.borrow().messages.is_empty()
    }

    // --- Startup ---

    /// Open the most recent session, or create a dated one if there are none.
    pub async fn initialize_chat(&self) {
        let sessions = self.load_sessions().await;
        match sessions.first() {
            Some(latest) => {
                self.switch_session(&latest.id).await;
            }
            None => {
                let title =
                    default_session_title(Local::now().date_naive(), &self.title_date_format);
                self.create_session(&title, None).await;
            }
        }
    }

    pub fn clear_error(&self) {
        self.dispatch(ChatAction::ErrorCleared);
    }
}
