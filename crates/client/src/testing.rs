//! In-memory backends for store tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fnchat_shared::{
    ApiError, CatalogFunction, CreateMessageRequest, CreateSessionRequest, FunctionPatch,
    GenerateTitleRequest, GeneratedTitle, MessageRecord, MessageType, NewFunction, Session,
    UpdateSessionRequest,
};
use serde_json::{json, Map, Value};

use crate::backend::{ChatBackend, FunctionBackend};

pub fn session(id: &str, title: &str) -> Session {
    Session {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        created_at: None,
        updated_at: None,
        is_active: true,
        metadata: None,
        message_count: 0,
    }
}

pub fn function(id: &str, category: &str) -> CatalogFunction {
    let mut extra = Map::new();
    extra.insert("name".into(), Value::String(format!("{id}-name")));
    CatalogFunction {
        id: id.to_string(),
        category: category.to_string(),
        is_enabled: true,
        extra,
    }
}

fn server_error() -> ApiError {
    ApiError::Http {
        status: 500,
        body: "Internal Server Error".into(),
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Http {
        status: 404,
        body: json!({ "detail": format!("{what} not found") }).to_string(),
    }
}

#[derive(Default)]
struct ChatData {
    sessions: Vec<Session>,
    messages: HashMap<String, Vec<MessageRecord>>,
    next_id: u32,
    calls: Vec<String>,
    failing: HashMap<&'static str, ApiError>,
    generated_title: Option<GeneratedTitle>,
}

/// Session/message backend keeping everything in memory. Ids are handed out
/// as `"1"`, `"2"`, ...
#[derive(Default)]
pub struct FakeChatBackend {
    data: Mutex<ChatData>,
}

impl FakeChatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        let backend = Self::new();
        backend.data.lock().unwrap().sessions = sessions;
        backend
    }

    /// Make `op` answer with a 500 and an opaque body.
    pub fn fail(&self, op: &'static str) {
        self.fail_with(op, server_error());
    }

    pub fn fail_with(&self, op: &'static str, err: ApiError) {
        self.data.lock().unwrap().failing.insert(op, err);
    }

    pub fn set_generated_title(&self, title: GeneratedTitle) {
        self.data.lock().unwrap().generated_title = Some(title);
    }

    pub fn push_message(&self, session_id: &str, message_type: MessageType, content: &str) {
        let mut data = self.data.lock().unwrap();
        data.next_id += 1;
        let record = MessageRecord {
            id: format!("m{}", data.next_id),
            session_id: Some(session_id.to_string()),
            message_type,
            content: content.to_string(),
            timestamp: None,
            metadata: None,
        };
        data.messages
            .entry(session_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn messages_for(&self, session_id: &str) -> Vec<MessageRecord> {
        self.data
            .lock()
            .unwrap()
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Names of the backend operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.data.lock().unwrap().calls.clone()
    }

    fn enter(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, ChatData>, ApiError> {
        let mut data = self.data.lock().unwrap();
        data.calls.push(op.to_string());
        if let Some(err) = data.failing.get(op).cloned() {
            return Err(err);
        }
        Ok(data)
    }
}

#[async_trait]
impl ChatBackend for FakeChatBackend {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        Ok(self.enter("list_sessions")?.sessions.clone())
    }

    async fn create_session(&self, req: &CreateSessionRequest) -> Result<Session, ApiError> {
        let mut data = self.enter("create_session")?;
        data.next_id += 1;
        let mut created = session(&data.next_id.to_string(), &req.title);
        created.description = req.description.clone();
        data.sessions.insert(0, created.clone());
        Ok(created)
    }

    async fn update_session(
        &self,
        session_id: &str,
        req: &UpdateSessionRequest,
    ) -> Result<Session, ApiError> {
        let mut data = self.enter("update_session")?;
        let found = data
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| not_found("Chat session"))?;
        found.title = req.title.clone();
        Ok(found.clone())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        let mut data = self.enter("delete_session")?;
        let before = data.sessions.len();
        data.sessions.retain(|s| s.id != session_id);
        if data.sessions.len() == before {
            return Err(not_found("Chat session"));
        }
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, ApiError> {
        let data = self.enter("list_messages")?;
        Ok(data.messages.get(session_id).cloned().unwrap_or_default())
    }

    async fn create_message(
        &self,
        session_id: &str,
        req: &CreateMessageRequest,
    ) -> Result<MessageRecord, ApiError> {
        let mut data = self.enter("create_message")?;
        data.next_id += 1;
        let record = MessageRecord {
            id: format!("m{}", data.next_id),
            session_id: Some(session_id.to_string()),
            message_type: req.message_type,
            content: req.content.clone(),
            timestamp: Some(chrono::Utc::now()),
            metadata: None,
        };
        data.messages
            .entry(session_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn generate_title(
        &self,
        _session_id: &str,
        req: &GenerateTitleRequest,
    ) -> Result<GeneratedTitle, ApiError> {
        let data = self.enter("generate_title")?;
        Ok(data.generated_title.clone().unwrap_or_else(|| GeneratedTitle {
            success: false,
            title: Some(format!("Chat {}", req.message)),
            error: Some("title generation disabled".into()),
        }))
    }
}

#[derive(Default)]
struct FunctionData {
    functions: Vec<CatalogFunction>,
    next_id: u32,
    calls: Vec<String>,
    failing: HashMap<&'static str, ApiError>,
}

/// Function catalog backend keeping everything in memory. New functions get
/// ids `"fn-1"`, `"fn-2"`, ...
#[derive(Default)]
pub struct FakeFunctionBackend {
    data: Mutex<FunctionData>,
}

impl FakeFunctionBackend {
    pub fn with_functions(functions: Vec<CatalogFunction>) -> Self {
        let backend = Self::default();
        backend.data.lock().unwrap().functions = functions;
        backend
    }

    pub fn fail(&self, op: &'static str) {
        self.fail_with(op, server_error());
    }

    pub fn fail_with(&self, op: &'static str, err: ApiError) {
        self.data.lock().unwrap().failing.insert(op, err);
    }

    pub fn succeed(&self, op: &'static str) {
        self.data.lock().unwrap().failing.remove(op);
    }

    /// Change the catalog behind the store's back.
    pub fn remove_remotely(&self, function_id: &str) {
        self.data
            .lock()
            .unwrap()
            .functions
            .retain(|f| f.id != function_id);
    }

    pub fn calls(&self) -> Vec<String> {
        self.data.lock().unwrap().calls.clone()
    }

    fn enter(
        &self,
        op: &'static str,
    ) -> Result<std::sync::MutexGuard<'_, FunctionData>, ApiError> {
        let mut data = self.data.lock().unwrap();
        data.calls.push(op.to_string());
        if let Some(err) = data.failing.get(op).cloned() {
            return Err(err);
        }
        Ok(data)
    }
}

#[async_trait]
impl FunctionBackend for FakeFunctionBackend {
    async fn list_functions(&self) -> Result<Vec<CatalogFunction>, ApiError> {
        Ok(self.enter("list_functions")?.functions.clone())
    }

    async fn create_function(&self, req: &NewFunction) -> Result<CatalogFunction, ApiError> {
        let mut data = self.enter("create_function")?;
        data.next_id += 1;
        let mut created = function(&format!("fn-{}", data.next_id), &req.category);
        created
            .extra
            .insert("name".into(), Value::String(req.name.clone()));
        data.functions.insert(0, created.clone());
        Ok(created)
    }

    async fn update_function(
        &self,
        function_id: &str,
        patch: &FunctionPatch,
    ) -> Result<CatalogFunction, ApiError> {
        let mut data = self.enter("update_function")?;
        let found = data
            .functions
            .iter_mut()
            .find(|f| f.id == function_id)
            .ok_or_else(|| not_found("Function"))?;
        if let Some(category) = &patch.category {
            found.category = category.clone();
        }
        if let Some(is_enabled) = patch.is_enabled {
            found.is_enabled = is_enabled;
        }
        if let Some(name) = &patch.name {
            found.extra.insert("name".into(), Value::String(name.clone()));
        }
        Ok(found.clone())
    }

    async fn delete_function(&self, function_id: &str) -> Result<(), ApiError> {
        let mut data = self.enter("delete_function")?;
        let before = data.functions.len();
        data.functions.retain(|f| f.id != function_id);
        if data.functions.len() == before {
            return Err(not_found("Function"));
        }
        Ok(())
    }
}
