//! HTTP API client for the chat backend.

use fnchat_shared::{
    ApiError, CatalogFunction, CreateMessageRequest, CreateSessionRequest, FunctionPatch,
    GenerateTitleRequest, GeneratedTitle, MessageRecord, NewFunction, Session,
    UpdateSessionRequest,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{ClientConfig, DEFAULT_BASE_URL};

/// HTTP client for JSON requests against the chat backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the local development backend
    /// ([`DEFAULT_BASE_URL`]).
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create a client for the base URL in `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new().with_base_url(config.base_url.clone())
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Send a request and return the body of a 2xx answer.
    async fn send(&self, rb: RequestBuilder) -> Result<String, ApiError> {
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        Ok(text)
    }

    fn decode<TRes: DeserializeOwned>(text: &str) -> Result<TRes, ApiError> {
        let text = if text.is_empty() { "null" } else { text };
        serde_json::from_str(text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    fn with_json<TReq: Serialize>(rb: RequestBuilder, body: &TReq) -> Result<RequestBuilder, ApiError> {
        let body_bytes =
            serde_json::to_vec(body).map_err(|e| ApiError::Deserialize(e.to_string()))?;
        Ok(rb
            .body(body_bytes)
            .header("Content-Type", "application/json"))
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let rb = self.client.get(self.url(path));
        let text = self.send(rb).await?;
        Self::decode(&text)
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = Self::with_json(self.client.post(self.url(path)), body)?;
        let text = self.send(rb).await?;
        Self::decode(&text)
    }

    /// Make a PUT request with JSON body
    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = Self::with_json(self.client.put(self.url(path)), body)?;
        let text = self.send(rb).await?;
        Self::decode(&text)
    }

    /// Make a DELETE request. Any 2xx answer counts as success; the body is
    /// ignored.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let rb = self.client.delete(self.url(path));
        self.send(rb).await.map(|_| ())
    }

    // --- Chat session API methods ---

    /// List all sessions, newest first
    pub async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.get_json("/api/chat/sessions").await
    }

    /// Create a session
    pub async fn create_session(&self, req: &CreateSessionRequest) -> Result<Session, ApiError> {
        self.post_json("/api/chat/sessions", req).await
    }

    /// Update a session's title
    pub async fn update_session(
        &self,
        session_id: &str,
        req: &UpdateSessionRequest,
    ) -> Result<Session, ApiError> {
        self.put_json(&session_path(session_id), req).await
    }

    /// Delete a session
    pub async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.delete(&session_path(session_id)).await
    }

    /// Message history of a session, oldest first
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, ApiError> {
        self.get_json(&format!("{}/messages", session_path(session_id)))
            .await
    }

    /// Persist a message in a session
    pub async fn create_message(
        &self,
        session_id: &str,
        req: &CreateMessageRequest,
    ) -> Result<MessageRecord, ApiError> {
        self.post_json(&format!("{}/messages", session_path(session_id)), req)
            .await
    }

    /// Ask the backend to generate a title from the first user message
    pub async fn generate_title(
        &self,
        session_id: &str,
        req: &GenerateTitleRequest,
    ) -> Result<GeneratedTitle, ApiError> {
        self.post_json(&format!("{}/generate-title", session_path(session_id)), req)
            .await
    }

    // --- Function catalog API methods ---

    /// List the function catalog
    pub async fn list_functions(&self) -> Result<Vec<CatalogFunction>, ApiError> {
        self.get_json("/api/functions/").await
    }

    /// Create a catalog function
    pub async fn create_function(&self, req: &NewFunction) -> Result<CatalogFunction, ApiError> {
        self.post_json("/api/functions/", req).await
    }

    /// Apply a partial update to a catalog function
    pub async fn update_function(
        &self,
        function_id: &str,
        patch: &FunctionPatch,
    ) -> Result<CatalogFunction, ApiError> {
        self.put_json(&function_path(function_id), patch).await
    }

    /// Delete a catalog function
    pub async fn delete_function(&self, function_id: &str) -> Result<(), ApiError> {
        self.delete(&function_path(function_id)).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn session_path(session_id: &str) -> String {
    format!("/api/chat/sessions/{}", urlencoding::encode(session_id))
}

fn function_path(function_id: &str) -> String {
    format!("/api/functions/{}", urlencoding::encode(function_id))
}
