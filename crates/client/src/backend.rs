//! Backend seams used by the stores.
//!
//! [`ApiClient`] is the production implementation of both traits. Tests swap
//! in in-memory fakes.

use async_trait::async_trait;
use fnchat_shared::{
    ApiError, CatalogFunction, CreateMessageRequest, CreateSessionRequest, FunctionPatch,
    GenerateTitleRequest, GeneratedTitle, MessageRecord, NewFunction, Session,
    UpdateSessionRequest,
};

use crate::api_client::ApiClient;

/// Session and message endpoints.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;
    async fn create_session(&self, req: &CreateSessionRequest) -> Result<Session, ApiError>;
    async fn update_session(
        &self,
        session_id: &str,
        req: &UpdateSessionRequest,
    ) -> Result<Session, ApiError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError>;
    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, ApiError>;
    async fn create_message(
        &self,
        session_id: &str,
        req: &CreateMessageRequest,
    ) -> Result<MessageRecord, ApiError>;
    async fn generate_title(
        &self,
        session_id: &str,
        req: &GenerateTitleRequest,
    ) -> Result<GeneratedTitle, ApiError>;
}

/// Function catalog endpoints.
#[async_trait]
pub trait FunctionBackend: Send + Sync {
    async fn list_functions(&self) -> Result<Vec<CatalogFunction>, ApiError>;
    async fn create_function(&self, req: &NewFunction) -> Result<CatalogFunction, ApiError>;
    async fn update_function(
        &self,
        function_id: &str,
        patch: &FunctionPatch,
    ) -> Result<CatalogFunction, ApiError>;
    async fn delete_function(&self, function_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        ApiClient::list_sessions(self).await
    }

    async fn create_session(&self, req: &CreateSessionRequest) -> Result<Session, ApiError> {
        ApiClient::create_session(self, req).await
    }

    async fn update_session(
        &self,
        session_id: &str,
        req: &UpdateSessionRequest,
    ) -> Result<Session, ApiError> {
        ApiClient::update_session(self, session_id, req).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        ApiClient::delete_session(self, session_id).await
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, ApiError> {
        ApiClient::list_messages(self, session_id).await
    }

    async fn create_message(
        &self,
        session_id: &str,
        req: &CreateMessageRequest,
    ) -> Result<MessageRecord, ApiError> {
        ApiClient::create_message(self, session_id, req).await
    }

    async fn generate_title(
        &self,
        session_id: &str,
        req: &GenerateTitleRequest,
    ) -> Result<GeneratedTitle, ApiError> {
        ApiClient::generate_title(self, session_id, req).await
    }
}

#[async_trait]
impl FunctionBackend for ApiClient {
    async fn list_functions(&self) -> Result<Vec<CatalogFunction>, ApiError> {
        ApiClient::list_functions(self).await
    }

    async fn create_function(&self, req: &NewFunction) -> Result<CatalogFunction, ApiError> {
        ApiClient::create_function(self, req).await
    }

    async fn update_function(
        &self,
        function_id: &str,
        patch: &FunctionPatch,
    ) -> Result<CatalogFunction, ApiError> {
        ApiClient::update_function(self, function_id, patch).await
    }

    async fn delete_function(&self, function_id: &str) -> Result<(), ApiError> {
        ApiClient::delete_function(self, function_id).await
    }
}
