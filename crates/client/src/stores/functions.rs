//! Function catalog store.
//!
//! Reads recover locally like the chat store does. Writes also record the
//! failure in [`FunctionState::error`] but return it to the caller, so forms
//! can show the server's validation message inline.

use std::collections::HashSet;
use std::sync::Arc;

use fnchat_shared::{ApiError, CatalogFunction, FunctionPatch, NewFunction};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::backend::FunctionBackend;
use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionState {
    pub functions: Vec<CatalogFunction>,
    /// Distinct categories of `functions`, in first-seen order.
    pub categories: Vec<String>,
    /// Ids selected for the next chat turn.
    pub active_functions: Vec<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionAction {
    LoadStarted,
    Loaded(Vec<CatalogFunction>),
    Created(CatalogFunction),
    Updated {
        function_id: String,
        function: CatalogFunction,
    },
    Deleted(String),
    Toggled(String),
    ActiveSet(Vec<String>),
    Failed(String),
    ErrorCleared,
}

/// Distinct categories of `functions`, in first-seen order.
pub fn categories_of(functions: &[CatalogFunction]) -> Vec<String> {
    let mut seen = HashSet::new();
    functions
        .iter()
        .filter(|f| seen.insert(f.category.as_str()))
        .map(|f| f.category.clone())
        .collect()
}

impl FunctionState {
    /// Apply `action` to the state. Pure; performs no I/O.
    pub fn reduce(mut self, action: FunctionAction) -> Self {
        match action {
            FunctionAction::LoadStarted => {
                self.is_loading = true;
                self.error = None;
            }
            FunctionAction::Loaded(functions) => {
                self.functions = functions;
                self.is_loading = false;
                // Functions removed elsewhere must not stay selected.
                let known: HashSet<&str> = self.functions.iter().map(|f| f.id.as_str()).collect();
                self.active_functions.retain(|id| known.contains(id.as_str()));
            }
            FunctionAction::Created(function) => {
                self.functions.insert(0, function);
            }
            FunctionAction::Updated {
                function_id,
                function,
            } => {
                if let Some(slot) = self.functions.iter_mut().find(|f| f.id == function_id) {
                    *slot = function;
                }
            }
            FunctionAction::Deleted(function_id) => {
                self.functions.retain(|f| f.id != function_id);
                self.active_functions.retain(|id| id != &function_id);
            }
            FunctionAction::Toggled(function_id) => {
                if let Some(pos) = self.active_functions.iter().position(|id| id == &function_id) {
                    self.active_functions.remove(pos);
                } else {
                    self.active_functions.push(function_id);
                }
            }
            FunctionAction::ActiveSet(ids) => {
                self.active_functions = ids;
            }
            FunctionAction::Failed(message) => {
                self.is_loading = false;
                self.error = Some(message);
            }
            FunctionAction::ErrorCleared => {
                self.error = None;
            }
        }
        self.categories = categories_of(&self.functions);
        self
    }

    pub fn function(&self, function_id: &str) -> Option<&CatalogFunction> {
        self.functions.iter().find(|f| f.id == function_id)
    }

    pub fn is_active(&self, function_id: &str) -> bool {
        self.active_functions.iter().any(|id| id == function_id)
    }
}

/// Store for the function catalog and the active selection.
pub struct FunctionStore {
    backend: Arc<dyn FunctionBackend>,
    state: watch::Sender<FunctionState>,
}

impl FunctionStore {
    pub fn new(backend: Arc<dyn FunctionBackend>) -> Self {
        Self {
            backend,
            state: watch::Sender::new(FunctionState::default()),
        }
    }

    pub fn snapshot(&self) -> FunctionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FunctionState> {
        self.state.subscribe()
    }

    fn dispatch(&self, action: FunctionAction) {
        self.state.send_modify(|state| {
            let previous = std::mem::take(state);
            *state = previous.reduce(action);
        });
    }

    /// Record a failed write and hand it back to the caller.
    fn reject(&self, err: ApiError, fallback: &str) -> StoreError {
        error!("{}: {}", fallback, err);
        let err = StoreError::request(err, fallback);
        self.dispatch(FunctionAction::Failed(err.to_string()));
        err
    }

    /// Fetch the catalog. Failures are recorded in the state only; the
    /// cached list is left as it was.
    pub async fn load_functions(&self) {
        self.dispatch(FunctionAction::LoadStarted);
        match self.backend.list_functions().await {
            Ok(functions) => {
                debug!("Loaded {} functions", functions.len());
                self.dispatch(FunctionAction::Loaded(functions));
            }
            Err(e) => {
                error!("Failed to load functions: {}", e);
                self.dispatch(FunctionAction::Failed(
                    e.user_message("Failed to load functions"),
                ));
            }
        }
    }

    pub async fn create_function(&self, data: &NewFunction) -> Result<CatalogFunction, StoreError> {
        match self.backend.create_function(data).await {
            Ok(created) => {
                info!("Created function {}", created.id);
                self.dispatch(FunctionAction::Created(created.clone()));
                Ok(created)
            }
            Err(e) => Err(self.reject(e, "Failed to create function")),
        }
    }

    pub async fn update_function(
        &self,
        function_id: &str,
        patch: &FunctionPatch,
    ) -> Result<CatalogFunction, StoreError> {
        match self.backend.update_function(function_id, patch).await {
            Ok(updated) => {
                self.dispatch(FunctionAction::Updated {
                    function_id: function_id.to_string(),
                    function: updated.clone(),
                });
                Ok(updated)
            }
            Err(e) => Err(self.reject(e, "Failed to update function")),
        }
    }

    /// Delete a function and drop it from the active selection.
    pub async fn delete_function(&self, function_id: &str) -> Result<(), StoreError> {
        match self.backend.delete_function(function_id).await {
            Ok(()) => {
                info!("Deleted function {}", function_id);
                self.dispatch(FunctionAction::Deleted(function_id.to_string()));
                Ok(())
            }
            Err(e) => Err(self.reject(e, "Failed to delete function")),
        }
    }

    /// Add `function_id` to the active selection, or remove it if present.
    pub fn toggle_function(&self, function_id: &str) {
        self.dispatch(FunctionAction::Toggled(function_id.to_string()));
    }

    /// Flip the backend `isEnabled` flag of a cached function.
    pub async fn toggle_function_enabled(
        &self,
        function_id: &str,
    ) -> Result<CatalogFunction, StoreError> {
        let current = self
            .state
            .borrow()
            .function(function_id)
            .map(|f| f.is_enabled);
        let Some(is_enabled) = current else {
            let err = StoreError::FunctionNotFound(function_id.to_string());
            error!("Failed to toggle function enabled state: {}", err);
            return Err(err);
        };

        self.update_function(function_id, &FunctionPatch::enabled(!is_enabled))
            .await
    }

    pub fn set_active_functions(&self, function_ids: Vec<String>) {
        self.dispatch(FunctionAction::ActiveSet(function_ids));
    }

    /// Ids to send along with the next chat turn.
    pub fn active_function_ids(&self) -> Vec<String> {
        self.state.borrow().active_functions.clone()
    }

    pub fn clear_error(&self) {
        self.dispatch(FunctionAction::ErrorCleared);
    }
}
