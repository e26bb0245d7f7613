//! fnchat client - state layer for the function-calling chat app
//!
//! This crate holds everything a front end needs to talk to the chat
//! backend: the REST client, the session/message and function catalog
//! stores, and the reconnecting realtime socket. Rendering is left to the
//! caller.

pub mod api_client;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod stores;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use api_client::ApiClient;
pub use backend::{ChatBackend, FunctionBackend};
pub use config::ClientConfig;
pub use error::StoreError;
pub use stores::{ChatMessage, ChatState, ChatStore, FunctionState, FunctionStore};
pub use ws::{ChatSocket, ConnectionState, ReconnectConfig};
