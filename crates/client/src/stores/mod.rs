//! Client-side state stores.
//!
//! Each store keeps its state in a `watch` channel: [`ChatStore::snapshot`]
//! and friends read the latest value synchronously, and `subscribe()` hands
//! out receivers that are notified after every change.

pub mod chat;
pub mod functions;

pub use chat::{
    default_session_title, session_title_from_message, ChatAction, ChatMessage, ChatState,
    ChatStore,
};
pub use functions::{categories_of, FunctionAction, FunctionState, FunctionStore};
