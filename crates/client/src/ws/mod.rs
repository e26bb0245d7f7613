//! WebSocket module for the realtime chat channel.
//!
//! # Architecture
//!
//! ```text
//!   send_message() ──► outbound queue ──┐
//!                                       ▼
//!                 ┌──────────────────────────────────┐
//!                 │            ChatSocket            │
//!                 │  (background task, reconnects)   │
//!                 └──────────────────────────────────┘
//!                       ▲                    │
//!              Connector / Timer      on_message(Value)
//!                       │             on_connection(bool)
//!                 tokio-tungstenite          ▼
//!                                     application code
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let socket = ChatSocket::new(&ClientConfig::default());
//! socket.on_message(|frame| println!("{frame}"));
//! socket.on_connection(|up| println!("connected: {up}"));
//! socket.connect();
//!
//! socket.send_message("hello", &active_function_ids, Some(&session_id));
//! ```

mod connection;
pub mod transport;

pub use connection::{Backoff, ChatSocket, ConnectionState, ReconnectConfig};
pub use transport::{
    Connector, Duplex, FrameSink, FrameStream, Timer, TokioTimer, TransportError,
    TungsteniteConnector,
};
