//! Reconnecting realtime chat channel on top of tokio.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fnchat_shared::ChatFrame;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Backoff, ConnectionState, ReconnectConfig};
use crate::config::ClientConfig;
use crate::ws::transport::{Connector, Duplex, Timer, TokioTimer, TungsteniteConnector};

type MessageCallback = Arc<dyn Fn(Value) + Send + Sync>;
type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the handle and its background task.
struct Shared {
    url: String,
    reconnect: ReconnectConfig,
    connector: Arc<dyn Connector>,
    timer: Arc<dyn Timer>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    /// Writer queue of the open channel, if any.
    outbound: Mutex<Option<UnboundedSender<String>>>,
    on_message: Mutex<Option<MessageCallback>>,
    on_connection: Mutex<Option<ConnectionCallback>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn notify_connection(&self, connected: bool) {
        let callback = lock(&self.on_connection).clone();
        if let Some(callback) = callback {
            callback(connected);
        }
    }

    fn dispatch_inbound(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(message) => {
                let callback = lock(&self.on_message).clone();
                if let Some(callback) = callback {
                    callback(message);
                }
            }
            Err(e) => error!("Failed to parse WebSocket message: {}", e),
        }
    }
}

/// How a connection run ended.
#[derive(Debug, PartialEq)]
enum Exit {
    /// `disconnect()` was called.
    Stopped,
    /// Retries exhausted.
    Exhausted,
}

/// How an open channel ended.
#[derive(Debug, PartialEq)]
enum Closed {
    ByPeer,
    ByUs,
}

struct Run {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Reconnecting duplex channel to the realtime chat endpoint.
///
/// Inbound frames are parsed as JSON and handed to the [`on_message`]
/// callback; malformed frames are logged and dropped. Outbound frames are
/// only sent while connected; there is no queueing across reconnects.
///
/// After the connection closes (or fails to open) the socket retries up to
/// `max_attempts` times, waiting `attempt * base_delay_ms` before each try,
/// then settles in [`ConnectionState::Failed`].
///
/// [`on_message`]: ChatSocket::on_message
pub struct ChatSocket {
    shared: Arc<Shared>,
    run: Mutex<Option<Run>>,
}

impl ChatSocket {
    /// Socket for `config.ws_url` using tokio-tungstenite and tokio timers.
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_transport(
            config.ws_url.clone(),
            config.reconnect.clone(),
            Arc::new(TungsteniteConnector),
            Arc::new(TokioTimer),
        )
    }

    pub fn with_transport(
        url: impl Into<String>,
        reconnect: ReconnectConfig,
        connector: Arc<dyn Connector>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                reconnect,
                connector,
                timer,
                state: watch::Sender::new(ConnectionState::Disconnected),
                attempts: AtomicU32::new(0),
                outbound: Mutex::new(None),
                on_message: Mutex::new(None),
                on_connection: Mutex::new(None),
            }),
            run: Mutex::new(None),
        }
    }

    /// Register the callback for inbound frames.
    pub fn on_message(&self, callback: impl Fn(Value) + Send + Sync + 'static) {
        *lock(&self.shared.on_message) = Some(Arc::new(callback));
    }

    /// Register the callback for connection changes: `true` on open, `false`
    /// on every close or failed open.
    pub fn on_connection(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        *lock(&self.shared.on_connection) = Some(Arc::new(callback));
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.borrow().is_connected()
    }

    /// Retries scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Open the channel in a background task, replacing any previous run.
    /// A previous run closes its channel (and reports `false`) before the
    /// new one starts.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut run = lock(&self.run);
        let previous = run.take().map(|previous| {
            debug!("Restarting WebSocket connection to {}", self.shared.url);
            previous.shutdown.notify_one();
            previous.task
        });

        let shutdown = Arc::new(Notify::new());
        let shared = self.shared.clone();
        let task_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    error!("Previous WebSocket run ended abnormally: {}", e);
                }
            }
            shared.attempts.store(0, Ordering::SeqCst);
            if connection_loop(&shared, &task_shutdown).await == Exit::Stopped {
                shared.set_state(ConnectionState::Disconnected);
            }
        });

        *run = Some(Run { shutdown, task });
    }

    /// Send a chat turn. Returns `false` (and logs) when the channel is not
    /// open; the message is dropped in that case.
    pub fn send_message(&self, message: &str, functions: &[String], session_id: Option<&str>) -> bool {
        let frame = ChatFrame {
            message: message.to_string(),
            functions: functions.to_vec(),
            session_id: session_id.map(str::to_string),
        };
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize chat frame: {}", e);
                return false;
            }
        };

        let sender = lock(&self.shared.outbound).clone();
        match sender {
            Some(sender) if self.is_connected() => match sender.unbounded_send(json) {
                Ok(()) => true,
                Err(e) => {
                    error!("WebSocket is not connected: {}", e);
                    false
                }
            },
            _ => {
                error!("WebSocket is not connected");
                false
            }
        }
    }

    /// Cancel any pending reconnect and close the channel if it is open.
    /// Calling it again is a no-op.
    pub fn disconnect(&self) {
        let Some(run) = lock(&self.run).take() else {
            return;
        };
        info!("Disconnecting WebSocket from {}", self.shared.url);
        *lock(&self.shared.outbound) = None;
        self.shared.set_state(ConnectionState::Disconnected);
        if run.task.is_finished() {
            return;
        }
        run.shutdown.notify_one();
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn connection_loop(shared: &Shared, shutdown: &Notify) -> Exit {
    let mut backoff = Backoff::new(shared.reconnect.clone());

    loop {
        let attempt = backoff.attempts();
        if attempt == 0 {
            shared.set_state(ConnectionState::Connecting);
        } else {
            shared.set_state(ConnectionState::Reconnecting { attempt });
        }

        let opened = tokio::select! {
            _ = shutdown.notified() => return Exit::Stopped,
            result = shared.connector.connect(&shared.url) => result,
        };

        match opened {
            Ok(duplex) => {
                let (sender, receiver) = unbounded();
                *lock(&shared.outbound) = Some(sender);
                backoff.reset();
                shared.attempts.store(0, Ordering::SeqCst);
                shared.set_state(ConnectionState::Connected);
                info!("WebSocket connected to {}", shared.url);
                shared.notify_connection(true);

                let closed = pump(shared, duplex, receiver, shutdown).await;
                *lock(&shared.outbound) = None;
                info!("WebSocket disconnected from {}", shared.url);
                shared.notify_connection(false);
                if closed == Closed::ByUs {
                    return Exit::Stopped;
                }
            }
            Err(e) => {
                error!("Failed to connect WebSocket to {}: {}", shared.url, e);
                shared.notify_connection(false);
            }
        }
        shared.set_state(ConnectionState::Disconnected);

        let Some(delay) = backoff.next_delay() else {
            error!(
                "Max reconnection attempts reached ({}) for {}",
                backoff.max_attempts(),
                shared.url
            );
            shared.set_state(ConnectionState::Failed {
                reason: format!(
                    "Max reconnect attempts ({}) exceeded",
                    backoff.max_attempts()
                ),
            });
            return Exit::Exhausted;
        };
        shared.attempts.store(backoff.attempts(), Ordering::SeqCst);
        info!(
            "Attempting to reconnect... ({}/{}) in {}ms",
            backoff.attempts(),
            backoff.max_attempts(),
            delay.as_millis()
        );

        tokio::select! {
            _ = shutdown.notified() => return Exit::Stopped,
            _ = shared.timer.sleep(delay) => {}
        }
    }
}

/// Move frames in both directions until either side closes.
async fn pump(
    shared: &Shared,
    duplex: Duplex,
    mut outbound: UnboundedReceiver<String>,
    shutdown: &Notify,
) -> Closed {
    let Duplex {
        mut sink,
        mut stream,
    } = duplex;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                if let Err(e) = sink.close().await {
                    debug!("Error while closing WebSocket: {}", e);
                }
                return Closed::ByUs;
            }
            inbound = stream.next() => match inbound {
                Some(Ok(text)) => shared.dispatch_inbound(&text),
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    return Closed::ByPeer;
                }
                None => return Closed::ByPeer,
            },
            Some(frame) = outbound.next() => {
                debug!("Sending to {}: {}", shared.url, frame);
                if let Err(e) = sink.send(frame).await {
                    error!("Send failed: {}", e);
                    return Closed::ByPeer;
                }
            }
        }
    }
}
