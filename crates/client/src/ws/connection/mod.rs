//! WebSocket connection state and reconnect policy.
//!
//! This module provides the shared types; the connection itself lives in
//! `connection_native`.

use std::time::Duration;

/// Connection state of the realtime channel
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Retries exhausted. Nothing happens until `connect()` is called again.
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Retries after the connection closed or failed to open
    /// (0 = never reconnect automatically)
    pub max_attempts: u32,
    /// Delay unit in milliseconds; retry `n` waits `n * base_delay_ms`
    pub base_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2000,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Retry bookkeeping for one connection run.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Retries scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Called on a successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Count a retry and return how long to wait before it, or `None` once
    /// the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.config.delay_for_attempt(self.attempts))
    }
}

mod connection_native;
pub use connection_native::ChatSocket;
