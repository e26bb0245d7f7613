//! Client configuration.

use crate::ws::ReconnectConfig;

/// Default backend address used by the development server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Path of the realtime chat endpoint.
pub const WS_CHAT_PATH: &str = "/ws/chat";

/// Everything the stores and the realtime transport need to reach the
/// backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for REST requests, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Full URL of the realtime endpoint.
    pub ws_url: String,
    /// Reconnect behaviour of the realtime transport.
    pub reconnect: ReconnectConfig,
    /// `chrono` format for the date in default session titles
    /// (`Chat 05.03.2024`).
    pub session_title_date_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: ws_url_for_base(DEFAULT_BASE_URL)
                .unwrap_or_else(|| format!("ws://localhost:8000{WS_CHAT_PATH}")),
            reconnect: ReconnectConfig::default(),
            session_title_date_format: "%d.%m.%Y".to_string(),
        }
    }
}

impl ClientConfig {
    /// Point REST and realtime traffic at `base_url`. The realtime URL is
    /// derived from it (`http` → `ws`, `https` → `wss`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        if let Some(ws_url) = ws_url_for_base(&self.base_url) {
            self.ws_url = ws_url;
        }
        self
    }

    /// Override the realtime URL independently of the REST base.
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_session_title_date_format(mut self, format: impl Into<String>) -> Self {
        self.session_title_date_format = format.into();
        self
    }
}

/// Derive the realtime endpoint URL from a REST base URL.
///
/// Returns `None` for unparsable bases or schemes other than http(s).
pub fn ws_url_for_base(base_url: &str) -> Option<String> {
    let mut url = url::Url::parse(base_url).ok()?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return None,
    };
    url.set_scheme(scheme).ok()?;
    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}{WS_CHAT_PATH}"));
    url.set_query(None);
    Some(url.to_string())
}
