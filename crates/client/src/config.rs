//! Client configuration from environment variables.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::ws::ReconnectPolicy;

const DEFAULT_WS_HOST: &str = "localhost:8000";
const DEFAULT_CHAT_PATH: &str = "/ws/chat";
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Settings for the realtime chat connection.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Chat server host, e.g. `"crm.example.com"` or `"localhost:8000"`.
    ///
    /// An `http://` or `https://` prefix is accepted and upgraded to the
    /// matching websocket scheme, overriding `secure`.
    pub ws_host: String,
    /// Whether the embedding page was served over https (selects `wss`).
    pub secure: bool,
    /// Path prefix of the per-room endpoint.
    pub chat_path: String,
    /// Session cookie forwarded on the handshake request.
    pub session_cookie: Option<String>,
    pub reconnect: ReconnectPolicy,
    /// How long teardown waits for the connection task to close the socket.
    pub shutdown_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            ws_host: DEFAULT_WS_HOST.to_string(),
            secure: false,
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            session_cookie: None,
            reconnect: ReconnectPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ChatConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CRM_WS_HOST`: chat server host (default: "localhost:8000")
    /// - `CRM_PAGE_SCHEME`: "http" | "https" (default: "http")
    /// - `CRM_SESSION_COOKIE`: cookie header value for the handshake (optional)
    /// - `CRM_RECONNECT_BASE_MS`: backoff base delay (default: 1000)
    /// - `CRM_RECONNECT_MAX_ATTEMPTS`: retries before giving up (default: 5)
    /// - `CRM_RECONNECT_MAX_DELAY_MS`: backoff cap (default: 60000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let policy = defaults.reconnect.clone();

        let ws_host = std::env::var("CRM_WS_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.ws_host);

        let secure = match std::env::var("CRM_PAGE_SCHEME") {
            Ok(scheme) => match parse_page_scheme(&scheme) {
                Ok(secure) => secure,
                Err(e) => {
                    crate::log_warn!("CRM_PAGE_SCHEME: {}, using http", e);
                    false
                }
            },
            Err(_) => false,
        };

        let session_cookie = std::env::var("CRM_SESSION_COOKIE")
            .ok()
            .filter(|c| !c.trim().is_empty());

        let reconnect = ReconnectPolicy {
            base_delay: Duration::from_millis(env_or(
                "CRM_RECONNECT_BASE_MS",
                policy.base_delay.as_millis() as u64,
            )),
            max_attempts: env_or("CRM_RECONNECT_MAX_ATTEMPTS", policy.max_attempts),
            max_delay: Duration::from_millis(env_or(
                "CRM_RECONNECT_MAX_DELAY_MS",
                policy.max_delay.as_millis() as u64,
            )),
        };

        Self {
            ws_host,
            secure,
            session_cookie,
            reconnect,
            ..defaults
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.ws_host = host.into();
        self
    }

    /// Select `ws`/`wss` from the scheme the embedding page was served with.
    pub fn with_page_scheme(mut self, scheme: &str) -> Result<Self, ConfigError> {
        self.secure = parse_page_scheme(scheme)?;
        Ok(self)
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Websocket URL of a room: `{ws|wss}://{host}{chat_path}/{room}/`.
    pub fn room_url(&self, room_id: &str) -> Result<Url, ConfigError> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(ConfigError::EmptyRoom);
        }

        let (scheme, host) = self.scheme_and_host();
        if host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let path = self.chat_path.trim_matches('/');
        let raw = if path.is_empty() {
            format!("{}://{}/{}/", scheme, host, urlencoding::encode(room_id))
        } else {
            format!(
                "{}://{}/{}/{}/",
                scheme,
                host,
                path,
                urlencoding::encode(room_id)
            )
        };

        Ok(Url::parse(&raw)?)
    }

    fn scheme_and_host(&self) -> (&'static str, &str) {
        let host = self.ws_host.trim();
        let (scheme, rest) = if let Some(rest) = host.strip_prefix("https://") {
            ("wss", rest)
        } else if let Some(rest) = host.strip_prefix("http://") {
            ("ws", rest)
        } else if let Some(rest) = host.strip_prefix("wss://") {
            ("wss", rest)
        } else if let Some(rest) = host.strip_prefix("ws://") {
            ("ws", rest)
        } else if self.secure {
            ("wss", host)
        } else {
            ("ws", host)
        };
        (scheme, rest.trim_end_matches('/'))
    }
}

fn parse_page_scheme(scheme: &str) -> Result<bool, ConfigError> {
    match scheme.trim().trim_end_matches(':').to_lowercase().as_str() {
        "http" => Ok(false),
        "https" => Ok(true),
        other => Err(ConfigError::Scheme(other.to_string())),
    }
}

fn env_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                crate::log_warn!("{}: cannot parse '{}', using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_url_uses_page_scheme() {
        let config = ChatConfig::default();
        assert_eq!(
            config.room_url("room-42").unwrap().as_str(),
            "ws://localhost:8000/ws/chat/room-42/"
        );

        let config = ChatConfig::default()
            .with_host("crm.example.com")
            .with_page_scheme("https:")
            .unwrap();
        assert_eq!(
            config.room_url("room-42").unwrap().as_str(),
            "wss://crm.example.com/ws/chat/room-42/"
        );
    }

    #[test]
    fn http_prefixed_host_is_upgraded() {
        let config = ChatConfig::default().with_host("https://crm.example.com/");
        assert_eq!(
            config.room_url("abc").unwrap().as_str(),
            "wss://crm.example.com/ws/chat/abc/"
        );

        let config = ChatConfig::default().with_host("http://10.0.0.5:8000");
        assert_eq!(
            config.room_url("abc").unwrap().scheme(),
            "ws"
        );
    }

    #[test]
    fn room_id_is_escaped() {
        let config = ChatConfig::default();
        let url = config.room_url("sales team/2").unwrap();
        assert_eq!(url.path(), "/ws/chat/sales%20team%2F2/");
    }

    #[test]
    fn empty_room_or_host_is_rejected() {
        let config = ChatConfig::default();
        assert!(matches!(config.room_url("  "), Err(ConfigError::EmptyRoom)));

        let config = ChatConfig::default().with_host("");
        assert!(matches!(config.room_url("r1"), Err(ConfigError::EmptyHost)));
    }

    #[test]
    fn unknown_page_scheme_is_rejected() {
        assert!(matches!(
            ChatConfig::default().with_page_scheme("ftp"),
            Err(ConfigError::Scheme(_))
        ));
    }
}
