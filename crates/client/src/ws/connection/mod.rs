//! Connection lifecycle types and the transport seam.
//!
//! The manager only talks to the network through [`Connector`] and
//! [`Transport`]; the tokio-tungstenite implementation lives in
//! `connection_native`.

use std::time::Duration;

use async_trait::async_trait;
use crmchat_shared::{describe_close_code, CLOSE_ABNORMAL, CLOSE_NORMAL};
use serde::Serialize;
use url::Url;

use crate::error::TransportError;

/// Lifecycle state of a room connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No room bound, not authenticated, torn down, or given up.
    #[default]
    Idle,
    Connecting,
    Open,
    /// Closed unexpectedly; a retry may be pending.
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// A connection exists or is being (re)established.
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Idle)
    }
}

/// Snapshot published to observers whenever the connection changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConnectionStatus {
    /// Identifies one connection instance in logs; `None` while idle.
    pub connection_id: Option<String>,
    pub room_id: Option<String>,
    pub state: ConnectionState,
    /// Reconnect attempts made since the last successful open.
    pub attempt: u32,
    /// Delay of the pending reconnect, if one is scheduled.
    pub retry_in: Option<Duration>,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }
}

/// Why a transport closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close without a close frame (network drop, failed handshake).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_ABNORMAL, reason)
    }

    /// Normal closure is only ever requested on purpose, never by failure.
    pub fn is_intentional(&self) -> bool {
        self.code == CLOSE_NORMAL
    }

    pub fn describe(&self) -> String {
        if self.reason.is_empty() {
            format!("{} ({})", self.code, describe_close_code(self.code))
        } else {
            format!(
                "{} ({}): {}",
                self.code,
                describe_close_code(self.code),
                self.reason
            )
        }
    }
}

/// One item read from a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A text frame.
    Frame(String),
    /// Data that is not a protocol text frame; the transport stays open.
    Malformed(String),
    /// The transport is closed and yields nothing further.
    Closed(CloseInfo),
}

/// An open, bidirectional frame transport.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Next inbound item. Must be cancel-safe: the manager races it against
    /// outbound traffic and shutdown.
    async fn recv(&mut self) -> Incoming;

    async fn close(&mut self, code: u16, reason: &str);
}

/// Opens transports. One connector serves every connection of a client.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError>;
}

mod connection_native;
pub use connection_native::WsConnector;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn close_descriptions() {
        assert_eq!(
            CloseInfo::new(4004, "").describe(),
            "4004 (room not found)"
        );
        assert_eq!(
            CloseInfo::abnormal("reset by peer").describe(),
            "1006 (abnormal closure): reset by peer"
        );
        assert!(CloseInfo::new(CLOSE_NORMAL, "bye").is_intentional());
        assert!(!CloseInfo::new(4001, "").is_intentional());
    }

    #[test]
    fn status_serializes_for_observers() {
        let status = ConnectionStatus {
            room_id: Some("room-1".into()),
            state: ConnectionState::Closed,
            attempt: 2,
            retry_in: Some(Duration::from_secs(4)),
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], json!("closed"));
        assert_eq!(value["attempt"], json!(2));
        assert_eq!(value["retry_in"]["secs"], json!(4));
        assert_eq!(value["last_error"], json!(null));
    }
}
