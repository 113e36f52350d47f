//! Client error types.

use thiserror::Error;

/// Failure while opening or using the realtime transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("room identifier is empty")]
    EmptyRoom,
    #[error("websocket host is empty")]
    EmptyHost,
    #[error("unsupported page scheme '{0}' (expected http or https)")]
    Scheme(String),
    #[error("invalid websocket url: {0}")]
    Url(#[from] url::ParseError),
}
