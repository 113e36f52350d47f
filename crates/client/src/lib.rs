//! CRM chat client - realtime room synchronization
//!
//! Keeps one WebSocket connection per chat room, reconnects with
//! exponential backoff, and turns server frames into state mutations for
//! the application to apply.

pub mod config;
pub mod error;
pub mod logging;
pub mod stores;
pub mod ws;

pub use config::ChatConfig;
pub use error::{ConfigError, TransportError};
pub use stores::ChatStore;
pub use ws::{ChatClient, ChatEvent, ChatMutation, ConnectionState, ConnectionStatus};
