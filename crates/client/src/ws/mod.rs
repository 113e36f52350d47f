//! Realtime connection to a chat room.
//!
//! # Architecture
//!
//! ```text
//!   set_room / set_authenticated / connect / disconnect
//!                         │
//!                         ▼
//!              ┌─────────────────────┐        status (watch)
//!              │     ChatClient      │ ─────────────────────▶ UI
//!              └─────────────────────┘
//!                         │ spawns one driver per connection
//!                         ▼
//!              ┌─────────────────────┐   ReconnectPolicy
//!              │       Driver        │ ◀──────────────────
//!              └─────────────────────┘
//!                │                  ▲
//!     Connector / Transport         │ frames
//!                ▼                  │
//!              ┌─────────────────────┐
//!              │    EventRouter      │ ─── ChatEvent ───▶ on_event
//!              └─────────────────────┘
//! ```
//!
//! The client never touches application state. Inbound frames become
//! [`ChatMutation`]s that the owner applies, for example with
//! [`crate::stores::ChatStore`].
//!
//! ```rust,ignore
//! let client = ChatClient::with_native_transport(config, move |event| store.apply(&event));
//! client.set_authenticated(true).await;
//! client.set_room(Some("42".into())).await;
//! client.send_message("hello", MessageKind::Text, None);
//! ```

mod connection;
mod gateway;
mod manager;
mod policy;
mod router;

#[cfg(test)]
pub(crate) mod mock;

pub use connection::{
    CloseInfo, ConnectionState, ConnectionStatus, Connector, Incoming, Transport, WsConnector,
};
pub use manager::{ChatClient, ChatEvent, ErrorKind, ErrorSignal, EventSink};
pub use policy::{Backoff, ReconnectPolicy};
pub use router::{ChatMutation, EventRouter, ReadReceipt, Routed};
