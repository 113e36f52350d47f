//! Maps inbound frames to state mutation intents.

use chrono::{DateTime, Utc};
use crmchat_shared::{decode_inbound, ChatMessage, InboundEvent, PresenceStatus, UserId};

/// A state change for the state layer to apply. The client never applies
/// these itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMutation {
    /// Append a message; de-duplication by id is up to the state layer.
    AppendMessage {
        room_id: String,
        message: ChatMessage,
    },
    /// Replace the message with the same id, if the state layer knows it.
    ReplaceMessage {
        room_id: String,
        message: ChatMessage,
    },
    RemoveMessage {
        room_id: String,
        message_id: String,
    },
    /// Last write wins per user.
    SetTyping {
        room_id: String,
        user_id: UserId,
        username: String,
        is_typing: bool,
    },
    SetPresence {
        room_id: String,
        user_id: UserId,
        username: String,
        status: PresenceStatus,
        timestamp: Option<DateTime<Utc>>,
    },
}

impl ChatMutation {
    pub fn room_id(&self) -> &str {
        match self {
            ChatMutation::AppendMessage { room_id, .. }
            | ChatMutation::ReplaceMessage { room_id, .. }
            | ChatMutation::RemoveMessage { room_id, .. }
            | ChatMutation::SetTyping { room_id, .. }
            | ChatMutation::SetPresence { room_id, .. } => room_id,
        }
    }
}

/// Someone read a message. Passed through for observers; no state change.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReceipt {
    pub room_id: String,
    pub message_id: String,
    pub user_id: Option<UserId>,
    pub username: String,
}

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Mutation(ChatMutation),
    Receipt(ReadReceipt),
    /// The server reported an error.
    ServerError(String),
    /// The frame could not be decoded.
    Malformed(String),
    /// Unrecognized frame kind, dropped.
    Ignored { kind: String },
}

/// Routes the frames of one room connection.
#[derive(Debug, Clone)]
pub struct EventRouter {
    room_id: String,
}

impl EventRouter {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Decode and route one text frame. Never panics on bad input.
    pub fn route_frame(&self, text: &str) -> Routed {
        match decode_inbound(text) {
            Ok(event) => self.route(event),
            Err(e) => {
                crate::log_warn!(room = %self.room_id, "Dropping malformed frame: {}", e);
                Routed::Malformed(e.to_string())
            }
        }
    }

    pub fn route(&self, event: InboundEvent) -> Routed {
        let room_id = self.room_id.clone();
        match event {
            InboundEvent::NewMessage { message } => {
                Routed::Mutation(ChatMutation::AppendMessage { room_id, message })
            }
            InboundEvent::MessageEdited { message } => {
                Routed::Mutation(ChatMutation::ReplaceMessage { room_id, message })
            }
            InboundEvent::MessageDeleted { message_id, .. } => {
                Routed::Mutation(ChatMutation::RemoveMessage {
                    room_id,
                    message_id,
                })
            }
            InboundEvent::TypingChanged {
                user_id,
                username,
                is_typing,
            } => Routed::Mutation(ChatMutation::SetTyping {
                room_id,
                user_id,
                username,
                is_typing,
            }),
            InboundEvent::PresenceChanged {
                user_id,
                username,
                status,
                timestamp,
            } => Routed::Mutation(ChatMutation::SetPresence {
                room_id,
                user_id,
                username,
                status,
                timestamp,
            }),
            InboundEvent::ReadReceipt {
                message_id,
                user_id,
                username,
            } => {
                crate::log_debug!(room = %room_id, "Message {} read by {}", message_id, username);
                Routed::Receipt(ReadReceipt {
                    room_id,
                    message_id,
                    user_id,
                    username,
                })
            }
            InboundEvent::ServerError { message } => {
                crate::log_error!(room = %room_id, "Server error: {}", message);
                Routed::ServerError(message)
            }
            InboundEvent::Unknown { kind } => {
                crate::log_debug!(room = %room_id, "Ignoring unhandled frame type '{}'", kind);
                Routed::Ignored { kind }
            }
        }
    }
}
