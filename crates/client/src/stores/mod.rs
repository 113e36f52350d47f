//! In-memory chat state that applies [`ChatEvent`]s.
//!
//! The realtime client only produces mutation intents; this store is one way
//! to apply them, keyed by room.

pub mod messages;
pub mod presence;

use std::collections::HashMap;

pub use messages::{RoomMessages, DELETED_PLACEHOLDER};
pub use presence::{OnlineUser, RoomPresence, TypingUser};

use crate::ws::{ChatEvent, ChatMutation};

#[derive(Debug, Default, Clone)]
pub struct ChatStore {
    pub messages: HashMap<String, RoomMessages>,
    pub presence: HashMap<String, RoomPresence>,
    pub connected: bool,
    pub error: Option<String>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Mutation(mutation) => self.apply_mutation(mutation),
            ChatEvent::MessageRead(_) => {}
            ChatEvent::Connected { .. } => {
                self.connected = true;
                self.error = None;
            }
            ChatEvent::Disconnected { .. } => self.connected = false,
            ChatEvent::Error(signal) => self.error = Some(signal.message.clone()),
        }
    }

    pub fn apply_mutation(&mut self, mutation: &ChatMutation) {
        match mutation {
            ChatMutation::AppendMessage { room_id, message } => {
                self.room_messages_mut(room_id).add_message(message.clone());
            }
            ChatMutation::ReplaceMessage { room_id, message } => {
                if let Some(room) = self.messages.get_mut(room_id) {
                    room.replace_message(message.clone());
                }
            }
            ChatMutation::RemoveMessage {
                room_id,
                message_id,
            } => {
                if let Some(room) = self.messages.get_mut(room_id) {
                    room.remove_message(message_id);
                }
            }
            ChatMutation::SetTyping {
                room_id,
                user_id,
                username,
                is_typing,
            } => {
                self.room_presence_mut(room_id)
                    .set_typing(*user_id, username, *is_typing);
            }
            ChatMutation::SetPresence {
                room_id,
                user_id,
                username,
                status,
                timestamp,
            } => {
                self.room_presence_mut(room_id).set_status(OnlineUser {
                    user_id: *user_id,
                    username: username.clone(),
                    status: *status,
                    timestamp: *timestamp,
                });
            }
        }
    }

    pub fn room_messages(&self, room_id: &str) -> Option<&RoomMessages> {
        self.messages.get(room_id)
    }

    pub fn room_presence(&self, room_id: &str) -> Option<&RoomPresence> {
        self.presence.get(room_id)
    }

    /// Forget everything about a room, e.g. when leaving it.
    pub fn clear_room(&mut self, room_id: &str) {
        self.messages.remove(room_id);
        self.presence.remove(room_id);
    }

    fn room_messages_mut(&mut self, room_id: &str) -> &mut RoomMessages {
        self.messages.entry(room_id.to_string()).or_default()
    }

    fn room_presence_mut(&mut self, room_id: &str) -> &mut RoomPresence {
        self.presence.entry(room_id.to_string()).or_default()
    }
}
