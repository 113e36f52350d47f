//! Message lists per room.

use crmchat_shared::ChatMessage;

/// Content shown in place of a deleted message.
pub const DELETED_PLACEHOLDER: &str = "[Message deleted]";

/// Messages of a single room, in arrival order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoomMessages {
    pub messages: Vec<ChatMessage>,
    /// Whether the room history has been loaded.
    pub is_loaded: bool,
}

impl RoomMessages {
    /// Append a message.
    /// Returns false if a message with the same ID already exists (deduplication).
    pub fn add_message(&mut self, message: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the message with the same id. Unknown ids are ignored.
    pub fn replace_message(&mut self, message: ChatMessage) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                *existing = message;
                true
            }
            None => false,
        }
    }

    /// Soft delete: the entry stays, flagged and with its content blanked.
    pub fn remove_message(&mut self, message_id: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(existing) => {
                existing.is_deleted = true;
                existing.content = DELETED_PLACEHOLDER.to_string();
                true
            }
            None => false,
        }
    }

    /// Set the full message history and mark the room loaded.
    pub fn set_history(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.is_loaded = true;
    }

    pub fn get(&self, message_id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, content: &str) -> ChatMessage {
        serde_json::from_value(serde_json::json!({ "id": id, "content": content })).unwrap()
    }

    #[test]
    fn add_message_deduplicates() {
        let mut room = RoomMessages::default();
        assert!(room.add_message(message("m1", "hi")));
        assert!(room.add_message(message("m2", "there")));
        assert!(!room.add_message(message("m1", "again")));
        let ids: Vec<_> = room.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(room.get("m1").map(|m| m.content.as_str()), Some("hi"));
    }

    #[test]
    fn replace_keeps_position() {
        let mut room = RoomMessages::default();
        room.add_message(message("m1", "hi"));
        room.add_message(message("m2", "there"));

        let mut edited = message("m1", "hello");
        edited.is_edited = true;
        assert!(room.replace_message(edited));
        assert!(!room.replace_message(message("m9", "ghost")));

        assert_eq!(room.messages[0].content, "hello");
        assert!(room.messages[0].is_edited);
        assert_eq!(room.messages.len(), 2);
    }

    #[test]
    fn remove_is_soft() {
        let mut room = RoomMessages::default();
        room.add_message(message("m1", "secret"));

        assert!(room.remove_message("m1"));
        assert!(!room.remove_message("m2"));
        let m = room.get("m1").unwrap();
        assert!(m.is_deleted);
        assert_eq!(m.content, DELETED_PLACEHOLDER);
    }
}
