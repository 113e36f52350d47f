//! Outbound commands.
//!
//! Each method sends one command if the connection is open and otherwise
//! does nothing. There is no offline queue.

use crmchat_shared::{MessageKind, OutboundCommand};

use super::manager::ChatClient;

impl ChatClient {
    pub fn send_message(
        &self,
        content: impl Into<String>,
        message_type: MessageKind,
        reply_to: Option<String>,
    ) {
        self.transmit(OutboundCommand::SendMessage {
            content: content.into(),
            message_type,
            reply_to,
        });
    }

    pub fn edit_message(&self, message_id: impl Into<String>, content: impl Into<String>) {
        self.transmit(OutboundCommand::EditMessage {
            message_id: message_id.into(),
            content: content.into(),
        });
    }

    pub fn delete_message(&self, message_id: impl Into<String>) {
        self.transmit(OutboundCommand::DeleteMessage {
            message_id: message_id.into(),
        });
    }

    pub fn mark_as_read(&self, message_id: impl Into<String>) {
        self.transmit(OutboundCommand::MarkRead {
            message_id: message_id.into(),
        });
    }

    pub fn set_typing(&self, is_typing: bool) {
        self.transmit(OutboundCommand::SetTyping { is_typing });
    }
}
