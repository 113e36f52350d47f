//! Chat room WebSocket protocol.
//!
//! Every frame is a JSON object with a top-level `type` discriminator. The
//! server pushes [`InboundEvent`]s; the client sends [`OutboundCommand`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{ChatMessage, MessageKind, PresenceStatus, UserId};

/// Close code for a caller-initiated, intentional close.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Server rejected the handshake: session not authenticated.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;
/// Server rejected the handshake: user may not access the room.
pub const CLOSE_FORBIDDEN: u16 = 4003;
/// Server rejected the handshake: room does not exist.
pub const CLOSE_ROOM_NOT_FOUND: u16 = 4004;

/// Reason sent with [`CLOSE_NORMAL`] when the client tears a connection down.
pub const INTENTIONAL_CLOSE_REASON: &str = "Disconnecting intentionally";

/// Human readable description of a close code, for logs and UI.
pub fn describe_close_code(code: u16) -> &'static str {
    match code {
        CLOSE_NORMAL => "normal closure",
        1001 => "going away",
        CLOSE_ABNORMAL => "abnormal closure",
        1011 => "server error",
        CLOSE_UNAUTHORIZED => "unauthorized",
        CLOSE_FORBIDDEN => "forbidden",
        CLOSE_ROOM_NOT_FOUND => "room not found",
        _ => "unexpected close",
    }
}

/// Events pushed by the chat server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    NewMessage {
        message: ChatMessage,
    },
    MessageEdited {
        message: ChatMessage,
    },
    MessageDeleted {
        message_id: String,
        /// Username of whoever deleted the message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deleted_by: Option<String>,
    },
    #[serde(rename = "user_typing")]
    TypingChanged {
        user_id: UserId,
        #[serde(default)]
        username: String,
        is_typing: bool,
    },
    #[serde(rename = "user_status")]
    PresenceChanged {
        user_id: UserId,
        #[serde(default)]
        username: String,
        status: PresenceStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    #[serde(rename = "message_read")]
    ReadReceipt {
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        #[serde(default)]
        username: String,
    },
    #[serde(rename = "error")]
    ServerError {
        #[serde(rename = "error", alias = "message")]
        message: String,
    },
    /// A frame whose `type` this client does not know. Never sent.
    #[serde(skip)]
    Unknown { kind: String },
}

impl InboundEvent {
    /// Wire tags this client understands.
    pub const KNOWN_TYPES: [&'static str; 7] = [
        "new_message",
        "message_edited",
        "message_deleted",
        "user_typing",
        "user_status",
        "message_read",
        "error",
    ];

    /// The wire tag of this event.
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::NewMessage { .. } => "new_message",
            InboundEvent::MessageEdited { .. } => "message_edited",
            InboundEvent::MessageDeleted { .. } => "message_deleted",
            InboundEvent::TypingChanged { .. } => "user_typing",
            InboundEvent::PresenceChanged { .. } => "user_status",
            InboundEvent::ReadReceipt { .. } => "message_read",
            InboundEvent::ServerError { .. } => "error",
            InboundEvent::Unknown { kind } => kind,
        }
    }
}

/// Commands sent to the chat server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    SendMessage {
        content: String,
        message_type: MessageKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
    EditMessage {
        message_id: String,
        content: String,
    },
    DeleteMessage {
        message_id: String,
    },
    #[serde(rename = "mark_as_read")]
    MarkRead {
        message_id: String,
    },
    #[serde(rename = "typing")]
    SetTyping {
        is_typing: bool,
    },
}

impl OutboundCommand {
    /// The wire tag of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundCommand::SendMessage { .. } => "send_message",
            OutboundCommand::EditMessage { .. } => "edit_message",
            OutboundCommand::DeleteMessage { .. } => "delete_message",
            OutboundCommand::MarkRead { .. } => "mark_as_read",
            OutboundCommand::SetTyping { .. } => "typing",
        }
    }
}

/// Decode one inbound text frame.
///
/// Unrecognized `type` values decode to [`InboundEvent::Unknown`] rather than
/// failing. The server also answers bad requests with an untyped
/// `{"error": "..."}` object; that shape decodes to
/// [`InboundEvent::ServerError`].
pub fn decode_inbound(text: &str) -> Result<InboundEvent, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let Some(object) = value.as_object() else {
        return Err(ProtocolError::NotAnObject);
    };

    let kind = match object.get("type") {
        Some(serde_json::Value::String(kind)) => kind.clone(),
        Some(_) => return Err(ProtocolError::MissingType),
        None => {
            if let Some(message) = object.get("error").and_then(|e| e.as_str()) {
                return Ok(InboundEvent::ServerError {
                    message: message.to_string(),
                });
            }
            return Err(ProtocolError::MissingType);
        }
    };

    if !InboundEvent::KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(InboundEvent::Unknown { kind });
    }

    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidBody { kind, source })
}

/// Encode one outbound command as a text frame.
pub fn encode_outbound(command: &OutboundCommand) -> Result<String, ProtocolError> {
    serde_json::to_string(command).map_err(ProtocolError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_new_message() {
        let event = decode_inbound(r#"{"type":"new_message","message":{"id":"m1","content":"hi"}}"#).unwrap();
        match event {
            InboundEvent::NewMessage { message } => {
                assert_eq!(message.id, "m1");
                assert_eq!(message.content, "hi");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn decodes_delete_with_username() {
        let event = decode_inbound(r#"{"type":"message_deleted","message_id":"m1","deleted_by":"alice"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::MessageDeleted {
                message_id: "m1".into(),
                deleted_by: Some("alice".into())
            }
        );
    }

    #[test]
    fn decodes_presence_with_offset_timestamp() {
        let event = decode_inbound(
            r#"{"type":"user_status","user_id":3,"username":"bob","status":"online","timestamp":"2024-05-01T12:00:00.123456+00:00"}"#,
        )
        .unwrap();
        let InboundEvent::PresenceChanged {
            user_id,
            username,
            status,
            timestamp,
        } = event
        else {
            panic!("expected presence event");
        };
        assert_eq!(user_id, 3);
        assert_eq!(username, "bob");
        assert_eq!(status, PresenceStatus::Online);
        assert!(timestamp.is_some());
    }

    #[test]
    fn error_frame_reads_error_field() {
        let event = decode_inbound(r#"{"type":"error","error":"This chat is read-only"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::ServerError {
                message: "This chat is read-only".into()
            }
        );
    }

    #[test]
    fn untyped_error_object_is_a_server_error() {
        let event = decode_inbound(r#"{"error":"Invalid JSON format"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::ServerError {
                message: "Invalid JSON format".into()
            }
        );
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let event = decode_inbound(r#"{"type":"room_archived","room":"r1"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Unknown {
                kind: "room_archived".into()
            }
        );
        assert_eq!(event.kind(), "room_archived");
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(decode_inbound("not json"), Err(ProtocolError::InvalidJson(_))));
        assert!(matches!(decode_inbound("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(decode_inbound(r#"{"foo":1}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(decode_inbound(r#"{"type":5}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(
            decode_inbound(r#"{"type":"message_deleted"}"#),
            Err(ProtocolError::InvalidBody { .. })
        ));
    }

    #[test]
    fn outbound_commands_use_server_tags() {
        let send = encode_outbound(&OutboundCommand::SendMessage {
            content: "hello".into(),
            message_type: MessageKind::Text,
            reply_to: None,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&send).unwrap();
        assert_eq!(
            value,
            json!({"type": "send_message", "content": "hello", "message_type": "text"})
        );

        let typing = encode_outbound(&OutboundCommand::SetTyping { is_typing: true }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&typing).unwrap();
        assert_eq!(value, json!({"type": "typing", "is_typing": true}));

        let read = encode_outbound(&OutboundCommand::MarkRead {
            message_id: "m9".into(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&read).unwrap();
        assert_eq!(value, json!({"type": "mark_as_read", "message_id": "m9"}));
    }

    #[test]
    fn reply_to_is_sent_when_present() {
        let frame = encode_outbound(&OutboundCommand::SendMessage {
            content: "re".into(),
            message_type: MessageKind::Text,
            reply_to: Some("m1".into()),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["reply_to"], json!("m1"));
    }

    #[test]
    fn close_codes_are_described() {
        assert_eq!(describe_close_code(CLOSE_FORBIDDEN), "forbidden");
        assert_eq!(describe_close_code(4999), "unexpected close");
    }
}
