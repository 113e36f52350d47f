//! Typing indicators and online status per room.

use chrono::{DateTime, Utc};
use crmchat_shared::{PresenceStatus, UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct TypingUser {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnlineUser {
    pub user_id: UserId,
    pub username: String,
    pub status: PresenceStatus,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoomPresence {
    pub typing: Vec<TypingUser>,
    pub online: Vec<OnlineUser>,
}

impl RoomPresence {
    /// Add the user while typing, remove them when they stop.
    pub fn set_typing(&mut self, user_id: UserId, username: &str, is_typing: bool) {
        let existing = self.typing.iter().position(|u| u.user_id == user_id);
        match (is_typing, existing) {
            (true, None) => self.typing.push(TypingUser {
                user_id,
                username: username.to_string(),
            }),
            (false, Some(index)) => {
                self.typing.remove(index);
            }
            _ => {}
        }
    }

    /// Insert or replace the user's status.
    pub fn set_status(&mut self, user: OnlineUser) {
        match self.online.iter_mut().find(|u| u.user_id == user.user_id) {
            Some(existing) => *existing = user,
            None => self.online.push(user),
        }
    }

    /// Get status for a user, defaulting to Offline if not found
    pub fn status_of(&self, user_id: UserId) -> PresenceStatus {
        self.online
            .iter()
            .find(|u| u.user_id == user_id)
            .map(|u| u.status)
            .unwrap_or(PresenceStatus::Offline)
    }

    pub fn typing_names(&self) -> Vec<&str> {
        self.typing.iter().map(|u| u.username.as_str()).collect()
    }
}
