//! Type definitions for the service.
use serde::{Deserialize, Serialize};

/// Method name of `Join` on the wire.
pub const JOIN: &str = "Chat.Join";

/// Method name of `Send` on the wire.
pub const SEND: &str = "Chat.Send";

/// A chat line. Used as both request and response of `Join` and `Send`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
        }
    }

    /// Both `user` and `text` are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.user.is_empty() && !self.text.is_empty()
    }
}
