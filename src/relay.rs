//! Chat relay: validates a chat line and hands it back unchanged.

use async_trait::async_trait;
use std::fmt;
use tracing::{info, warn};

use crate::services::chat::{server::ChatHandler, ChatMessage};
use crate::Status;

/// Entry point a message arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOp {
    Join,
    Send,
}

impl RelayOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOp::Join => "join",
            RelayOp::Send => "send",
        }
    }
}

impl fmt::Display for RelayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks that `user` and `text` are both present.
///
/// The status message names every empty field.
pub fn validate(message: &ChatMessage) -> Result<(), Status> {
    let mut problems = Vec::new();
    if message.user.is_empty() {
        problems.push("user must not be empty");
    }
    if message.text.is_empty() {
        problems.push("text must not be empty");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Status::invalid_argument(problems.join("; ")))
    }
}

/// `Chat` handler. Stateless, so clones and concurrent calls are free.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatRelay;

impl ChatRelay {
    pub fn new() -> Self {
        Self
    }

    /// Shared body of `Join` and `Send`: log, validate, echo.
    pub fn relay(&self, op: RelayOp, message: ChatMessage) -> Result<ChatMessage, Status> {
        info!(op = %op, user = %message.user, text = %message.text, "[Message]");

        if let Err(status) = validate(&message) {
            warn!(op = %op, reason = %status.message(), "rejected chat message");
            return Err(status);
        }
        Ok(message)
    }
}

#[async_trait]
impl ChatHandler for ChatRelay {
    async fn join(&self, request: ChatMessage) -> Result<ChatMessage, Status> {
        self.relay(RelayOp::Join, request)
    }

    async fn send(&self, request: ChatMessage) -> Result<ChatMessage, Status> {
        self.relay(RelayOp::Send, request)
    }
}
