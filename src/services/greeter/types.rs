//! Type definitions for the service.
use serde::{Deserialize, Serialize};

/// Method name of `SayHello` on the wire.
pub const SAY_HELLO: &str = "Greeter.SayHello";

/// Fixed part of every greeting; the resolved name follows it.
pub const GREETING_PREFIX: &str = "Hello, ";

/// Request for a greeting.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdentityRequest {
    pub id: String,
}

impl IdentityRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Greeting for a resolved (or unresolved) identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdentityReply {
    pub message: String,
}

impl IdentityReply {
    /// Builds `"Hello, {name}"`. An empty name is a valid, unresolved greeting.
    pub fn greeting(name: &str) -> Self {
        Self {
            message: format!("{GREETING_PREFIX}{name}"),
        }
    }

    /// The display name carried by the greeting.
    pub fn name(&self) -> &str {
        self.message
            .strip_prefix(GREETING_PREFIX)
            .unwrap_or(&self.message)
    }

    pub fn is_resolved(&self) -> bool {
        !self.name().is_empty()
    }
}
