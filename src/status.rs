//! Wire-level error values returned by RPC methods.
//!
//! A [`Status`] travels inside an [`RpcResponse`](crate::RpcResponse) so the
//! caller sees the class of a failure as well as its text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure class carried by a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    /// The caller supplied input that failed validation.
    InvalidArgument,
    /// No handler is registered under the requested method name.
    Unimplemented,
    /// The server failed while producing a response.
    Internal,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::InvalidArgument => "InvalidArgument",
            Code::Unimplemented => "Unimplemented",
            Code::Internal => "Internal",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let status = Status::invalid_argument("user must not be empty");
        assert_eq!(status.to_string(), "InvalidArgument: user must not be empty");
    }

    #[test]
    fn constructors_set_expected_codes() {
        assert_eq!(Status::invalid_argument("x").code(), Code::InvalidArgument);
        assert_eq!(Status::unimplemented("x").code(), Code::Unimplemented);
        assert_eq!(Status::internal("x").code(), Code::Internal);
    }

    #[test]
    fn status_survives_bincode() {
        let status = Status::unimplemented("unknown method: Nope.Nope");
        let bytes = bincode::serialize(&status).unwrap();
        let decoded: Status = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, status);
        assert_eq!(decoded.message(), "unknown method: Nope.Nope");
    }
}
