//! `Chat` service: message relay.
pub mod client;
pub mod server;
pub mod types;
pub use types::*;
