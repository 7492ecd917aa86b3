//! `Greeter` service: identity resolution.
pub mod client;
pub mod server;
pub mod types;
pub use types::*;
