//! Typed surfaces of the RPC services: request/response types, a handler
//! trait to implement, a server that registers the handler's methods and a
//! client that calls them.

pub mod chat;
pub mod greeter;
