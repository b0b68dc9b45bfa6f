//! message-catalog: a fixed-width message server.
//!
//! Clients send a 5-byte request naming a message by 1-based index (0 for a
//! random one) plus a keep-alive flag, and receive a length-prefixed,
//! 150-character `STATUS|payload` line.
//!
//! - `catalog`: immutable, shared message store
//! - `codec`: request/response wire format
//! - `connection`: per-connection request/response state machine
//! - `server`: listener that spawns one task per connection
//! - `client`: async client used by the CLI and tests
//! - `config`: CLI and TOML configuration

pub mod catalog;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod server;
