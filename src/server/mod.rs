//! Assigner server
//!
//! Accepts QUIC connections from requesters, answers each publish request
//! with a fresh publisher name and starts the matching publish pipeline.

pub mod assigner;
pub mod config;
pub mod exchange;
pub mod listener;

pub use assigner::PublisherAssigner;
pub use config::ServerConfig;
pub use exchange::{handle_exchange, read_message, write_message, Exchange};
pub use listener::{AssignerServer, RELAY_KEY};
