//! Requester side of the control channel
//!
//! Provides:
//! - Dialing the assigner and requesting publisher names
//! - Recording a random channel through the relay

pub mod config;
pub mod recorder;
pub mod requester;

pub use config::ClientConfig;
pub use recorder::{record_random_channel, Recording};
pub use requester::ControlClient;
