//! Control plane for relaying random live-TV channels through a MoQ relay
//!
//! A requester picks a random channel from a locally mirrored catalog and
//! asks an assigner, over QUIC, to publish it. The assigner answers with a
//! unique publisher name (`pub0`, `pub1`, ...) and starts an external
//! publish pipeline under that name; the requester then records the
//! publisher from the relay.
//!
//! # Modules
//!
//! - [`catalog`]: channel metadata, playlist refresh, random selection
//! - [`protocol`]: control channel constants and payloads
//! - [`server`]: the assigner (accept loop, name assignment)
//! - [`client`]: the requester (dial, request, record)
//! - [`pipeline`]: external command construction and readiness waits
//! - [`registry`]: launching and terminating external processes
//! - [`shutdown`]: coordinated shutdown on signal

pub mod catalog;
pub mod client;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod stats;
pub mod tls;

pub use client::{ClientConfig, ControlClient};
pub use error::{Error, Result};
pub use server::{AssignerServer, ServerConfig};
pub use shutdown::ShutdownCoordinator;
