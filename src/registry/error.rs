//! Registry error types
//!
//! Errors for launching and terminating managed processes.

use std::ffi::OsString;
use std::io;

use thiserror::Error;

/// An external pipeline could not be started
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Pipeline has no stages
    #[error("pipeline {key} has no stages")]
    EmptyPipeline { key: String },

    /// A stage failed to spawn
    #[error("failed to spawn {program:?} for {key}: {source}")]
    Spawn {
        key: String,
        program: OsString,
        #[source]
        source: io::Error,
    },

    /// Output of one stage could not be connected to the next
    #[error("failed to connect stages of {key}: {source}")]
    Pipe {
        key: String,
        #[source]
        source: io::Error,
    },

    /// A process is already registered under this key
    #[error("process already registered under {0}")]
    DuplicateKey(String),
}

/// A tracked process could not be killed
#[derive(Debug, Error)]
#[error("failed to terminate {key}: {source}")]
pub struct TerminationError {
    pub key: String,
    #[source]
    pub source: io::Error,
}
