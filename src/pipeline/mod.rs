//! External media pipelines
//!
//! This module provides:
//! - Argument-vector pipeline commands (no shell)
//! - Publish, subscribe and relay command builders
//! - Readiness waiting before subscribing

pub mod command;
pub mod readiness;

pub use command::{recording_path, MediaTools, PipelineCommand, Stage};
pub use readiness::{
    CommandProbe, Readiness, ReadinessProbe, ReadyOutcome, DEFAULT_SUBSCRIBE_DELAY,
};
