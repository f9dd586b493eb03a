#![deny(missing_docs)]
//! Fable Agent runtime helpers.
//!
//! Provides the transport-agnostic seams between the agent runtime and its
//! transports.

/// Runtime settings access.
pub mod settings;

pub use settings::{AgentRuntime, EnvRuntime};
