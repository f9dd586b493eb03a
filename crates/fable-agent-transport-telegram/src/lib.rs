#![deny(missing_docs)]
//! Telegram transport adapter for Fable Agent.

/// Telegram-specific bot/transport implementation.
pub mod bot;
/// Telegram transport configuration.
pub mod config;
/// Telegram dispatch schema and delegation pipeline.
pub mod runner;
