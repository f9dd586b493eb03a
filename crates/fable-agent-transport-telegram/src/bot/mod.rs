/// Recommender registration client for the trader backend.
pub mod backend;
/// Transport lifecycle client (startup, shutdown, signal coordination).
pub mod client;
/// General command and message handlers.
pub mod handlers;
/// Delegation seam for inbound messages.
pub mod manager;
/// User state and dialogue management.
pub mod state;
/// View layer for user-visible reply texts.
pub mod views;

pub use backend::{BackendError, HttpRecommenderRegistry, RecommenderRegistry};
pub use client::{ClientError, TelegramClient};
pub use manager::MessageManager;
