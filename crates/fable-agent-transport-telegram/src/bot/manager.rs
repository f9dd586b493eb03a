//! Delegation seam for inbound messages.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;

/// Interface for message-handling collaborators.
///
/// The transport forwards every non-command message here. The
/// implementation owns response generation and may send any number of
/// replies through the provided bot handle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageManager: Send + Sync {
    /// Handle a single inbound message.
    ///
    /// # Errors
    ///
    /// Returns an error when the message could not be handled; the
    /// transport answers the user with a generic failure notice.
    async fn handle_message(&self, bot: &Bot, msg: &Message) -> Result<()>;
}
