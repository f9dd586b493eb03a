use crate::bot::state::State;
use crate::bot::views;
use anyhow::{anyhow, Result};
use teloxide::{dispatching::dialogue::InMemStorage, prelude::*, utils::command::BotCommands};
use tracing::{debug, info};

/// Dialogue handle for the transport state machine.
pub type ChatDialogue = Dialogue<State, InMemStorage<State>>;

/// Commands registered with the dispatcher
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Enter the voice conversation scene
    #[command(description = "Start a voice conversation.")]
    Audio,
    /// Reserved for image generation
    #[command(description = "Reserved.")]
    Image,
}

// Helper function to get the sender's visible name from a Message
fn visible_name(msg: &Message) -> Option<String> {
    let user = msg.from.as_ref()?;
    if let Some(ref username) = user.username {
        return Some(username.clone());
    }
    // first_name is String, not Option<String>
    if !user.first_name.is_empty() {
        return Some(user.first_name.clone());
    }
    None
}

/// Display name of the sender: username, first name or "Unknown".
#[must_use]
pub fn display_name(msg: &Message) -> String {
    visible_name(msg).unwrap_or_else(|| "Unknown".to_string())
}

/// Sender's Telegram user ID, if the message carries one.
#[must_use]
pub fn sender_id(msg: &Message) -> Option<String> {
    msg.from.as_ref().map(|u| u.id.0.to_string())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    info!("User {} initiated /start command.", display_name(&msg));

    let text = views::welcome_text(visible_name(&msg).as_deref());
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Voice scene entry handler
///
/// The scene's internal flow lives outside the transport; this handler
/// only performs the transition into it.
///
/// # Errors
///
/// Returns an error if the dialogue state cannot be updated.
pub async fn audio(msg: Message, dialogue: ChatDialogue) -> Result<()> {
    info!("User {} entered the voice conversation scene.", display_name(&msg));

    dialogue
        .update(State::ChatVoice)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Image command handler
///
/// Registered without behavior: the command is accepted and produces no
/// reply.
///
/// # Errors
///
/// Never fails.
pub async fn image(msg: Message) -> Result<()> {
    debug!("Ignoring /image from user {}", display_name(&msg));
    Ok(())
}
