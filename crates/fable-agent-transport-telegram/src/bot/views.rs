//! User-visible reply texts.

/// Reply sent when message delegation fails.
pub const PROCESSING_ERROR_TEXT: &str = "An error occurred while processing your message.";

/// Reply sent when a command handler fails.
pub const UNEXPECTED_ERROR_TEXT: &str = "An unexpected error occurred. Please try again later.";

/// Greeting sent in response to the /start command.
///
/// Personalised with the sender's visible name when one is available.
#[must_use]
pub fn welcome_text(name: Option<&str>) -> String {
    let headline = match name {
        Some(name) => format!("🤖 *Welcome {name}!*"),
        None => "🤖 *Welcome!*".to_string(),
    };
    format!(
        "{headline}\n\n\
         I am your AI assistant bot.\n\n\
         Commands:\n\
         - /help - Show all commands\n\
         - /start - Start conversation\n\
         - /info - Show information\n\
         - /new - Create new Character\n\
         - /characters - Show All your character\n\n\
         Send me a message to begin!"
    )
}

#[cfg(test)]
mod tests {
    use super::welcome_text;

    #[test]
    fn test_welcome_is_personalised() {
        let text = welcome_text(Some("Ada"));
        assert!(text.contains("Welcome Ada!"));
    }

    #[test]
    fn test_welcome_falls_back_to_generic_greeting() {
        let text = welcome_text(None);
        assert!(text.contains("Welcome!"));
        assert!(!text.contains("Welcome !"));
    }

    #[test]
    fn test_welcome_lists_all_commands() {
        let text = welcome_text(Some("Ada"));
        for command in ["/help", "/start", "/info", "/new", "/characters"] {
            assert!(text.contains(command), "missing {command}");
        }
        assert!(text.contains("Show All your character"));
        assert!(text.contains("Send me a message to begin!"));
    }
}
