//! Telegram dispatch schema and delegation pipeline.
//!
//! The schema routes every message update either to a registered command
//! handler or to the delegation pipeline, which forwards the message to
//! the [`MessageManager`] collaborator (registering the sender with the
//! trader backend first, when trader mode is enabled).

use crate::bot::backend::RecommenderRegistry;
use crate::bot::handlers::{self, ChatDialogue, Command};
use crate::bot::manager::MessageManager;
use crate::bot::state::State;
use crate::bot::views;
use crate::config::BackendSettings;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{error, warn};

/// Shared dependencies injected into every endpoint.
pub struct DelegationContext {
    /// Trader-backend settings resolved at client construction.
    pub settings: BackendSettings,
    /// Recommender registry used in trader mode.
    pub registry: Arc<dyn RecommenderRegistry>,
    /// Message-handling collaborator.
    pub manager: Arc<dyn MessageManager>,
}

/// Outcome of delegating one inbound message.
pub enum DelegationOutcome {
    /// The message manager handled the message.
    Completed,
    /// Trader mode requires a sender ID and none was present; the
    /// message was dropped without replies.
    SenderUnknown,
    /// The message manager failed; the user should receive a generic
    /// failure notice.
    Failed(anyhow::Error),
}

/// Build the update-handling schema for the dispatcher.
///
/// Commands are matched first; every other message falls through to the
/// delegation endpoint.
#[must_use]
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().branch(
        Update::filter_message()
            .enter_dialogue::<Message, InMemStorage<State>, State>()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(dptree::endpoint(handle_message)),
    )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: ChatDialogue,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot.clone(), msg.clone()).await,
        Command::Audio => handlers::audio(msg.clone(), dialogue).await,
        Command::Image => handlers::image(msg.clone()).await,
    };
    if let Err(e) = res {
        error!("Telegram error for message update: {e}");
        send_failure_notice(&bot, msg.chat.id, views::UNEXPECTED_ERROR_TEXT).await;
    }
    respond(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    context: Arc<DelegationContext>,
) -> Result<(), teloxide::RequestError> {
    match run_delegation(&bot, &context, &msg).await {
        DelegationOutcome::Completed | DelegationOutcome::SenderUnknown => {}
        DelegationOutcome::Failed(e) => {
            error!("Error handling message: {e}");
            send_failure_notice(&bot, msg.chat.id, views::PROCESSING_ERROR_TEXT).await;
        }
    }
    respond(())
}

async fn send_failure_notice(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot.send_message(chat_id, text).await {
        error!("Failed to send failure notice: {e}");
    }
}

/// Delegate one inbound message to the collaborators.
///
/// In trader mode the sender is registered with the recommender backend
/// before the message manager runs; registration failures are logged and
/// never block delegation.
pub async fn run_delegation(
    bot: &Bot,
    context: &DelegationContext,
    msg: &Message,
) -> DelegationOutcome {
    if context.settings.trader_mode {
        let Some(user_id) = handlers::sender_id(msg) else {
            warn!("Received message from a user without an ID.");
            return DelegationOutcome::SenderUnknown;
        };
        let username = handlers::display_name(msg);

        if let (Some(url), Some(token)) = (
            &context.settings.backend_url,
            &context.settings.backend_token,
        ) {
            if let Err(e) = context
                .registry
                .get_or_create_recommender(&user_id, &username, token, url)
                .await
            {
                error!("Error getting or creating recommender in backend: {e}");
            }
        } else {
            warn!("Trader mode is enabled but the backend URL or token is not configured.");
        }
    }

    match context.manager.handle_message(bot, msg).await {
        Ok(()) => DelegationOutcome::Completed,
        Err(e) => DelegationOutcome::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::{run_delegation, schema, DelegationContext, DelegationOutcome};
    use crate::bot::backend::{BackendError, MockRecommenderRegistry};
    use crate::bot::manager::MockMessageManager;
    use crate::config::BackendSettings;
    use mockall::Sequence;
    use std::sync::Arc;
    use teloxide::prelude::*;

    fn trader_settings() -> BackendSettings {
        BackendSettings {
            backend_url: Some("https://backend.example".to_string()),
            backend_token: Some("secret".to_string()),
            trader_mode: true,
        }
    }

    fn message(from: serde_json::Value) -> Message {
        let mut value = serde_json::json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": {"id": 42, "type": "private"},
            "text": "what is the plan?",
        });
        if !from.is_null() {
            value["from"] = from;
        }
        serde_json::from_value(value).expect("valid message JSON")
    }

    fn ada() -> serde_json::Value {
        serde_json::json!({"id": 7, "is_bot": false, "first_name": "Ada", "username": "ada_l"})
    }

    fn context(
        settings: BackendSettings,
        registry: MockRecommenderRegistry,
        manager: MockMessageManager,
    ) -> DelegationContext {
        DelegationContext {
            settings,
            registry: Arc::new(registry),
            manager: Arc::new(manager),
        }
    }

    fn offline_bot() -> Bot {
        Bot::new("123456:TEST")
    }

    #[test]
    fn test_schema_builds() {
        let _ = schema();
    }

    #[tokio::test]
    async fn test_trader_mode_registers_before_delegating() {
        let mut seq = Sequence::new();

        let mut registry = MockRecommenderRegistry::new();
        registry
            .expect_get_or_create_recommender()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|user_id, username, token, url| {
                user_id == "7"
                    && username == "ada_l"
                    && token == "secret"
                    && url == "https://backend.example"
            })
            .returning(|_, _, _, _| Ok(()));

        let mut manager = MockMessageManager::new();
        manager
            .expect_handle_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let ctx = context(trader_settings(), registry, manager);
        let outcome = run_delegation(&offline_bot(), &ctx, &message(ada())).await;
        assert!(matches!(outcome, DelegationOutcome::Completed));
    }

    #[tokio::test]
    async fn test_trader_disabled_skips_registration() {
        let mut registry = MockRecommenderRegistry::new();
        registry.expect_get_or_create_recommender().times(0);

        let mut manager = MockMessageManager::new();
        manager
            .expect_handle_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let settings = BackendSettings {
            trader_mode: false,
            ..trader_settings()
        };
        let ctx = context(settings, registry, manager);
        let outcome = run_delegation(&offline_bot(), &ctx, &message(ada())).await;
        assert!(matches!(outcome, DelegationOutcome::Completed));
    }

    #[tokio::test]
    async fn test_missing_sender_aborts_delegation() {
        let mut registry = MockRecommenderRegistry::new();
        registry.expect_get_or_create_recommender().times(0);

        let mut manager = MockMessageManager::new();
        manager.expect_handle_message().times(0);

        let ctx = context(trader_settings(), registry, manager);
        let outcome = run_delegation(&offline_bot(), &ctx, &message(serde_json::Value::Null)).await;
        assert!(matches!(outcome, DelegationOutcome::SenderUnknown));
    }

    #[tokio::test]
    async fn test_registration_failure_does_not_block_delegation() {
        let mut registry = MockRecommenderRegistry::new();
        registry
            .expect_get_or_create_recommender()
            .times(1)
            .returning(|_, _, _, _| Err(BackendError::Api("500 - boom".to_string())));

        let mut manager = MockMessageManager::new();
        manager
            .expect_handle_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let ctx = context(trader_settings(), registry, manager);
        let outcome = run_delegation(&offline_bot(), &ctx, &message(ada())).await;
        assert!(matches!(outcome, DelegationOutcome::Completed));
    }

    #[tokio::test]
    async fn test_unconfigured_backend_skips_registration() {
        let mut registry = MockRecommenderRegistry::new();
        registry.expect_get_or_create_recommender().times(0);

        let mut manager = MockMessageManager::new();
        manager
            .expect_handle_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let settings = BackendSettings {
            backend_url: None,
            backend_token: None,
            trader_mode: true,
        };
        let ctx = context(settings, registry, manager);
        let outcome = run_delegation(&offline_bot(), &ctx, &message(ada())).await;
        assert!(matches!(outcome, DelegationOutcome::Completed));
    }

    #[tokio::test]
    async fn test_manager_failure_yields_failed_outcome() {
        let registry = MockRecommenderRegistry::new();

        let mut manager = MockMessageManager::new();
        manager
            .expect_handle_message()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("manager exploded")));

        let settings = BackendSettings {
            trader_mode: false,
            ..BackendSettings::default()
        };
        let ctx = context(settings, registry, manager);
        let outcome = run_delegation(&offline_bot(), &ctx, &message(ada())).await;
        match outcome {
            DelegationOutcome::Failed(e) => assert!(e.to_string().contains("manager exploded")),
            _ => panic!("expected a failed delegation"),
        }
    }

    #[tokio::test]
    async fn test_display_name_falls_back_for_registration() {
        let mut registry = MockRecommenderRegistry::new();
        registry
            .expect_get_or_create_recommender()
            .times(1)
            .withf(|user_id, username, _, _| user_id == "8" && username == "Bob")
            .returning(|_, _, _, _| Ok(()));

        let mut manager = MockMessageManager::new();
        manager
            .expect_handle_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let bob = serde_json::json!({"id": 8, "is_bot": false, "first_name": "Bob"});
        let ctx = context(trader_settings(), registry, manager);
        let outcome = run_delegation(&offline_bot(), &ctx, &message(bob)).await;
        assert!(matches!(outcome, DelegationOutcome::Completed));
    }
}
