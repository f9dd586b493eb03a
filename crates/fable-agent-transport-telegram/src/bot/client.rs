//! Transport lifecycle client.
//!
//! Owns the long-lived Telegram connection: token verification, dispatcher
//! startup, and coordinated shutdown on process signals or an explicit
//! `stop` call.

use crate::bot::backend::{HttpRecommenderRegistry, RecommenderRegistry};
use crate::bot::manager::MessageManager;
use crate::bot::state::State;
use crate::config::BackendSettings;
use crate::runner::{self, DelegationContext};
use fable_agent_runtime::AgentRuntime;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::ShutdownToken;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::Me;
use teloxide::update_listeners::Polling;
use thiserror::Error;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors surfaced by the transport lifecycle
#[derive(Error, Debug)]
pub enum ClientError {
    /// The bot could not be launched against the Telegram API
    #[error("Failed to launch Telegram bot: {0}")]
    Startup(#[from] teloxide::RequestError),
    /// `start` was called more than once on the same client
    #[error("Telegram bot has already been started")]
    AlreadyStarted,
    /// `stop` was called before a successful `start`
    #[error("Telegram bot has not been started")]
    NotStarted,
}

enum Lifecycle {
    Unstarted,
    Starting,
    Running {
        shutdown: ShutdownToken,
        dispatch: JoinHandle<()>,
    },
    Stopping,
    Stopped,
}

struct ClientInner {
    identity: OnceLock<Me>,
    lifecycle: Mutex<Lifecycle>,
    stopped: CancellationToken,
}

/// Long-lived Telegram transport client.
///
/// Wires the dispatcher to the message manager and, in trader mode, the
/// recommender registry; caches the bot identity after startup and
/// coordinates shutdown across process signals and explicit `stop` calls.
pub struct TelegramClient {
    bot: Bot,
    context: Arc<DelegationContext>,
    inner: Arc<ClientInner>,
}

impl TelegramClient {
    /// Construct a new client.
    ///
    /// The trader-backend settings are read from the runtime here, once;
    /// the transport never re-reads them while running.
    #[must_use]
    pub fn new(
        bot_token: &str,
        runtime: &dyn AgentRuntime,
        message_manager: Arc<dyn MessageManager>,
    ) -> Self {
        info!("Constructing new TelegramClient...");
        let settings = BackendSettings::from_runtime(runtime);
        let context = DelegationContext {
            settings,
            registry: Arc::new(HttpRecommenderRegistry::new()),
            manager: message_manager,
        };

        Self {
            bot: Bot::new(bot_token),
            context: Arc::new(context),
            inner: Arc::new(ClientInner {
                identity: OnceLock::new(),
                lifecycle: Mutex::new(Lifecycle::Unstarted),
                stopped: CancellationToken::new(),
            }),
        }
    }

    /// Replace the recommender registry used in trader mode.
    #[must_use]
    pub fn with_recommender_registry(mut self, registry: Arc<dyn RecommenderRegistry>) -> Self {
        self.context = Arc::new(DelegationContext {
            settings: self.context.settings.clone(),
            registry,
            manager: Arc::clone(&self.context.manager),
        });
        self
    }

    /// Start the Telegram bot.
    ///
    /// Verifies the token against the Telegram API, registers all command
    /// and message handlers, and begins polling with pending updates
    /// dropped. On failure the client returns to its unstarted state and
    /// the transport error is propagated; there is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyStarted`] unless this is the first
    /// `start` call, or [`ClientError::Startup`] if the Telegram API
    /// cannot be reached with the configured token.
    pub async fn start(&self) -> Result<(), ClientError> {
        info!("Starting Telegram bot...");
        {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            if !matches!(*lifecycle, Lifecycle::Unstarted) {
                return Err(ClientError::AlreadyStarted);
            }
            *lifecycle = Lifecycle::Starting;
        }

        let me = match self.bot.get_me().await {
            Ok(me) => me,
            Err(e) => {
                error!("Failed to launch Telegram bot: {e}");
                *self.inner.lifecycle.lock().await = Lifecycle::Unstarted;
                return Err(ClientError::Startup(e));
            }
        };
        info!("Bot username: @{}", me.username());
        let _ = self.inner.identity.set(me);

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), runner::schema())
            .dependencies(dptree::deps![
                Arc::clone(&self.context),
                InMemStorage::<State>::new()
            ])
            .default_handler(|upd| async move {
                debug!("Unhandled update: {:?}", upd.kind);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .build();
        let shutdown = dispatcher.shutdown_token();

        // Long polling with the 10s timeout the default listener uses;
        // an active webhook would otherwise make getUpdates fail.
        let listener = Polling::builder(self.bot.clone())
            .timeout(Duration::from_secs(10))
            .drop_pending_updates()
            .delete_webhook()
            .await
            .build();

        let dispatch = tokio::spawn(async move {
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
            debug!("Dispatch loop finished.");
        });

        *self.inner.lifecycle.lock().await = Lifecycle::Running { shutdown, dispatch };
        tokio::spawn(watch_signals(Arc::clone(&self.inner)));

        info!("Telegram bot successfully launched and is running!");
        Ok(())
    }

    /// Stop the Telegram bot.
    ///
    /// Requests dispatcher shutdown and waits for the dispatch loop to
    /// finish. Stopping an already stopped client is a no-op; in-flight
    /// updates may be abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotStarted`] if the client never started.
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.inner.stop().await
    }

    /// Bot identity fetched during startup, if the client has started.
    #[must_use]
    pub fn identity(&self) -> Option<&Me> {
        self.inner.identity.get()
    }

    /// Wait until the bot has fully stopped.
    pub async fn wait_until_stopped(&self) {
        self.inner.stopped.cancelled().await;
    }
}

impl ClientInner {
    async fn stop(&self) -> Result<(), ClientError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopping) {
            Lifecycle::Running { shutdown, dispatch } => {
                info!("Stopping Telegram bot...");
                match shutdown.shutdown() {
                    Ok(wait) => wait.await,
                    // The dispatcher stops on its own when the listener ends first.
                    Err(e) => debug!("Dispatcher was already idle: {e}"),
                }
                if let Err(e) = dispatch.await {
                    warn!("Dispatch task ended abnormally: {e}");
                }
                *lifecycle = Lifecycle::Stopped;
                self.stopped.cancel();
                info!("Telegram bot stopped");
                Ok(())
            }
            state @ (Lifecycle::Unstarted | Lifecycle::Starting) => {
                *lifecycle = state;
                Err(ClientError::NotStarted)
            }
            state => {
                *lifecycle = state;
                debug!("Telegram bot is already stopped.");
                Ok(())
            }
        }
    }
}

/// Waits for the first termination signal and stops the client.
///
/// Subscribes to SIGINT, SIGTERM and SIGHUP exactly once. Signals that
/// arrive after shutdown has begun are absorbed by the runtime's signal
/// infrastructure rather than crashing the process.
async fn watch_signals(inner: Arc<ClientInner>) {
    let (Some(mut sigint), Some(mut sigterm), Some(mut sighup)) = (
        subscribe(SignalKind::interrupt(), "SIGINT"),
        subscribe(SignalKind::terminate(), "SIGTERM"),
        subscribe(SignalKind::hangup(), "SIGHUP"),
    ) else {
        return;
    };

    let stopped = inner.stopped.clone();
    run_signal_watch(
        async move {
            sigint.recv().await;
        },
        async move {
            sigterm.recv().await;
        },
        async move {
            sighup.recv().await;
        },
        stopped,
        move |_| async move { inner.stop().await },
    )
    .await;
}

/// Select-and-stop core of the signal watcher.
///
/// Resolves on the first of the three signal futures and invokes `stop`
/// exactly once, or exits without stopping when `stopped` is cancelled
/// first (explicit `stop` call won the race).
async fn run_signal_watch<I, T, H, S, Fut>(
    sigint: I,
    sigterm: T,
    sighup: H,
    stopped: CancellationToken,
    stop: S,
) where
    I: Future<Output = ()>,
    T: Future<Output = ()>,
    H: Future<Output = ()>,
    S: FnOnce(&'static str) -> Fut,
    Fut: Future<Output = Result<(), ClientError>>,
{
    let name = tokio::select! {
        () = sigint => "SIGINT",
        () = sigterm => "SIGTERM",
        () = sighup => "SIGHUP",
        () = stopped.cancelled() => return,
    };

    info!("Received {name}. Shutting down Telegram bot gracefully...");
    match stop(name).await {
        Ok(()) => info!("Telegram bot stopped gracefully"),
        Err(e) => error!("Error during Telegram bot shutdown: {e}"),
    }
}

fn subscribe(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            error!("Failed to install {name} handler: {e}");
            None
        }
    }
}
