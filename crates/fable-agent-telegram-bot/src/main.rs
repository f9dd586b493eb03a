use async_trait::async_trait;
use dotenvy::dotenv;
use fable_agent_runtime::EnvRuntime;
use fable_agent_transport_telegram::bot::{MessageManager, TelegramClient};
use fable_agent_transport_telegram::config::TelegramSettings;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Scrubs secrets out of log lines before they reach the terminal.
///
/// Rules are applied in order; each pair is a pattern and its
/// replacement text.
struct LogSanitizer {
    rules: Vec<(Regex, &'static str)>,
}

impl LogSanitizer {
    /// Compile the sanitizer rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    fn new() -> Result<Self, regex::Error> {
        let rules = vec![
            (
                Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
                "$1[TELEGRAM_TOKEN]$3",
            ),
            (
                Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
                "[TELEGRAM_TOKEN]",
            ),
            (
                Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
                "$1[TELEGRAM_TOKEN]",
            ),
            (
                Regex::new(r"BACKEND_TOKEN=[^\s&]+")?,
                "BACKEND_TOKEN=[MASKED]",
            ),
            (
                Regex::new(r"(?i)(authorization: ?bearer )\S+")?,
                "$1[MASKED]",
            ),
        ];
        Ok(Self { rules })
    }

    fn scrub(&self, input: &str) -> String {
        let mut output = input.to_string();
        for (pattern, replacement) in &self.rules {
            output = pattern.replace_all(&output, *replacement).into_owned();
        }
        output
    }
}

struct SanitizingWriter<W: Write> {
    inner: W,
    sanitizer: Arc<LogSanitizer>,
}

impl<W: Write> SanitizingWriter<W> {
    const fn new(inner: W, sanitizer: Arc<LogSanitizer>) -> Self {
        Self { inner, sanitizer }
    }
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        self.inner.write_all(self.sanitizer.scrub(&line).as_bytes())?;
        // The contract wants the consumed input length; the scrubbed
        // output may be shorter or longer than the input.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Demo message manager: echoes text messages back to the sender.
struct EchoManager;

#[async_trait]
impl MessageManager for EchoManager {
    async fn handle_message(&self, bot: &Bot, msg: &Message) -> anyhow::Result<()> {
        let reply = match msg.text() {
            Some(text) => format!("You said: {text}"),
            None => "I can only read text messages for now.".to_string(),
        };
        bot.send_message(msg.chat.id, reply).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Sanitizer rules must compile before any logging is set up.
    let sanitizer = match LogSanitizer::new() {
        Ok(sanitizer) => Arc::new(sanitizer),
        Err(e) => {
            eprintln!("Failed to compile log sanitizer rules: {e}");
            std::process::exit(1);
        }
    };
    init_logging(sanitizer);

    info!("Starting Fable Agent Telegram Bot...");

    let settings = init_settings();
    let runtime = EnvRuntime::new();

    let client = TelegramClient::new(&settings.telegram_token, &runtime, Arc::new(EchoManager));
    if let Err(e) = client.start().await {
        error!("Failed to start Telegram bot: {e}");
        std::process::exit(1);
    }

    client.wait_until_stopped().await;
}

fn init_logging(sanitizer: Arc<LogSanitizer>) {
    let make_writer = move || SanitizingWriter::new(io::stderr(), Arc::clone(&sanitizer));

    // DEBUG_MODE switches the whole process to verbose logging.
    let debug_mode = std::env::var("DEBUG_MODE").is_ok_and(|v| v == "true" || v == "1");

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "fable_agent_runtime=info,fable_agent_transport_telegram=info,fable_agent_telegram_bot=info,teloxide=warn,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> TelegramSettings {
    match TelegramSettings::new() {
        Ok(settings) => {
            info!("Configuration loaded successfully.");
            settings
        }
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    }
}
