//! DebAI application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the employee directory (SQLite)
//! 3. Pick the completion service and the mail transport
//! 4. Build the chat orchestrator
//! 5. Serve the REST API, or chat in the terminal with `--chat`

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use debai_action::completion::{
    CompletionService, KeywordRouter, OpenAiCompatible, RetryingCompletion,
};
use debai_action::handler::{
    ActionDispatcher, EmailSender, FileRenderer, OutboxMailer, SmtpMailer, SqliteDirectory,
};
use debai_api::routes;
use debai_api::state::AppState;
use debai_chat::{ChatConfig, ChatOrchestrator, MemoryStore, SessionFiles};
use debai_core::config::{expand_home, DebaiConfig};
use debai_storage::{Database, EmployeeRepository};

use cli::CliArgs;

/// Session key for the terminal chat.
const TERMINAL_SESSION: &str = "terminal";

/// Resolve a configured directory against the data directory.
fn resolve_under(data_dir: &Path, dir: &str) -> PathBuf {
    let path = expand_home(dir);
    if path.is_absolute() {
        path
    } else {
        data_dir.join(path)
    }
}

/// Apply CLI and environment overrides on top of the file config.
fn apply_overrides(config: &mut DebaiConfig, args: &CliArgs) {
    config.server.port = args.resolve_port(config.server.port);
    if let Some(host) = args.resolve_host() {
        config.server.host = host;
    }
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if args.offline {
        config.llm.provider = "keyword".to_string();
        config.email.transport = "outbox".to_string();
    }
}

/// Keyword router, or an OpenAI-compatible endpoint behind the retry
/// decorator. Falls back to the keyword router when no API key is set.
fn build_oracle(config: &DebaiConfig) -> Result<Arc<dyn CompletionService>, Box<dyn std::error::Error>> {
    if config.llm.provider == "openai" {
        match std::env::var(&config.llm.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                let inner = OpenAiCompatible::new(&config.llm, key)?;
                tracing::info!(
                    base_url = %config.llm.base_url,
                    model = %config.llm.model,
                    "Using OpenAI-compatible completion service"
                );
                return Ok(Arc::new(RetryingCompletion::new(
                    Arc::new(inner),
                    Duration::from_secs(config.llm.timeout_secs),
                    config.llm.max_retries,
                )));
            }
            _ => tracing::warn!(
                env = %config.llm.api_key_env,
                "API key not set, falling back to the keyword router"
            ),
        }
    }
    tracing::info!("Using offline keyword router");
    Ok(Arc::new(KeywordRouter::new()))
}

/// SMTP when configured and a password is available, else the outbox.
fn build_mailer(
    config: &DebaiConfig,
    data_dir: &Path,
) -> Result<Arc<dyn EmailSender>, Box<dyn std::error::Error>> {
    if config.email.transport == "smtp" {
        match std::env::var(&config.email.password_env) {
            Ok(password) if !password.is_empty() => {
                let mailer = SmtpMailer::new(&config.email, password)?;
                tracing::info!(
                    host = %config.email.smtp_host,
                    port = config.email.smtp_port,
                    "Sending email over SMTP"
                );
                return Ok(Arc::new(mailer));
            }
            _ => tracing::warn!(
                env = %config.email.password_env,
                "SMTP password not set, writing email to the outbox instead"
            ),
        }
    }
    let dir = resolve_under(data_dir, &config.email.outbox_dir);
    tracing::info!(dir = %dir.display(), "Writing email to the outbox");
    Ok(Arc::new(OutboxMailer::new(dir, &config.email)?))
}

/// Interactive terminal loop against the same orchestrator.
async fn run_terminal_chat(orchestrator: &ChatOrchestrator) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"DebAI terminal chat. Type 'exit' to quit.\n")
        .await?;
    loop {
        stdout.write_all(b"\nyou> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let reply = match orchestrator.handle_message(TERMINAL_SESSION, message).await {
            Ok(outcome) => outcome.reply,
            Err(e) => format!("Error: {}", e),
        };
        stdout
            .write_all(format!("debai> {}\n", reply).as_bytes())
            .await?;
    }
    stdout.write_all(b"Goodbye!\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = if config_exists {
        DebaiConfig::load(&config_file)?
    } else {
        DebaiConfig::default()
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting DebAI v{}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No config file, using defaults");
    }

    // Storage.
    let data_dir = config.general.data_path();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("debai.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "Employee directory opened");

    // Collaborators.
    let oracle = build_oracle(&config)?;
    let mailer = build_mailer(&config, &data_dir)?;
    let directory = Arc::new(SqliteDirectory::new(Arc::new(EmployeeRepository::new(db))));
    let dispatcher = ActionDispatcher::new(
        mailer,
        directory,
        Arc::new(FileRenderer::new()),
        config.email.sender_name.clone(),
    );

    let files = SessionFiles::from_config(&config.documents, &data_dir, config.server.max_upload_mb);
    let orchestrator = ChatOrchestrator::new(
        ChatConfig::from(&config),
        oracle,
        dispatcher,
        Arc::new(MemoryStore::from_config(&config.memory)),
        files,
    );

    if args.chat {
        return run_terminal_chat(&orchestrator).await;
    }

    // === API server ===

    let state = AppState::new(config.clone(), orchestrator);
    if let Err(e) = routes::start_server(&config, state, shutdown_signal()).await {
        tracing::error!(
            addr = %format!("{}:{}", config.server.host, config.server.port),
            error = %e,
            "API server failed. Is another instance running?"
        );
        tracing::error!("Try: DEBAI_PORT={} debai", config.server.port.saturating_add(1));
        return Err(e.into());
    }

    Ok(())
}
