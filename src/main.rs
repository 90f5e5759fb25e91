mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clipsync::backend::{BackendClient, HistoryEntry, HistoryKind};
use clipsync::clipboard::{HOLD_AFTER_COPY, SystemClipboard, copy_and_hold};
use clipsync::config::{self, Config, ReceiverMode};
use clipsync::sync::SyncLoop;
use clipsync::utils::text::preview;
use cli::{Cli, Commands};
use dialoguer::Select;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Run { receiver }) => handle_run(config_path, receiver).await?,
        None => handle_run(config_path, None).await?,
        Some(Commands::Push { text, kind }) => handle_push(config_path, text, kind).await?,
        Some(Commands::Pull) => handle_pull(config_path).await?,
        Some(Commands::History { kind, pick }) => handle_history(config_path, kind, pick).await?,
        Some(Commands::Config { init }) => handle_config(config_path, init)?,
    }

    Ok(())
}

fn load_checked(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate()?;
    Ok(config)
}

fn backend_client(config: &Config) -> Result<Arc<BackendClient>> {
    let client = BackendClient::new(&config.server, Uuid::new_v4())
        .context("Failed to create backend client")?;
    Ok(Arc::new(client))
}

async fn handle_run(path: Option<&Path>, receiver: Option<ReceiverMode>) -> Result<()> {
    let config = load_checked(path)?;
    let client = backend_client(&config)?;
    let clipboard = Arc::new(SystemClipboard::new()?);
    let mode = receiver.unwrap_or(config.sync.receiver);

    info!(
        server = %config.server.url,
        username = %config.server.username,
        client_id = %client.client_id(),
        "Starting clipboard sync"
    );

    let sync_loop = SyncLoop::from_config(&config, clipboard, client, mode)?;
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        shutdown.cancel();
    });

    let stats = sync_loop.run(cancel).await?;
    println!(
        "✓ Sync stopped ({} sent, {} dropped)",
        stats.delivered, stats.dropped
    );

    Ok(())
}

async fn handle_push(path: Option<&Path>, text: String, kind: HistoryKind) -> Result<()> {
    let config = load_checked(path)?;
    let client = backend_client(&config)?;

    client
        .submit_text(kind, &text)
        .await
        .context("Failed to submit text")?;

    println!("✓ Sent \"{}\"", preview(&text, 60));
    Ok(())
}

async fn handle_pull(path: Option<&Path>) -> Result<()> {
    let config = load_checked(path)?;
    let client = backend_client(&config)?;

    let Some(latest) = client.latest().await.context("Failed to fetch latest value")? else {
        println!("Nothing on the server yet.");
        return Ok(());
    };

    println!("✓ Copied \"{}\" (update {})", preview(&latest.text, 60), latest.marker);
    copy_to_clipboard(latest.text).await?;
    Ok(())
}

async fn handle_history(path: Option<&Path>, kind: HistoryKind, pick: bool) -> Result<()> {
    let config = load_checked(path)?;
    let client = backend_client(&config)?;

    let response = client.history().await.context("Failed to fetch history")?;
    let mut entries = match kind {
        HistoryKind::Copied => response.copied_text_history,
        HistoryKind::History => response.history,
    };

    if entries.is_empty() {
        println!("No history yet!");
        return Ok(());
    }

    if pick {
        let labels: Vec<String> = entries.iter().map(entry_label).collect();
        let selection = Select::new()
            .with_prompt("Copy which entry?")
            .items(&labels)
            .default(0)
            .interact_opt()?;

        if let Some(index) = selection {
            let text = entries.swap_remove(index).text;
            println!("✓ Copied \"{}\"", preview(&text, 60));
            copy_to_clipboard(text).await?;
        }
        return Ok(());
    }

    println!("\n📋 {} history for {}\n", kind_title(kind), config.server.username);
    for (idx, entry) in entries.iter().enumerate() {
        println!("{:>3}. {}", idx + 1, entry_label(entry));
    }
    println!();

    Ok(())
}

fn handle_config(path: Option<&Path>, init: bool) -> Result<()> {
    if init {
        let (written, created) = Config::write_default(path)?;
        if created {
            println!("✓ Wrote default config to {}", written.display());
        } else {
            println!("Config already exists at {}", written.display());
        }
    }

    let resolved = config::resolve_path(path)?;
    let config = Config::load(path)?;
    let exists = if resolved.exists() { "" } else { " (not found, using defaults)" };

    println!("Config file: {}{}\n", resolved.display(), exists);
    print!("{}", toml::to_string_pretty(&config.redacted())?);

    if let Err(e) = config.validate() {
        println!("\n⚠ {e}");
    }
    Ok(())
}

/// Copy `text` and keep it served until another application takes the clipboard
/// or the hold period ends. X11 and Wayland drop the value once its owner exits.
async fn copy_to_clipboard(text: String) -> Result<()> {
    if cfg!(target_os = "linux") {
        println!(
            "  Holding the clipboard for up to {}s; copy something else or press Ctrl-C to stop.",
            HOLD_AFTER_COPY.as_secs()
        );
    }
    tokio::task::spawn_blocking(move || {
        let clipboard = SystemClipboard::new()?;
        copy_and_hold(&clipboard, &text, HOLD_AFTER_COPY)?;
        Ok::<_, anyhow::Error>(())
    })
    .await
    .context("Clipboard task panicked")?
}

fn entry_label(entry: &HistoryEntry) -> String {
    match entry.timestamp {
        Some(ts) => format!("[{}] {}", ts.format("%Y-%m-%d %H:%M"), preview(&entry.text, 60)),
        None => preview(&entry.text, 60),
    }
}

fn kind_title(kind: HistoryKind) -> &'static str {
    match kind {
        HistoryKind::Copied => "Copied text",
        HistoryKind::History => "Saved",
    }
}
