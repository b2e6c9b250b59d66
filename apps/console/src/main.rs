use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use devnet::{Devnet, DevnetConfig};
use futures::StreamExt;
use serde::Deserialize;
use session_core::{
    config::{load_settings_from, DEFAULT_SETTINGS_FILE},
    FormField, SessionEvent, TransactionSessionManager,
};
use shared::domain::ConnectorId;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
    task::JoinHandle,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::{parse_command, ConsoleCommand, HELP};

#[derive(Parser, Debug)]
#[command(name = "value-console", about = "Manage your game value from the terminal")]
struct Args {
    /// Settings file; `[devnet]` holds the simulated network options.
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Connect this wallet connector on startup.
    #[arg(long)]
    connector: Option<String>,
    #[arg(long)]
    account_seed: Option<String>,
    #[arg(long)]
    confirmation_polls: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ConsoleFile {
    #[serde(default)]
    devnet: DevnetConfig,
}

fn load_devnet_config(path: &Path) -> Result<DevnetConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(DevnetConfig::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    let file: ConsoleFile = toml::from_str(&raw)
        .with_context(|| format!("failed to parse [devnet] section of {}", path.display()))?;
    Ok(file.devnet)
}

fn spawn_event_printer(events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if let Some(line) = render::event_line(&event) {
                        println!("{line}");
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "console: event printer lagged");
                }
            }
        }
    })
}

async fn run_command(manager: &Arc<TransactionSessionManager>, command: ConsoleCommand) {
    debug!(command = command.name(), "console: running command");
    match command {
        ConsoleCommand::Connectors => {
            for connector in manager.connectors() {
                println!("  {:<10} {}", connector.id, connector.name);
            }
        }
        ConsoleCommand::Connect { connector } => {
            let _ = manager.connect(&ConnectorId::new(connector)).await;
        }
        ConsoleCommand::Disconnect => {
            let _ = manager.disconnect().await;
        }
        ConsoleCommand::Value => {
            let _ = manager.refresh_value().await;
        }
        ConsoleCommand::Increase { amount } => {
            manager.update_form(FormField::IncreaseAmount, amount).await;
            if let Ok(handle) = manager.submit_increase_form().await {
                manager.spawn_tracker(handle).await;
            }
        }
        ConsoleCommand::Transfer { recipient, amount } => {
            manager
                .update_form(FormField::TransferRecipient, recipient)
                .await;
            manager.update_form(FormField::TransferAmount, amount).await;
            if let Ok(handle) = manager.submit_transfer_form().await {
                manager.spawn_tracker(handle).await;
            }
        }
        ConsoleCommand::Status { json } => {
            let snapshot = manager.snapshot().await;
            if json {
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(text) => println!("{text}"),
                    Err(err) => warn!("console: failed to encode snapshot: {err}"),
                }
            } else {
                for line in render::status_lines(&snapshot) {
                    println!("{line}");
                }
            }
        }
        ConsoleCommand::StopTracking => {
            if manager.stop_tracking().await.is_none() {
                println!("No transaction is being tracked.");
            }
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = load_settings_from(&args.config);
    let mut devnet_config = load_devnet_config(&args.config)?;
    if let Some(seed) = args.account_seed {
        devnet_config.account_seed = seed;
    }
    if let Some(polls) = args.confirmation_polls {
        devnet_config.confirmation_polls = polls;
    }

    info!(
        contract = %settings.contract_address,
        chain = ?settings.chain,
        "console: starting against in-memory devnet"
    );
    let net = Devnet::new(settings.contract_address.clone(), devnet_config);
    let manager = net.session_manager(settings);

    let printer = spawn_event_printer(manager.subscribe_events());
    let wallet_watch = manager.spawn_wallet_watch();
    let value_watch = manager.spawn_value_watch();

    println!("Game Value Manager");
    println!("{HELP}");
    if let Some(connector) = args.connector {
        run_command(&manager, ConsoleCommand::Connect { connector }).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match parse_command(&line) {
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(command)) => run_command(&manager, command).await,
            Ok(None) => {}
            Err(message) => println!("{message}"),
        }
    }

    if let Some(hash) = manager.stop_tracking().await {
        info!(%hash, "console: exiting while transaction is still unconfirmed");
    }
    value_watch.abort();
    wallet_watch.abort();
    printer.abort();
    Ok(())
}
