// rigstate test application -- CLI tool for exercising the Elecraft backend
// against real hardware or a mock transport.
//
// Usage:
//   rigstate-test-app --port /dev/ttyUSB0 keys
//   rigstate-test-app --port /dev/ttyUSB0 get freq
//   rigstate-test-app --port /dev/ttyUSB0 set freq 14074000
//   rigstate-test-app --port /dev/ttyUSB0 --baud 4800 watch --duration 30
//   rigstate-test-app --port /dev/ttyUSB0 raw "ID;"
//   rigstate-test-app --mock keys
//
// Logging is controlled with RUST_LOG, e.g. RUST_LOG=rigstate_elecraft=debug.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use rigstate_core::{display_value, CommHealth, StateCell};
use rigstate_elecraft::{ElecraftBuilder, ElecraftRadio};
use rigstate_test_harness::{MockLink, MockTransport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// rigstate test application -- mirrors an Elecraft radio from the command line.
#[derive(Parser)]
#[command(name = "rigstate-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3). Required unless --mock is used.
    #[arg(long)]
    port: Option<String>,

    /// Baud rate.
    #[arg(long, default_value_t = 38_400)]
    baud: u32,

    /// Use a mock transport instead of a real serial port.
    /// Useful for verifying CLI parsing and builder wiring without hardware.
    #[arg(long)]
    mock: bool,

    /// Seconds to wait for the radio to answer before reading values.
    #[arg(long, default_value_t = 3)]
    sync_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every cell with its type and writability.
    Keys,

    /// Print the current value of one cell (or all cells with `all`).
    Get {
        /// Cell key, e.g. freq, mode, af_gain$, iq_center.
        key: String,
    },

    /// Write a cell; the matching CAT command is sent to the radio.
    Set {
        /// Cell key.
        key: String,
        /// New value, parsed according to the cell's type.
        value: String,
    },

    /// Print cell changes and session events as they happen.
    Watch {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Send raw CAT text. Must end with ';'.
    Raw {
        text: String,
    },
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(true)
        .init();
}

/// Open the radio. The mock link must stay alive for the session to run.
async fn create_radio(cli: &Cli) -> Result<(ElecraftRadio, Option<MockLink>)> {
    if cli.mock {
        let (mock, link) = MockTransport::new();
        let radio = ElecraftBuilder::new()
            .build_with_transport(Box::new(mock))
            .await
            .context("failed to build radio on mock transport")?;
        return Ok((radio, Some(link)));
    }

    let Some(port) = cli.port.as_deref() else {
        bail!("--port is required unless --mock is used");
    };
    let radio = ElecraftBuilder::new()
        .serial_port(port)
        .baud_rate(cli.baud)
        .build()
        .await
        .with_context(|| format!("failed to open Elecraft radio on {port}"))?;
    Ok((radio, None))
}

/// Wait until the radio has answered and the full request has landed.
async fn wait_for_sync(radio: &ElecraftRadio, timeout: Duration) -> rigstate_core::Result<()> {
    radio.wait_responding(timeout).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}

fn describe(radio: &ElecraftRadio, key: &str) -> Result<String> {
    let cell = radio.state_cell(key)?;
    Ok(display_value(key, &cell.get()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_keys(radio: &ElecraftRadio) -> Result<()> {
    for key in radio.keys() {
        let cell = radio.state_cell(&key)?;
        let access = if cell.is_writable() { "rw" } else { "ro" };
        println!("{key:<16} {access}  {:?}", cell.value_type());
    }
    Ok(())
}

fn cmd_get(radio: &ElecraftRadio, key: &str) -> Result<()> {
    if key == "all" {
        for key in radio.keys() {
            println!("{key:<16} {}", describe(radio, &key)?);
        }
        return Ok(());
    }
    println!("{}", describe(radio, key).with_context(|| format!("cannot read {key}"))?);
    Ok(())
}

async fn cmd_set(radio: &ElecraftRadio, key: &str, text: &str) -> Result<()> {
    let cell = radio.state_cell(key)?;
    let value = cell
        .value_type()
        .parse(text)
        .with_context(|| format!("cannot parse {text:?} for {key}"))?;
    cell.set(value)
        .with_context(|| format!("cannot set {key}"))?;
    // Give the session a moment to apply and send the write.
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("{key} = {}", describe(radio, key)?);
    Ok(())
}

async fn cmd_watch(radio: &ElecraftRadio, duration_secs: u64) -> Result<()> {
    let (tx, mut changes) = mpsc::unbounded_channel::<String>();
    let mut subscriptions = Vec::new();
    for key in radio.keys() {
        let cell = radio.state_cell(&key)?;
        let tx = tx.clone();
        let name = key.clone();
        let id = cell.subscribe(Arc::new(move || {
            let _ = tx.send(name.clone());
        }));
        subscriptions.push((cell, id));
    }
    let mut events = radio.subscribe_events();

    println!("Watching radio state (Ctrl-C to stop)...");

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));
    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expired);

    loop {
        tokio::select! {
            _ = &mut expired => {
                println!("Watch duration elapsed.");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
            Some(key) = changes.recv() => {
                println!("{key:<16} {}", describe(radio, &key)?);
            }
            event = events.recv() => match event {
                Ok(event) => println!("[event] {event:?}"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    for (cell, id) in subscriptions {
        cell.unsubscribe(id);
    }
    Ok(())
}

async fn cmd_raw(radio: &ElecraftRadio, text: &str) -> Result<()> {
    radio.send_raw(text).context("cannot send raw command")?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (radio, _mock_link) = create_radio(&cli).await?;

    if !matches!(cli.command, Command::Keys | Command::Watch { .. }) {
        if let Err(e) = wait_for_sync(&radio, Duration::from_secs(cli.sync_timeout)).await {
            eprintln!("warning: {e}: {}", radio.errors());
        }
    }

    let result = match &cli.command {
        Command::Keys => cmd_keys(&radio),
        Command::Get { key } => cmd_get(&radio, key),
        Command::Set { key, value } => cmd_set(&radio, key, value).await,
        Command::Watch { duration } => cmd_watch(&radio, *duration).await,
        Command::Raw { text } => cmd_raw(&radio, text).await,
    };

    if radio.health() == CommHealth::BadData {
        eprintln!("warning: {}", radio.errors());
    }
    radio.close().await.ok();
    result
}
