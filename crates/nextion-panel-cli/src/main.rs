//! Nextion Panel Control Tool
//!
//! CLI for monitoring and commanding a Nextion-style display over serial.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nextion_panel_hw::{Callbacks, DisplayEvent, NextionDevice, SystemEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "nextionctl")]
#[command(about = "Control tool for Nextion displays")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, default_value = "config/nextion.toml")]
    config: PathBuf,

    /// Serial port (overrides the configuration file)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate (overrides the configuration file)
    #[arg(long)]
    baud: Option<u32>,

    /// Print get results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log touch and system events until interrupted
    Monitor,
    /// Read a component's text
    GetText {
        /// Object name (e.g., t0)
        object: String,
    },
    /// Read a component's numeric value
    GetValue {
        /// Object name (e.g., n0)
        object: String,
    },
    /// Set a component's text
    SetText {
        /// Object name (e.g., t0)
        object: String,
        /// New text
        value: String,
    },
    /// Set a component's numeric value
    SetValue {
        /// Object name (e.g., n0)
        object: String,
        /// New value
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Send a raw instruction (terminator is appended)
    Raw {
        /// Instruction text (e.g., "page 1")
        command: String,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the configuration file instead
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive("info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = if cli.config.exists() {
        let config = Config::load(&cli.config).context("Failed to load configuration")?;
        info!("Loaded configuration from: {}", cli.config.display());
        config
    } else {
        info!(
            "No configuration at {}, using defaults",
            cli.config.display()
        );
        Config::default()
    };
    if let Some(port) = cli.port {
        config.serial.port = port;
    }
    if let Some(baud) = cli.baud {
        config.serial.baud = baud;
    }

    if let Commands::Config { write } = cli.command {
        if write {
            config
                .save(&cli.config)
                .context("Failed to save configuration")?;
            info!("Saved configuration to: {}", cli.config.display());
        } else {
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to serialize configuration")?
            );
        }
        return Ok(());
    }

    let device = NextionDevice::open(&config.serial.port, config.serial.baud, config.driver())
        .with_context(|| format!("Failed to open display on {}", config.serial.port))?;

    match cli.command {
        Commands::Monitor => monitor(&device, &config).await,
        Commands::GetText { object } => {
            let text = device.get_text(object.as_str()).await?;
            let text = text.to_string_lossy();
            if cli.json {
                println!("{}", serde_json::json!({ "object": object, "text": text }));
            } else {
                println!("{}", text);
            }
            Ok(())
        }
        Commands::GetValue { object } => {
            let value = device.get_value(object.as_str()).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "object": object, "value": value }));
            } else {
                println!("{}", value);
            }
            Ok(())
        }
        Commands::SetText { object, value } => {
            device.set_text(object.as_str(), &value).await?;
            println!("{}.txt set to: {:?}", object, value);
            Ok(())
        }
        Commands::SetValue { object, value } => {
            device.set_value(object.as_str(), value).await?;
            println!("{}.val set to: {}", object, value);
            Ok(())
        }
        Commands::Raw { command } => {
            device.send_raw(&command).await?;
            println!("Sent: {}", command);
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

async fn monitor(device: &NextionDevice, config: &Config) -> Result<()> {
    for component in &config.components {
        let name = component.name.clone();
        device
            .register_named(
                &component.name,
                component.page,
                component.id,
                Callbacks::generic(move |event| {
                    info!("{} {}", name, event.action);
                }),
            )
            .with_context(|| format!("Failed to register component {}", component.name))?;
    }
    info!(
        "Monitoring {} ({} components registered), Ctrl-C to stop",
        config.serial.port,
        config.components.len()
    );

    let mut events = device.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut liveness = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => log_event(event),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = liveness.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
        }
        if !device.is_running() {
            warn!("Display link closed");
            break;
        }
    }

    Ok(())
}

fn log_event(event: DisplayEvent) {
    match event {
        DisplayEvent::Touch(touch) => debug!(
            "Touch {} on page {} id {}",
            touch.action, touch.page, touch.id
        ),
        DisplayEvent::System(SystemEvent::Coordinate {
            x,
            y,
            action,
            asleep,
        }) => info!(
            "Touch {} at ({}, {}){}",
            action,
            x,
            y,
            if asleep { " while asleep" } else { "" }
        ),
        DisplayEvent::System(SystemEvent::PageChanged(page)) => info!("Page {}", page),
        DisplayEvent::System(SystemEvent::Error(code)) => warn!("Display reported {}", code),
        DisplayEvent::System(event) => info!("{:?}", event),
        DisplayEvent::Unclassified(opcode) => info!("Unclassified frame 0x{:02X}", opcode),
    }
}
