//! ota-node - LoRa OTA update node
//!
//! Runs the update engine against a UDP radio stand-in, or inspects and
//! repairs a device root.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lora_ota_node::commands;
use lora_ota_node::node::revert_pending;
use lora_ota_node::{Node, NodeConfig, NodeError, Overrides, UdpRadio};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ota-node")]
#[command(about = "LoRa OTA update node - receive, verify and apply firmware updates")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "OTA_NODE_CONFIG")]
    config: Option<PathBuf>,

    /// Device root, overrides the configuration file
    #[arg(long, global = true, env = "OTA_NODE_ROOT")]
    root: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the node until interrupted
    Run {
        /// Local address to receive radio frames on
        #[arg(long)]
        listen: Option<String>,

        /// Address to send uplink frames to
        #[arg(long)]
        gateway: Option<String>,

        /// Stop after this many boots
        #[arg(long)]
        max_boots: Option<u32>,
    },

    /// Revert changes left pending by an interrupted update
    Revert,

    /// Show the running version and any pending changes
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compare a candidate version against the current one
    CheckVersion {
        /// Version currently running
        current: String,
        /// Version offered
        candidate: String,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            device_root: self.root.clone(),
            ..Overrides::default()
        };
        if let Commands::Run {
            listen,
            gateway,
            max_boots,
        } = &self.command
        {
            overrides.listen.clone_from(listen);
            overrides.gateway.clone_from(gateway);
            overrides.max_boots = *max_boots;
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ota_node={log_level},lora_ota_node={log_level},lora_ota_update={log_level},lora_ota_watchdog={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = match e.downcast_ref::<NodeError>() {
                Some(NodeError::InvalidConfiguration(_) | NodeError::YamlError(_))
                | Some(NodeError::ConfigRead { .. }) => 4,
                Some(NodeError::VersionFile { .. } | NodeError::InvalidVersion(_)) => 3,
                Some(NodeError::Radio(_)) => 5,
                _ => 1,
            };
            ExitCode::from(code)
        }
    }
}

fn load_config(cli: &Cli) -> Result<NodeConfig> {
    let mut config = NodeConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&cli.overrides());
    config.validate()?;
    Ok(config)
}

async fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run { .. } => run(load_config(cli)?).await,
        Commands::Revert => {
            let config = load_config(cli)?;
            println!("{}", commands::revert(&config)?);
            Ok(())
        }
        Commands::Status { json } => {
            let config = load_config(cli)?;
            let report = commands::status(&config)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
            Ok(())
        }
        Commands::CheckVersion { current, candidate } => {
            println!("{}", commands::check_version(current, candidate)?);
            Ok(())
        }
    }
}

async fn run(config: NodeConfig) -> Result<()> {
    let radio = UdpRadio::bind(&config.radio).await?;
    tracing::info!(
        listen = %radio.local_addr()?,
        gateway = %config.radio.gateway,
        root = %config.agent.device_root.display(),
        "radio up"
    );

    let device_root = config.agent.device_root.clone();
    let mut node = Node::new(config, radio.start());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let result = node.run(shutdown).await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "node loop failed, reverting pending changes");
        match revert_pending(&device_root) {
            Ok(report) => tracing::info!(
                restored = report.restored,
                removed = report.removed,
                discarded = report.discarded,
                "pending changes reverted"
            ),
            Err(revert_error) => tracing::error!(error = %revert_error, "revert failed"),
        }
    }
    result.context("node stopped with an error")
}
