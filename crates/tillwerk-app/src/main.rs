// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tillwerk — restaurant receipt delivery
//
// Entry point. Initialises logging and backend services, then runs one
// command-line operation.

mod services;

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::human_errors::{describe_result, humanize_error};
use tillwerk_core::types::{
    DEFAULT_PRINTER_PORT, DeliveryResult, DiscoveredEndpoint, PrinterDevice, PrinterRole,
    ReceiptDocument, TransportBinding, TransportKind,
};

use services::app_services::AppServices;
use services::data_dir;

#[derive(Parser)]
#[command(name = "tillwerk", version, about = "Receipt delivery for restaurant tills")]
struct Cli {
    /// Override the data directory (default: $XDG_DATA_HOME/tillwerk).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the printer registry.
    #[command(subcommand)]
    Printers(PrintersCommand),

    /// Deliver a receipt (JSON file) to a registered printer.
    Print {
        #[arg(long)]
        printer: String,
        #[arg(long)]
        receipt: PathBuf,
    },

    /// Print the canned test page.
    TestPrint { id: String },

    /// Sweep a /24 for hosts with open printer ports.
    Discover {
        /// First three octets, e.g. 192.168.1
        #[arg(long)]
        prefix: String,
        /// Comma-separated ports (default: from config).
        #[arg(long, value_delimiter = ',')]
        ports: Vec<u16>,
        /// Per-probe timeout in milliseconds (default: from config).
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List receipts saved locally after every transport failed.
    Saved {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show or change settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum PrintersCommand {
    List,
    /// Register a printer. With --ip it is reachable over the network.
    Add {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// kitchen, bar or receipt
        #[arg(long, default_value = "receipt")]
        role: String,
        #[arg(long)]
        ip: Option<IpAddr>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        model: Option<String>,
    },
    Remove { id: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    /// Set the fallback chain, e.g. `network,export,email`.
    SetChain {
        #[arg(value_delimiter = ',', required = true)]
        transports: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let human = humanize_error(&e);
            tracing::error!(error = %e, "command failed");
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let dir = data_dir::data_dir(cli.data_dir.as_deref())?;
    let svc = match AppServices::init(dir.clone()) {
        Ok(s) => s,
        Err(e @ TillwerkError::Config(_)) => return Err(e),
        Err(e) => {
            tracing::error!(error = %e, "persistent storage failed, using in-memory fallback");
            AppServices::fallback(dir)?
        }
    };
    let json = cli.json;

    match cli.command {
        Commands::Printers(cmd) => printers(&svc, cmd, json)?,
        Commands::Print { printer, receipt } => {
            let data = std::fs::read_to_string(&receipt)?;
            let document: ReceiptDocument = serde_json::from_str(&data)?;
            let result = svc.print_receipt(&printer, &document).await?;
            return report_delivery(&result, json);
        }
        Commands::TestPrint { id } => {
            let result = svc.test_print(&id).await?;
            return report_delivery(&result, json);
        }
        Commands::Discover {
            prefix,
            ports,
            timeout_ms,
        } => {
            let stopper = svc.clone();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stopper.stop_discovery();
                }
            });
            let ports = (!ports.is_empty()).then_some(ports);
            let found = svc
                .discover(&prefix, ports, timeout_ms.map(Duration::from_millis))
                .await;
            ctrl_c.abort();
            let found = found?;

            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else if found.is_empty() {
                println!("No open printer ports found on {prefix}.0/24.");
            } else {
                for endpoint in &found {
                    println!("{}:{}", endpoint.ip, endpoint.port);
                }
                println!("Add one with: tillwerk printers add <id> --ip <ip> --port <port>");
            }
        }
        Commands::Saved { limit } => {
            let saved = svc.saved_receipts(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&saved)?);
            } else {
                for receipt in &saved {
                    println!(
                        "#{} {} {} {} total={}",
                        receipt.id,
                        receipt.saved_at.format("%Y-%m-%d %H:%M:%S"),
                        receipt.printer_id,
                        receipt.document.header,
                        receipt.document.total.unwrap_or_default()
                    );
                }
                println!("{} saved receipt(s)", saved.len());
            }
        }
        Commands::Config(ConfigCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(&svc.config())?);
        }
        Commands::Config(ConfigCommand::SetChain { transports }) => {
            let kinds = transports
                .iter()
                .map(|t| t.parse::<TransportKind>())
                .collect::<Result<Vec<_>>>()?;
            svc.set_fallback_chain(kinds)?;
            println!("Fallback chain saved; it applies from the next command.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn printers(svc: &AppServices, cmd: PrintersCommand, json: bool) -> Result<()> {
    match cmd {
        PrintersCommand::List => {
            let list = svc.printers();
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
                return Ok(());
            }
            for device in &list {
                let address = device
                    .network_address()
                    .map(|(ip, port)| format!("{ip}:{port}"))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<16} {:<20} {:<8} {}",
                    device.id,
                    device.name,
                    format!("{:?}", device.role).to_lowercase(),
                    address
                );
            }
        }
        PrintersCommand::Add {
            id,
            name,
            role,
            ip,
            port,
            model,
        } => {
            let device = device_from_args(id, name, role.parse()?, ip, port, model);
            let id = svc.register_printer(device)?;
            println!("Registered printer '{id}'.");
        }
        PrintersCommand::Remove { id } => {
            svc.remove_printer(&id)?;
            println!("Removed printer '{id}'.");
        }
    }
    Ok(())
}

/// Build the device `printers add` registers. An address makes it a network
/// printer, adopted the same way as a discovered endpoint.
fn device_from_args(
    id: String,
    name: Option<String>,
    role: PrinterRole,
    ip: Option<IpAddr>,
    port: Option<u16>,
    model: Option<String>,
) -> PrinterDevice {
    let name = name.unwrap_or_else(|| id.clone());
    let mut device = match ip {
        Some(ip) => DiscoveredEndpoint::found(ip, port.unwrap_or(DEFAULT_PRINTER_PORT))
            .into_device(id, name, role),
        None => PrinterDevice::new(id, name, role),
    };
    if let Some(binding) = device.binding.as_mut() {
        binding.model = model;
    } else if port.is_some() || model.is_some() {
        device.binding = Some(TransportBinding {
            ip: None,
            port,
            model,
        });
    }
    device
}

/// Print the outcome; exit non-zero when the receipt only reached local storage.
fn report_delivery(result: &DeliveryResult, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", describe_result(result));
        for attempt in &result.attempts {
            println!(
                "  {:<8} {:?}: {}",
                attempt.transport.as_str(),
                attempt.outcome,
                attempt.detail
            );
        }
    }
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
