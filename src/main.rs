use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use modbus_scanner_web::bus::SerialBus;
use modbus_scanner_web::client::HttpScannerApi;
use modbus_scanner_web::form::{Field, ScanForm};
use modbus_scanner_web::page::ScanPage;
use modbus_scanner_web::server::{self, AppState};
use modbus_scanner_web::sim::SimulatedBus;
use modbus_scanner_web::types::WriteRequest;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

/// modbus-scanner-web — Modbus RTU register scanner with a tiny embedded web UI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "modbus-scanner-web",
    version,
    about = "Modbus RTU register scanner for serial devices with a tiny embedded web UI.",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the HTTP API and serve the web UI until Ctrl+C.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,

        /// Directory with the static UI (index.html, script.js).
        #[arg(long = "ui-dir", default_value = "ui")]
        ui_dir: PathBuf,

        /// Serve simulated ports backed by in-memory slaves instead of hardware.
        #[arg(long, default_value_t = false)]
        simulate: bool,
    },

    /// List the serial ports a running server can see.
    Ports {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: Url,
    },

    /// Submit one scan to a running server and print the results.
    Scan {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: Url,

        #[command(flatten)]
        form: ScanArgs,
    },

    /// Write a single holding register through a running server.
    Write {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: Url,

        #[arg(long = "com-port")]
        com_port: String,

        #[arg(long = "baud-rate", default_value_t = 9600)]
        baud_rate: u32,

        #[arg(long, default_value = "none")]
        parity: String,

        #[arg(long = "slave-id", default_value_t = 1)]
        slave_id: u8,

        #[arg(long)]
        register: u16,

        #[arg(long)]
        value: u16,
    },
}

/// Scan form fields, taken as text and coerced exactly like the web form.
#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Serial port; defaults to the first port the server lists.
    #[arg(long = "com-port")]
    com_port: Option<String>,

    #[arg(long = "baud-rate", default_value = "9600")]
    baud_rate: String,

    /// none, even or odd.
    #[arg(long, default_value = "none")]
    parity: String,

    #[arg(long = "slave-id", default_value = "1")]
    slave_id: String,

    #[arg(long = "start-register", default_value = "0")]
    start_register: String,

    #[arg(long = "num-registers", default_value = "10")]
    num_registers: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            ui_dir,
            simulate,
        } => {
            init_tracing("info,tower_http=info");
            serve(bind, ui_dir, simulate).await
        }
        Command::Ports { server } => {
            init_tracing("warn");
            list_ports(server).await
        }
        Command::Scan { server, form } => {
            init_tracing("warn");
            scan(server, form).await
        }
        Command::Write {
            server,
            com_port,
            baud_rate,
            parity,
            slave_id,
            register,
            value,
        } => {
            init_tracing("warn");
            let api = HttpScannerApi::new(server)?;
            let ack = api
                .write(&WriteRequest {
                    com_port,
                    baud_rate,
                    parity,
                    slave_id,
                    register,
                    value,
                    data_bits: None,
                    stop_bits: None,
                    timeout_ms: None,
                })
                .await?;
            println!("{}", ack.message);
            Ok(())
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(bind: String, ui_dir: PathBuf, simulate: bool) -> Result<()> {
    println!("modbus-scanner-web configuration:");
    println!("  bind         : {}", bind);
    println!("  ui_dir       : {}", ui_dir.display());
    println!(
        "  devices      : {}",
        if simulate { "simulated" } else { "serial" }
    );

    if !ui_dir.is_dir() {
        tracing::warn!(
            "UI directory {} not found; only /api endpoints will work",
            ui_dir.display()
        );
    }

    let state = if simulate {
        let bus = SimulatedBus::demo().map_err(|e| anyhow!("failed to seed demo slaves: {e}"))?;
        AppState::new(bus)
    } else {
        AppState::new(SerialBus)
    };

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        on_ctrl_c.cancel();
    });

    println!("UI server starting at http://{} (Ctrl+C to stop)", bind);
    server::spawn_server(&bind, state, &ui_dir, shutdown)
        .await
        .with_context(|| format!("HTTP UI server on {bind} failed"))
}

async fn list_ports(server: Url) -> Result<()> {
    let page = ScanPage::new(HttpScannerApi::new(server)?);
    if !page.load_ports().await {
        bail!("{}", page.results().to_text().trim_end());
    }
    let select = page.port_select();
    if select.options().is_empty() {
        println!("No serial ports found.");
    }
    for option in select.options() {
        println!("{}", option.label);
    }
    Ok(())
}

async fn scan(server: Url, args: ScanArgs) -> Result<()> {
    let page = ScanPage::new(HttpScannerApi::new(server)?);

    let com_port = match args.com_port {
        Some(p) => p,
        None => {
            if !page.load_ports().await {
                bail!("{}", page.results().to_text().trim_end());
            }
            page.port_select()
                .selected()
                .map(str::to_owned)
                .context("server reports no serial ports; pass --com-port")?
        }
    };

    let form = ScanForm::new()
        .with(Field::ComPort, com_port)
        .with(Field::BaudRate, args.baud_rate)
        .with(Field::Parity, args.parity)
        .with(Field::SlaveId, args.slave_id)
        .with(Field::StartRegister, args.start_register)
        .with(Field::NumRegisters, args.num_registers);

    page.submit(&form).await;
    let results = page.results();
    print!("{}", results.to_text());
    if results.error().is_some() {
        bail!("scan against {} failed", page.api().base());
    }
    Ok(())
}
