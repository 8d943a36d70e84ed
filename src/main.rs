use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inkkeys::config::Config;
use inkkeys::device::{find_ports, DeviceManager, PhysicalInput, Settings, VirtualDevice};
use inkkeys::input::{EnigoBackend, HidBackend, LogBackend};
use inkkeys::profiles::parse_hex_color;
use inkkeys::{resolve_port, App};

#[derive(Parser, Debug)]
#[command(name = "inkkeys")]
#[command(about = "Host controller for the inkkeys e-ink macro keypad")]
#[command(version)]
struct Cli {
    /// Serial port of the keypad (auto-detected by default)
    #[arg(long, value_name = "PATH")]
    port: Option<PathBuf>,

    /// Check device connection status and exit
    #[arg(long)]
    status: bool,

    /// Set LED colours (comma separated hex, e.g. ff0000,00ff00) and exit
    #[arg(long, value_name = "COLORS")]
    leds: Option<String>,

    /// List serial ports with the keypad's USB id and exit
    #[arg(long)]
    list_ports: bool,

    /// Run against a simulated keypad driven from stdin
    #[arg(long)]
    simulate: bool,

    /// With --simulate, inject the simulated keypad's events into the desktop
    #[arg(long, requires = "simulate")]
    inject: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.device.port = Some(port);
    }

    // Handle simple commands first
    if cli.list_ports {
        return list_ports(&config);
    }

    if cli.status {
        return check_status(&config).await;
    }

    if let Some(colors) = cli.leds {
        return set_leds(&config, &colors).await;
    }

    if cli.simulate {
        return if cli.inject {
            simulate(config, EnigoBackend::new()?).await
        } else {
            simulate(config, LogBackend).await
        };
    }

    info!("Starting inkkeys");
    let mut app = App::new(config);
    run_until_signal(&mut app).await
}

/// Run the app with graceful shutdown on Ctrl+C or SIGTERM
async fn run_until_signal(app: &mut App) -> Result<()> {
    let result = wait_for_signal(app.run()).await;

    // Always run shutdown
    app.shutdown().await;
    result
}

async fn wait_for_signal<F>(task: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    let terminate = sigterm.recv();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = task => result,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
            Ok(())
        }
    }
}

fn list_ports(config: &Config) -> Result<()> {
    let ports = find_ports(config.device.vendor_id, config.device.product_id);
    if ports.is_empty() {
        println!(
            "No ports with USB id {:04x}:{:04x}",
            config.device.vendor_id, config.device.product_id
        );
    }
    for port in ports {
        println!("{}", port.display());
    }
    Ok(())
}

async fn check_status(config: &Config) -> Result<()> {
    info!("Checking device status...");

    let result = match resolve_port(&config.device) {
        Ok(port) => DeviceManager::connect(&port, config.device.info_timeout()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(device) => {
            println!("{}", serde_json::to_string_pretty(&device.info())?);
            device.disconnect().await;
            Ok(())
        }
        Err(e) => {
            println!("✗ No device found: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn set_leds(config: &Config, colors: &str) -> Result<()> {
    let colors = colors
        .split(',')
        .map(|hex| parse_hex_color(hex).ok_or_else(|| anyhow!("Invalid colour '{}'", hex)))
        .collect::<Result<Vec<_>>>()?;

    let port = resolve_port(&config.device)?;
    let mut device = DeviceManager::connect(&port, config.device.info_timeout()).await?;
    if colors.len() > device.settings().n_leds as usize {
        bail!(
            "{} colours given, the device has {} LEDs",
            colors.len(),
            device.settings().n_leds
        );
    }

    device.set_leds(&colors).await?;
    println!("✓ Set {} LED(s)", colors.len());
    device.disconnect().await;
    Ok(())
}

/// Connect the app to a virtual keypad over an in-process stream
async fn simulate<B: HidBackend>(config: Config, backend: B) -> Result<()> {
    let (host, keypad) = tokio::io::duplex(1 << 16);
    let (input_tx, input_rx) = mpsc::channel(16);
    let mut device = VirtualDevice::new(Settings::default(), backend);

    println!("Simulated keypad: type 1-9 to tap a key, 3p/3r to press or release, + or - to turn");
    let stdin_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match PhysicalInput::parse_line(&line) {
                Some(inputs) => {
                    for input in inputs {
                        if input_tx.send(input).await.is_err() {
                            return;
                        }
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!("Cannot parse '{}'", line.trim()),
            }
        }
    });

    let controller = async {
        let mut manager = DeviceManager::new("simulated", host);
        manager.request_info(config.device.info_timeout()).await?;
        let mut app = App::with_device(config, manager);
        run_until_signal(&mut app).await
    };

    let result = tokio::select! {
        result = controller => result,
        result = device.run(keypad, input_rx) => result,
    };
    stdin_task.abort();
    result
}
