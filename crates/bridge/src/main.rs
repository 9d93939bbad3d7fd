//! input-bridge
//!
//! Watches USB for input devices and feeds them, together with their events,
//! into a host input pipeline driven from the main thread.

use anyhow::{Context, Result};
use backend::{BackendCore, DeviceChange};
use bridge::config::BridgeConfig;
use bridge::usb::{FilterProber, UsbTransport, list_usb_devices, matches_filters};
use bridge::{HotplugWatcher, LoggingHost, UsbBridgeBackend};
use clap::Parser;
use common::setup_logging;
use tokio::signal;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

type BridgeCore = BackendCore<UsbBridgeBackend, LoggingHost>;

#[derive(Parser, Debug)]
#[command(name = "input-bridge")]
#[command(
    author,
    version,
    about = "Input bridge - Feed hotplugged USB devices into a host input pipeline"
)]
#[command(long_about = "
Watches USB for devices, creates a host device for each recognized one and
forwards their events to the host once per tick.

EXAMPLES:
    # Run with default config
    input-bridge

    # Run with custom config
    input-bridge --config /path/to/bridge.toml

    # List USB devices and exit
    input-bridge --list-devices

    # Run with debug logging
    input-bridge --log-level debug

CONFIGURATION:
    The bridge looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/input-bridge/bridge.toml
    3. /etc/input-bridge/bridge.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

// The core must stay on the thread that ticks it
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = BridgeConfig::default();
        let path = BridgeConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        BridgeConfig::load_from(path).context("Failed to load configuration")?
    } else {
        BridgeConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.bridge.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("input-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    if args.list_devices {
        return list_devices_mode(&config);
    }

    let mut core = BackendCore::new(
        UsbBridgeBackend::new(),
        LoggingHost::new(config.host.schemas.clone()),
    );

    let result = run(&config, &mut core).await;

    core.shutdown();
    info!("Bridge shutdown complete");
    result
}

/// List USB devices and exit
fn list_devices_mode(config: &BridgeConfig) -> Result<()> {
    let devices = list_usb_devices().context("Failed to enumerate USB devices")?;

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in devices {
        let matched = matches_filters(device.vendor_id, device.product_id, &config.usb.filters);
        println!(
            "  {:04x}:{:04x} - {} {}{}",
            device.vendor_id,
            device.product_id,
            device
                .manufacturer
                .as_deref()
                .unwrap_or("Unknown Manufacturer"),
            device.product.as_deref().unwrap_or("Unknown Product"),
            if matched { "" } else { " (filtered)" }
        );
        println!(
            "      Bus {:03} Device {:03} Class: {}",
            device.bus_number,
            device.device_address,
            bridge::usb::device::class_name(device.class)
        );
        if let Some(serial) = &device.serial_number {
            println!("      Serial: {}", serial);
        }
        println!();
    }

    Ok(())
}

/// Tick the core until Ctrl+C
async fn run(config: &BridgeConfig, core: &mut BridgeCore) -> Result<()> {
    let mut watcher = if config.usb.enabled {
        let prober = FilterProber::new(config.usb.filters.clone(), core.handle());
        let transport = UsbTransport::new(prober).context("Failed to initialize USB")?;
        Some(
            HotplugWatcher::spawn("usb", transport, core.handle(), config.usb.poll_interval())
                .context("Failed to start USB watcher")?,
        )
    } else {
        info!("USB watching disabled");
        None
    };

    let mut ticker = interval(config.bridge.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Press Ctrl+C to shutdown");
    loop {
        tokio::select! {
            _ = ticker.tick() => tick(core),
            result = &mut ctrl_c => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
        }
    }

    if let Some(watcher) = watcher.as_mut() {
        info!("Shutting down USB watcher...");
        watcher.shutdown();
    }
    Ok(())
}

fn tick(core: &mut BridgeCore) {
    core.tick();
    for handle in core.host_mut().take_removed() {
        core.on_device_change(handle, DeviceChange::Removed);
    }
}
