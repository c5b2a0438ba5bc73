//! Sprayer Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  OutputDriver    WifiAdapter   SntpClock    MqttAdapter        │
//! │  (OutputPort)    (NetworkPort) (TimeSync)   (CloudPort)        │
//! │  LocalListener   LogEventSink  Delay                           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  CommandService (interpret → execute)                  │    │
//! │  │  ConnectivitySupervisor                                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On ESP-IDF this drives the real board.  On any other target it runs
//! the same loop against simulated Wi-Fi/SNTP/MQTT and in-memory pins,
//! with the local TCP listener live on the host.
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use sprayer::adapters::log_sink::LogEventSink;
use sprayer::adapters::mqtt::MqttAdapter;
use sprayer::adapters::time::{Delay, SntpClock};
use sprayer::adapters::wifi::WifiAdapter;
use sprayer::config::SystemConfig;
use sprayer::device::{Device, Hardware, Platform};
use sprayer::drivers::gpio::{self, BoardPin};
use sprayer::drivers::outputs::OutputDriver;
use sprayer::inbox::Inbox;

/// Adapter set for this build target.
struct Board;

impl Platform for Board {
    type Outputs = OutputDriver<BoardPin>;
    type Network = WifiAdapter;
    type Clock = SntpClock;
    type Cloud = MqttAdapter;
    type Delay = Delay;
    type Sink = LogEventSink;
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(target_os = "espidf")]
fn load_config() -> Result<SystemConfig> {
    Ok(SystemConfig::from_build_env())
}

#[cfg(target_os = "espidf")]
fn network(config: &SystemConfig) -> Result<WifiAdapter> {
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    Ok(WifiAdapter::new(config.wifi.clone(), peripherals.modem, sysloop, nvs)?)
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logger init failed: {e}"))
}

/// Build-time config, or the JSON file named by the first argument.
#[cfg(not(target_os = "espidf"))]
fn load_config() -> Result<SystemConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            SystemConfig::from_json(&text).with_context(|| format!("parsing {path}"))?
        }
        None => SystemConfig::from_build_env(),
    };
    if config.wifi.ssid.is_empty() {
        log::warn!("no WiFi SSID configured, using simulator network");
        let _ = config.wifi.ssid.push_str("sprayer-sim");
    }
    Ok(config)
}

#[cfg(not(target_os = "espidf"))]
fn network(config: &SystemConfig) -> Result<WifiAdapter> {
    Ok(WifiAdapter::new(config.wifi.clone()))
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logging()?;
    info!("Sprayer v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config()?;
    config.validate().context("invalid configuration")?;
    info!(
        "Config: {} solenoids, pump GPIO{}, local port {}, device '{}'",
        config.channel_count(),
        config.pump_gpio,
        config.local_port,
        config.cloud.device_id
    );

    // ── 3. Adapters ───────────────────────────────────────────
    let outputs = gpio::init_outputs(&config).context("output GPIO init")?;
    let inbox = Arc::new(Inbox::new());
    let hw = Hardware::<Board> {
        outputs,
        network: network(&config)?,
        clock: SntpClock::new(),
        cloud: MqttAdapter::new(inbox),
        delay: Delay,
        sink: LogEventSink::new(),
    };

    // ── 4. Connect and serve ──────────────────────────────────
    let mut device = Device::new(&config, hw);
    device.start().context("device start")?;
    device.run()
}
