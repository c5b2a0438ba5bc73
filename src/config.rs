//! System configuration parameters
//!
//! All tunable parameters for the sprayer: output mapping, activation
//! limits, retry timing, and the provisioned network/cloud identity.
//! Secrets are baked in at build time from `SPRAYER_*` environment
//! variables; the host simulator can also load a JSON file.

use serde::{Deserialize, Serialize};

use crate::pins;

/// Upper bound on the number of solenoid channels a board may configure.
pub const MAX_CHANNELS: usize = 16;

/// Largest payload the cloud inbox can hold per message (bytes).
pub const MAX_PAYLOAD_BYTES: usize = 512;

/// Azure IoT Hub MQTT API version used in the session username.
pub const IOT_HUB_API_VERSION: &str = "2021-04-12";

/// Wi-Fi station credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

/// Cloud (IoT Hub) session identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// IoT Hub hostname, e.g. `my-hub.azure-devices.net`.
    pub host: String,
    /// MQTT over TLS port.
    pub port: u16,
    /// Device identity registered in the hub.
    pub device_id: String,
    /// Pre-provisioned SAS token used as the MQTT password.
    pub sas_token: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8883,
            device_id: String::new(),
            sas_token: String::new(),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Outputs ---
    /// GPIO driving the shared pump.
    pub pump_gpio: i32,
    /// GPIO per solenoid channel, in channel index order.
    pub solenoid_gpios: heapless::Vec<i32, MAX_CHANNELS>,

    // --- Activation policy ---
    /// Hold time when a command omits `duration` (milliseconds).
    pub default_duration_ms: u32,
    /// Longest hold a command may request (milliseconds).
    pub max_duration_ms: u32,
    /// Largest accepted command payload (bytes).
    pub max_payload_bytes: usize,

    // --- Local transport ---
    /// TCP port of the line-delimited command listener.
    pub local_port: u16,
    /// A connected local client idle for this long is dropped (milliseconds).
    pub local_session_timeout_ms: u32,

    // --- Connectivity timing ---
    pub network_retry_ms: u32,
    pub time_sync_retry_ms: u32,
    pub cloud_retry_ms: u32,
    /// Clock readings below this (Unix seconds) are treated as unsynced.
    pub min_sane_epoch_secs: u64,
    /// Main-loop pause when no local client was waiting (milliseconds).
    pub loop_idle_ms: u32,

    // --- Identity ---
    pub wifi: WifiConfig,
    pub cloud: CloudConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut solenoid_gpios = heapless::Vec::new();
        for gpio in pins::SOLENOID_GPIOS {
            // SOLENOID_GPIOS is shorter than MAX_CHANNELS.
            let _ = solenoid_gpios.push(gpio);
        }

        Self {
            // Outputs
            pump_gpio: pins::PUMP_GPIO,
            solenoid_gpios,

            // Activation policy
            default_duration_ms: 18_000,
            max_duration_ms: 60_000,
            max_payload_bytes: MAX_PAYLOAD_BYTES,

            // Local transport
            local_port: 1234,
            local_session_timeout_ms: 30_000,

            // Connectivity timing
            network_retry_ms: 1_000,
            time_sync_retry_ms: 500,
            cloud_retry_ms: 1_000,
            min_sane_epoch_secs: 1_577_836_800, // 2020-01-01T00:00:00Z
            loop_idle_ms: 10_000,

            wifi: WifiConfig::default(),
            cloud: CloudConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Defaults plus any credentials provisioned at build time.
    pub fn from_build_env() -> Self {
        let mut config = Self::default();
        if let Some(ssid) = option_env!("SPRAYER_WIFI_SSID") {
            config.wifi.ssid = truncated(ssid);
        }
        if let Some(password) = option_env!("SPRAYER_WIFI_PASSWORD") {
            config.wifi.password = truncated(password);
        }
        if let Some(host) = option_env!("SPRAYER_IOT_HOST") {
            config.cloud.host = host.into();
        }
        if let Some(device_id) = option_env!("SPRAYER_DEVICE_ID") {
            config.cloud.device_id = device_id.into();
        }
        if let Some(token) = option_env!("SPRAYER_SAS_TOKEN") {
            config.cloud.sas_token = token.into();
        }
        config
    }

    /// Decode a JSON config document.  Validation is separate, see
    /// [`validate`](Self::validate).
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)
    }

    /// Number of solenoid channels (N).
    pub fn channel_count(&self) -> usize {
        self.solenoid_gpios.len()
    }

    /// Reject configurations the firmware cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solenoid_gpios.is_empty() {
            return Err(ConfigError::ValidationFailed("at least one solenoid GPIO is required"));
        }
        for (i, gpio) in self.solenoid_gpios.iter().enumerate() {
            if *gpio == self.pump_gpio {
                return Err(ConfigError::ValidationFailed("solenoid GPIO collides with pump GPIO"));
            }
            if self.solenoid_gpios[i + 1..].contains(gpio) {
                return Err(ConfigError::ValidationFailed("duplicate solenoid GPIO"));
            }
        }
        if self.default_duration_ms > self.max_duration_ms {
            return Err(ConfigError::ValidationFailed("default duration exceeds max duration"));
        }
        if self.max_payload_bytes == 0 || self.max_payload_bytes > MAX_PAYLOAD_BYTES {
            return Err(ConfigError::ValidationFailed("max_payload_bytes out of range"));
        }
        if self.network_retry_ms == 0 || self.time_sync_retry_ms == 0 || self.cloud_retry_ms == 0 {
            return Err(ConfigError::ValidationFailed("retry intervals must be non-zero"));
        }
        if self.local_port == 0 {
            return Err(ConfigError::ValidationFailed("local_port must be non-zero"));
        }
        Ok(())
    }
}

fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Errors from configuration loading and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The config document could not be decoded.
    Corrupted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Corrupted => write!(f, "config corrupted"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Corrupted => Self::Config("config corrupted"),
        }
    }
}
