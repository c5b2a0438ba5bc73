//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`] — association with the configured access
//! point.  Retry timing belongs to the connectivity supervisor; this
//! adapter makes exactly one attempt per call.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: simulation stub that associates immediately.

use log::{info, warn};

use crate::app::ports::NetworkPort;
use crate::config::WifiConfig;
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// SSID must be 1-32 printable ASCII bytes; password empty (open) or
/// 8-64 bytes (WPA2).
pub fn credentials_valid(creds: &WifiConfig) -> bool {
    let ssid = creds.ssid.as_str();
    let ssid_ok = !ssid.is_empty() && ssid.len() <= 32 && is_printable_ascii(ssid);
    let pw = creds.password.len();
    ssid_ok && (pw == 0 || (8..=64).contains(&pw))
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    creds: WifiConfig,
    attempts: u32,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(not(target_os = "espidf"))]
    associated: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(
        creds: WifiConfig,
        modem: esp_idf_hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: esp_idf_svc::nvs::EspDefaultNvsPartition,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        let wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), Some(nvs))?, sysloop)?;
        Ok(Self {
            creds,
            attempts: 0,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(creds: WifiConfig) -> Self {
        Self {
            creds,
            attempts: 0,
            associated: false,
        }
    }

    pub fn ssid(&self) -> &str {
        self.creds.ssid.as_str()
    }

    /// Association attempts since boot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_associate(&mut self) -> Result<(), esp_idf_svc::sys::EspError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let auth_method = if self.creds.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        // Lengths were checked by credentials_valid().
        let ssid = self.creds.ssid.as_str().try_into().unwrap_or_default();
        let password = self.creds.password.as_str().try_into().unwrap_or_default();

        self.wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid,
            password,
            auth_method,
            ..Default::default()
        }))?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect()?;
        self.wifi.wait_netif_up()?;

        let ip = self.wifi.wifi().sta_netif().get_ip_info()?;
        info!("WiFi: connected to '{}', ip={}", self.creds.ssid, ip.ip);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associate(&mut self) -> Result<(), core::convert::Infallible> {
        self.associated = true;
        info!("WiFi(sim): associated with '{}'", self.creds.ssid);
        Ok(())
    }

    /// Simulation only: pretend the AP went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop(&mut self) {
        warn!("WiFi(sim): association lost");
        self.associated = false;
    }
}

impl NetworkPort for WifiAdapter {
    fn associate(&mut self) -> Result<(), CommsError> {
        self.attempts = self.attempts.wrapping_add(1);
        if !credentials_valid(&self.creds) {
            warn!("WiFi: credentials missing or invalid, cannot associate");
            return Err(CommsError::AssociationFailed);
        }
        self.platform_associate().map_err(|e| {
            warn!("WiFi: association with '{}' failed: {:?}", self.creds.ssid, e);
            CommsError::AssociationFailed
        })
    }

    #[cfg(target_os = "espidf")]
    fn is_associated(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_associated(&self) -> bool {
        self.associated
    }
}
