//! Wall-clock sync and blocking delay.
//!
//! - [`SntpClock`] implements [`TimeSyncPort`].  On ESP-IDF it starts the
//!   `EspSntp` service; the clock reading itself is plain `SystemTime`,
//!   which SNTP steers once synced.
//! - [`Delay`] is the platform [`DelayNs`] used for activation holds and
//!   retry waits: FreeRTOS ticks on the device, `thread::sleep` on the host.

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::TimeSyncPort;
use crate::error::CommsError;

/// Seconds since the Unix epoch per the system clock (0 if before it).
fn system_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ───────────────────────────────────────────────────────────────
// SNTP clock
// ───────────────────────────────────────────────────────────────

pub struct SntpClock {
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,
    #[cfg(not(target_os = "espidf"))]
    requested: bool,
}

impl Default for SntpClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SntpClock {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,
            #[cfg(not(target_os = "espidf"))]
            requested: false,
        }
    }

    /// Whether the SNTP service reports a completed sync.
    #[cfg(target_os = "espidf")]
    pub fn is_synced(&self) -> bool {
        use esp_idf_svc::sntp::SyncStatus;
        self.sntp
            .as_ref()
            .is_some_and(|s| s.get_sync_status() == SyncStatus::Completed)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_synced(&self) -> bool {
        self.requested
    }
}

impl TimeSyncPort for SntpClock {
    #[cfg(target_os = "espidf")]
    fn request_sync(&mut self) -> Result<(), CommsError> {
        // The service keeps running across reconnects; start it once.
        if self.sntp.is_none() {
            let sntp = esp_idf_svc::sntp::EspSntp::new_default().map_err(|e| {
                log::warn!("SNTP: start failed: {:?}", e);
                CommsError::TimeSyncFailed
            })?;
            self.sntp = Some(sntp);
            info!("SNTP: sync requested");
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn request_sync(&mut self) -> Result<(), CommsError> {
        self.requested = true;
        info!("SNTP(sim): host clock assumed synced");
        Ok(())
    }

    fn epoch_secs(&self) -> u64 {
        system_epoch_secs()
    }
}

// ───────────────────────────────────────────────────────────────
// Delay
// ───────────────────────────────────────────────────────────────

/// Blocking delay for the current platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delay;

#[cfg(target_os = "espidf")]
impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::FreeRtos.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

#[cfg(not(target_os = "espidf"))]
impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
