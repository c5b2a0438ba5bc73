//! Output pin construction.
//!
//! Turns the configured GPIO numbers into owned output pins for
//! [`OutputDriver`](super::outputs::OutputDriver).  Called once from
//! `main()` before the first shutdown.
//!
//! On ESP-IDF the pins are `esp_idf_hal` push-pull drivers.  On the host
//! they are [`SimPin`]s that only remember their level.

use crate::config::SystemConfig;

use super::outputs::OutputDriver;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    /// `gpio` could not be configured as an output (ESP-IDF return code).
    GpioConfigFailed { gpio: i32, rc: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed { gpio, rc } => {
                write!(f, "GPIO{} output config failed (rc={})", gpio, rc)
            }
        }
    }
}

impl std::error::Error for HwInitError {}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub type BoardPin = esp_idf_hal::gpio::PinDriver<'static, esp_idf_hal::gpio::AnyOutputPin, esp_idf_hal::gpio::Output>;

#[cfg(target_os = "espidf")]
fn output_pin(gpio: i32) -> Result<BoardPin, HwInitError> {
    use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};

    // SAFETY: each GPIO number appears once in a validated config, and
    // nothing else in the firmware claims these pins.
    let pin = unsafe { AnyOutputPin::new(gpio) };
    PinDriver::output(pin).map_err(|e| HwInitError::GpioConfigFailed { gpio, rc: e.code() })
}

// ── Host simulation ───────────────────────────────────────────

/// In-memory output pin used off-target.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
pub struct SimPin {
    gpio: i32,
    high: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimPin {
    pub fn new(gpio: i32) -> Self {
        Self { gpio, high: false }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    pub fn is_high(&self) -> bool {
        self.high
    }
}

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::digital::ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high {
            log::trace!("sim: GPIO{} LOW", self.gpio);
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            log::trace!("sim: GPIO{} HIGH", self.gpio);
        }
        self.high = true;
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
pub type BoardPin = SimPin;

#[cfg(not(target_os = "espidf"))]
fn output_pin(gpio: i32) -> Result<BoardPin, HwInitError> {
    Ok(SimPin::new(gpio))
}

// ── Shared ────────────────────────────────────────────────────

/// Claim the pump and solenoid pins named in `config`.
pub fn init_outputs(config: &SystemConfig) -> Result<OutputDriver<BoardPin>, HwInitError> {
    let pump = output_pin(config.pump_gpio)?;
    let mut channels = Vec::with_capacity(config.solenoid_gpios.len());
    for &gpio in &config.solenoid_gpios {
        channels.push(output_pin(gpio)?);
    }
    log::info!(
        "gpio: pump=GPIO{} solenoids={:?}",
        config.pump_gpio,
        config.solenoid_gpios.as_slice()
    );
    Ok(OutputDriver::new(pump, channels))
}
