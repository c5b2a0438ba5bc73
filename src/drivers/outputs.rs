//! Pump and solenoid output driver.
//!
//! One shared pump plus N solenoid valves, each on a push-pull GPIO
//! (active HIGH).  The driver is generic over
//! [`embedded_hal::digital::OutputPin`] so the same code drives
//! `esp_idf_hal` pin drivers on the board and plain in-memory pins on
//! the host.
//!
//! ## Safety contract
//!
//! [`OutputDriver::shutdown`] drives every output LOW and never stops
//! early: a failing pin is logged and the remaining pins are still
//! attempted.  It is safe to call any number of times.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::app::ports::OutputPort;
use crate::config::MAX_CHANNELS;
use crate::error::ActuatorError;

/// Last commanded state of every output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActuatorAssembly {
    pub pump_on: bool,
    pub channels: heapless::Vec<bool, MAX_CHANNELS>,
}

impl ActuatorAssembly {
    fn with_channels(n: usize) -> Self {
        let mut channels = heapless::Vec::new();
        for _ in 0..n.min(MAX_CHANNELS) {
            let _ = channels.push(false);
        }
        Self {
            pump_on: false,
            channels,
        }
    }

    /// `true` when the pump and every channel are off.
    pub fn all_off(&self) -> bool {
        !self.pump_on && self.channels.iter().all(|on| !on)
    }

    /// Number of energised channels.
    pub fn active_channels(&self) -> usize {
        self.channels.iter().filter(|on| **on).count()
    }
}

pub struct OutputDriver<P: OutputPin> {
    pump: P,
    channels: heapless::Vec<P, MAX_CHANNELS>,
    state: ActuatorAssembly,
}

impl<P: OutputPin> OutputDriver<P> {
    /// Take ownership of the pump pin and the channel pins (index order).
    ///
    /// Pins beyond [`MAX_CHANNELS`] are dropped.  Outputs are not touched
    /// here; call [`OutputPort::shutdown`] before the first command.
    pub fn new(pump: P, channels: impl IntoIterator<Item = P>) -> Self {
        let mut pins = heapless::Vec::new();
        for pin in channels {
            if pins.push(pin).is_err() {
                break;
            }
        }
        let state = ActuatorAssembly::with_channels(pins.len());
        Self {
            pump,
            channels: pins,
            state,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn write_pump(&mut self, on: bool) -> Result<(), ActuatorError> {
        drive(&mut self.pump, on).map_err(|()| ActuatorError::PumpWriteFailed)?;
        self.state.pump_on = on;
        Ok(())
    }

    fn write_channel(&mut self, idx: usize, on: bool) -> Result<(), ActuatorError> {
        let pin = &mut self.channels[idx];
        drive(pin, on).map_err(|()| ActuatorError::ChannelWriteFailed(idx))?;
        self.state.channels[idx] = on;
        Ok(())
    }
}

fn drive<P: OutputPin>(pin: &mut P, on: bool) -> Result<(), ()> {
    let res = if on { pin.set_high() } else { pin.set_low() };
    res.map_err(|_| ())
}

impl<P: OutputPin> OutputPort for OutputDriver<P> {
    fn set_all(&mut self, flags: &[bool], pump_on: bool) -> Result<(), ActuatorError> {
        for idx in 0..self.channels.len() {
            let on = flags.get(idx).copied().unwrap_or(false);
            self.write_channel(idx, on)?;
        }
        self.write_pump(pump_on)?;
        debug!(
            "outputs: pump={} channels={}/{}",
            pump_on,
            self.state.active_channels(),
            self.channels.len()
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        // Pump first so nothing is pushing against closed valves.
        if let Err(e) = self.write_pump(false) {
            error!("shutdown: {e}");
        }
        for idx in 0..self.channels.len() {
            if let Err(e) = self.write_channel(idx, false) {
                error!("shutdown: {e}");
            }
        }
    }

    fn assembly(&self) -> &ActuatorAssembly {
        &self.state
    }
}
