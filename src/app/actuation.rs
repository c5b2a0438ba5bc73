//! Actuation engine.
//!
//! Runs one [`ActivationRequest`] to completion:
//!
//! ```text
//!   set_all(flags, pump=ON) ──▶ hold duration ──▶ shutdown
//! ```
//!
//! The closing shutdown lives in [`ShutdownGuard`]'s `Drop`, so it also
//! runs when a write fails part-way or the hold panics.  No path out of
//! [`execute`] leaves an output energised.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::error::ActuatorError;

use super::commands::ActivationRequest;
use super::ports::OutputPort;

/// What [`execute`] did with a valid request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Pump and the selected channels were held on for the duration.
    Activated,
    /// No channel was selected; outputs were forced off instead.
    NoOpSkipped,
}

/// Forces all outputs off when dropped.
pub struct ShutdownGuard<'a, O: OutputPort> {
    outputs: &'a mut O,
}

impl<'a, O: OutputPort> ShutdownGuard<'a, O> {
    pub fn new(outputs: &'a mut O) -> Self {
        Self { outputs }
    }

    pub fn outputs(&mut self) -> &mut O {
        self.outputs
    }
}

impl<O: OutputPort> Drop for ShutdownGuard<'_, O> {
    fn drop(&mut self) {
        self.outputs.shutdown();
    }
}

/// Apply `req`, hold it, then shut everything off.  The request is
/// consumed; each one runs at most once.
///
/// A request with no channel selected never energises the pump.  On a
/// write failure the error is returned after the outputs have been
/// shut down.
pub fn execute<O, D>(req: ActivationRequest, outputs: &mut O, delay: &mut D) -> Result<ActivationOutcome, ActuatorError>
where
    O: OutputPort,
    D: DelayNs,
{
    let mut guard = ShutdownGuard::new(outputs);

    if !req.any_requested() {
        debug!("actuation: no channel selected, skipping");
        return Ok(ActivationOutcome::NoOpSkipped);
    }

    guard.outputs().set_all(req.flags(), true)?;
    info!(
        "actuation: channels=0b{:b} on for {} ms",
        req.channel_mask(),
        req.duration_ms()
    );

    delay.delay_ms(req.duration_ms());

    drop(guard);
    info!("actuation: done, all outputs off");
    Ok(ActivationOutcome::Activated)
}
