//! Command service — the single interpret → execute path.
//!
//! Both transports hand raw payloads to [`CommandService::handle_payload`].
//! Nothing else in the firmware energises an output.
//!
//! ```text
//!  local line ──┐
//!               ├──▶ interpret ──▶ execute ──▶ EventSink
//!  cloud msg ───┘        │
//!                        └─ reject ──▶ shutdown
//! ```

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::{Error, Result};

use super::actuation::{self, ActivationOutcome};
use super::commands::{self, CommandPolicy, CommandSource};
use super::events::AppEvent;
use super::ports::{EventSink, OutputPort};

/// Running totals since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStats {
    pub received: u32,
    pub activated: u32,
    pub skipped: u32,
    pub rejected: u32,
    pub failed: u32,
}

/// Reply line sent back to a local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    NowSpraying,
    JsonError,
}

impl Reply {
    pub fn for_result(result: &Result<ActivationOutcome>) -> Self {
        match result {
            Ok(_) => Self::NowSpraying,
            Err(_) => Self::JsonError,
        }
    }

    /// Wire form, newline included.
    pub fn as_line(self) -> &'static str {
        match self {
            Self::NowSpraying => "Now spraying!\n",
            Self::JsonError => "JSON error\n",
        }
    }
}

pub struct CommandService {
    policy: CommandPolicy,
    stats: CommandStats,
}

impl CommandService {
    pub fn new(config: &SystemConfig) -> Self {
        Self::with_policy(CommandPolicy::from_config(config))
    }

    pub fn with_policy(policy: CommandPolicy) -> Self {
        Self {
            policy,
            stats: CommandStats::default(),
        }
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    pub fn stats(&self) -> CommandStats {
        self.stats
    }

    /// Interpret `payload` and, if valid, run it to completion.
    ///
    /// Rejected payloads still force the outputs off.  Returns once the
    /// hold is over and every output is low again.
    pub fn handle_payload<O, D, S>(
        &mut self,
        source: CommandSource,
        payload: &str,
        outputs: &mut O,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<ActivationOutcome>
    where
        O: OutputPort,
        D: DelayNs,
        S: EventSink,
    {
        self.stats.received = self.stats.received.wrapping_add(1);
        sink.emit(&AppEvent::CommandReceived {
            source,
            bytes: payload.len(),
        });

        let req = match commands::interpret(payload, &self.policy) {
            Ok(req) => req,
            Err(e) => {
                outputs.shutdown();
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                warn!("CMD: {:?} payload rejected: {}", source, e);
                sink.emit(&AppEvent::CommandRejected(e));
                return Err(Error::Command(e));
            }
        };

        let channels = req.channel_mask();
        let duration_ms = req.duration_ms();

        match actuation::execute(req, outputs, delay) {
            Ok(ActivationOutcome::Activated) => {
                self.stats.activated = self.stats.activated.wrapping_add(1);
                sink.emit(&AppEvent::Activated {
                    channels,
                    duration_ms,
                });
                Ok(ActivationOutcome::Activated)
            }
            Ok(ActivationOutcome::NoOpSkipped) => {
                self.stats.skipped = self.stats.skipped.wrapping_add(1);
                info!("CMD: no solenoid selected, nothing to spray");
                sink.emit(&AppEvent::NoOpSkipped);
                Ok(ActivationOutcome::NoOpSkipped)
            }
            Err(e) => {
                self.stats.failed = self.stats.failed.wrapping_add(1);
                warn!("CMD: actuation aborted: {}", e);
                sink.emit(&AppEvent::ActuationFailed(e));
                Err(Error::Actuator(e))
            }
        }
    }
}
