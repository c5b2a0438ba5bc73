//! Unified error types for the sprayer firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the main loop's error handling uniform.  All variants are `Copy` so
//! they can be passed through the command service and the connectivity
//! supervisor without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An inbound command payload was rejected.
    Command(CommandError),
    /// An output (pump or solenoid) write failed.
    Actuator(ActuatorError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Reasons the command interpreter rejects a payload.
///
/// Both kinds end in the same place operationally (no actuation, outputs
/// forced off) but are reported differently: an empty channel list is a
/// failed command, an all-zero list is a successful no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The payload is not a parsable document (or exceeds the size limit).
    MalformedPayload,
    /// `solenoids` is missing, not an array, or empty.
    EmptyChannelList,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload => write!(f, "malformed payload"),
            Self::EmptyChannelList => write!(f, "no solenoid data"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Driving the pump GPIO failed.
    PumpWriteFailed,
    /// Driving the GPIO of the given channel index failed.
    ChannelWriteFailed(usize),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PumpWriteFailed => write!(f, "pump GPIO write failed"),
            Self::ChannelWriteFailed(idx) => write!(f, "solenoid {idx} GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

/// Transient transport-layer failures.  None of these are fatal; the
/// connectivity supervisor retries them indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    AssociationFailed,
    TimeSyncFailed,
    SessionConnectFailed,
    SubscribeFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssociationFailed => write!(f, "WiFi association failed"),
            Self::TimeSyncFailed => write!(f, "time sync request failed"),
            Self::SessionConnectFailed => write!(f, "cloud session connect failed"),
            Self::SubscribeFailed => write!(f, "cloud subscribe failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
