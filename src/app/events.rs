//! Outbound application events.
//!
//! The command service and the connectivity supervisor emit these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them.

use crate::connectivity::ConnectivityState;
use crate::error::{ActuatorError, CommandError};

use super::commands::CommandSource;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The device finished start-up and is accepting commands.
    Started,

    /// A payload arrived on one of the transports.
    CommandReceived { source: CommandSource, bytes: usize },

    /// Pump and the listed channels were energised for `duration_ms`.
    Activated { channels: u16, duration_ms: u32 },

    /// A well-formed command selected no channels.
    NoOpSkipped,

    /// The interpreter rejected a payload.
    CommandRejected(CommandError),

    /// An output write failed mid-command.
    ActuationFailed(ActuatorError),

    /// The connectivity supervisor changed state.
    LinkChanged {
        from: ConnectivityState,
        to: ConnectivityState,
    },
}
