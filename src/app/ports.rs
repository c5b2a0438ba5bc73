//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CommandService / ConnectivitySupervisor
//! ```
//!
//! Driven adapters (GPIO outputs, Wi-Fi, SNTP, MQTT, event sinks)
//! implement these traits.  The domain consumes them via generics, so the
//! core never touches hardware or sockets directly and every port can be
//! replaced by a scripted mock in tests.

use crate::drivers::outputs::ActuatorAssembly;
use crate::error::{ActuatorError, CommsError};

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → pump + solenoids)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the pump and solenoid outputs.
pub trait OutputPort {
    /// Drive the pump and every channel at once.
    ///
    /// `flags[i]` is the desired state of channel `i`.  Flags beyond the
    /// configured channel count are ignored; channels without a flag are
    /// driven off.
    fn set_all(&mut self, flags: &[bool], pump_on: bool) -> Result<(), ActuatorError>;

    /// Force the pump and every channel off.  Unconditional and idempotent;
    /// this is the only safety primitive.
    fn shutdown(&mut self);

    /// Last state written to the outputs.
    fn assembly(&self) -> &ActuatorAssembly;
}

// ───────────────────────────────────────────────────────────────
// Connectivity ports (driven adapters: domain → network stack)
// ───────────────────────────────────────────────────────────────

/// Wi-Fi station association.
pub trait NetworkPort {
    /// Associate with the configured access point and bring the netif up.
    fn associate(&mut self) -> Result<(), CommsError>;

    /// Whether the station is still associated.
    fn is_associated(&self) -> bool;
}

/// Wall-clock synchronisation (SNTP).
pub trait TimeSyncPort {
    /// Start synchronisation.  Called once per network bring-up.
    fn request_sync(&mut self) -> Result<(), CommsError>;

    /// Current wall-clock time in Unix seconds (may be unsynced).
    fn epoch_secs(&self) -> u64;
}

/// Connection parameters for a secure pub/sub session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEndpoint {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
}

/// Secure publish/subscribe client.
pub trait CloudPort {
    /// Open (or re-open) an authenticated session.
    fn connect(&mut self, endpoint: &CloudEndpoint) -> Result<(), CommsError>;

    /// Subscribe to `topic`; returns once the broker acknowledged it.
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    /// Whether the session is currently up.
    fn is_connected(&self) -> bool;

    /// Hand every message received since the last call to `handler`,
    /// in arrival order.
    fn poll<F: FnMut(&str)>(&mut self, handler: F);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
