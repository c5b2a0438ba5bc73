//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on the device, stderr on the host).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => {
                info!("START | accepting commands");
            }
            AppEvent::CommandReceived { source, bytes } => {
                info!("CMD   | {:?} payload, {} bytes", source, bytes);
            }
            AppEvent::Activated {
                channels,
                duration_ms,
            } => {
                info!("SPRAY | channels=0b{:b} for {} ms", channels, duration_ms);
            }
            AppEvent::NoOpSkipped => {
                info!("SPRAY | skipped, no channel selected");
            }
            AppEvent::CommandRejected(e) => {
                warn!("CMD   | rejected: {}", e);
            }
            AppEvent::ActuationFailed(e) => {
                warn!("SPRAY | aborted: {}", e);
            }
            AppEvent::LinkChanged { from, to } => {
                info!("LINK  | {} -> {}", from, to);
            }
        }
    }
}
