//! Cloud message inbox.
//!
//! The MQTT client delivers messages on its own task; the main loop is
//! the only place commands are executed.  The inbox sits between them:
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ MQTT task   │────▶│    Inbox     │────▶│  Main Loop   │
//! │ (producer)  │     │  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Messages that arrive while a hold is running wait here and are served
//! afterwards, in arrival order.  When the queue is full the newest
//! message is dropped and counted.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::mpmc::MpMcQueue;
use log::warn;

use crate::config::MAX_PAYLOAD_BYTES;

/// Pending messages.  Power of 2 (required by the MPMC queue).
pub const INBOX_CAP: usize = 8;

/// One queued payload.
pub type Payload = heapless::String<MAX_PAYLOAD_BYTES>;

/// Why a message did not make it into the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxReject {
    /// Larger than a slot.
    Oversized,
    /// Not valid UTF-8.
    NotUtf8,
    /// All slots in use.
    Full,
}

pub struct Inbox {
    queue: MpMcQueue<Payload, INBOX_CAP>,
    dropped: AtomicU32,
}

impl Inbox {
    pub const fn new() -> Self {
        Self {
            queue: MpMcQueue::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue raw message bytes.  Safe to call from any task.
    pub fn push_bytes(&self, bytes: &[u8]) -> Result<(), InboxReject> {
        let text = core::str::from_utf8(bytes).map_err(|_| self.reject(InboxReject::NotUtf8))?;
        self.push(text)
    }

    /// Queue a text message.  Safe to call from any task.
    pub fn push(&self, text: &str) -> Result<(), InboxReject> {
        let mut slot = Payload::new();
        slot.push_str(text).map_err(|_| self.reject(InboxReject::Oversized))?;
        self.queue.enqueue(slot).map_err(|_| self.reject(InboxReject::Full))
    }

    /// Oldest queued message, if any.
    pub fn pop(&self) -> Option<Payload> {
        self.queue.dequeue()
    }

    /// Hand every queued message to `handler`, oldest first.  Returns
    /// how many were handled.
    pub fn drain<F: FnMut(&str)>(&self, mut handler: F) -> usize {
        let mut n = 0;
        while let Some(msg) = self.pop() {
            handler(&msg);
            n += 1;
        }
        n
    }

    /// Messages rejected since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn reject(&self, why: InboxReject) -> InboxReject {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        warn!("INBOX: message dropped ({:?}), {} dropped so far", why, total);
        why
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}
