//! Inbound commands and the command interpreter.
//!
//! Both transports deliver the same JSON document:
//!
//! ```json
//! {"solenoids": [1, 0, 1], "duration": 500}
//! ```
//!
//! [`interpret`] turns that text into a validated [`ActivationRequest`]
//! or a [`CommandError`].  It is a pure function; logging and the
//! defensive shutdown on rejection are the caller's job.

use serde_json::Value;

use crate::config::{MAX_CHANNELS, SystemConfig};
use crate::error::CommandError;

/// Which transport a payload arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// Line-delimited TCP listener; gets a reply.
    Local,
    /// Cloud subscription; fire-and-forget.
    Cloud,
}

/// Limits applied while interpreting a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    /// Number of configured channels (N).
    pub channel_count: usize,
    pub default_duration_ms: u32,
    pub max_duration_ms: u32,
    pub max_payload_bytes: usize,
}

impl CommandPolicy {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            channel_count: config.channel_count().min(MAX_CHANNELS),
            default_duration_ms: config.default_duration_ms,
            max_duration_ms: config.max_duration_ms,
            max_payload_bytes: config.max_payload_bytes,
        }
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

/// A validated command: one flag per channel plus a clamped hold time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    flags: heapless::Vec<bool, MAX_CHANNELS>,
    duration_ms: u32,
}

impl ActivationRequest {
    /// Build a request directly (actuation and property tests).  Flags beyond
    /// [`MAX_CHANNELS`] are dropped.
    pub fn new(flags: &[bool], duration_ms: u32) -> Self {
        let take = flags.len().min(MAX_CHANNELS);
        let mut v = heapless::Vec::new();
        // Bounded by MAX_CHANNELS above.
        let _ = v.extend_from_slice(&flags[..take]);
        Self {
            flags: v,
            duration_ms,
        }
    }

    /// Desired state per channel, exactly N entries.
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    /// `true` if at least one channel is requested.
    pub fn any_requested(&self) -> bool {
        self.flags.iter().any(|&f| f)
    }

    /// Requested channels as a bitmask (bit `i` = channel `i`).
    pub fn channel_mask(&self) -> u16 {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, f)| **f)
            .fold(0u16, |mask, (i, _)| mask | (1 << i))
    }
}

/// Parse and validate a command payload.
pub fn interpret(payload: &str, policy: &CommandPolicy) -> Result<ActivationRequest, CommandError> {
    if payload.len() > policy.max_payload_bytes {
        return Err(CommandError::MalformedPayload);
    }

    let doc: Value = serde_json::from_str(payload).map_err(|_| CommandError::MalformedPayload)?;

    // A missing key, a non-array value, or a non-object document all read
    // as "no channel list".
    let entries = match doc.get("solenoids") {
        Some(Value::Array(entries)) if !entries.is_empty() => entries,
        _ => return Err(CommandError::EmptyChannelList),
    };

    let n = policy.channel_count.min(MAX_CHANNELS);
    let mut flags: heapless::Vec<bool, MAX_CHANNELS> = heapless::Vec::new();
    for i in 0..n {
        // Numeric equality: `1` and `1.0` both select.
        let on = entries.get(i).and_then(Value::as_f64) == Some(1.0);
        // n <= MAX_CHANNELS.
        let _ = flags.push(on);
    }

    let duration_ms = doc
        .get("duration")
        .and_then(duration_from_value)
        .map_or(policy.default_duration_ms, |ms| clamp_duration(ms, policy.max_duration_ms));

    Ok(ActivationRequest { flags, duration_ms })
}

/// Integer milliseconds only; floats and non-numbers fall back to the default.
fn duration_from_value(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
}

fn clamp_duration(ms: i64, max_ms: u32) -> u32 {
    ms.clamp(0, i64::from(max_ms)) as u32
}
