//! Connectivity supervisor.
//!
//! Four totally ordered states, advanced one step per [`tick`]:
//!
//! ```text
//! ┌──────────────┐ associate ┌───────────┐ clock sane ┌────────────┐ connect+sub ┌────────────────┐
//! │ Disconnected │──────────▶│ NetworkUp │───────────▶│ TimeSynced │────────────▶│ CloudConnected │
//! └──────────────┘           └───────────┘            └────────────┘             └────────────────┘
//!        ▲                                                  ▲    session dropped         │
//!        │                                                  └────────────────────────────┤
//!        └───────────────────────── session dropped + association lost ──────────────────┘
//! ```
//!
//! A failed step waits its fixed retry interval on the injected delay and
//! stays put; the next tick tries again.  Retries are unbounded.  A
//! session failure while Wi-Fi is down drops straight to `Disconnected`.
//!
//! [`tick`]: ConnectivitySupervisor::tick

pub mod cloud;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{CloudEndpoint, CloudPort, EventSink, NetworkPort, TimeSyncPort};
use crate::config::SystemConfig;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    NetworkUp = 1,
    TimeSynced = 2,
    CloudConnected = 3,
}

impl ConnectivityState {
    pub const COUNT: usize = 4;

    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::NetworkUp => "NetworkUp",
            Self::TimeSynced => "TimeSynced",
            Self::CloudConnected => "CloudConnected",
        }
    }
}

impl core::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Retry timing and thresholds, copied out of [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub network_retry_ms: u32,
    pub time_sync_retry_ms: u32,
    pub cloud_retry_ms: u32,
    pub min_sane_epoch_secs: u64,
}

impl LinkTiming {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            network_retry_ms: config.network_retry_ms,
            time_sync_retry_ms: config.time_sync_retry_ms,
            cloud_retry_ms: config.cloud_retry_ms,
            min_sane_epoch_secs: config.min_sane_epoch_secs,
        }
    }
}

/// Borrowed set of connectivity ports for one tick.
pub struct LinkPorts<'a, N, T, C, D> {
    pub network: &'a mut N,
    pub clock: &'a mut T,
    pub cloud: &'a mut C,
    pub delay: &'a mut D,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct ConnectivitySupervisor {
    state: ConnectivityState,
    timing: LinkTiming,
    endpoint: CloudEndpoint,
    topic: String,
    /// SNTP was requested during the current network bring-up.
    sync_requested: bool,
    /// Consecutive failures in the current state.
    failures: u32,
    transitions: u32,
}

impl ConnectivitySupervisor {
    pub fn new(config: &SystemConfig) -> Self {
        Self::with_parts(
            LinkTiming::from_config(config),
            cloud::endpoint(&config.cloud),
            cloud::inbound_topic(&config.cloud.device_id),
        )
    }

    pub fn with_parts(timing: LinkTiming, endpoint: CloudEndpoint, topic: String) -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            timing,
            endpoint,
            topic,
            sync_requested: false,
            failures: 0,
            transitions: 0,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Number of state changes since construction.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Tick until [`ConnectivityState::CloudConnected`].  Blocks for as
    /// long as that takes.
    pub fn establish<N, T, C, D, S>(&mut self, ports: &mut LinkPorts<'_, N, T, C, D>, sink: &mut S)
    where
        N: NetworkPort,
        T: TimeSyncPort,
        C: CloudPort,
        D: DelayNs,
        S: EventSink,
    {
        info!("LINK: establishing connectivity");
        while self.state != ConnectivityState::CloudConnected {
            self.tick(ports, sink);
        }
        info!("LINK: online after {} transitions", self.transitions);
    }

    /// Perform one step of the state machine and return the new state.
    pub fn tick<N, T, C, D, S>(&mut self, ports: &mut LinkPorts<'_, N, T, C, D>, sink: &mut S) -> ConnectivityState
    where
        N: NetworkPort,
        T: TimeSyncPort,
        C: CloudPort,
        D: DelayNs,
        S: EventSink,
    {
        let next = match self.state {
            ConnectivityState::Disconnected => self.step_network(ports),
            ConnectivityState::NetworkUp => self.step_time(ports),
            ConnectivityState::TimeSynced => self.step_cloud(ports),
            ConnectivityState::CloudConnected => self.step_steady(ports),
        };
        if let Some(to) = next {
            self.transition(to, sink);
        }
        self.state
    }

    fn step_network<N, T, C, D>(&mut self, ports: &mut LinkPorts<'_, N, T, C, D>) -> Option<ConnectivityState>
    where
        N: NetworkPort,
        D: DelayNs,
    {
        match ports.network.associate() {
            Ok(()) => {
                self.sync_requested = false;
                Some(ConnectivityState::NetworkUp)
            }
            Err(e) => {
                self.retry(e, self.timing.network_retry_ms, ports.delay);
                None
            }
        }
    }

    fn step_time<N, T, C, D>(&mut self, ports: &mut LinkPorts<'_, N, T, C, D>) -> Option<ConnectivityState>
    where
        T: TimeSyncPort,
        D: DelayNs,
    {
        if !self.sync_requested {
            if let Err(e) = ports.clock.request_sync() {
                self.retry(e, self.timing.time_sync_retry_ms, ports.delay);
                return None;
            }
            self.sync_requested = true;
        }

        let now = ports.clock.epoch_secs();
        if now >= self.timing.min_sane_epoch_secs {
            info!("LINK: clock synced, epoch={}", now);
            return Some(ConnectivityState::TimeSynced);
        }
        ports.delay.delay_ms(self.timing.time_sync_retry_ms);
        None
    }

    fn step_cloud<N, T, C, D>(&mut self, ports: &mut LinkPorts<'_, N, T, C, D>) -> Option<ConnectivityState>
    where
        N: NetworkPort,
        C: CloudPort,
        D: DelayNs,
    {
        let res = ports
            .cloud
            .connect(&self.endpoint)
            .and_then(|()| ports.cloud.subscribe(&self.topic));
        match res {
            Ok(()) => {
                info!("LINK: subscribed to {}", self.topic);
                Some(ConnectivityState::CloudConnected)
            }
            Err(e) if !ports.network.is_associated() => {
                warn!("LINK: {} with WiFi down, re-associating", e);
                Some(ConnectivityState::Disconnected)
            }
            Err(e) => {
                self.retry(e, self.timing.cloud_retry_ms, ports.delay);
                None
            }
        }
    }

    fn step_steady<N, T, C, D>(&mut self, ports: &mut LinkPorts<'_, N, T, C, D>) -> Option<ConnectivityState>
    where
        N: NetworkPort,
        C: CloudPort,
    {
        if ports.cloud.is_connected() {
            return None;
        }
        if ports.network.is_associated() {
            warn!("LINK: cloud session dropped, reconnecting");
            Some(ConnectivityState::TimeSynced)
        } else {
            warn!("LINK: cloud session dropped with WiFi down");
            Some(ConnectivityState::Disconnected)
        }
    }

    fn retry<D: DelayNs>(&mut self, err: crate::error::CommsError, wait_ms: u32, delay: &mut D) {
        self.failures = self.failures.saturating_add(1);
        warn!(
            "LINK: {} in {} (attempt {}), retrying in {} ms",
            err, self.state, self.failures, wait_ms
        );
        delay.delay_ms(wait_ms);
    }

    fn transition<S: EventSink>(&mut self, to: ConnectivityState, sink: &mut S) {
        let from = self.state;
        info!("LINK: {} -> {}", from, to);
        self.state = to;
        self.failures = 0;
        self.transitions = self.transitions.wrapping_add(1);
        sink.emit(&AppEvent::LinkChanged { from, to });
    }
}
