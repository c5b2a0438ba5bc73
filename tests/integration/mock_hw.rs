//! Mock hardware and network adapters for integration tests.
//!
//! Pins share one level table so tests can see the whole output bank at
//! any instant, including from inside a hold (via [`MockDelay`]).  The
//! network, clock and cloud mocks are scripted and count every call.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use sprayer::app::events::AppEvent;
use sprayer::app::ports::{CloudEndpoint, CloudPort, EventSink, NetworkPort, TimeSyncPort};
use sprayer::connectivity::ConnectivityState;
use sprayer::device::Platform;
use sprayer::drivers::outputs::OutputDriver;
use sprayer::error::CommsError;

// ── Output bank ───────────────────────────────────────────────

/// Level of every pin: index 0 is the pump, 1..=N the channels.
#[derive(Clone, Default)]
pub struct PinBank {
    levels: Rc<RefCell<Vec<bool>>>,
    /// Pin index whose writes fail, if any.
    broken: Rc<Cell<Option<usize>>>,
    /// HIGH writes per pin.
    highs: Rc<RefCell<Vec<u32>>>,
}

impl PinBank {
    pub fn new(channels: usize) -> Self {
        Self {
            levels: Rc::new(RefCell::new(vec![false; channels + 1])),
            broken: Rc::new(Cell::new(None)),
            highs: Rc::new(RefCell::new(vec![0; channels + 1])),
        }
    }

    pub fn pump(&self) -> bool {
        self.levels.borrow()[0]
    }

    pub fn channels(&self) -> Vec<bool> {
        self.levels.borrow()[1..].to_vec()
    }

    pub fn all_low(&self) -> bool {
        self.levels.borrow().iter().all(|l| !l)
    }

    /// Whether channel `idx` was ever driven HIGH.
    pub fn ever_high(&self, channel: usize) -> bool {
        self.highs.borrow()[channel + 1] > 0
    }

    pub fn pump_ever_high(&self) -> bool {
        self.highs.borrow()[0] > 0
    }

    pub fn break_channel(&self, channel: usize) {
        self.broken.set(Some(channel + 1));
    }

    pub fn break_pump(&self) {
        self.broken.set(Some(0));
    }

    pub fn repair(&self) {
        self.broken.set(None);
    }
}

#[derive(Debug)]
pub struct PinFault;

impl embedded_hal::digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct MockPin {
    idx: usize,
    bank: PinBank,
}

impl ErrorType for MockPin {
    type Error = PinFault;
}

impl MockPin {
    fn write(&mut self, high: bool) -> Result<(), PinFault> {
        if self.bank.broken.get() == Some(self.idx) {
            return Err(PinFault);
        }
        self.bank.levels.borrow_mut()[self.idx] = high;
        if high {
            self.bank.highs.borrow_mut()[self.idx] += 1;
        }
        Ok(())
    }
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), PinFault> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), PinFault> {
        self.write(true)
    }
}

/// Real output driver over mock pins.
pub fn outputs(channels: usize) -> (OutputDriver<MockPin>, PinBank) {
    let bank = PinBank::new(channels);
    let pump = MockPin { idx: 0, bank: bank.clone() };
    let pins = (1..=channels).map(|idx| MockPin { idx, bank: bank.clone() });
    (OutputDriver::new(pump, pins), bank)
}

// ── Delay ─────────────────────────────────────────────────────

/// Output state seen when a delay started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    pub ms: u32,
    pub pump: bool,
    pub channels: Vec<bool>,
}

/// Returns immediately, recording each wait and the outputs at that time.
pub struct MockDelay {
    bank: Option<PinBank>,
    pub holds: Vec<Hold>,
    /// Called at every wait; lets a test act "during" a hold.
    pub on_wait: Option<Box<dyn FnMut(u32)>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self { bank: None, holds: Vec::new(), on_wait: None }
    }

    pub fn watching(bank: &PinBank) -> Self {
        Self { bank: Some(bank.clone()), holds: Vec::new(), on_wait: None }
    }

    pub fn waits(&self) -> Vec<u32> {
        self.holds.iter().map(|h| h.ms).collect()
    }

    /// Waits taken while the pump was running.
    pub fn energised_holds(&self) -> Vec<&Hold> {
        self.holds.iter().filter(|h| h.pump).collect()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        let (pump, channels) = match &self.bank {
            Some(b) => (b.pump(), b.channels()),
            None => (false, Vec::new()),
        };
        self.holds.push(Hold { ms, pump, channels });
        if let Some(f) = self.on_wait.as_mut() {
            f(ms);
        }
    }
}

// ── Network ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNetwork {
    /// Fail this many association attempts first.
    pub fail_next: u32,
    pub associate_calls: u32,
    pub associated: bool,
}

impl MockNetwork {
    pub fn drop_link(&mut self) {
        self.associated = false;
    }
}

impl NetworkPort for MockNetwork {
    fn associate(&mut self) -> Result<(), CommsError> {
        self.associate_calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(CommsError::AssociationFailed);
        }
        self.associated = true;
        Ok(())
    }

    fn is_associated(&self) -> bool {
        self.associated
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub const SANE_EPOCH: u64 = 1_760_000_000;

/// Reads 0 until `sane_after` reads have happened, then [`SANE_EPOCH`].
#[derive(Default)]
pub struct MockClock {
    pub sane_after: u32,
    pub sync_requests: u32,
    pub fail_requests: u32,
    reads: Cell<u32>,
}

impl MockClock {
    pub fn synced() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl TimeSyncPort for MockClock {
    fn request_sync(&mut self) -> Result<(), CommsError> {
        self.sync_requests += 1;
        if self.fail_requests > 0 {
            self.fail_requests -= 1;
            return Err(CommsError::TimeSyncFailed);
        }
        Ok(())
    }

    fn epoch_secs(&self) -> u64 {
        let n = self.reads.get();
        self.reads.set(n + 1);
        if n >= self.sane_after { SANE_EPOCH } else { 0 }
    }
}

// ── Cloud ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockCloud {
    pub connected: bool,
    pub refuse_connects: u32,
    pub refuse_subscribes: u32,
    pub connect_calls: u32,
    pub subscribe_calls: u32,
    pub last_endpoint: Option<CloudEndpoint>,
    pub topics: Vec<String>,
    /// Shared so a test can deliver messages while the device owns the mock.
    pub pending: Rc<RefCell<VecDeque<String>>>,
}

impl MockCloud {
    pub fn inject(&self, payload: &str) {
        self.pending.borrow_mut().push_back(payload.to_owned());
    }

    /// Handle for delivering messages later.
    pub fn feed(&self) -> Rc<RefCell<VecDeque<String>>> {
        self.pending.clone()
    }

    pub fn drop_session(&mut self) {
        self.connected = false;
    }
}

impl CloudPort for MockCloud {
    fn connect(&mut self, endpoint: &CloudEndpoint) -> Result<(), CommsError> {
        self.connect_calls += 1;
        self.last_endpoint = Some(endpoint.clone());
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(CommsError::SessionConnectFailed);
        }
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.subscribe_calls += 1;
        if self.refuse_subscribes > 0 {
            self.refuse_subscribes -= 1;
            return Err(CommsError::SubscribeFailed);
        }
        self.topics.push(topic.to_owned());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll<F: FnMut(&str)>(&mut self, mut handler: F) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(msg) => handler(&msg),
                None => break,
            }
        }
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_path(&self) -> Vec<ConnectivityState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::LinkChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Platform ──────────────────────────────────────────────────

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Outputs = OutputDriver<MockPin>;
    type Network = MockNetwork;
    type Clock = MockClock;
    type Cloud = MockCloud;
    type Delay = MockDelay;
    type Sink = RecordingSink;
}
