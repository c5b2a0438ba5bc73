//! Integration tests for the connectivity supervisor against scripted
//! network, clock and cloud mocks.

use crate::mock_hw::{MockClock, MockCloud, MockDelay, MockNetwork, RecordingSink};

use sprayer::config::SystemConfig;
use sprayer::connectivity::ConnectivityState::{self, CloudConnected, Disconnected, NetworkUp, TimeSynced};
use sprayer::connectivity::{ConnectivitySupervisor, LinkPorts};

struct Link {
    sup: ConnectivitySupervisor,
    net: MockNetwork,
    clock: MockClock,
    cloud: MockCloud,
    delay: MockDelay,
    sink: RecordingSink,
}

impl Link {
    fn new() -> Self {
        let mut config = SystemConfig::default();
        config.cloud.host = "farm-hub.azure-devices.net".into();
        config.cloud.device_id = "sprayer-01".into();
        config.cloud.sas_token = "SharedAccessSignature sr=x".into();
        Self {
            sup: ConnectivitySupervisor::new(&config),
            net: MockNetwork::default(),
            clock: MockClock::synced(),
            cloud: MockCloud::default(),
            delay: MockDelay::new(),
            sink: RecordingSink::new(),
        }
    }

    fn ports(&mut self) -> (LinkPorts<'_, MockNetwork, MockClock, MockCloud, MockDelay>, &mut ConnectivitySupervisor, &mut RecordingSink) {
        (
            LinkPorts {
                network: &mut self.net,
                clock: &mut self.clock,
                cloud: &mut self.cloud,
                delay: &mut self.delay,
            },
            &mut self.sup,
            &mut self.sink,
        )
    }

    fn tick(&mut self) -> ConnectivityState {
        let (mut ports, sup, sink) = self.ports();
        sup.tick(&mut ports, sink)
    }

    fn establish(&mut self) {
        let (mut ports, sup, sink) = self.ports();
        sup.establish(&mut ports, sink);
    }
}

#[test]
fn establish_connects_with_iot_hub_identity() {
    let mut link = Link::new();
    link.establish();

    assert_eq!(link.sup.state(), CloudConnected);
    assert_eq!(link.sink.link_path(), vec![NetworkUp, TimeSynced, CloudConnected]);

    let ep = link.cloud.last_endpoint.clone().unwrap();
    assert_eq!(ep.client_id, "sprayer-01");
    assert_eq!(ep.username, "farm-hub.azure-devices.net/sprayer-01/?api-version=2021-04-12");
    assert_eq!(ep.password, "SharedAccessSignature sr=x");
    assert_eq!(ep.port, 8883);
    assert_eq!(link.cloud.topics, vec!["devices/sprayer-01/messages/devicebound/#"]);
}

// ── Scenario D: session drop → reconnect only ─────────────────

#[test]
fn scenario_d_session_drop_reconnects_without_redoing_network_or_time() {
    let mut link = Link::new();
    link.establish();
    let assoc = link.net.associate_calls;
    let syncs = link.clock.sync_requests;
    let reads = link.clock.reads();

    link.cloud.drop_session();
    assert_eq!(link.tick(), TimeSynced);
    assert_eq!(link.tick(), CloudConnected);

    assert_eq!(link.net.associate_calls, assoc);
    assert_eq!(link.clock.sync_requests, syncs);
    assert_eq!(link.clock.reads(), reads);
    assert_eq!(link.cloud.connect_calls, 2);
    assert_eq!(link.cloud.subscribe_calls, 2);
    assert_eq!(
        link.sink.link_path(),
        vec![NetworkUp, TimeSynced, CloudConnected, TimeSynced, CloudConnected]
    );
}

#[test]
fn reconnect_failures_retry_on_cloud_interval() {
    let mut link = Link::new();
    link.establish();
    link.cloud.drop_session();
    link.cloud.refuse_connects = 2;

    assert_eq!(link.tick(), TimeSynced);
    assert_eq!(link.tick(), TimeSynced);
    assert_eq!(link.tick(), TimeSynced);
    assert_eq!(link.tick(), CloudConnected);
    assert_eq!(link.delay.waits(), vec![1_000, 1_000]);
}

#[test]
fn subscribe_failure_retries_connect_and_subscribe() {
    let mut link = Link::new();
    link.cloud.refuse_subscribes = 1;
    link.establish();
    assert_eq!(link.cloud.connect_calls, 2);
    assert_eq!(link.cloud.subscribe_calls, 2);
    assert_eq!(link.delay.waits(), vec![1_000]);
}

#[test]
fn association_retries_every_second_until_it_succeeds() {
    let mut link = Link::new();
    link.net.fail_next = 3;
    link.establish();
    assert_eq!(link.net.associate_calls, 4);
    assert_eq!(link.delay.waits(), vec![1_000, 1_000, 1_000]);
    assert_eq!(link.sup.state(), CloudConnected);
}

#[test]
fn clock_is_polled_every_500ms_until_sane() {
    let mut link = Link::new();
    link.clock.sane_after = 3;
    link.establish();
    assert_eq!(link.clock.sync_requests, 1);
    assert_eq!(link.delay.waits(), vec![500, 500, 500]);
}

#[test]
fn failed_sync_request_is_retried() {
    let mut link = Link::new();
    link.clock.fail_requests = 1;
    link.establish();
    assert_eq!(link.clock.sync_requests, 2);
    assert_eq!(link.delay.waits(), vec![500]);
}

#[test]
fn wifi_loss_falls_back_to_disconnected() {
    let mut link = Link::new();
    link.establish();
    link.cloud.drop_session();
    link.net.drop_link();

    assert_eq!(link.tick(), Disconnected);
    assert_eq!(link.tick(), NetworkUp);
    // Clock is already sane; time sync passes straight through.
    assert_eq!(link.tick(), TimeSynced);
    assert_eq!(link.tick(), CloudConnected);
    assert_eq!(link.net.associate_calls, 2);
    assert!(link.delay.waits().is_empty());
}

#[test]
fn wifi_loss_during_reconnect_re_associates() {
    let mut link = Link::new();
    link.establish();
    link.cloud.drop_session();
    link.cloud.refuse_connects = 2;

    assert_eq!(link.tick(), TimeSynced);
    assert_eq!(link.tick(), TimeSynced);
    link.net.drop_link();
    assert_eq!(link.tick(), Disconnected);
    assert_eq!(link.tick(), NetworkUp);
    assert_eq!(link.tick(), TimeSynced);
    assert_eq!(link.tick(), CloudConnected);
    assert_eq!(link.net.associate_calls, 2);
    assert_eq!(link.delay.waits(), vec![1_000]);
}

#[test]
fn steady_state_does_nothing() {
    let mut link = Link::new();
    link.establish();
    let events = link.sink.events.len();
    for _ in 0..5 {
        assert_eq!(link.tick(), CloudConnected);
    }
    assert_eq!(link.sink.events.len(), events);
    assert_eq!(link.cloud.connect_calls, 1);
    assert_eq!(link.sup.transitions(), 3);
}
