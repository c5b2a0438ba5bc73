//! End-to-end tests of the device loop: boot, cloud commands, local TCP
//! sessions and link supervision, all on mock adapters plus a real
//! loopback listener.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::mock_hw::{self, MockClock, MockCloud, MockDelay, MockNetwork, MockPlatform, PinBank, RecordingSink};

use sprayer::app::events::AppEvent;
use sprayer::config::SystemConfig;
use sprayer::connectivity::ConnectivityState;
use sprayer::device::{Device, Hardware};

fn config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.local_port = 0;
    config.local_session_timeout_ms = 2_000;
    config.cloud.device_id = "sprayer-01".into();
    config
}

fn device() -> (Device<MockPlatform>, PinBank) {
    let config = config();
    let (outputs, bank) = mock_hw::outputs(config.channel_count());
    let hw = Hardware::<MockPlatform> {
        outputs,
        network: MockNetwork::default(),
        clock: MockClock::synced(),
        cloud: MockCloud::default(),
        delay: MockDelay::watching(&bank),
        sink: RecordingSink::new(),
    };
    (Device::new(&config, hw), bank)
}

fn connect(dev: &Device<MockPlatform>) -> TcpStream {
    let port = dev.listener().unwrap().local_addr().unwrap().port();
    TcpStream::connect(("127.0.0.1", port)).unwrap()
}

/// Iterate until a local session has been served.
fn serve_client(dev: &mut Device<MockPlatform>) -> usize {
    for _ in 0..200 {
        if let Some(lines) = dev.run_iteration().local_lines {
            return lines;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("local client never served");
}

#[test]
fn boot_forces_outputs_off_and_comes_online() {
    let (mut dev, bank) = device();
    dev.start().unwrap();

    assert!(bank.all_low());
    assert_eq!(dev.supervisor().state(), ConnectivityState::CloudConnected);
    assert!(dev.listener().is_some());
    assert_eq!(dev.hardware().sink.events.last(), Some(&AppEvent::Started));
}

#[test]
fn idle_iteration_waits_loop_interval() {
    let (mut dev, _) = device();
    dev.start().unwrap();

    let report = dev.run_iteration();

    assert_eq!(report.cloud_commands, 0);
    assert_eq!(report.local_lines, None);
    assert_eq!(report.link, ConnectivityState::CloudConnected);
    assert_eq!(dev.hardware().delay.waits().last(), Some(&10_000));
}

#[test]
fn cloud_command_is_executed_by_the_loop() {
    let (mut dev, bank) = device();
    dev.start().unwrap();
    dev.hardware().cloud.inject(r#"{"solenoids":[0,1],"duration":250}"#);

    let report = dev.run_iteration();

    assert_eq!(report.cloud_commands, 1);
    let holds = dev.hardware().delay.energised_holds().into_iter().cloned().collect::<Vec<_>>();
    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].ms, 250);
    assert_eq!(holds[0].channels, vec![false, true, false, false, false, false]);
    assert!(bank.all_low());
    assert_eq!(dev.service().stats().activated, 1);
}

#[test]
fn cloud_messages_arriving_mid_hold_run_after_it() {
    let (mut dev, bank) = device();
    dev.start().unwrap();
    let feed = dev.hardware().cloud.feed();
    let mut sent = false;
    dev.hardware_mut().delay.on_wait = Some(Box::new(move |ms: u32| {
        if ms == 300 && !sent {
            sent = true;
            feed.borrow_mut().push_back(r#"{"solenoids":[0,0,1],"duration":100}"#.into());
        }
    }));
    dev.hardware().cloud.inject(r#"{"solenoids":[1],"duration":300}"#);

    let report = dev.run_iteration();

    assert_eq!(report.cloud_commands, 2);
    let holds: Vec<_> = dev.hardware().delay.energised_holds().into_iter().cloned().collect();
    assert_eq!(holds.len(), 2, "second command must not overlap the first");
    assert_eq!(holds[0].channels[..3], [true, false, false]);
    assert_eq!(holds[1].channels[..3], [false, false, true]);
    assert!(bank.all_low());
}

#[test]
fn bad_cloud_payload_is_dropped_without_spraying() {
    let (mut dev, bank) = device();
    dev.start().unwrap();
    dev.hardware().cloud.inject("not json");

    dev.run_iteration();

    assert!(!bank.pump_ever_high());
    assert_eq!(dev.service().stats().rejected, 1);
}

#[test]
fn local_session_gets_one_reply_per_line() {
    let (mut dev, bank) = device();
    dev.start().unwrap();

    let mut client = connect(&dev);
    client
        .write_all(b"{\"solenoids\":[1,0,1],\"duration\":500}\n{\"solenoids\":[]}\nnot json\n")
        .unwrap();
    client.shutdown(std::net::Shutdown::Write).unwrap();

    assert_eq!(serve_client(&mut dev), 3);

    let replies: Vec<String> = BufReader::new(client).lines().map(|l| l.unwrap()).collect();
    assert_eq!(replies, vec!["Now spraying!", "JSON error", "JSON error"]);
    assert!(bank.all_low());
    let holds = dev.hardware().delay.energised_holds().len();
    assert_eq!(holds, 1);
}

#[test]
fn empty_and_non_utf8_lines_get_json_error() {
    let (mut dev, bank) = device();
    dev.start().unwrap();

    let mut client = connect(&dev);
    client.write_all(b"\n\xc3\x28\n").unwrap();
    client.shutdown(std::net::Shutdown::Write).unwrap();

    assert_eq!(serve_client(&mut dev), 2);

    let replies: Vec<String> = BufReader::new(client).lines().map(|l| l.unwrap()).collect();
    assert_eq!(replies, vec!["JSON error", "JSON error"]);
    assert!(!bank.pump_ever_high());
    assert_eq!(dev.service().stats().rejected, 1);
}

#[test]
fn served_iteration_skips_idle_wait() {
    let (mut dev, _) = device();
    dev.start().unwrap();
    let mut client = connect(&dev);
    client.write_all(b"{\"solenoids\":[0]}\n").unwrap();
    client.shutdown(std::net::Shutdown::Write).unwrap();

    let mut served = false;
    for _ in 0..200 {
        let before = dev.hardware().delay.waits().len();
        if dev.run_iteration().local_lines.is_some() {
            assert_eq!(dev.hardware().delay.waits().len(), before);
            served = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(served);
    let mut reply = String::new();
    BufReader::new(client).read_line(&mut reply).unwrap();
    assert_eq!(reply, "Now spraying!\n");
}

#[test]
fn loop_reconnects_after_cloud_drop() {
    let (mut dev, _) = device();
    dev.start().unwrap();
    dev.hardware_mut().cloud.drop_session();

    assert_eq!(dev.run_iteration().link, ConnectivityState::TimeSynced);
    assert_eq!(dev.run_iteration().link, ConnectivityState::CloudConnected);
    assert_eq!(dev.hardware().network.associate_calls, 1);
    assert_eq!(dev.hardware().cloud.connect_calls, 2);
}
