//! MQTT cloud session adapter.
//!
//! Implements [`CloudPort`].  Inbound messages are pushed into the shared
//! [`Inbox`] by whatever task receives them and handed to the main loop
//! in [`CloudPort::poll`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` over TLS (`mqtts://`),
//!   server certificate checked against the ESP-IDF certificate bundle.
//!   The client's event callback runs on the MQTT task.
//! - **all other targets**: in-memory session; tests and the simulator
//!   inject messages with [`MqttAdapter::inject`].

use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::{CloudEndpoint, CloudPort};
use crate::error::CommsError;
use crate::inbox::Inbox;

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::EspMqttClient;

/// How long to wait for CONNACK / SUBACK before giving up.
#[cfg(target_os = "espidf")]
const ACK_TIMEOUT_MS: u32 = 10_000;
#[cfg(target_os = "espidf")]
const ACK_POLL_MS: u32 = 50;

/// Flags flipped by the MQTT task, read by the main loop.
#[cfg(target_os = "espidf")]
#[derive(Default)]
struct SessionFlags {
    connected: AtomicBool,
    subscribed: AtomicBool,
}

pub struct MqttAdapter {
    inbox: Arc<Inbox>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    flags: Arc<SessionFlags>,
    #[cfg(not(target_os = "espidf"))]
    connected: bool,
    #[cfg(not(target_os = "espidf"))]
    topic: Option<String>,
    #[cfg(not(target_os = "espidf"))]
    refuse_connects: u32,
}

impl MqttAdapter {
    pub fn new(inbox: Arc<Inbox>) -> Self {
        Self {
            inbox,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            flags: Arc::new(SessionFlags::default()),
            #[cfg(not(target_os = "espidf"))]
            connected: false,
            #[cfg(not(target_os = "espidf"))]
            topic: None,
            #[cfg(not(target_os = "espidf"))]
            refuse_connects: 0,
        }
    }

    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    // ── ESP-IDF ───────────────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn wait_for(flag: &AtomicBool) -> bool {
        let mut waited = 0;
        while !flag.load(Ordering::Acquire) {
            if waited >= ACK_TIMEOUT_MS {
                return false;
            }
            esp_idf_hal::delay::FreeRtos::delay_ms(ACK_POLL_MS);
            waited += ACK_POLL_MS;
        }
        true
    }

    #[cfg(target_os = "espidf")]
    fn open(&mut self, endpoint: &CloudEndpoint) -> Result<(), esp_idf_svc::sys::EspError> {
        use esp_idf_svc::mqtt::client::{Details, EventPayload, MqttClientConfiguration, MqttProtocolVersion};

        // Drop any previous session before opening a new one.
        self.client = None;
        self.flags = Arc::new(SessionFlags::default());

        let conf = MqttClientConfiguration {
            client_id: Some(endpoint.client_id.as_str()),
            username: Some(endpoint.username.as_str()),
            password: Some(endpoint.password.as_str()),
            protocol_version: Some(MqttProtocolVersion::V3_1_1),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        let flags = self.flags.clone();
        let inbox = self.inbox.clone();
        let client = EspMqttClient::new_cb(&endpoint.broker_url(), &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    flags.connected.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    flags.connected.store(false, Ordering::Release);
                    flags.subscribed.store(false, Ordering::Release);
                }
                EventPayload::Subscribed(_) => {
                    flags.subscribed.store(true, Ordering::Release);
                }
                EventPayload::Received { data, details, .. } => {
                    // Only whole messages; chunked deliveries are larger than a slot anyway.
                    if matches!(details, Details::Complete) {
                        let _ = inbox.push_bytes(data);
                    } else {
                        warn!("MQTT: dropping chunked message");
                    }
                }
                EventPayload::Error(e) => {
                    warn!("MQTT: {:?}", e);
                }
                _ => {}
            }
        })?;
        self.client = Some(client);
        Ok(())
    }

    // ── Host simulation ───────────────────────────────────────

    /// Simulation only: deliver a message as if it came from the broker.
    /// Dropped unless a session is up.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&self, payload: &str) -> bool {
        if !self.connected {
            warn!("MQTT(sim): no session, message lost");
            return false;
        }
        self.inbox.push(payload).is_ok()
    }

    /// Simulation only: the broker closed the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn drop_session(&mut self) {
        warn!("MQTT(sim): session dropped");
        self.connected = false;
        self.topic = None;
    }

    /// Simulation only: refuse the next `n` connect attempts.
    #[cfg(not(target_os = "espidf"))]
    pub fn refuse_connects(&mut self, n: u32) {
        self.refuse_connects = n;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn subscribed_topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

impl CloudPort for MqttAdapter {
    #[cfg(target_os = "espidf")]
    fn connect(&mut self, endpoint: &CloudEndpoint) -> Result<(), CommsError> {
        info!("MQTT: connecting to {} as {}", endpoint.broker_url(), endpoint.client_id);
        self.open(endpoint).map_err(|e| {
            warn!("MQTT: client start failed: {:?}", e);
            CommsError::SessionConnectFailed
        })?;
        if !Self::wait_for(&self.flags.connected) {
            warn!("MQTT: no CONNACK within {} ms", ACK_TIMEOUT_MS);
            self.client = None;
            return Err(CommsError::SessionConnectFailed);
        }
        info!("MQTT: session up");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect(&mut self, endpoint: &CloudEndpoint) -> Result<(), CommsError> {
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            warn!("MQTT(sim): connect to {} refused", endpoint.host);
            return Err(CommsError::SessionConnectFailed);
        }
        info!("MQTT(sim): session up as {}", endpoint.client_id);
        self.connected = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::QoS;

        let client = self.client.as_mut().ok_or(CommsError::SubscribeFailed)?;
        client.subscribe(topic, QoS::AtLeastOnce).map_err(|e| {
            warn!("MQTT: subscribe to {} failed: {:?}", topic, e);
            CommsError::SubscribeFailed
        })?;
        if !Self::wait_for(&self.flags.subscribed) {
            warn!("MQTT: no SUBACK for {} within {} ms", topic, ACK_TIMEOUT_MS);
            return Err(CommsError::SubscribeFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        if !self.connected {
            return Err(CommsError::SubscribeFailed);
        }
        self.topic = Some(topic.to_owned());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn is_connected(&self) -> bool {
        self.client.is_some() && self.flags.connected.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll<F: FnMut(&str)>(&mut self, handler: F) {
        self.inbox.drain(handler);
    }
}
