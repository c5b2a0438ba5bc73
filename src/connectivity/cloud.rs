//! Azure IoT Hub session identity.
//!
//! IoT Hub speaks plain MQTT 3.1.1 on port 8883 with a few fixed
//! conventions:
//!
//! - client id = device id
//! - username  = `{host}/{device_id}/?api-version=…`
//! - password  = a SAS token
//! - cloud-to-device messages arrive on `devices/{device_id}/messages/devicebound/#`

use crate::app::ports::CloudEndpoint;
use crate::config::{CloudConfig, IOT_HUB_API_VERSION};

/// Session parameters for `config`.
pub fn endpoint(config: &CloudConfig) -> CloudEndpoint {
    CloudEndpoint {
        host: config.host.clone(),
        port: config.port,
        client_id: config.device_id.clone(),
        username: username(&config.host, &config.device_id),
        password: config.sas_token.clone(),
    }
}

pub fn username(host: &str, device_id: &str) -> String {
    format!("{host}/{device_id}/?api-version={IOT_HUB_API_VERSION}")
}

/// Cloud-to-device topic filter for `device_id`.
pub fn inbound_topic(device_id: &str) -> String {
    format!("devices/{device_id}/messages/devicebound/#")
}

impl CloudEndpoint {
    /// `mqtts://host:port`, as the ESP-IDF client expects.
    pub fn broker_url(&self) -> String {
        format!("mqtts://{}:{}", self.host, self.port)
    }
}
