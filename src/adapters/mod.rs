//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements   | Connects to                    |
//! |------------------|--------------|--------------------------------|
//! | `local_listener` | —            | TCP line listener (std::net)   |
//! | `log_sink`       | EventSink    | Serial log output              |
//! | `mqtt`           | CloudPort    | ESP-IDF MQTT client over TLS   |
//! | `time`           | TimeSyncPort | ESP-IDF SNTP / system clock    |
//! |                  | DelayNs      | FreeRTOS / thread::sleep       |
//! | `wifi`           | NetworkPort  | ESP-IDF WiFi STA               |
//!
//! GPIO outputs implement `OutputPort` in [`crate::drivers::outputs`].

pub mod local_listener;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub mod wifi;
