//! Sprayer firmware library.
//!
//! Exposes the command core, drivers, adapters and the device loop for
//! the binary and for integration testing.  All ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module; on
//! other targets the same modules build with simulation stubs.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod connectivity;
pub mod device;
pub mod drivers;
pub mod error;
pub mod inbox;
pub mod pins;
