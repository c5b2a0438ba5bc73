//! Application core — pure domain logic, zero I/O.
//!
//! Command interpretation, the actuation engine, and the command service
//! that ties them together.  All interaction with hardware and the
//! network happens through the **port traits** in [`ports`], so this
//! layer is testable without real peripherals.

pub mod actuation;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
