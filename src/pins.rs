//! GPIO assignments for the sprayer board.
//!
//! These are the factory defaults; [`SystemConfig`](crate::config::SystemConfig)
//! carries the live mapping so a board revision can re-route outputs
//! without touching the drivers.

// ---------------------------------------------------------------------------
// Pump (relay / MOSFET, active HIGH)
// ---------------------------------------------------------------------------

pub const PUMP_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// Solenoid valves (active HIGH), index order = channel order
// ---------------------------------------------------------------------------

pub const SOLENOID_GPIOS: [i32; 6] = [4, 5, 13, 14, 17, 21];
