//! Output drivers and pin initialisation.

pub mod gpio;
pub mod outputs;
