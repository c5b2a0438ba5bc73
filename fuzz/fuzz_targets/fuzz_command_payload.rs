//! Fuzz target: command interpreter + actuation engine.
//!
//! Any byte string is fed to the interpreter; accepted requests are run
//! against simulated outputs.  Must never panic, and every output must
//! be off afterwards.

#![no_main]

use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;

use sprayer::app::actuation;
use sprayer::app::commands::{CommandPolicy, interpret};
use sprayer::app::ports::OutputPort;
use sprayer::drivers::gpio::SimPin;
use sprayer::drivers::outputs::OutputDriver;

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let policy = CommandPolicy::default();
    let Ok(req) = interpret(text, &policy) else {
        return;
    };
    assert_eq!(req.flags().len(), policy.channel_count);
    assert!(req.duration_ms() <= policy.max_duration_ms);

    let mut out = OutputDriver::new(SimPin::new(16), (0..policy.channel_count).map(|i| SimPin::new(i as i32)));
    let _ = actuation::execute(req, &mut out, &mut NoDelay);
    assert!(out.assembly().all_off());
});
