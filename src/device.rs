//! Device context and main loop.
//!
//! [`Device`] owns every piece of mutable state (outputs, network
//! adapters, the command service, the connectivity supervisor, the local
//! listener) and threads it through one cooperative loop.  There are no
//! mutable statics.
//!
//! Each [`Device::run_iteration`]:
//!
//! 1. drains the cloud inbox through the command service,
//! 2. ticks the connectivity supervisor once,
//! 3. serves at most one local client session,
//! 4. idles for `loop_idle_ms` if no local client was waiting.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::adapters::local_listener::{ListenerError, LocalListener};
use crate::app::commands::CommandSource;
use crate::app::events::AppEvent;
use crate::app::ports::{CloudPort, EventSink, NetworkPort, OutputPort, TimeSyncPort};
use crate::app::service::{CommandService, Reply};
use crate::config::SystemConfig;
use crate::connectivity::{ConnectivityState, ConnectivitySupervisor, LinkPorts};

/// Binds the concrete adapter types for one build target.
pub trait Platform {
    type Outputs: OutputPort;
    type Network: NetworkPort;
    type Clock: TimeSyncPort;
    type Cloud: CloudPort;
    type Delay: DelayNs;
    type Sink: EventSink;
}

/// The adapter instances a [`Device`] runs on.
pub struct Hardware<P: Platform> {
    pub outputs: P::Outputs,
    pub network: P::Network,
    pub clock: P::Clock,
    pub cloud: P::Cloud,
    pub delay: P::Delay,
    pub sink: P::Sink,
}

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationReport {
    /// Cloud messages handled in step 1.
    pub cloud_commands: usize,
    /// Supervisor state after step 2.
    pub link: ConnectivityState,
    /// Lines answered in step 3, `None` if no client was waiting.
    pub local_lines: Option<usize>,
}

pub struct Device<P: Platform> {
    hw: Hardware<P>,
    service: CommandService,
    supervisor: ConnectivitySupervisor,
    listener: Option<LocalListener>,
    local_port: u16,
    max_line: usize,
    session_timeout_ms: u32,
    loop_idle_ms: u32,
    iterations: u64,
}

impl<P: Platform> Device<P> {
    pub fn new(config: &SystemConfig, hw: Hardware<P>) -> Self {
        Self {
            hw,
            service: CommandService::new(config),
            supervisor: ConnectivitySupervisor::new(config),
            listener: None,
            local_port: config.local_port,
            max_line: config.max_payload_bytes,
            session_timeout_ms: config.local_session_timeout_ms,
            loop_idle_ms: config.loop_idle_ms,
            iterations: 0,
        }
    }

    /// Boot sequence: outputs off, connectivity up, listener bound.
    ///
    /// Blocks until the cloud session is established.
    pub fn start(&mut self) -> Result<(), ListenerError> {
        self.hw.outputs.shutdown();
        info!("BOOT: outputs forced off");

        let hw = &mut self.hw;
        self.supervisor.establish(
            &mut LinkPorts {
                network: &mut hw.network,
                clock: &mut hw.clock,
                cloud: &mut hw.cloud,
                delay: &mut hw.delay,
            },
            &mut hw.sink,
        );

        self.listener = Some(LocalListener::bind(self.local_port, self.max_line, self.session_timeout_ms)?);
        self.hw.sink.emit(&AppEvent::Started);
        Ok(())
    }

    /// One pass of the main loop.
    pub fn run_iteration(&mut self) -> IterationReport {
        self.iterations = self.iterations.wrapping_add(1);
        let Self {
            hw,
            service,
            supervisor,
            listener,
            loop_idle_ms,
            ..
        } = self;

        // 1. Cloud commands queued since the last pass.
        let mut cloud_commands = 0;
        hw.cloud.poll(|payload| {
            cloud_commands += 1;
            // Cloud callers get no reply; failures are already logged.
            let _ = service.handle_payload(
                CommandSource::Cloud,
                payload,
                &mut hw.outputs,
                &mut hw.delay,
                &mut hw.sink,
            );
        });

        // 2. Connectivity.
        let link = supervisor.tick(
            &mut LinkPorts {
                network: &mut hw.network,
                clock: &mut hw.clock,
                cloud: &mut hw.cloud,
                delay: &mut hw.delay,
            },
            &mut hw.sink,
        );

        // 3. Local client.
        let local_lines = match listener.as_mut() {
            Some(listener) => {
                let served = listener.serve_next(|line| {
                    let result = service.handle_payload(
                        CommandSource::Local,
                        line,
                        &mut hw.outputs,
                        &mut hw.delay,
                        &mut hw.sink,
                    );
                    Reply::for_result(&result)
                });
                served.unwrap_or_else(|e| {
                    warn!("LOCAL: {}", e);
                    None
                })
            }
            None => None,
        };

        // 4. Idle.
        if local_lines.is_none() {
            hw.delay.delay_ms(*loop_idle_ms);
        }

        IterationReport {
            cloud_commands,
            link,
            local_lines,
        }
    }

    /// Run forever.
    pub fn run(&mut self) -> ! {
        loop {
            let report = self.run_iteration();
            if self.iterations % 60 == 0 {
                let s = self.service.stats();
                info!(
                    "STATS | link={} rx={} ok={} skip={} rej={} fail={}",
                    report.link, s.received, s.activated, s.skipped, s.rejected, s.failed
                );
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn hardware(&self) -> &Hardware<P> {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut Hardware<P> {
        &mut self.hw
    }

    pub fn service(&self) -> &CommandService {
        &self.service
    }

    pub fn supervisor(&self) -> &ConnectivitySupervisor {
        &self.supervisor
    }

    pub fn listener(&self) -> Option<&LocalListener> {
        self.listener.as_ref()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
