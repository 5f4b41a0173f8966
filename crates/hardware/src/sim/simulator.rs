//! Simulator: owns the controller, the DRAM device, and the requestor
//! side-by-side.
//!
//! Components never hold references to each other; the dispatch loop passes
//! peers as `&mut` arguments, and deferred interactions (retries, response
//! delivery) travel through the event queue.

use log::debug;

use crate::config::Config;
use crate::sim::eventq::{DrainState, EventQueue, SimEvent, Tick};
use crate::soc::cxl::compression::{BlockCompressor, Lz4Compressor};
use crate::soc::cxl::CxlMemCtrl;
use crate::soc::dram::DramDevice;
use crate::soc::port::Upstream;
use crate::common::error::ConfigError;

/// Top-level simulator: controller + downstream device + requestor.
pub struct Simulator {
    /// The controller under study.
    pub ctrl: CxlMemCtrl,
    /// Downstream DRAM device.
    pub mem: DramDevice,
    /// CPU-side peer driving the workload.
    pub requestor: Box<dyn Upstream>,
    /// Shared event queue.
    pub events: EventQueue,
    now: Tick,
}

impl Simulator {
    /// Builds a system from configuration with the real LZ4 compressor.
    pub fn new(config: &Config, requestor: Box<dyn Upstream>) -> Result<Self, ConfigError> {
        Self::with_compressor(config, requestor, Box::new(Lz4Compressor))
    }

    /// Builds a system with a caller-supplied block compressor.
    pub fn with_compressor(
        config: &Config,
        requestor: Box<dyn Upstream>,
        compressor: Box<dyn BlockCompressor>,
    ) -> Result<Self, ConfigError> {
        let mem = DramDevice::new(&config.mem)?;
        let mut ctrl = CxlMemCtrl::new(config, compressor)?;
        ctrl.connect(mem.addr_range())?;
        let mut events = EventQueue::new();
        events.schedule(SimEvent::RequestorTick, 0);
        Ok(Self {
            ctrl,
            mem,
            requestor,
            events,
            now: 0,
        })
    }

    /// Current simulation time.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Executes the next event. Returns false when no events remain.
    pub fn step(&mut self) -> bool {
        let Some((tick, event)) = self.events.pop() else {
            return false;
        };
        debug_assert!(tick >= self.now, "event time moved backwards");
        self.now = tick;
        self.dispatch(event, tick);
        true
    }

    /// Runs until the event queue is exhausted.
    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Runs events up to and including `limit` ticks.
    pub fn run_until(&mut self, limit: Tick) {
        while self.events.peek_tick().is_some_and(|t| t <= limit) {
            self.step();
        }
        self.now = self.now.max(limit);
    }

    fn dispatch(&mut self, event: SimEvent, now: Tick) {
        let Self {
            ctrl,
            mem,
            requestor,
            events,
            ..
        } = self;
        match event {
            SimEvent::ControllerRequest => ctrl.process_request_event(now, mem, events),
            SimEvent::ControllerResponse => ctrl.process_response_event(now, mem, events),
            SimEvent::PortDeliver => {
                while let Some(pkt) = ctrl.cpu_port.pop_due(now) {
                    match requestor.recv_timing_resp(pkt, now) {
                        Ok(()) => {}
                        Err(pkt) => {
                            ctrl.cpu_port.block_with(pkt, now);
                            break;
                        }
                    }
                }
            }
            SimEvent::MemRespond => {
                mem.begin_respond();
                while let Some(pkt) = mem.pop_ready(now) {
                    match ctrl.recv_timing_resp(pkt, now, events) {
                        Ok(()) => {}
                        Err(pkt) => {
                            mem.stash_blocked(pkt);
                            break;
                        }
                    }
                }
                mem.finish_respond(now, events);
            }
            SimEvent::MemRetryReq => ctrl.recv_req_retry(now, events),
            SimEvent::RequestorRetry => requestor.recv_retry_req(now, events),
            SimEvent::RequestorTick => {
                if requestor.needs_resp_retry() {
                    ctrl.recv_resp_retry(now, events);
                }
                requestor.tick(now, ctrl, events);
            }
        }
    }

    /// Drains the system: flushes the controller queues, the downstream
    /// device, and the delivery port, then reports the final state.
    pub fn drain(&mut self) -> DrainState {
        let state = self.ctrl.drain(self.now, &mut self.events);
        if state == DrainState::Drained && self.mem.is_idle() && self.ctrl.cpu_port.is_empty() {
            return DrainState::Drained;
        }
        debug!("simulator: draining at {}", self.now);
        while !(self.ctrl.queues_empty() && self.mem.is_idle() && self.ctrl.cpu_port.is_empty()) {
            if !self.step() {
                break;
            }
        }
        self.ctrl.check_drain();
        self.ctrl.drain_state()
    }
}
