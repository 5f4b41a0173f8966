//! Test harness: a small system with a recording stub requestor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cxlsim_core::config::Config;
use cxlsim_core::mem::Packet;
use cxlsim_core::sim::eventq::{EventQueue, Tick};
use cxlsim_core::soc::cxl::compression::BlockCompressor;
use cxlsim_core::soc::cxl::CxlMemCtrl;
use cxlsim_core::soc::port::Upstream;
use cxlsim_core::Simulator;

/// Compressor that always reports incompressible blocks.
pub struct NoCompression;

impl BlockCompressor for NoCompression {
    fn compress(&self, _src: &[u8]) -> Option<usize> {
        None
    }
}

/// Compressor with a fixed 50% ratio, for deterministic block sizes.
pub struct HalfCompressor;

impl BlockCompressor for HalfCompressor {
    fn compress(&self, src: &[u8]) -> Option<usize> {
        Some(src.len() / 2)
    }
}

/// Upstream stub that records deliveries and can reject them on demand.
pub struct StubRequestor {
    responses: Arc<Mutex<Vec<(Tick, Packet)>>>,
    reject_responses: Arc<AtomicBool>,
    retry_reqs: Arc<AtomicUsize>,
}

impl Upstream for StubRequestor {
    fn recv_timing_resp(&mut self, pkt: Packet, now: Tick) -> Result<(), Packet> {
        if self.reject_responses.load(Ordering::Relaxed) {
            return Err(pkt);
        }
        self.responses.lock().unwrap().push((now, pkt));
        Ok(())
    }

    fn recv_retry_req(&mut self, _now: Tick, _events: &mut EventQueue) {
        self.retry_reqs.fetch_add(1, Ordering::Relaxed);
    }

    fn tick(&mut self, _now: Tick, _ctrl: &mut CxlMemCtrl, _events: &mut EventQueue) {}

    fn done(&self) -> bool {
        true
    }
}

/// Builds detached stub requestors for constructor tests.
pub struct StubBuilder;

impl StubBuilder {
    /// A fresh boxed stub with its own (unobserved) recording state.
    pub fn boxed() -> Box<dyn Upstream> {
        Box::new(StubRequestor {
            responses: Arc::new(Mutex::new(Vec::new())),
            reject_responses: Arc::new(AtomicBool::new(false)),
            retry_reqs: Arc::new(AtomicUsize::new(0)),
        })
    }
}

/// A controller + DRAM system driven directly by the test.
pub struct TestContext {
    pub sim: Simulator,
    responses: Arc<Mutex<Vec<(Tick, Packet)>>>,
    reject_responses: Arc<AtomicBool>,
    retry_reqs: Arc<AtomicUsize>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Baseline config: default controller parameters over a small RAM
    /// based at zero, so tests can use short literal addresses.
    pub fn config() -> Config {
        let mut config = Config::default();
        config.mem.ram_base = 0;
        config.mem.ram_size = 16 * 1024 * 1024;
        config.traffic.num_packets = 0;
        config
    }

    /// System with the baseline config and the real LZ4 compressor.
    pub fn new() -> Self {
        Self::with_config(Self::config())
    }

    /// System with a custom config and the real LZ4 compressor.
    pub fn with_config(config: Config) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let responses = Arc::new(Mutex::new(Vec::new()));
        let reject_responses = Arc::new(AtomicBool::new(false));
        let retry_reqs = Arc::new(AtomicUsize::new(0));
        let stub = StubRequestor {
            responses: responses.clone(),
            reject_responses: reject_responses.clone(),
            retry_reqs: retry_reqs.clone(),
        };
        let sim = Simulator::new(&config, Box::new(stub)).expect("valid test config");
        Self {
            sim,
            responses,
            reject_responses,
            retry_reqs,
        }
    }

    /// System with a custom config and compressor.
    pub fn with_compressor(config: Config, compressor: Box<dyn BlockCompressor>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let responses = Arc::new(Mutex::new(Vec::new()));
        let reject_responses = Arc::new(AtomicBool::new(false));
        let retry_reqs = Arc::new(AtomicUsize::new(0));
        let stub = StubRequestor {
            responses: responses.clone(),
            reject_responses: reject_responses.clone(),
            retry_reqs: retry_reqs.clone(),
        };
        let sim =
            Simulator::with_compressor(&config, Box::new(stub), compressor).expect("valid config");
        Self {
            sim,
            responses,
            reject_responses,
            retry_reqs,
        }
    }

    /// Injects a 64-byte read at `addr`.
    pub fn send_read(&mut self, addr: u64) -> Result<(), Packet> {
        self.send(Packet::read_req(addr, 64, 0))
    }

    /// Injects a 64-byte write of `fill` at `addr`.
    pub fn send_write(&mut self, addr: u64, fill: u8) -> Result<(), Packet> {
        self.send(Packet::write_req(addr, vec![fill; 64], 0))
    }

    /// Injects an arbitrary packet at the current tick.
    pub fn send(&mut self, pkt: Packet) -> Result<(), Packet> {
        let now = self.sim.now();
        self.sim.ctrl.recv_timing_req(pkt, now, &mut self.sim.events)
    }

    /// Runs all pending events.
    pub fn run(&mut self) {
        self.sim.run();
    }

    /// Runs events up to `tick` and advances time there.
    pub fn advance_to(&mut self, tick: Tick) {
        self.sim.run_until(tick);
    }

    /// Deliveries recorded so far, in order, with their ticks.
    pub fn responses(&self) -> Vec<(Tick, Packet)> {
        self.responses.lock().unwrap().clone()
    }

    /// Read responses only.
    pub fn read_responses(&self) -> Vec<Packet> {
        self.responses()
            .into_iter()
            .map(|(_, p)| p)
            .filter(|p| p.is_read())
            .collect()
    }

    /// Makes the stub reject (or accept again) deliveries.
    pub fn set_reject_responses(&mut self, reject: bool) {
        self.reject_responses.store(reject, Ordering::Relaxed);
    }

    /// Signals the upstream response retry to the controller.
    pub fn retry_responses(&mut self) {
        let now = self.sim.now();
        self.sim.ctrl.recv_resp_retry(now, &mut self.sim.events);
    }

    /// Number of retry-request signals the stub has received.
    pub fn retry_reqs(&self) -> usize {
        self.retry_reqs.load(Ordering::Relaxed)
    }

    /// Reads `len` bytes straight from the backing store.
    pub fn functional_read(&mut self, addr: u64, len: usize) -> Vec<u8> {
        let mut pkt = Packet::read_req(addr, len, 0);
        self.sim.ctrl.recv_functional(&mut pkt, &mut self.sim.mem);
        pkt.data
    }
}
