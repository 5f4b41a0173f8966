//! CXL-attached memory controller with transparent line compression.
//!
//! The controller sits between the requestor and the downstream DRAM
//! device. It provides:
//! 1. **Admission:** Bounded read/write queues with write coalescing and
//!    read-after-write forwarding; writes are acknowledged on buffering.
//! 2. **Bus turn:** A read/write state machine that drains one queue at a
//!    time, flushing writes in compressed batches.
//! 3. **Compression:** Batch granularity selection and per-block size
//!    bookkeeping; reads under a compressed block are amplified to the
//!    whole block and the requested line is extracted from the response.
//! 4. **Backpressure:** Retry latches in both directions; nothing is
//!    dropped.
//! 5. **Drain:** A quiescence handshake that flushes all queues.

/// Write-batch compression selection.
pub mod compression;
/// Request and response pipeline steps.
pub mod pipeline;
/// Bounded packet queues.
pub mod queues;

use std::collections::HashMap;

use log::{debug, trace};

use crate::common::addr::{AddrRange, AddrRangeList};
use crate::common::error::ConfigError;
use crate::common::CACHE_LINE;
use crate::config::Config;
use crate::mem::{Packet, PacketId};
use crate::sim::eventq::{DrainState, EventQueue, SimEvent, Tick};
use crate::soc::dram::DramDevice;
use crate::soc::port::QueuedResponsePort;
use crate::stats::CtrlStats;

use compression::BlockCompressor;
use queues::PacketQueue;

/// Bus-turn direction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RwState {
    /// No direction chosen; pick from queue occupancy.
    Start,
    /// Draining the read queue.
    Read,
    /// Draining the write queue as a compressed batch.
    Write,
}

/// The CXL memory controller.
pub struct CxlMemCtrl {
    name: &'static str,

    read_queue: PacketQueue,
    write_queue: PacketQueue,
    resp_queue: PacketQueue,

    /// Buffer of responses scheduled for delivery to the requestor.
    pub cpu_port: QueuedResponsePort,

    packet_latency: HashMap<PacketId, Tick>,
    compressed_read_map: HashMap<PacketId, Packet>,
    compressed_block_sizes: HashMap<u64, u32>,

    cmp_block_sizes: Vec<u32>,
    cmped_pkt: usize,
    batch_open: bool,

    pub(crate) rw_state: RwState,
    pub(crate) next_rw_state: RwState,

    prev_arrival: Option<Tick>,

    retry_rd_req: bool,
    retry_wr_req: bool,
    resend_req: bool,
    resend_mem_resp: bool,

    req_event_scheduled: bool,
    resp_event_scheduled: bool,

    drain_state: DrainState,

    pub(crate) write_pkt_threshold: usize,
    pub(crate) block_size: u64,
    pub(crate) frontend_latency: Tick,
    pub(crate) backend_latency: Tick,
    pub(crate) delay: Tick,

    pub(crate) compressor: Box<dyn BlockCompressor>,
    mem_range: AddrRange,

    /// Published statistics.
    pub stats: CtrlStats,
}

impl CxlMemCtrl {
    /// Builds a controller from configuration, validating queue depths and
    /// batch geometry.
    pub fn new(config: &Config, compressor: Box<dyn BlockCompressor>) -> Result<Self, ConfigError> {
        let c = &config.ctrl;
        if c.read_buffer_size == 0 {
            return Err(ConfigError::ZeroQueueDepth("read_buffer_size"));
        }
        if c.write_buffer_size == 0 {
            return Err(ConfigError::ZeroQueueDepth("write_buffer_size"));
        }
        if c.response_buffer_size == 0 {
            return Err(ConfigError::ZeroQueueDepth("response_buffer_size"));
        }
        if c.write_pkt_threshold == 0 || c.write_pkt_threshold > c.write_buffer_size {
            return Err(ConfigError::InvalidWriteThreshold {
                threshold: c.write_pkt_threshold,
                write_buffer_size: c.write_buffer_size,
            });
        }
        if c.compressed_size == 0 || c.compressed_size % CACHE_LINE as u64 != 0 {
            return Err(ConfigError::InvalidBlockSize(c.compressed_size));
        }
        Ok(Self {
            name: "cxl_mem_ctrl",
            read_queue: PacketQueue::new(c.read_buffer_size),
            write_queue: PacketQueue::new(c.write_buffer_size),
            resp_queue: PacketQueue::new(c.response_buffer_size),
            cpu_port: QueuedResponsePort::new(),
            packet_latency: HashMap::new(),
            compressed_read_map: HashMap::new(),
            compressed_block_sizes: HashMap::new(),
            cmp_block_sizes: Vec::new(),
            cmped_pkt: 0,
            batch_open: false,
            rw_state: RwState::Start,
            next_rw_state: RwState::Start,
            prev_arrival: None,
            retry_rd_req: false,
            retry_wr_req: false,
            resend_req: false,
            resend_mem_resp: false,
            req_event_scheduled: false,
            resp_event_scheduled: false,
            drain_state: DrainState::Running,
            write_pkt_threshold: c.write_pkt_threshold,
            block_size: c.compressed_size,
            frontend_latency: c.static_frontend_latency,
            backend_latency: c.static_backend_latency,
            delay: c.delay,
            compressor,
            mem_range: AddrRange::new(0, 0),
            stats: CtrlStats::default(),
        })
    }

    /// Connects the memory-side port to the downstream device's range.
    pub fn connect(&mut self, range: AddrRange) -> Result<(), ConfigError> {
        if range.size == 0 {
            return Err(ConfigError::PortUnconnected(self.name.into()));
        }
        self.mem_range = range;
        Ok(())
    }

    /// Address ranges visible through the requestor-side port.
    pub fn get_addr_ranges(&self) -> AddrRangeList {
        vec![self.mem_range]
    }

    // ── Admission ────────────────────────────────────────────────

    /// Accepts a timing request from the requestor.
    ///
    /// Writes coalesce into a matching queued write or append a copy, and
    /// are acknowledged immediately. Reads are served from a matching
    /// queued write when possible, otherwise queued (amplified if the line
    /// lives under a compressed block). A full queue hands the packet back
    /// and latches a retry.
    ///
    /// # Panics
    ///
    /// Panics on a cache-responding or non-read/non-write packet; both
    /// indicate a bug in the surrounding simulator.
    pub fn recv_timing_req(
        &mut self,
        pkt: Packet,
        now: Tick,
        events: &mut EventQueue,
    ) -> Result<(), Packet> {
        assert!(
            !pkt.cache_responding,
            "{}: should not see packets where cache is responding",
            self.name
        );
        assert!(
            pkt.is_read() || pkt.is_write(),
            "{}: should only see read and writes, saw {:?}",
            self.name,
            pkt.cmd
        );

        if pkt.is_write() {
            self.recv_write(pkt, now, events)
        } else {
            self.recv_read(pkt, now, events)
        }
    }

    fn recv_write(
        &mut self,
        pkt: Packet,
        now: Tick,
        events: &mut EventQueue,
    ) -> Result<(), Packet> {
        if self.write_queue.is_full() {
            debug!("{}: write queue full, not accepting", self.name);
            self.retry_wr_req = true;
            return Err(pkt);
        }

        self.note_arrival(pkt.id, now);
        self.stats.record_write_req(pkt.requestor, pkt.size as u64);

        if let Some(existing) = self.write_queue.find_mut(pkt.addr, pkt.size) {
            // Merge into the pending write; its ack covers this one too.
            existing.data.copy_from_slice(&pkt.data);
            self.packet_latency.remove(&pkt.id);
            self.stats.merged_writes += 1;
            trace!("{}: merged write to {:#x}", self.name, pkt.addr);
        } else {
            self.write_queue.push_back(pkt.clone());
        }

        self.access_and_respond(pkt, self.frontend_latency, now, events);

        if self.write_trigger() {
            self.schedule_req_event(events, now);
        }
        Ok(())
    }

    fn recv_read(&mut self, pkt: Packet, now: Tick, events: &mut EventQueue) -> Result<(), Packet> {
        if let Some(forwarded) = self.find_in_write_queue(&pkt) {
            let mut pkt = pkt;
            self.note_arrival(pkt.id, now);
            self.stats.record_read_req(pkt.requestor, pkt.size as u64);
            pkt.data.copy_from_slice(&forwarded);
            // Served entirely from the buffer: latency closes right here.
            let arrival = self
                .packet_latency
                .remove(&pkt.id)
                .expect("arrival recorded above");
            self.stats.record_read_latency(now - arrival);
            self.stats.serviced_by_wrq += 1;
            trace!("{}: read {:#x} served from write queue", self.name, pkt.addr);
            self.access_and_respond(pkt, self.frontend_latency, now, events);
            return Ok(());
        }

        if self.read_queue.is_full() {
            debug!("{}: read queue full, not accepting", self.name);
            self.retry_rd_req = true;
            return Err(pkt);
        }

        self.note_arrival(pkt.id, now);
        self.stats.record_read_req(pkt.requestor, pkt.size as u64);
        self.handle_read_request(pkt);
        self.schedule_req_event(events, now);
        Ok(())
    }

    /// Returns the pending write data covering `pkt`, if forwarding
    /// applies. Only a full-cacheline read at the exact address of an
    /// equally-sized pending write is forwarded.
    fn find_in_write_queue(&self, pkt: &Packet) -> Option<Vec<u8>> {
        if pkt.size != CACHE_LINE {
            return None;
        }
        self.write_queue
            .find(pkt.addr, pkt.size)
            .map(|w| w.data.clone())
    }

    /// Queues a read, amplifying it to the containing compressed block
    /// when the line was written under compression.
    fn handle_read_request(&mut self, pkt: Packet) {
        let cmp_size = match self.compressed_block_sizes.get(&pkt.addr) {
            None => {
                self.stats.non_dram_read_packets += 1;
                self.read_queue.push_back(pkt);
                return;
            }
            Some(&s) => s as u64,
        };

        let mut start = pkt.addr;
        let end = start + cmp_size - 1;
        if start / self.block_size != end / self.block_size {
            // Slide left so the span stays inside one interleave region.
            start -= (end % self.block_size) + 1;
        }

        let mut big = Packet::read_req(start, cmp_size as usize, pkt.requestor);
        big.flags = pkt.flags;
        trace!(
            "{}: amplifying read {:#x} to [{:#x}, {:#x})",
            self.name,
            pkt.addr,
            start,
            start + cmp_size
        );
        self.stats.dram_read_packets += 1;
        self.stats.dram_read_bytes += cmp_size;
        self.compressed_read_map.insert(big.id, pkt);
        self.read_queue.push_back(big);
    }

    // ── Downstream responses ─────────────────────────────────────

    /// Accepts a timing response from the downstream device.
    ///
    /// Write responses close out latency accounting and are dropped (the
    /// admission-time ack already answered the requestor). Read responses
    /// queue for delivery; an amplified read response first has the
    /// original line extracted. A full response queue hands the packet
    /// back and latches the downstream retry.
    pub fn recv_timing_resp(
        &mut self,
        pkt: Packet,
        now: Tick,
        events: &mut EventQueue,
    ) -> Result<(), Packet> {
        if pkt.cmd.is_write() {
            if let Some(arrival) = self.packet_latency.remove(&pkt.id) {
                self.stats.record_write_latency(now - arrival);
            }
            self.check_drain();
            return Ok(());
        }

        if self.resp_queue.is_full() {
            debug!("{}: response queue full, deferring downstream", self.name);
            self.resend_mem_resp = true;
            return Err(pkt);
        }

        if let Some(mut orig) = self.compressed_read_map.remove(&pkt.id) {
            let offset = (orig.addr - pkt.addr) as usize;
            assert!(
                offset + orig.size <= pkt.size,
                "{}: extracted line [{:#x}, {:#x}) escapes block [{:#x}, {:#x})",
                self.name,
                orig.addr,
                orig.addr + orig.size as u64,
                pkt.addr,
                pkt.addr + pkt.size as u64
            );
            orig.data
                .copy_from_slice(&pkt.data[offset..offset + orig.size]);
            self.stats.total_read_copy_latency += orig.size as Tick;
            self.resp_queue.push_back(orig);
            // The synthetic block read is dropped here.
        } else {
            self.resp_queue.push_back(pkt);
        }

        self.schedule_resp_event(events, now + self.delay);
        Ok(())
    }

    // ── Retry entry points ───────────────────────────────────────

    /// The requestor has room again; resume response delivery.
    pub fn recv_resp_retry(&mut self, now: Tick, events: &mut EventQueue) {
        self.cpu_port.unblock();
        if !self.cpu_port.is_empty() {
            events.schedule(SimEvent::PortDeliver, now);
        }
    }

    /// The downstream device can accept requests again.
    pub fn recv_req_retry(&mut self, now: Tick, events: &mut EventQueue) {
        self.resend_req = false;
        self.schedule_req_event(events, now);
    }

    /// Forwards a functional (atomic, non-timing) access to the device.
    pub fn recv_functional(&self, pkt: &mut Packet, dram: &mut DramDevice) {
        dram.functional_access(pkt);
    }

    // ── Drain ────────────────────────────────────────────────────

    /// Begins a drain. Returns `Drained` immediately when all queues are
    /// empty, otherwise kicks both pipelines and returns `Draining`.
    pub fn drain(&mut self, now: Tick, events: &mut EventQueue) -> DrainState {
        if self.queues_empty() {
            self.drain_state = DrainState::Drained;
        } else {
            debug!(
                "{}: draining, rd {} wr {} resp {}",
                self.name,
                self.read_queue.len(),
                self.write_queue.len(),
                self.resp_queue.len()
            );
            self.drain_state = DrainState::Draining;
            self.schedule_req_event(events, now);
            self.schedule_resp_event(events, now);
        }
        self.drain_state
    }

    /// Current drain state.
    pub fn drain_state(&self) -> DrainState {
        self.drain_state
    }

    pub(crate) fn queues_empty(&self) -> bool {
        self.read_queue.is_empty() && self.write_queue.is_empty() && self.resp_queue.is_empty()
    }

    pub(crate) fn check_drain(&mut self) {
        if self.drain_state == DrainState::Draining && self.queues_empty() {
            debug!("{}: done draining", self.name);
            self.drain_state = DrainState::Drained;
        }
    }

    pub(crate) fn draining(&self) -> bool {
        self.drain_state == DrainState::Draining
    }

    // ── Internals shared with the pipeline ───────────────────────

    fn note_arrival(&mut self, id: PacketId, now: Tick) {
        if let Some(prev) = self.prev_arrival {
            self.stats.total_gap += now - prev;
        }
        self.prev_arrival = Some(now);
        debug_assert!(
            !self.packet_latency.contains_key(&id),
            "packet id {} already in flight",
            id
        );
        self.packet_latency.insert(id, now);
    }

    /// Turns a request into its response and schedules delivery at
    /// `now + static_latency` through the queued port.
    pub(crate) fn access_and_respond(
        &mut self,
        mut pkt: Packet,
        static_latency: Tick,
        now: Tick,
        events: &mut EventQueue,
    ) {
        if !pkt.needs_response {
            return;
        }
        pkt.make_response();
        self.cpu_port.schedule_resp(pkt, now + static_latency, events);
    }

    pub(crate) fn write_trigger(&self) -> bool {
        self.write_queue.len() >= self.write_pkt_threshold
            || (self.draining() && !self.write_queue.is_empty())
    }

    pub(crate) fn schedule_req_event(&mut self, events: &mut EventQueue, tick: Tick) {
        if !self.req_event_scheduled {
            self.req_event_scheduled = true;
            events.schedule(SimEvent::ControllerRequest, tick);
        }
    }

    pub(crate) fn schedule_resp_event(&mut self, events: &mut EventQueue, tick: Tick) {
        if !self.resp_event_scheduled {
            self.resp_event_scheduled = true;
            events.schedule(SimEvent::ControllerResponse, tick);
        }
    }

    // ── Introspection (tests, reporting) ─────────────────────────

    /// Occupancy of the read queue.
    pub fn read_queue_len(&self) -> usize {
        self.read_queue.len()
    }

    /// Occupancy of the write queue.
    pub fn write_queue_len(&self) -> usize {
        self.write_queue.len()
    }

    /// Occupancy of the response queue.
    pub fn resp_queue_len(&self) -> usize {
        self.resp_queue.len()
    }

    /// The pending write matching `addr`/`size`, if one is queued.
    pub fn pending_write(&self, addr: u64, size: usize) -> Option<&Packet> {
        self.write_queue.find(addr, size)
    }

    /// The compressed block size recorded for `addr`, if any.
    pub fn compressed_block_size(&self, addr: u64) -> Option<u32> {
        self.compressed_block_sizes.get(&addr).copied()
    }

    /// Number of latency records currently open.
    pub fn open_latency_records(&self) -> usize {
        self.packet_latency.len()
    }

    /// Number of amplified reads in flight.
    pub fn amplified_in_flight(&self) -> usize {
        self.compressed_read_map.len()
    }

    /// Whether a read retry is owed to the requestor.
    pub fn retry_rd_req(&self) -> bool {
        self.retry_rd_req
    }

    /// Whether a write retry is owed to the requestor.
    pub fn retry_wr_req(&self) -> bool {
        self.retry_wr_req
    }

    /// Whether the request pipeline is suspended on a downstream retry.
    pub fn resend_req(&self) -> bool {
        self.resend_req
    }
}
