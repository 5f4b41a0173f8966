//! Downstream DRAM device.
//!
//! The memory-side peer of the controller. It provides:
//! 1. **Timing:** Row-buffer-aware access latency (CAS, RAS, precharge) with
//!    a busy-until serialization point, so back-to-back accesses queue up.
//! 2. **Storage:** A byte-accurate backing buffer; writes are applied on
//!    acceptance and reads are filled when the response is produced.
//! 3. **Backpressure:** A bounded in-flight queue; a rejected request is
//!    retried after the device signals capacity, and a response the
//!    controller rejects is held until the controller signals space.

use std::collections::VecDeque;

use log::trace;

use crate::common::addr::AddrRange;
use crate::common::error::ConfigError;
use crate::config::MemConfig;
use crate::mem::Packet;
use crate::sim::eventq::{EventQueue, SimEvent, Tick};

/// How an access relates to the currently open row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RowEvent {
    /// The access falls in the open row.
    Hit,
    /// No row is open yet.
    Cold,
    /// A different row is open and must be closed first.
    Conflict,
}

/// CAS/RAS/precharge timing table.
struct RowTiming {
    cas: Tick,
    ras: Tick,
    pre: Tick,
}

impl RowTiming {
    /// Access latency implied by a row transition: a hit needs only the
    /// column access, a cold row adds activation, and a conflict pays the
    /// precharge on top.
    fn latency(&self, event: RowEvent) -> Tick {
        let activate = match event {
            RowEvent::Hit => 0,
            RowEvent::Cold => self.ras,
            RowEvent::Conflict => self.pre + self.ras,
        };
        activate + self.cas
    }
}

/// DRAM-style memory device with row-buffer timing.
pub struct DramDevice {
    range: AddrRange,
    buffer: super::buffer::DramBuffer,

    timing: RowTiming,
    row_mask: u64,
    open_row: Option<u64>,

    queue_cap: usize,
    inflight: VecDeque<(Tick, Packet)>,
    busy_until: Tick,

    respond_scheduled: bool,
    resp_blocked: bool,
    blocked_resp: Option<Packet>,
    retry_req_pending: bool,
}

impl DramDevice {
    /// Builds the device from configuration.
    ///
    /// Fails with [`ConfigError::PortUnconnected`] when the region is empty
    /// (there is nothing for the controller's memory-side port to reach)
    /// and with [`ConfigError::InvalidRowSize`] for a non-power-of-two row.
    pub fn new(cfg: &MemConfig) -> Result<Self, ConfigError> {
        if cfg.ram_size == 0 {
            return Err(ConfigError::PortUnconnected("dram".into()));
        }
        if cfg.row_size == 0 || !cfg.row_size.is_power_of_two() {
            return Err(ConfigError::InvalidRowSize(cfg.row_size));
        }
        if cfg.mem_queue_size == 0 {
            return Err(ConfigError::ZeroQueueDepth("mem_queue_size"));
        }
        Ok(Self {
            range: AddrRange::new(cfg.ram_base, cfg.ram_size as u64),
            buffer: super::buffer::DramBuffer::new(cfg.ram_size)?,
            timing: RowTiming {
                cas: cfg.t_cas,
                ras: cfg.t_ras,
                pre: cfg.t_pre,
            },
            row_mask: !(cfg.row_size - 1),
            open_row: None,
            queue_cap: cfg.mem_queue_size,
            inflight: VecDeque::new(),
            busy_until: 0,
            respond_scheduled: false,
            resp_blocked: false,
            blocked_resp: None,
            retry_req_pending: false,
        })
    }

    /// The physical address region this device backs.
    pub fn addr_range(&self) -> AddrRange {
        self.range
    }

    /// Classifies an access against the open row, then opens its row.
    fn classify_row(&mut self, addr: u64) -> RowEvent {
        let row = addr & self.row_mask;
        let event = match self.open_row {
            None => RowEvent::Cold,
            Some(open) if open == row => RowEvent::Hit,
            Some(_) => RowEvent::Conflict,
        };
        self.open_row = Some(row);
        event
    }

    /// Accepts a timing request, or hands it back when the in-flight queue
    /// is full (a retry fires once a slot frees).
    pub fn recv_timing_req(
        &mut self,
        pkt: Packet,
        now: Tick,
        events: &mut EventQueue,
    ) -> Result<(), Packet> {
        if self.inflight.len() >= self.queue_cap {
            trace!("dram: rejecting {:?} at {:#x}, queue full", pkt.cmd, pkt.addr);
            self.retry_req_pending = true;
            return Err(pkt);
        }
        debug_assert!(
            self.range.contains_span(pkt.addr, pkt.size as u64),
            "dram: access {:#x}+{} outside {:#x}+{:#x}",
            pkt.addr,
            pkt.size,
            self.range.base,
            self.range.size
        );

        if pkt.is_write() {
            let offset = (pkt.addr - self.range.base) as usize;
            self.buffer.write_slice(offset, &pkt.data);
        }

        let row_event = self.classify_row(pkt.addr);
        let latency = self.timing.latency(row_event);
        let ready = now.max(self.busy_until) + latency;
        self.busy_until = ready;
        trace!(
            "dram: accepted {:?} at {:#x} size {}, ready at {}",
            pkt.cmd, pkt.addr, pkt.size, ready
        );
        self.inflight.push_back((ready, pkt));

        if !self.respond_scheduled {
            // Ready times are monotonic, so the head is always earliest.
            let head_ready = self.inflight.front().map(|(t, _)| *t).unwrap_or(ready);
            events.schedule(SimEvent::MemRespond, head_ready);
            self.respond_scheduled = true;
        }
        Ok(())
    }

    /// Marks the respond event as consumed; called at the top of dispatch.
    pub fn begin_respond(&mut self) {
        self.respond_scheduled = false;
    }

    /// Pops the next response that is ready at `now`, converting the request
    /// into a response and filling read payloads from the backing store.
    /// Returns `None` while delivery is blocked on a controller retry.
    pub fn pop_ready(&mut self, now: Tick) -> Option<Packet> {
        if self.resp_blocked {
            return None;
        }
        if let Some(pkt) = self.blocked_resp.take() {
            return Some(pkt);
        }
        match self.inflight.front() {
            Some((ready, _)) if *ready <= now => {
                let (_, mut pkt) = self.inflight.pop_front().expect("front checked");
                if pkt.is_read() {
                    let offset = (pkt.addr - self.range.base) as usize;
                    pkt.data
                        .copy_from_slice(self.buffer.read_slice(offset, pkt.size));
                }
                pkt.make_response();
                Some(pkt)
            }
            _ => None,
        }
    }

    /// Holds a response the controller rejected until it signals space.
    pub fn stash_blocked(&mut self, pkt: Packet) {
        trace!("dram: response {:#x} rejected, holding", pkt.addr);
        self.blocked_resp = Some(pkt);
        self.resp_blocked = true;
    }

    /// The controller freed response space; resume delivery.
    pub fn recv_resp_retry(&mut self, now: Tick, events: &mut EventQueue) {
        self.resp_blocked = false;
        if !self.respond_scheduled && (self.blocked_resp.is_some() || !self.inflight.is_empty()) {
            events.schedule(SimEvent::MemRespond, now);
            self.respond_scheduled = true;
        }
    }

    /// Reschedules delivery for remaining responses and fires the request
    /// retry once capacity has opened; called after a delivery burst.
    pub fn finish_respond(&mut self, now: Tick, events: &mut EventQueue) {
        if !self.resp_blocked && !self.respond_scheduled {
            if let Some((ready, _)) = self.inflight.front() {
                events.schedule(SimEvent::MemRespond, (*ready).max(now));
                self.respond_scheduled = true;
            }
        }
        if self.retry_req_pending && self.inflight.len() < self.queue_cap {
            self.retry_req_pending = false;
            events.schedule(SimEvent::MemRetryReq, now);
        }
    }

    /// Immediate, non-timing access to the backing store. Writes apply
    /// their payload; reads fill theirs.
    pub fn functional_access(&mut self, pkt: &mut Packet) {
        let offset = (pkt.addr - self.range.base) as usize;
        if pkt.is_write() {
            self.buffer.write_slice(offset, &pkt.data);
        } else {
            pkt.data
                .copy_from_slice(self.buffer.read_slice(offset, pkt.size));
        }
    }

    /// Number of in-flight requests.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    /// Returns whether no work is pending or held.
    pub fn is_idle(&self) -> bool {
        self.inflight.is_empty() && self.blocked_resp.is_none()
    }
}
