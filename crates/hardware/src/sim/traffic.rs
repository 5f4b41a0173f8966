//! Synthetic traffic generation.
//!
//! `TrafficGen` plays a deterministic, seeded workload into the controller:
//! either every line of the working set written then read back, or a
//! uniform random mix. Written lines are shadowed so read responses can be
//! checked against the data the workload produced, end-to-end through the
//! write buffer, compression, and the backing store.

use std::collections::HashMap;

use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::CACHE_LINE;
use crate::config::{Config, TrafficPattern};
use crate::mem::Packet;
use crate::sim::eventq::{EventQueue, SimEvent, Tick};
use crate::soc::cxl::CxlMemCtrl;
use crate::soc::port::Upstream;

/// Seeded synthetic workload driver.
pub struct TrafficGen {
    rng: StdRng,
    pattern: TrafficPattern,
    total: usize,
    period: Tick,
    base: u64,
    lines: u64,
    read_pct: u8,

    issued: usize,
    received: usize,
    shadow: HashMap<u64, Vec<u8>>,
    outstanding_reads: HashMap<u64, u32>,
    pending: Option<Packet>,
    awaiting_retry: bool,
    verify_errors: usize,
}

impl TrafficGen {
    /// Builds a generator from the traffic section of `config`.
    pub fn new(config: &Config) -> Self {
        let t = &config.traffic;
        Self {
            rng: StdRng::seed_from_u64(config.general.seed),
            pattern: t.pattern,
            total: t.num_packets,
            period: t.period,
            base: config.mem.ram_base,
            lines: (t.working_set / CACHE_LINE as u64).max(1),
            read_pct: t.read_pct.min(100),
            issued: 0,
            received: 0,
            shadow: HashMap::new(),
            outstanding_reads: HashMap::new(),
            pending: None,
            awaiting_retry: false,
            verify_errors: 0,
        }
    }

    /// Packets injected so far.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Responses received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Read responses whose payload did not match the shadow copy.
    pub fn verify_errors(&self) -> usize {
        self.verify_errors
    }

    fn line_addr(&self, line: u64) -> u64 {
        self.base + (line % self.lines) * CACHE_LINE as u64
    }

    fn write_packet(&mut self, line: u64) -> Packet {
        let addr = self.line_addr(line);
        // Low-entropy payload: one byte repeated per line, so batches stay
        // compressible and round-trips remain checkable.
        let fill = self.rng.gen_range(0..=255u32) as u8;
        let data = vec![fill; CACHE_LINE];
        self.shadow.insert(addr, data.clone());
        Packet::write_req(addr, data, 0)
    }

    fn read_packet(&mut self, addr: u64) -> Packet {
        *self.outstanding_reads.entry(addr).or_insert(0) += 1;
        Packet::read_req(addr, CACHE_LINE, 0)
    }

    fn next_packet(&mut self) -> Option<Packet> {
        if self.issued >= self.total {
            return None;
        }
        let i = self.issued;
        self.issued += 1;
        let pkt = match self.pattern {
            TrafficPattern::WriteRead => {
                let half = self.total / 2;
                if i < half {
                    self.write_packet(i as u64)
                } else {
                    let addr = self.line_addr((i - half) as u64);
                    self.read_packet(addr)
                }
            }
            TrafficPattern::Random => {
                let line = self.rng.gen_range(0..self.lines);
                let addr = self.line_addr(line);
                let want_read = self.rng.gen_range(0..100) < self.read_pct as u32;
                // The bus turn may reorder a write past an in-flight read
                // to the same line, making the read's data indeterminate.
                // Never write under an outstanding read.
                if want_read || self.outstanding_reads.contains_key(&addr) {
                    self.read_packet(addr)
                } else {
                    self.write_packet(line)
                }
            }
        };
        Some(pkt)
    }
}

impl Upstream for TrafficGen {
    fn recv_timing_resp(&mut self, pkt: Packet, _now: Tick) -> Result<(), Packet> {
        self.received += 1;
        if pkt.is_read() {
            if let Some(expected) = self.shadow.get(&pkt.addr) {
                if &pkt.data != expected {
                    warn!("traffic: read {:#x} returned stale data", pkt.addr);
                    self.verify_errors += 1;
                }
            }
            if let Some(n) = self.outstanding_reads.get_mut(&pkt.addr) {
                *n -= 1;
                if *n == 0 {
                    self.outstanding_reads.remove(&pkt.addr);
                }
            }
        }
        Ok(())
    }

    fn recv_retry_req(&mut self, now: Tick, events: &mut EventQueue) {
        self.awaiting_retry = false;
        events.schedule(SimEvent::RequestorTick, now);
    }

    fn tick(&mut self, now: Tick, ctrl: &mut CxlMemCtrl, events: &mut EventQueue) {
        if self.awaiting_retry {
            return;
        }
        let pkt = match self.pending.take() {
            Some(p) => p,
            None => match self.next_packet() {
                Some(p) => p,
                None => return,
            },
        };
        match ctrl.recv_timing_req(pkt, now, events) {
            Ok(()) => {
                if self.issued < self.total {
                    events.schedule(SimEvent::RequestorTick, now + self.period);
                }
            }
            Err(p) => {
                self.pending = Some(p);
                self.awaiting_retry = true;
            }
        }
    }

    fn done(&self) -> bool {
        self.issued >= self.total && self.received >= self.total && self.pending.is_none()
    }

    fn as_traffic_gen(&self) -> Option<&TrafficGen> {
        Some(self)
    }
}
