//! Request and response pipeline steps.
//!
//! One packet moves per event invocation; the pipelines reschedule
//! themselves at the current tick while work remains, so a batch drain is a
//! chain of same-tick events. The request side runs the bus-turn state
//! machine; the response side closes out latency and delivers upstream.

use log::{debug, trace};

use crate::common::CACHE_LINE;
use crate::sim::eventq::{EventQueue, SimEvent, Tick};
use crate::soc::dram::DramDevice;

use super::{compression, CxlMemCtrl, RwState};

impl CxlMemCtrl {
    /// Bus-turn step: choose a direction if none is pending, issue one
    /// packet downstream, and reschedule while either queue has work.
    ///
    /// Suspended while a downstream retry is outstanding; progress resumes
    /// from [`recv_req_retry`](Self::recv_req_retry).
    pub fn process_request_event(
        &mut self,
        now: Tick,
        dram: &mut DramDevice,
        events: &mut EventQueue,
    ) {
        self.req_event_scheduled = false;
        if self.resend_req() {
            return;
        }

        if self.next_rw_state == RwState::Start {
            if self.write_trigger() {
                self.next_rw_state = RwState::Write;
            } else if !self.read_queue.is_empty() {
                self.next_rw_state = RwState::Read;
            } else {
                self.check_drain();
                return;
            }
        }

        match self.next_rw_state {
            RwState::Read => self.issue_read(now, dram, events),
            RwState::Write => self.issue_write(now, dram, events),
            RwState::Start => unreachable!("direction chosen above"),
        }

        if !self.resend_req() && (!self.read_queue.is_empty() || !self.write_queue.is_empty()) {
            self.schedule_req_event(events, now);
        }
        self.check_drain();
    }

    fn issue_read(&mut self, now: Tick, dram: &mut DramDevice, events: &mut EventQueue) {
        let was_full = self.read_queue.is_full();
        let Some(pkt) = self.read_queue.pop_front() else {
            self.next_rw_state = RwState::Start;
            return;
        };
        trace!("cxl_mem_ctrl: issuing read {:#x} size {}", pkt.addr, pkt.size);
        match dram.recv_timing_req(pkt, now, events) {
            Err(pkt) => {
                self.read_queue.push_front(pkt);
                self.resend_req = true;
                self.next_rw_state = RwState::Read;
            }
            Ok(()) => {
                self.rw_state = RwState::Read;
                self.next_rw_state = if self.write_trigger() {
                    RwState::Write
                } else if !self.read_queue.is_empty() {
                    RwState::Read
                } else {
                    RwState::Start
                };
                if was_full && self.retry_rd_req && !self.read_queue.is_full() {
                    self.retry_rd_req = false;
                    events.schedule(SimEvent::RequestorRetry, now);
                }
            }
        }
    }

    fn issue_write(&mut self, now: Tick, dram: &mut DramDevice, events: &mut EventQueue) {
        if self.write_queue.is_empty() {
            self.end_batch();
            return;
        }
        if !self.batch_open {
            self.cmp_block_sizes = self.run_compression();
            self.batch_open = true;
        }

        let was_full = self.write_queue.is_full();
        let pkt = self.write_queue.pop_front().expect("checked non-empty");
        let addr = pkt.addr;
        trace!("cxl_mem_ctrl: issuing write {:#x}", addr);
        match dram.recv_timing_req(pkt, now, events) {
            Err(pkt) => {
                self.write_queue.push_front(pkt);
                self.resend_req = true;
                self.next_rw_state = RwState::Write;
            }
            Ok(()) => {
                self.rw_state = RwState::Write;
                if !self.cmp_block_sizes.is_empty() {
                    let blocks = self.cmp_block_sizes.len();
                    let per_block = (self.write_pkt_threshold / blocks).max(1);
                    let idx = (self.cmped_pkt / per_block).min(blocks - 1);
                    self.compressed_block_sizes
                        .insert(addr, self.cmp_block_sizes[idx]);
                    self.stats.compressed_packets += 1;
                }
                self.cmped_pkt += 1;
                if self.cmped_pkt >= self.write_pkt_threshold || self.write_queue.is_empty() {
                    self.end_batch();
                } else {
                    self.next_rw_state = RwState::Write;
                }
                if was_full && self.retry_wr_req && !self.write_queue.is_full() {
                    self.retry_wr_req = false;
                    events.schedule(SimEvent::RequestorRetry, now);
                }
            }
        }
    }

    fn end_batch(&mut self) {
        self.next_rw_state = RwState::Start;
        self.cmped_pkt = 0;
        self.cmp_block_sizes.clear();
        self.batch_open = false;
    }

    /// Runs the granularity selector over the head of the write queue and
    /// returns the cache-line-rounded per-block sizes; empty means the
    /// batch issues uncompressed.
    fn run_compression(&mut self) -> Vec<u32> {
        let source = compression::gather_batch_source(
            self.write_queue.iter(),
            self.write_pkt_threshold,
            CACHE_LINE,
        );
        let raw = compression::selected_sizes(&*self.compressor, &source);
        self.stats.compression_times += 1;

        let mut rounded = Vec::with_capacity(raw.len());
        for size in raw {
            let r = (size as u64).div_ceil(CACHE_LINE as u64) * CACHE_LINE as u64;
            self.stats.compressed_size_hist.sample(r);
            self.stats.compressed_bytes += r;
            rounded.push(r as u32);
        }
        if rounded.is_empty() {
            debug!("cxl_mem_ctrl: batch incompressible, issuing uncompressed");
        }
        rounded
    }

    /// Response step: close out the head response's latency, deliver it
    /// upstream, and resume the downstream device if it was held off.
    pub fn process_response_event(
        &mut self,
        now: Tick,
        dram: &mut DramDevice,
        events: &mut EventQueue,
    ) {
        self.resp_event_scheduled = false;
        let was_full = self.resp_queue.is_full();
        let Some(pkt) = self.resp_queue.pop_front() else {
            self.check_drain();
            return;
        };

        if let Some(arrival) = self.packet_latency.remove(&pkt.id) {
            let latency = now - arrival;
            self.stats.record_read_latency(latency);
            if self.compressed_block_sizes.contains_key(&pkt.addr) {
                // This one actually traversed the amplified DRAM path.
                self.stats.total_dram_read_latency += latency;
            }
        }

        self.access_and_respond(
            pkt,
            self.frontend_latency + self.backend_latency,
            now,
            events,
        );

        if was_full && self.resend_mem_resp {
            self.resend_mem_resp = false;
            dram.recv_resp_retry(now, events);
        }
        if !self.resp_queue.is_empty() {
            self.schedule_resp_event(events, now);
        }
        self.check_drain();
    }
}
