//! Admission Path Tests.
//!
//! Verifies write coalescing, read-after-write forwarding, queue-full
//! rejection, and arrival accounting at the controller boundary.

use cxlsim_core::mem::Packet;

use crate::common::harness::TestContext;

// ══════════════════════════════════════════════════════════
// 1. Write coalescing
// ══════════════════════════════════════════════════════════

#[test]
fn same_addr_same_size_writes_merge() {
    let mut ctx = TestContext::new();
    ctx.send_write(0x2000, 0x41).unwrap();
    ctx.send_write(0x2000, 0x42).unwrap();
    assert_eq!(ctx.sim.ctrl.write_queue_len(), 1);
    let pending = ctx.sim.ctrl.pending_write(0x2000, 64).expect("queued");
    assert_eq!(pending.data, vec![0x42; 64]);
    assert_eq!(ctx.sim.ctrl.stats.merged_writes, 1);
    assert_eq!(ctx.sim.ctrl.stats.write_packets, 2);
}

#[test]
fn different_size_does_not_merge() {
    let mut ctx = TestContext::new();
    ctx.send_write(0x2000, 0x41).unwrap();
    ctx.send(Packet::write_req(0x2000, vec![0x42; 128], 0)).unwrap();
    assert_eq!(ctx.sim.ctrl.write_queue_len(), 2);
    assert_eq!(ctx.sim.ctrl.stats.merged_writes, 0);
}

#[test]
fn merged_write_still_acks_both() {
    let mut ctx = TestContext::new();
    ctx.send_write(0x2000, 0x41).unwrap();
    ctx.send_write(0x2000, 0x42).unwrap();
    ctx.run();
    let acks = ctx.responses();
    assert_eq!(acks.len(), 2);
    assert!(acks.iter().all(|(_, p)| p.is_write()));
}

// ══════════════════════════════════════════════════════════
// 2. Read-after-write forwarding
// ══════════════════════════════════════════════════════════

#[test]
fn read_hits_pending_write() {
    let mut ctx = TestContext::new();
    ctx.send_write(0x3000, 0x58).unwrap();
    ctx.send_read(0x3000).unwrap();
    ctx.run();

    let reads = ctx.read_responses();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].data, vec![0x58; 64]);
    assert_eq!(ctx.sim.ctrl.stats.serviced_by_wrq, 1);
    // Nothing was issued downstream; the write still sits below threshold.
    assert_eq!(ctx.sim.mem.inflight_len(), 0);
    assert_eq!(ctx.sim.ctrl.write_queue_len(), 1);
}

#[test]
fn forwarding_requires_exact_cacheline_match() {
    let mut ctx = TestContext::new();
    ctx.send_write(0x3000, 0x58).unwrap();
    // Different address: queued for DRAM instead of forwarded.
    ctx.send_read(0x3040).unwrap();
    assert_eq!(ctx.sim.ctrl.stats.serviced_by_wrq, 0);
    assert_eq!(ctx.sim.ctrl.read_queue_len(), 1);
}

#[test]
fn forwarded_read_closes_latency_immediately() {
    let mut ctx = TestContext::new();
    ctx.send_write(0x3000, 0x11).unwrap();
    ctx.send_read(0x3000).unwrap();
    assert_eq!(ctx.sim.ctrl.stats.lat_read.count(), 1);
    assert_eq!(ctx.sim.ctrl.stats.total_read_latency, 0);
}

// ══════════════════════════════════════════════════════════
// 3. Queue-full rejection
// ══════════════════════════════════════════════════════════

#[test]
fn full_read_queue_latches_retry() {
    let mut config = TestContext::config();
    config.ctrl.read_buffer_size = 1;
    let mut ctx = TestContext::with_config(config);
    ctx.send_read(0x1000).unwrap();
    let rejected = ctx.send_read(0x1040).unwrap_err();
    assert_eq!(rejected.addr, 0x1040);
    assert!(ctx.sim.ctrl.retry_rd_req());
    // The rejection must not have touched accounting.
    assert_eq!(ctx.sim.ctrl.stats.read_packets, 1);
    assert_eq!(ctx.sim.ctrl.open_latency_records(), 1);
}

#[test]
fn full_write_queue_latches_retry() {
    let mut config = TestContext::config();
    config.ctrl.write_buffer_size = 2;
    config.ctrl.write_pkt_threshold = 2;
    let mut ctx = TestContext::with_config(config);
    ctx.send_write(0x0, 1).unwrap();
    ctx.send_write(0x40, 2).unwrap();
    let rejected = ctx.send_write(0x80, 3).unwrap_err();
    assert_eq!(rejected.addr, 0x80);
    assert!(ctx.sim.ctrl.retry_wr_req());
    assert_eq!(ctx.sim.ctrl.stats.write_packets, 2);
}

// ══════════════════════════════════════════════════════════
// 4. Arrival accounting
// ══════════════════════════════════════════════════════════

#[test]
fn first_packet_gap_not_counted() {
    let mut ctx = TestContext::new();
    ctx.send_read(0x1000).unwrap();
    assert_eq!(ctx.sim.ctrl.stats.total_gap, 0);
}

#[test]
fn gap_accumulates_between_arrivals() {
    let mut ctx = TestContext::new();
    ctx.send_read(0x1000).unwrap();
    ctx.advance_to(100);
    ctx.send_read(0x2000).unwrap();
    assert_eq!(ctx.sim.ctrl.stats.total_gap, 100);
    ctx.advance_to(250);
    ctx.send_write(0x3000, 1).unwrap();
    assert_eq!(ctx.sim.ctrl.stats.total_gap, 250);
}

// ══════════════════════════════════════════════════════════
// 5. Invariant aborts
// ══════════════════════════════════════════════════════════

#[test]
#[should_panic(expected = "cache is responding")]
fn cache_responding_packet_aborts() {
    let mut ctx = TestContext::new();
    let mut pkt = Packet::read_req(0x1000, 64, 0);
    pkt.cache_responding = true;
    let _ = ctx.send(pkt);
}
