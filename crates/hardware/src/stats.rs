//! Controller statistics collection and reporting.
//!
//! This module tracks performance metrics for the memory controller. It
//! provides:
//! 1. **Latency scalars:** Total, read, write, DRAM-read, and copy latency, plus inter-arrival gap.
//! 2. **Packet counts:** Totals by class (read, write, DRAM read, non-DRAM read, compressed).
//! 3. **Byte totals:** Per-class traffic volume for bandwidth derivation.
//! 4. **Histograms:** Latency distributions (all, read, write) and compressed block sizes.
//! 5. **Per-requestor counters:** Read/write packets and bytes per requestor id.

use std::collections::BTreeMap;

use crate::common::{TICKS_PER_NS, TICKS_PER_SEC};
use crate::mem::RequestorId;
use crate::sim::eventq::Tick;

/// Number of buckets kept by a [`Histogram`].
const HIST_BUCKETS: usize = 32;

/// A linear histogram that doubles its bucket width when a sample falls
/// beyond the last bucket, folding existing counts pairwise.
#[derive(Clone, Debug)]
pub struct Histogram {
    buckets: Vec<u64>,
    bucket_width: u64,
    count: u64,
    sum: u64,
    min_val: u64,
    max_val: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    /// Creates an empty histogram with unit bucket width.
    pub fn new() -> Self {
        Self {
            buckets: vec![0; HIST_BUCKETS],
            bucket_width: 1,
            count: 0,
            sum: 0,
            min_val: u64::MAX,
            max_val: 0,
        }
    }

    /// Records one sample.
    pub fn sample(&mut self, value: u64) {
        while value / self.bucket_width >= self.buckets.len() as u64 {
            self.rescale();
        }
        self.buckets[(value / self.bucket_width) as usize] += 1;
        self.count += 1;
        self.sum += value;
        self.min_val = self.min_val.min(value);
        self.max_val = self.max_val.max(value);
    }

    fn rescale(&mut self) {
        let n = self.buckets.len();
        for i in 0..n / 2 {
            self.buckets[i] = self.buckets[2 * i] + self.buckets[2 * i + 1];
        }
        for b in &mut self.buckets[n / 2..] {
            *b = 0;
        }
        self.bucket_width *= 2;
    }

    /// Number of samples recorded.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of all samples.
    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Arithmetic mean of the samples, or 0.0 if empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Smallest sample recorded, or `None` if empty.
    pub fn min(&self) -> Option<u64> {
        (self.count > 0).then_some(self.min_val)
    }

    /// Largest sample recorded, or `None` if empty.
    pub fn max(&self) -> Option<u64> {
        (self.count > 0).then_some(self.max_val)
    }

    /// Current bucket width in sample units.
    pub fn bucket_width(&self) -> u64 {
        self.bucket_width
    }

    /// Returns (lower_bound, count) for each non-empty bucket.
    pub fn non_empty_buckets(&self) -> Vec<(u64, u64)> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(i, &c)| (i as u64 * self.bucket_width, c))
            .collect()
    }
}

/// Per-requestor traffic counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestorCounters {
    /// Read packets accepted from this requestor.
    pub read_packets: u64,
    /// Write packets accepted from this requestor.
    pub write_packets: u64,
    /// Read bytes accepted from this requestor.
    pub read_bytes: u64,
    /// Write bytes accepted from this requestor.
    pub write_bytes: u64,
}

/// Controller statistics.
#[derive(Clone, Debug, Default)]
pub struct CtrlStats {
    /// Sum of end-to-end latency over all attributed packets, in ticks.
    pub total_latency: Tick,
    /// Sum of read latency, in ticks.
    pub total_read_latency: Tick,
    /// Sum of write latency (admission to downstream completion), in ticks.
    pub total_write_latency: Tick,
    /// Sum of latency of reads that traversed the amplified DRAM path.
    pub total_dram_read_latency: Tick,
    /// Ticks spent copying lines out of amplified read responses.
    pub total_read_copy_latency: Tick,
    /// Sum of inter-arrival gaps between accepted requests, in ticks.
    pub total_gap: Tick,

    /// All packets accepted.
    pub num_packets: u64,
    /// Read packets accepted.
    pub read_packets: u64,
    /// Write packets accepted.
    pub write_packets: u64,
    /// Reads amplified to a compressed block.
    pub dram_read_packets: u64,
    /// Reads issued downstream without amplification.
    pub non_dram_read_packets: u64,
    /// Reads served directly from the write queue.
    pub serviced_by_wrq: u64,
    /// Writes coalesced into an existing write queue entry.
    pub merged_writes: u64,
    /// Writes issued downstream under compression.
    pub compressed_packets: u64,
    /// Times the compression selector ran.
    pub compression_times: u64,

    /// Bytes of accepted read traffic.
    pub read_bytes: u64,
    /// Bytes of accepted write traffic.
    pub write_bytes: u64,
    /// Bytes fetched by amplified reads.
    pub dram_read_bytes: u64,
    /// Bytes of compressed blocks produced (after cache-line rounding).
    pub compressed_bytes: u64,

    /// Latency distribution over all attributed packets.
    pub lat_all: Histogram,
    /// Latency distribution over reads.
    pub lat_read: Histogram,
    /// Latency distribution over writes.
    pub lat_write: Histogram,
    /// Distribution of rounded compressed block sizes.
    pub compressed_size_hist: Histogram,

    /// Per-requestor traffic counters.
    pub requestors: BTreeMap<RequestorId, RequestorCounters>,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"latency"`, `"compression"`,
/// `"requestors"`. Pass an empty slice to `print_sections` to print all.
pub const STATS_SECTIONS: &[&str] = &["summary", "latency", "compression", "requestors"];

impl CtrlStats {
    /// Records an accepted read request for `requestor` of `bytes` bytes.
    pub fn record_read_req(&mut self, requestor: RequestorId, bytes: u64) {
        self.num_packets += 1;
        self.read_packets += 1;
        self.read_bytes += bytes;
        let ctr = self.requestors.entry(requestor).or_default();
        ctr.read_packets += 1;
        ctr.read_bytes += bytes;
    }

    /// Records an accepted write request for `requestor` of `bytes` bytes.
    pub fn record_write_req(&mut self, requestor: RequestorId, bytes: u64) {
        self.num_packets += 1;
        self.write_packets += 1;
        self.write_bytes += bytes;
        let ctr = self.requestors.entry(requestor).or_default();
        ctr.write_packets += 1;
        ctr.write_bytes += bytes;
    }

    /// Attributes an end-to-end read latency.
    pub fn record_read_latency(&mut self, latency: Tick) {
        self.total_latency += latency;
        self.total_read_latency += latency;
        self.lat_all.sample(latency);
        self.lat_read.sample(latency);
    }

    /// Attributes an end-to-end write latency.
    pub fn record_write_latency(&mut self, latency: Tick) {
        self.total_latency += latency;
        self.total_write_latency += latency;
        self.lat_all.sample(latency);
        self.lat_write.sample(latency);
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]. Pass
    /// an empty slice to print all sections. `sim_ticks` is the simulated
    /// time used for bandwidth derivation. Zero-valued entries are skipped;
    /// averages print at four decimal places in nanoseconds.
    pub fn print_sections(&self, sections: &[String], sim_ticks: Tick) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let sim_seconds = sim_ticks as f64 / TICKS_PER_SEC as f64;
        let ns = |ticks: Tick, count: u64| {
            if count == 0 {
                0.0
            } else {
                ticks as f64 / count as f64 / TICKS_PER_NS as f64
            }
        };
        let mb_per_s = |bytes: u64| {
            if sim_seconds > 0.0 {
                bytes as f64 / sim_seconds / 1.0e6
            } else {
                0.0
            }
        };
        let scalar = |name: &str, v: u64| {
            if v != 0 {
                println!("{:<28} {}", name, v);
            }
        };

        if want("summary") {
            println!("\n==========================================================");
            println!("CXL MEMORY CONTROLLER STATISTICS");
            println!("==========================================================");
            println!("{:<28} {}", "sim_ticks", sim_ticks);
            scalar("num_packets", self.num_packets);
            scalar("read_packets", self.read_packets);
            scalar("write_packets", self.write_packets);
            scalar("dram_read_packets", self.dram_read_packets);
            scalar("non_dram_read_packets", self.non_dram_read_packets);
            scalar("serviced_by_wrq", self.serviced_by_wrq);
            scalar("merged_writes", self.merged_writes);
            scalar("read_bytes", self.read_bytes);
            scalar("write_bytes", self.write_bytes);
            scalar("dram_read_bytes", self.dram_read_bytes);
            if self.read_bytes > 0 {
                println!("{:<28} {:.4} MB/s", "avg_rd_bw", mb_per_s(self.read_bytes));
            }
            if self.write_bytes > 0 {
                println!("{:<28} {:.4} MB/s", "avg_wr_bw", mb_per_s(self.write_bytes));
            }
            if self.num_packets > 1 {
                println!(
                    "{:<28} {:.4} ns",
                    "avg_gap",
                    ns(self.total_gap, self.num_packets - 1)
                );
            }
            println!("----------------------------------------------------------");
        }
        if want("latency") {
            println!("LATENCY");
            if self.lat_all.count() > 0 {
                println!(
                    "{:<28} {:.4} ns",
                    "avg_latency",
                    ns(self.total_latency, self.lat_all.count())
                );
            }
            if self.lat_read.count() > 0 {
                println!(
                    "{:<28} {:.4} ns",
                    "avg_read_latency",
                    ns(self.total_read_latency, self.lat_read.count())
                );
            }
            if self.lat_write.count() > 0 {
                println!(
                    "{:<28} {:.4} ns",
                    "avg_write_latency",
                    ns(self.total_write_latency, self.lat_write.count())
                );
            }
            if self.dram_read_packets > 0 {
                println!(
                    "{:<28} {:.4} ns",
                    "avg_dram_read_latency",
                    ns(self.total_dram_read_latency, self.dram_read_packets)
                );
            }
            scalar("read_copy_ticks", self.total_read_copy_latency);
            Self::print_histogram("lat_all", &self.lat_all);
            Self::print_histogram("lat_read", &self.lat_read);
            Self::print_histogram("lat_write", &self.lat_write);
            println!("----------------------------------------------------------");
        }
        if want("compression") {
            println!("COMPRESSION");
            scalar("compression_times", self.compression_times);
            scalar("compressed_packets", self.compressed_packets);
            scalar("compressed_bytes", self.compressed_bytes);
            if self.compressed_size_hist.count() > 0 {
                println!(
                    "{:<28} {:.4} B",
                    "avg_block_size",
                    self.compressed_size_hist.mean()
                );
            }
            Self::print_histogram("compressed_size", &self.compressed_size_hist);
            println!("----------------------------------------------------------");
        }
        if want("requestors") {
            println!("REQUESTORS");
            for (id, ctr) in &self.requestors {
                println!(
                    "  requestor[{}]  reads: {:<8} writes: {:<8} rd_bytes: {:<10} wr_bytes: {}",
                    id, ctr.read_packets, ctr.write_packets, ctr.read_bytes, ctr.write_bytes
                );
            }
        }
        println!("==========================================================");
    }

    fn print_histogram(name: &str, hist: &Histogram) {
        if hist.count() == 0 {
            return;
        }
        println!("  {} (bucket width {}):", name, hist.bucket_width());
        for (lower, count) in hist.non_empty_buckets() {
            println!("    [{:>12}..) {}", lower, count);
        }
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self, sim_ticks: Tick) {
        self.print_sections(&[], sim_ticks);
    }
}
