//! Configuration system for the CXL memory controller model.
//!
//! This module defines all configuration structures used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline hardware constants (queues, latencies, DRAM timing).
//! 2. **Structures:** Hierarchical config for general, controller, memory, and traffic.
//! 3. **Enums:** Traffic pattern selection.
//!
//! Configuration is supplied via JSON (see the CLI `--config` flag) or use
//! `Config::default()` for the built-in model parameters.

use serde::Deserialize;

/// Default configuration constants for the simulator.
///
/// These values reproduce the original model's parameters when not
/// explicitly overridden.
mod defaults {
    /// Maximum read queue depth.
    pub const READ_BUFFER_SIZE: usize = 64;

    /// Maximum write queue depth.
    pub const WRITE_BUFFER_SIZE: usize = 128;

    /// Maximum response queue depth.
    pub const RESPONSE_BUFFER_SIZE: usize = 64;

    /// Number of buffered writes that triggers a compressed batch flush.
    ///
    /// 64 packets of 64 bytes form the 4 KiB compression source.
    pub const WRITE_PKT_THRESHOLD: usize = 64;

    /// Compressed block interleave region size in bytes (2 KiB).
    ///
    /// An amplified read is aligned so its span never straddles two of
    /// these regions.
    pub const COMPRESSED_SIZE: u64 = 2048;

    /// Static frontend latency in ticks (25 ns); added to every response.
    pub const STATIC_FRONTEND_LATENCY: u64 = 25_000;

    /// Static backend latency in ticks (25 ns); added to reads serviced by
    /// the downstream memory.
    pub const STATIC_BACKEND_LATENCY: u64 = 25_000;

    /// Decompression delay in ticks (10 ns); applied before a downstream
    /// response is eligible for processing.
    pub const DELAY: u64 = 10_000;

    /// Base address of the downstream memory region (2 GiB).
    pub const RAM_BASE: u64 = 0x8000_0000;

    /// Size of the downstream memory region (128 MiB).
    pub const RAM_SIZE: usize = 128 * 1024 * 1024;

    /// Downstream in-flight request queue depth.
    pub const MEM_QUEUE_SIZE: usize = 32;

    /// CAS (column access strobe) latency in ticks.
    pub const T_CAS: u64 = 15_000;

    /// RAS (row access strobe) latency in ticks.
    pub const T_RAS: u64 = 15_000;

    /// Precharge latency in ticks.
    pub const T_PRE: u64 = 15_000;

    /// DRAM row size in bytes; row-buffer hits are tracked at this
    /// granularity.
    pub const ROW_SIZE: u64 = 2048;

    /// RNG seed for synthetic traffic.
    pub const SEED: u64 = 42;

    /// Number of packets a synthetic workload injects.
    pub const TRAFFIC_PACKETS: usize = 1024;

    /// Ticks between synthetic packet injections (1 ns).
    pub const TRAFFIC_PERIOD: u64 = 1_000;

    /// Working set of the synthetic workload in bytes (256 KiB).
    pub const TRAFFIC_WORKING_SET: u64 = 256 * 1024;

    /// Read percentage of the random-mix workload.
    pub const TRAFFIC_READ_PCT: u8 = 50;
}

/// Synthetic traffic patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TrafficPattern {
    /// Write every line of the working set, then read it back.
    #[default]
    #[serde(alias = "WriteThenRead")]
    WriteRead,
    /// Uniform random mix of reads and writes over the working set.
    Random,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Deserializing from JSON (typical CLI usage):
///
/// ```
/// use cxlsim_core::config::Config;
///
/// let json = r#"{
///     "ctrl": {
///         "read_buffer_size": 8,
///         "write_pkt_threshold": 16
///     },
///     "mem": {
///         "ram_size": 4194304
///     },
///     "traffic": {
///         "pattern": "Random",
///         "num_packets": 100
///     }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.ctrl.read_buffer_size, 8);
/// assert_eq!(config.ctrl.write_buffer_size, 128);
/// assert_eq!(config.mem.ram_size, 4 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Controller queue and latency parameters.
    #[serde(default)]
    pub ctrl: CtrlConfig,
    /// Downstream memory configuration.
    #[serde(default)]
    pub mem: MemConfig,
    /// Synthetic workload configuration.
    #[serde(default)]
    pub traffic: TrafficConfig,
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// RNG seed for synthetic traffic generation.
    #[serde(default = "GeneralConfig::default_seed")]
    pub seed: u64,
}

impl GeneralConfig {
    fn default_seed() -> u64 {
        defaults::SEED
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed: defaults::SEED,
        }
    }
}

/// Controller queue depths, batch threshold, and pipeline latencies.
#[derive(Debug, Clone, Deserialize)]
pub struct CtrlConfig {
    /// Maximum read queue depth.
    #[serde(default = "CtrlConfig::default_read_buffer")]
    pub read_buffer_size: usize,

    /// Maximum write queue depth.
    #[serde(default = "CtrlConfig::default_write_buffer")]
    pub write_buffer_size: usize,

    /// Maximum response queue depth.
    #[serde(default = "CtrlConfig::default_response_buffer")]
    pub response_buffer_size: usize,

    /// Buffered write count that triggers a compressed batch flush.
    #[serde(default = "CtrlConfig::default_write_pkt_threshold")]
    pub write_pkt_threshold: usize,

    /// Compressed block interleave region size in bytes.
    #[serde(default = "CtrlConfig::default_compressed_size")]
    pub compressed_size: u64,

    /// Static frontend latency in ticks; added to every response.
    #[serde(default = "CtrlConfig::default_frontend_latency")]
    pub static_frontend_latency: u64,

    /// Static backend latency in ticks; added to DRAM-serviced reads.
    #[serde(default = "CtrlConfig::default_backend_latency")]
    pub static_backend_latency: u64,

    /// Decompression delay in ticks before response processing.
    #[serde(default = "CtrlConfig::default_delay")]
    pub delay: u64,
}

impl CtrlConfig {
    fn default_read_buffer() -> usize {
        defaults::READ_BUFFER_SIZE
    }

    fn default_write_buffer() -> usize {
        defaults::WRITE_BUFFER_SIZE
    }

    fn default_response_buffer() -> usize {
        defaults::RESPONSE_BUFFER_SIZE
    }

    fn default_write_pkt_threshold() -> usize {
        defaults::WRITE_PKT_THRESHOLD
    }

    fn default_compressed_size() -> u64 {
        defaults::COMPRESSED_SIZE
    }

    fn default_frontend_latency() -> u64 {
        defaults::STATIC_FRONTEND_LATENCY
    }

    fn default_backend_latency() -> u64 {
        defaults::STATIC_BACKEND_LATENCY
    }

    fn default_delay() -> u64 {
        defaults::DELAY
    }
}

impl Default for CtrlConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: defaults::READ_BUFFER_SIZE,
            write_buffer_size: defaults::WRITE_BUFFER_SIZE,
            response_buffer_size: defaults::RESPONSE_BUFFER_SIZE,
            write_pkt_threshold: defaults::WRITE_PKT_THRESHOLD,
            compressed_size: defaults::COMPRESSED_SIZE,
            static_frontend_latency: defaults::STATIC_FRONTEND_LATENCY,
            static_backend_latency: defaults::STATIC_BACKEND_LATENCY,
            delay: defaults::DELAY,
        }
    }
}

/// Downstream DRAM device configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemConfig {
    /// Base physical address of the memory region.
    #[serde(default = "MemConfig::default_ram_base")]
    pub ram_base: u64,

    /// Memory region size in bytes.
    #[serde(default = "MemConfig::default_ram_size")]
    pub ram_size: usize,

    /// In-flight request queue depth.
    #[serde(default = "MemConfig::default_mem_queue_size")]
    pub mem_queue_size: usize,

    /// CAS latency in ticks.
    #[serde(default = "MemConfig::default_t_cas")]
    pub t_cas: u64,

    /// RAS latency in ticks.
    #[serde(default = "MemConfig::default_t_ras")]
    pub t_ras: u64,

    /// Precharge latency in ticks.
    #[serde(default = "MemConfig::default_t_pre")]
    pub t_pre: u64,

    /// Row size in bytes for row-buffer hit tracking.
    #[serde(default = "MemConfig::default_row_size")]
    pub row_size: u64,
}

impl MemConfig {
    fn default_ram_base() -> u64 {
        defaults::RAM_BASE
    }

    fn default_ram_size() -> usize {
        defaults::RAM_SIZE
    }

    fn default_mem_queue_size() -> usize {
        defaults::MEM_QUEUE_SIZE
    }

    fn default_t_cas() -> u64 {
        defaults::T_CAS
    }

    fn default_t_ras() -> u64 {
        defaults::T_RAS
    }

    fn default_t_pre() -> u64 {
        defaults::T_PRE
    }

    fn default_row_size() -> u64 {
        defaults::ROW_SIZE
    }
}

impl Default for MemConfig {
    fn default() -> Self {
        Self {
            ram_base: defaults::RAM_BASE,
            ram_size: defaults::RAM_SIZE,
            mem_queue_size: defaults::MEM_QUEUE_SIZE,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
            row_size: defaults::ROW_SIZE,
        }
    }
}

/// Synthetic workload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficConfig {
    /// Number of packets to inject.
    #[serde(default = "TrafficConfig::default_num_packets")]
    pub num_packets: usize,

    /// Injection pattern.
    #[serde(default)]
    pub pattern: TrafficPattern,

    /// Ticks between injections.
    #[serde(default = "TrafficConfig::default_period")]
    pub period: u64,

    /// Working set size in bytes; addresses are line-aligned within it.
    #[serde(default = "TrafficConfig::default_working_set")]
    pub working_set: u64,

    /// Percentage of reads in the `Random` pattern.
    #[serde(default = "TrafficConfig::default_read_pct")]
    pub read_pct: u8,
}

impl TrafficConfig {
    fn default_num_packets() -> usize {
        defaults::TRAFFIC_PACKETS
    }

    fn default_period() -> u64 {
        defaults::TRAFFIC_PERIOD
    }

    fn default_working_set() -> u64 {
        defaults::TRAFFIC_WORKING_SET
    }

    fn default_read_pct() -> u8 {
        defaults::TRAFFIC_READ_PCT
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            num_packets: defaults::TRAFFIC_PACKETS,
            pattern: TrafficPattern::default(),
            period: defaults::TRAFFIC_PERIOD,
            working_set: defaults::TRAFFIC_WORKING_SET,
            read_pct: defaults::TRAFFIC_READ_PCT,
        }
    }
}
