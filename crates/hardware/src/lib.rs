//! CXL-attached compressed memory controller model.
//!
//! This crate implements a discrete-event timing model of a memory
//! controller behind a CXL.mem link that performs transparent line
//! compression. It provides:
//! 1. **Controller:** Bounded queues, write coalescing, read-after-write
//!    forwarding, a read/write bus-turn state machine, and a retry
//!    handshake in both directions.
//! 2. **Compression:** LZ4 batch compression with 1/2/4 KiB granularity
//!    selection, and read amplification over compressed blocks.
//! 3. **Memory:** A downstream DRAM device with row-buffer timing and a
//!    byte-accurate backing store.
//! 4. **Simulation:** Event queue, dispatch loop, drain handshake, and
//!    synthetic traffic generation.
//! 5. **Statistics:** Latency and bandwidth scalars, histograms, and
//!    per-requestor counters.

/// Shared constants, address ranges, and error types.
pub mod common;
/// Simulator configuration (defaults, hierarchical config structures).
pub mod config;
/// Memory packet model.
pub mod mem;
/// Event kernel, simulator loop, and traffic generation.
pub mod sim;
/// Device side: backing store, DRAM device, ports, and the controller.
pub mod soc;
/// Statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Top-level simulator; owns the controller, device, and requestor.
pub use crate::sim::Simulator;
/// The CXL memory controller.
pub use crate::soc::cxl::CxlMemCtrl;
