//! Configuration error definitions.
//!
//! Construction of the controller or the downstream device fails with a
//! `ConfigError` when the supplied configuration cannot describe a working
//! system. These are the only recoverable errors in the model; run-time
//! invariant violations indicate a bug in the surrounding simulator and
//! abort instead.

use std::fmt;

/// Errors detected while building a system from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The memory-side port has nothing to connect to (zero-sized RAM).
    ///
    /// The associated value names the controller instance.
    PortUnconnected(String),

    /// A queue was configured with zero depth.
    ///
    /// The associated value names the queue.
    ZeroQueueDepth(&'static str),

    /// The write-packet threshold is zero or exceeds the write queue depth.
    InvalidWriteThreshold {
        /// Configured threshold.
        threshold: usize,
        /// Configured write queue depth.
        write_buffer_size: usize,
    },

    /// The compressed block interleave size is not a positive multiple of
    /// the cache line.
    InvalidBlockSize(u64),

    /// The DRAM row size is not a power of two.
    InvalidRowSize(u64),

    /// The host refused to allocate the backing store.
    ///
    /// The associated value is the requested size in bytes.
    BackingStore(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PortUnconnected(name) => {
                write!(f, "{}: memory-side port is not connected", name)
            }
            ConfigError::ZeroQueueDepth(queue) => {
                write!(f, "{} depth must be non-zero", queue)
            }
            ConfigError::InvalidWriteThreshold {
                threshold,
                write_buffer_size,
            } => write!(
                f,
                "write_pkt_threshold {} must be non-zero and no larger than write_buffer_size {}",
                threshold, write_buffer_size
            ),
            ConfigError::InvalidBlockSize(size) => {
                write!(f, "compressed_size {} must be a positive multiple of 64", size)
            }
            ConfigError::InvalidRowSize(size) => {
                write!(f, "row_size {} must be a power of two", size)
            }
            ConfigError::BackingStore(bytes) => {
                write!(f, "cannot allocate {}-byte backing store", bytes)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
