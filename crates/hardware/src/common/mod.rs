//! Common types and constants shared across the simulator.
//!
//! This module collects the pieces every other module needs:
//! 1. **Constants:** Cache line geometry and tick conversions.
//! 2. **Addresses:** `AddrRange` for device address advertisement.
//! 3. **Errors:** Construction-time configuration errors.

/// Address range types for device advertisement.
pub mod addr;

/// Configuration and construction error types.
pub mod error;

/// Cache line size in bytes; the unit transferred between requestor and
/// controller, and the rounding granularity for compressed block sizes.
pub const CACHE_LINE: usize = 64;

/// Simulator ticks per nanosecond (1 tick = 1 ps).
pub const TICKS_PER_NS: u64 = 1_000;

/// Simulator ticks per second.
pub const TICKS_PER_SEC: u64 = 1_000_000_000_000;
