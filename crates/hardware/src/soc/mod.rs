//! Device-side components.
//!
//! This module organizes the memory side of the model: the backing store,
//! the downstream DRAM device, the link port types, and the CXL controller
//! that ties them together.

/// Backing byte storage for the DRAM device.
pub mod buffer;

/// The CXL memory controller.
pub mod cxl;

/// Downstream DRAM device with row-buffer timing.
pub mod dram;

/// CPU-side link interfaces (requestor trait, queued response port).
pub mod port;
