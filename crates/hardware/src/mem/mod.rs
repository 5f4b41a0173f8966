//! Memory packet model.
//!
//! Requests and responses travel through the system as owned `Packet`
//! values; ownership transfers on every hop, and a rejected hop hands the
//! packet back to the sender through a `Result`.

/// Packet and command definitions.
pub mod packet;

pub use packet::{MemCmd, Packet, PacketId, RequestorId};
