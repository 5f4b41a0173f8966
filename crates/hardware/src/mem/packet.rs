//! Memory request and response packets.
//!
//! A `Packet` is the unit of communication between the requestor, the
//! controller, and the downstream DRAM device. It provides:
//! 1. **Identity:** A globally unique id, kept by clones so that a queued
//!    write copy and its original share one latency record.
//! 2. **Command:** Read/write request and response commands.
//! 3. **Payload:** An owned byte buffer sized to the access.
//! 4. **Attribution:** The requestor id and flags of the originating agent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique packet identifier.
pub type PacketId = u64;

/// Identifier of the agent that issued a packet.
pub type RequestorId = u16;

static NEXT_PACKET_ID: AtomicU64 = AtomicU64::new(1);

/// Memory command carried by a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemCmd {
    /// Read request.
    ReadReq,
    /// Read response carrying data.
    ReadResp,
    /// Write request carrying data.
    WriteReq,
    /// Write acknowledgement.
    WriteResp,
}

impl MemCmd {
    /// Returns whether this command moves data from memory to requestor.
    pub fn is_read(self) -> bool {
        matches!(self, MemCmd::ReadReq | MemCmd::ReadResp)
    }

    /// Returns whether this command moves data from requestor to memory.
    pub fn is_write(self) -> bool {
        matches!(self, MemCmd::WriteReq | MemCmd::WriteResp)
    }

    /// Returns whether this command is a request.
    pub fn is_request(self) -> bool {
        matches!(self, MemCmd::ReadReq | MemCmd::WriteReq)
    }

    /// Returns the response command matching this request.
    ///
    /// # Panics
    ///
    /// Panics if called on a response command.
    pub fn response(self) -> MemCmd {
        match self {
            MemCmd::ReadReq => MemCmd::ReadResp,
            MemCmd::WriteReq => MemCmd::WriteResp,
            other => panic!("{:?} has no response command", other),
        }
    }
}

/// A memory transaction packet.
#[derive(Clone, Debug)]
pub struct Packet {
    /// Unique id; preserved by `clone` so queue copies share the original's
    /// latency record. Use the constructors to allocate a fresh id.
    pub id: PacketId,
    /// Current command.
    pub cmd: MemCmd,
    /// Physical start address of the access.
    pub addr: u64,
    /// Access size in bytes.
    pub size: usize,
    /// Payload buffer; `size` bytes.
    pub data: Vec<u8>,
    /// Id of the issuing agent.
    pub requestor: RequestorId,
    /// Opaque flags propagated from the original request.
    pub flags: u32,
    /// Whether the sender expects a response.
    pub needs_response: bool,
    /// Set by a cache that is answering this request elsewhere. The
    /// controller must never see such a packet.
    pub cache_responding: bool,
}

impl Packet {
    fn next_id() -> PacketId {
        NEXT_PACKET_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Creates a read request with a zeroed payload buffer.
    pub fn read_req(addr: u64, size: usize, requestor: RequestorId) -> Self {
        Self {
            id: Self::next_id(),
            cmd: MemCmd::ReadReq,
            addr,
            size,
            data: vec![0; size],
            requestor,
            flags: 0,
            needs_response: true,
            cache_responding: false,
        }
    }

    /// Creates a write request carrying `data`.
    pub fn write_req(addr: u64, data: Vec<u8>, requestor: RequestorId) -> Self {
        let size = data.len();
        Self {
            id: Self::next_id(),
            cmd: MemCmd::WriteReq,
            addr,
            size,
            data,
            requestor,
            flags: 0,
            needs_response: true,
            cache_responding: false,
        }
    }

    /// Returns whether the packet is a read (request or response).
    pub fn is_read(&self) -> bool {
        self.cmd.is_read()
    }

    /// Returns whether the packet is a write (request or response).
    pub fn is_write(&self) -> bool {
        self.cmd.is_write()
    }

    /// Returns whether the packet is a response.
    pub fn is_response(&self) -> bool {
        !self.cmd.is_request()
    }

    /// Converts this request into its response in place.
    pub fn make_response(&mut self) {
        self.cmd = self.cmd.response();
        self.needs_response = false;
    }
}
