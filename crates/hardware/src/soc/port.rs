//! CPU-side link interfaces.
//!
//! The port roles of the original design are capability seams here:
//! 1. **Upstream:** The trait a requestor implements to receive responses
//!    and retry signals from the controller.
//! 2. **QueuedResponsePort:** The controller-owned buffer that holds
//!    scheduled responses until their delivery tick, absorbing requestor
//!    backpressure.

use std::collections::VecDeque;

use crate::mem::Packet;
use crate::sim::eventq::{EventQueue, SimEvent, Tick};
use crate::sim::traffic::TrafficGen;
use crate::soc::cxl::CxlMemCtrl;

/// CPU-side peer of the controller.
///
/// Implementors inject requests from `tick` and take delivery of responses;
/// a rejected delivery is handed back and redelivered after the implementor
/// reports readiness through `needs_resp_retry`.
pub trait Upstream {
    /// Delivers a timing response. Hand the packet back to defer delivery.
    fn recv_timing_resp(&mut self, pkt: Packet, now: Tick) -> Result<(), Packet>;

    /// The controller has space again for a previously rejected request.
    fn recv_retry_req(&mut self, now: Tick, events: &mut EventQueue);

    /// Stimulus step; inject requests into the controller here.
    fn tick(&mut self, now: Tick, ctrl: &mut CxlMemCtrl, events: &mut EventQueue);

    /// Returns whether the workload has fully completed.
    fn done(&self) -> bool;

    /// Polled before `tick`: returns true once after a rejected delivery to
    /// make the simulator issue the response retry to the controller.
    fn needs_resp_retry(&mut self) -> bool {
        false
    }

    /// Returns this peer as a [`TrafficGen`] if it is one.
    fn as_traffic_gen(&self) -> Option<&TrafficGen> {
        None
    }
}

/// Buffer of responses scheduled for future delivery to the requestor.
///
/// Each entry carries its delivery tick; entries are kept sorted so delivery
/// order matches scheduling order even when latencies differ. The blocked
/// flag latches requestor backpressure until a response retry arrives.
#[derive(Debug, Default)]
pub struct QueuedResponsePort {
    queue: VecDeque<(Tick, Packet)>,
    blocked: bool,
}

impl QueuedResponsePort {
    /// Creates an empty port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `pkt` for delivery at `when` and schedules the delivery
    /// event.
    pub fn schedule_resp(&mut self, pkt: Packet, when: Tick, events: &mut EventQueue) {
        let pos = self
            .queue
            .iter()
            .position(|(t, _)| *t > when)
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, (when, pkt));
        events.schedule(SimEvent::PortDeliver, when);
    }

    /// Pops the next response due at `now`, unless delivery is blocked.
    pub fn pop_due(&mut self, now: Tick) -> Option<Packet> {
        if self.blocked {
            return None;
        }
        match self.queue.front() {
            Some((when, _)) if *when <= now => self.queue.pop_front().map(|(_, p)| p),
            _ => None,
        }
    }

    /// Requeues a rejected response at the head and latches backpressure.
    pub fn block_with(&mut self, pkt: Packet, when: Tick) {
        self.queue.push_front((when, pkt));
        self.blocked = true;
    }

    /// Clears backpressure after an upstream response retry.
    pub fn unblock(&mut self) {
        self.blocked = false;
    }

    /// Returns whether delivery is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Returns whether no responses are buffered.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of buffered responses.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
