//! Multiplayer assignment sync.
//!
//! Whenever a client's assignment set changes, the full current course
//! list for that vehicle is serialized into one [`AssignmentSyncMessage`]
//! and handed to an [`AssignmentTransport`]. Delivery is fire-and-forget:
//! a dropped message leaves peers temporarily inconsistent until the next
//! assignment change resyncs them.

use serde::{Deserialize, Serialize};

use crate::assignment::VehicleId;

/// Identity of a directly connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

/// Full assignment state for one vehicle, as sent over the wire.
///
/// `courses` holds the serialized document bytes in load order;
/// `slot_index` is advisory (receivers re-derive the slot from the
/// vehicle identity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSyncMessage {
    pub vehicle: VehicleId,
    pub slot_index: Option<usize>,
    pub courses: Vec<Vec<u8>>,
}

/// Outgoing side of the network boundary. Transport mechanics live
/// outside this crate; implementations only deliver.
pub trait AssignmentTransport {
    /// Send to every directly connected peer.
    fn broadcast(&mut self, msg: &AssignmentSyncMessage);

    /// Send to every directly connected peer except `skip`. Used by the
    /// server to relay a client's change to the rest of the star.
    fn relay(&mut self, msg: &AssignmentSyncMessage, skip: PeerId);
}

// Lets callers keep a handle on a transport they hand to a manager.
impl<T: AssignmentTransport> AssignmentTransport for std::rc::Rc<std::cell::RefCell<T>> {
    fn broadcast(&mut self, msg: &AssignmentSyncMessage) {
        self.borrow_mut().broadcast(msg);
    }

    fn relay(&mut self, msg: &AssignmentSyncMessage, skip: PeerId) {
        self.borrow_mut().relay(msg, skip);
    }
}

/// Transport for standalone use; drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl AssignmentTransport for NullTransport {
    fn broadcast(&mut self, _msg: &AssignmentSyncMessage) {}

    fn relay(&mut self, _msg: &AssignmentSyncMessage, _skip: PeerId) {}
}

/// In-memory transport that records outgoing traffic.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    /// Broadcast messages, in send order.
    pub broadcasts: Vec<AssignmentSyncMessage>,
    /// Relayed messages with the skipped peer.
    pub relays: Vec<(AssignmentSyncMessage, PeerId)>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentTransport for MemoryTransport {
    fn broadcast(&mut self, msg: &AssignmentSyncMessage) {
        self.broadcasts.push(msg.clone());
    }

    fn relay(&mut self, msg: &AssignmentSyncMessage, skip: PeerId) {
        self.relays.push((msg.clone(), skip));
    }
}
