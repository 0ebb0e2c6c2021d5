//! Face abstraction and registry. See spec §4.6, §6.
//!
//! Grounded on `fidinda-reto/src/face/mod.rs`'s split between sending and
//! receiving (`FaceSender`/`FaceReceiver`); here collapsed into one `Face`
//! trait since the pipeline (§4.7) only ever pushes encoded packets out --
//! receiving is the caller's job, matching the "Face sink contract" in
//! spec §6 (`face.sendInterest`/`face.sendData`, fire-and-forget).

use crate::packet::{Data, Interest};

/// First face id available for ordinary links; ids below this are reserved
/// for internal/management faces (spec §4.6).
pub const FIRST_ASSIGNABLE_FACE_ID: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceId(u64);

impl FaceId {
    pub fn new(raw: u64) -> Self {
        FaceId(raw)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceScope {
    Local,
    NonLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacePersistency {
    Persistent,
    OnDemand,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceFailReason {
    Disconnected,
    SendError,
}

/// A bidirectional link to a peer. Sending is fire-and-forget: reliability
/// is the face implementation's concern, not the forwarding core's
/// (spec §6).
pub trait Face {
    fn remote_uri(&self) -> &str;
    fn local_uri(&self) -> &str;
    fn scope(&self) -> FaceScope;
    fn persistency(&self) -> FacePersistency;

    fn is_local(&self) -> bool {
        self.scope() == FaceScope::Local
    }

    fn send_interest(&mut self, interest: &Interest) -> Result<(), FaceFailReason>;
    fn send_data(&mut self, data: &Data) -> Result<(), FaceFailReason>;
}

struct FaceSlot {
    face: Box<dyn Face>,
}

/// Registry of links. Assigns a monotonically increasing `FaceId` on
/// `add`, and notifies subscribers on `remove` (spec §4.6).
#[derive(Default)]
pub struct FaceTable {
    faces: std::collections::BTreeMap<FaceId, FaceSlot>,
    next_id: u64,
    on_remove: Vec<Box<dyn FnMut(FaceId)>>,
}

impl FaceTable {
    pub fn new() -> Self {
        FaceTable {
            faces: Default::default(),
            next_id: FIRST_ASSIGNABLE_FACE_ID,
            on_remove: Vec::new(),
        }
    }

    pub fn add(&mut self, face: Box<dyn Face>) -> FaceId {
        let id = FaceId(self.next_id);
        self.next_id += 1;
        self.faces.insert(id, FaceSlot { face });
        id
    }

    /// Registers a callback invoked for every subsequent `remove`. FIB,
    /// PIT, RIB, and strategies all subscribe so removal cascades through
    /// every table that might hold a reference to the face (spec §4.6).
    pub fn on_remove(&mut self, callback: impl FnMut(FaceId) + 'static) {
        self.on_remove.push(Box::new(callback));
    }

    pub fn remove(&mut self, id: FaceId) -> bool {
        if self.faces.remove(&id).is_none() {
            return false;
        }
        for cb in &mut self.on_remove {
            cb(id);
        }
        true
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut dyn Face> {
        self.faces.get_mut(&id).map(|slot| slot.face.as_mut())
    }

    pub fn contains(&self, id: FaceId) -> bool {
        self.faces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys().copied()
    }
}
