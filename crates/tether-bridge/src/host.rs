//! Minimal host object model
//!
//! The bridge extends a host object system; this module provides the part of
//! that system the bridge touches: objects with per-descriptor byte storage,
//! a liveness flag, and a construction path that runs the synthesized
//! constructor hook. Identity is a stable numeric id, never a raw address.

use rustc_hash::FxHashMap;

use crate::descriptor::DescriptorId;

/// Stable identity of a host object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostObjectId(pub(crate) u64);

impl HostObjectId {
    /// Raw id value carried across the boundary as the host pointer.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A host object instance.
#[derive(Debug)]
pub struct HostObject {
    /// Identity of this object.
    pub id: HostObjectId,
    /// Runtime type of this object.
    pub class: DescriptorId,
    /// Property storage, laid out by the class descriptor.
    pub data: Vec<u8>,
}

/// Host-side object storage.
///
/// Destroyed objects are removed immediately; a missing id reads as dead.
#[derive(Debug, Default)]
pub struct HostHeap {
    objects: FxHashMap<HostObjectId, HostObject>,
    next_id: u64,
}

impl HostHeap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object with the given class and initial storage.
    ///
    /// This is the raw allocation path; `context::construct` layers the
    /// synthesized constructor hook on top.
    pub fn allocate(&mut self, class: DescriptorId, data: Vec<u8>) -> HostObjectId {
        self.next_id += 1;
        let id = HostObjectId(self.next_id);
        self.objects.insert(id, HostObject { id, class, data });
        id
    }

    /// Whether the object is still alive.
    pub fn is_alive(&self, id: HostObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Look up a live object.
    pub fn object(&self, id: HostObjectId) -> Option<&HostObject> {
        self.objects.get(&id)
    }

    /// Mutable lookup of a live object.
    pub fn object_mut(&mut self, id: HostObjectId) -> Option<&mut HostObject> {
        self.objects.get_mut(&id)
    }

    /// Runtime type of a live object.
    pub fn class_of(&self, id: HostObjectId) -> Option<DescriptorId> {
        self.objects.get(&id).map(|o| o.class)
    }

    /// Remove an object's storage. Returns whether it was alive.
    pub fn release(&mut self, id: HostObjectId) -> bool {
        self.objects.remove(&id).is_some()
    }

    /// Read a byte range from an object's storage.
    pub fn read_bytes(&self, id: HostObjectId, offset: usize, len: usize) -> Option<&[u8]> {
        self.objects.get(&id)?.data.get(offset..offset + len)
    }

    /// Write a byte range into an object's storage.
    ///
    /// Returns `false` when the object is dead or the range is out of
    /// bounds.
    pub fn write_bytes(&mut self, id: HostObjectId, offset: usize, bytes: &[u8]) -> bool {
        let Some(obj) = self.objects.get_mut(&id) else {
            return false;
        };
        let Some(slot) = obj.data.get_mut(offset..offset + bytes.len()) else {
            return false;
        };
        slot.copy_from_slice(bytes);
        true
    }

    /// Ids of all live objects whose class is in `classes`.
    pub fn objects_of_classes(&self, classes: &[DescriptorId]) -> Vec<HostObjectId> {
        let mut ids: Vec<_> = self
            .objects
            .values()
            .filter(|o| classes.contains(&o.class))
            .map(|o| o.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the heap holds no live objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
