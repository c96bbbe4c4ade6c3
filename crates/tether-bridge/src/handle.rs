//! Handles to foreign-runtime objects
//!
//! A [`Handle`] tags a [`ForeignRef`] with an ownership strength. Handles are
//! plain values; the identity bridge owns the authoritative copy for each
//! host object and guarantees the underlying foreign object is disposed
//! through exactly one runtime callback (removal happens before dispose, so
//! a second removal finds nothing to dispose).

use tether_abi::ForeignRef;

/// Ownership strength of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// No referenced object.
    Null,
    /// Keeps the foreign object alive.
    Strong,
    /// Does not keep the foreign object alive.
    Weak,
    /// Keeps the foreign object alive and fixed in memory.
    Pinned,
}

/// A tagged reference to an object on the foreign runtime's heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    /// The referenced foreign object, or [`ForeignRef::NULL`].
    pub foreign: ForeignRef,
    /// Ownership strength.
    pub kind: HandleKind,
}

impl Handle {
    /// The null handle.
    pub fn null() -> Self {
        Self {
            foreign: ForeignRef::NULL,
            kind: HandleKind::Null,
        }
    }

    /// A strong handle to `foreign`.
    ///
    /// A null reference collapses to the null handle.
    pub fn strong(foreign: ForeignRef) -> Self {
        Self::with_kind(foreign, HandleKind::Strong)
    }

    /// A weak handle to `foreign`.
    pub fn weak(foreign: ForeignRef) -> Self {
        Self::with_kind(foreign, HandleKind::Weak)
    }

    /// A pinned handle to `foreign`.
    pub fn pinned(foreign: ForeignRef) -> Self {
        Self::with_kind(foreign, HandleKind::Pinned)
    }

    fn with_kind(foreign: ForeignRef, kind: HandleKind) -> Self {
        if foreign.is_null() {
            Self::null()
        } else {
            Self { foreign, kind }
        }
    }

    /// Whether this handle references nothing.
    pub fn is_null(&self) -> bool {
        self.kind == HandleKind::Null || self.foreign.is_null()
    }

    /// A weak copy of this handle.
    pub fn downgrade(&self) -> Self {
        Self::with_kind(self.foreign, HandleKind::Weak)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::null()
    }
}
