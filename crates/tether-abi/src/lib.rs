//! Tether ABI - Shared boundary contract for the tether bridge
//!
//! This crate provides the minimal types shared between the tether bridge and
//! the external runtime host that boots the foreign managed runtime:
//!
//! - Opaque reference and lookup-key tokens (`ForeignRef`, `TypeKey`,
//!   `MethodKey`, `ModuleKey`)
//! - The `ForeignRuntime` trait and the C-compatible `CallbackTable` it can
//!   be backed by (`runtime` module)
//! - The immutable metadata description model delivered by the external
//!   metadata parser (`meta` module) and the per-module blob decoder
//!   (`ingest` module)
//!
//! The bridge itself lives in `tether-bridge`; runtime hosts and metadata
//! producers only need this crate.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod ingest;
pub mod meta;
pub mod runtime;

pub use ingest::{IngestError, ModuleMetadata};
pub use meta::{
    FunctionDescription, FunctionFlags, InnerType, PropertyDescription, PropertyFlags,
    TypeDescription, TypeFlags, TypeKind, TypeRef,
};
pub use runtime::{CallbackRuntime, CallbackTable, ForeignRuntime};

// ============================================================================
// Opaque Tokens
// ============================================================================

/// Opaque reference to an object on the foreign runtime's heap.
///
/// The token value is owned by the foreign runtime; the bridge never
/// dereferences it. Zero is reserved for the null reference.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignRef(pub u64);

impl ForeignRef {
    /// The null foreign reference.
    pub const NULL: ForeignRef = ForeignRef(0);

    /// Check whether this is the null reference.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Opaque handle to a foreign-runtime type, obtained via `lookup_type`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey(pub u64);

/// Opaque handle to a foreign-runtime method, obtained via `lookup_method`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodKey(pub u64);

/// Opaque handle to a loaded foreign module, obtained via `load_module`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKey(pub u64);

// ============================================================================
// Call Status
// ============================================================================

/// Status code returned by a cross-boundary method invocation.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// The call completed; output and return slots are valid.
    Ok = 0,
    /// The foreign runtime raised a fault while executing the method.
    Fault = 1,
    /// The method key did not resolve to a callable method.
    MissingMethod = 2,
}

impl CallStatus {
    /// Convert from the raw `i32` carried across the C boundary.
    ///
    /// Unknown codes are treated as `Fault`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => CallStatus::Ok,
            2 => CallStatus::MissingMethod,
            _ => CallStatus::Fault,
        }
    }
}
