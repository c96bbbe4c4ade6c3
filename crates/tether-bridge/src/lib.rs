//! Tether Bridge - core of the host/foreign-runtime object bridge
//!
//! This crate lets foreign-runtime code define types that behave, to the
//! host object system, like native host types — constructible, reflectable,
//! callable — while the two garbage collectors run independently:
//!
//! - **Identity bridge** (`handle`, `identity`): one foreign twin per host
//!   object, created lazily, disposed exactly once
//! - **Type registry** (`registry`): owns every descriptor, resolves
//!   references by name, defers builds blocked on unloaded modules
//! - **Dynamic type builders** (`builders`): synthesize class/struct/enum/
//!   interface/delegate descriptors from ingested metadata
//! - **Property synthesis** (`property`): table-driven kind dispatch with
//!   recursive container linkage
//! - **Invocation bridge** (`invoke`): flat-buffer call marshaling with
//!   output-parameter write-back
//! - **Hot reload** (`reload`): dependency-ordered module teardown,
//!   in-place descriptor rebuild, object reinstancing
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_abi::{ModuleKey, ModuleMetadata};
//! use tether_bridge::BridgeContext;
//!
//! let mut ctx = BridgeContext::new(Arc::new(runtime));
//! let metadata = ModuleMetadata::from_json(&blob)?;
//! ctx.ingest(metadata, "game_mod.bin", ModuleKey(1))?;
//!
//! let class = ctx.resolve_type(&type_ref)?;
//! let enemy = ctx.construct(class)?;
//! ctx.invoke(enemy, "TakeDamage", &mut frame)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builders;
pub mod context;
pub mod descriptor;
pub mod diag;
pub mod handle;
pub mod host;
pub mod identity;
pub mod introspect;
pub mod invoke;
pub mod modules;
pub mod property;
pub mod registry;
pub mod reload;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the boundary contract (canonical definitions live in tether-abi)
pub use tether_abi::{
    CallStatus, CallbackRuntime, CallbackTable, ForeignRef, ForeignRuntime, FunctionDescription,
    FunctionFlags, IngestError, InnerType, MethodKey, ModuleKey, ModuleMetadata,
    PropertyDescription, PropertyFlags, TypeDescription, TypeFlags, TypeKey, TypeKind, TypeRef,
};

pub use builders::BuildOutcome;
pub use context::{BridgeContext, BridgeOptions};
pub use descriptor::{
    DescriptorId, DescriptorState, HostFunction, HostProperty, TypeDescriptor,
};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use handle::{Handle, HandleKind};
pub use host::{HostHeap, HostObject, HostObjectId};
pub use identity::IdentityBridge;
pub use modules::{ModuleInfo, ModuleState, ModuleTracker};
pub use registry::TypeRegistry;
pub use reload::{DependencyGraph, HotReloader, ReloadError, ReloadReport};

/// Bridge errors.
///
/// Fatal variants mean the process cannot continue in a known-good state:
/// a successfully synthesized type whose twin creation returns null, or a
/// type explicitly named in metadata that cannot be resolved at all.
/// Builder-local degradations (missing interface, unhashable map key) never
/// surface here; they are absorbed at the builder boundary as diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The foreign runtime returned null for a synthesized type, an
    /// unrecoverable invariant violation.
    #[error("Failed to create foreign twin for '{type_name}'")]
    TwinCreationFailed {
        /// Qualified name of the class being instantiated.
        type_name: String,
    },

    /// A twin was requested for a host object that already has one.
    #[error("Host object {0:?} already has a live foreign twin")]
    DuplicateTwin(HostObjectId),

    /// A type explicitly named in metadata does not exist anywhere.
    #[error("Type not found: {0}")]
    MissingType(String),

    /// A descriptor exists but no description was ever registered for it.
    #[error("No description registered for '{0}'")]
    MissingDescription(String),

    /// The foreign runtime has no type for a synthesized class, a
    /// metadata/runtime-module mismatch.
    #[error("Foreign type for '{0}' not found in its loaded module")]
    MissingForeignType(String),

    /// The foreign runtime has no method behind a synthesized function.
    #[error("Method '{method}' not found on foreign type '{type_name}'")]
    MissingMethod {
        /// Qualified name of the owning type.
        type_name: String,
        /// Method name that failed to resolve.
        method: String,
    },

    /// No function of this name on the receiver's class chain.
    #[error("Function '{0}' not found")]
    MissingFunction(String),

    /// Invocation on a host object that is no longer alive.
    #[error("Invoke on dead host object {0:?}")]
    DeadObject(HostObjectId),

    /// The host object id does not name a live object.
    #[error("Host object {0:?} not found")]
    UnknownObject(HostObjectId),

    /// Construction requested for a descriptor that cannot be instantiated.
    #[error("Descriptor is not an instantiable class: {0}")]
    NotInstantiable(String),

    /// The provided call frame cannot hold the function's layout.
    #[error("Argument frame too small: need {need} bytes, got {got}")]
    FrameTooSmall {
        /// Bytes the function's frame layout requires.
        need: usize,
        /// Bytes the caller provided.
        got: usize,
    },

    /// The foreign runtime reported a failure for a cross-boundary call.
    #[error("Foreign call '{function}' failed with status {status:?}")]
    CallFailed {
        /// Name of the invoked function.
        function: String,
        /// Status the runtime returned.
        status: CallStatus,
    },

    /// A property description's payload does not match its kind tag.
    #[error("Malformed description for property '{property}': {detail}")]
    MalformedDescription {
        /// Name of the offending property.
        property: String,
        /// What was wrong with it.
        detail: String,
    },

    /// A declared interface is missing and strict interface checking is on.
    #[error("Interface '{0}' could not be resolved")]
    MissingInterface(String),

    /// Metadata blob decoding failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Bridge operation result.
pub type BridgeResult<T> = Result<T, BridgeError>;
