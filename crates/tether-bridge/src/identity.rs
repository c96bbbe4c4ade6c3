//! Object identity bridge
//!
//! Process-wide mapping from host object identity to its foreign twin. At
//! most one live mapping exists per host object; entries are created lazily
//! on first cross-boundary access and removed exactly once when the host
//! object is destroyed. Disposal is routed through exactly one runtime
//! callback — removal happens before dispose, so a second removal finds
//! nothing left to dispose.
//!
//! Deletion notifications may arrive from the host collector's thread; they
//! are queued and drained synchronously on the owning thread.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tether_abi::meta::TypeKind;
use tether_abi::TypeKey;

use crate::context::BridgeContext;
use crate::descriptor::DescriptorId;
use crate::handle::Handle;
use crate::host::HostObjectId;
use crate::{BridgeError, BridgeResult};

/// Host-identity to foreign-twin mapping.
#[derive(Debug, Default)]
pub struct IdentityBridge {
    map: FxHashMap<HostObjectId, Handle>,
    destroyed: Mutex<Vec<HostObjectId>>,
}

impl IdentityBridge {
    /// Create an empty identity bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live handle mapped for a host object, if any.
    pub fn get(&self, host: HostObjectId) -> Option<Handle> {
        self.map.get(&host).copied()
    }

    /// Whether a host object currently has a foreign twin.
    pub fn contains(&self, host: HostObjectId) -> bool {
        self.map.contains_key(&host)
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no mappings exist.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Record a host-object deletion observed off the owning thread.
    ///
    /// Safe to call from the host collector's thread; the removal itself
    /// happens in [`drain_destroyed`].
    pub fn notify_destroyed(&self, host: HostObjectId) {
        self.destroyed.lock().push(host);
    }

    fn insert(&mut self, host: HostObjectId, handle: Handle) {
        self.map.insert(host, handle);
    }

    fn remove(&mut self, host: HostObjectId) -> Option<Handle> {
        self.map.remove(&host)
    }

    fn take_destroyed(&mut self) -> Vec<HostObjectId> {
        std::mem::take(&mut *self.destroyed.lock())
    }
}

// ============================================================================
// Twin Lifecycle
// ============================================================================

/// Resolve the foreign type key for a class descriptor, caching it.
///
/// A synthesized class whose foreign type cannot be found indicates a
/// metadata/runtime-module mismatch and is unrecoverable.
pub fn ensure_type_key(ctx: &mut BridgeContext, class: DescriptorId) -> BridgeResult<TypeKey> {
    if let Some(key) = ctx.registry.descriptor(class).type_key {
        return Ok(key);
    }
    let (module, namespace, name, qualified) = {
        let desc = ctx.registry.descriptor(class);
        (
            desc.module.clone(),
            desc.namespace.clone(),
            desc.name.clone(),
            desc.qualified_name(),
        )
    };
    let module_key = ctx
        .modules
        .key_of(&module)
        .unwrap_or(tether_abi::ModuleKey(0));
    let runtime = ctx.runtime.clone();
    let key = runtime
        .lookup_type(module_key, &namespace, &name)
        .ok_or(BridgeError::MissingForeignType(qualified))?;
    ctx.registry.descriptor_mut(class).type_key = Some(key);
    Ok(key)
}

/// Create the foreign twin for a host object of a synthesized class.
///
/// Precondition: no existing mapping for `host`; violating it is a
/// programming error, reported as [`BridgeError::DuplicateTwin`]. A null
/// return from the runtime for a successfully synthesized type is an
/// unrecoverable invariant violation.
pub fn create_foreign_twin(
    ctx: &mut BridgeContext,
    host: HostObjectId,
    class: DescriptorId,
) -> BridgeResult<Handle> {
    if ctx.identity.contains(host) {
        return Err(BridgeError::DuplicateTwin(host));
    }

    let type_key = ensure_type_key(ctx, class)?;
    let runtime = ctx.runtime.clone();
    let foreign = runtime.create_object(host.raw(), type_key);
    if foreign.is_null() {
        return Err(BridgeError::TwinCreationFailed {
            type_name: ctx.registry.descriptor(class).qualified_name(),
        });
    }

    let handle = Handle::strong(foreign);
    ctx.identity.insert(host, handle);
    Ok(handle)
}

/// Find the twin for a host object, creating one on first access.
///
/// A dead host object first has any stale mapping removed and disposed,
/// then yields the null handle.
pub fn find_or_create_twin(ctx: &mut BridgeContext, host: HostObjectId) -> BridgeResult<Handle> {
    if !ctx.heap.is_alive(host) {
        remove_twin(ctx, host);
        return Ok(Handle::null());
    }
    if let Some(handle) = ctx.identity.get(host) {
        return Ok(handle);
    }
    let class = ctx
        .heap
        .class_of(host)
        .ok_or(BridgeError::UnknownObject(host))?;
    if ctx.registry.descriptor(class).kind != TypeKind::Class {
        return Err(BridgeError::NotInstantiable(
            ctx.registry.descriptor(class).qualified_name(),
        ));
    }
    create_foreign_twin(ctx, host, class)
}

/// Remove and dispose a host object's twin mapping.
///
/// Idempotent: absent mappings are a no-op. Used on explicit teardown and
/// on the host's object-deletion notification.
pub fn remove_twin(ctx: &mut BridgeContext, host: HostObjectId) {
    if let Some(handle) = ctx.identity.remove(host) {
        if !handle.is_null() {
            ctx.runtime.dispose(handle.foreign);
        }
    }
}

/// Drain queued deletion notifications on the owning thread.
///
/// Returns how many mappings were removed.
pub fn drain_destroyed(ctx: &mut BridgeContext) -> usize {
    let destroyed = ctx.identity.take_destroyed();
    let mut removed = 0;
    for host in destroyed {
        if ctx.identity.contains(host) {
            removed += 1;
        }
        remove_twin(ctx, host);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BridgeContext;
    use crate::testutil::NullRuntime;
    use std::sync::Arc;

    fn ctx_with(rt: NullRuntime) -> (BridgeContext, Arc<NullRuntime>) {
        let rt = Arc::new(rt);
        (BridgeContext::new(rt.clone()), rt)
    }

    fn spawn_object(ctx: &mut BridgeContext) -> (HostObjectId, DescriptorId) {
        let class = ctx.object_root();
        let size = ctx.registry.descriptor(class).instance_size;
        let host = ctx.heap.allocate(class, vec![0u8; size]);
        (host, class)
    }

    #[test]
    fn test_find_or_create_is_stable() {
        let (mut ctx, rt) = ctx_with(NullRuntime::default());
        let (host, _) = spawn_object(&mut ctx);

        let first = find_or_create_twin(&mut ctx, host).unwrap();
        let second = find_or_create_twin(&mut ctx, host).unwrap();

        assert!(!first.is_null());
        assert_eq!(first, second);
        assert_eq!(ctx.identity.len(), 1);
        assert_eq!(rt.created_count(), 1);
    }

    #[test]
    fn test_duplicate_twin_is_a_programming_error() {
        let (mut ctx, _rt) = ctx_with(NullRuntime::default());
        let (host, class) = spawn_object(&mut ctx);

        create_foreign_twin(&mut ctx, host, class).unwrap();
        let err = create_foreign_twin(&mut ctx, host, class).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateTwin(h) if h == host));
    }

    #[test]
    fn test_null_creation_is_fatal() {
        let (mut ctx, _rt) = ctx_with(NullRuntime::failing_create());
        let (host, class) = spawn_object(&mut ctx);

        let err = create_foreign_twin(&mut ctx, host, class).unwrap_err();
        assert!(matches!(err, BridgeError::TwinCreationFailed { .. }));
        assert!(!ctx.identity.contains(host));
    }

    #[test]
    fn test_dead_object_yields_null_and_purges() {
        let (mut ctx, rt) = ctx_with(NullRuntime::default());
        let (host, _) = spawn_object(&mut ctx);

        let live = find_or_create_twin(&mut ctx, host).unwrap();
        assert!(!live.is_null());

        ctx.heap.release(host);
        let dead = find_or_create_twin(&mut ctx, host).unwrap();
        assert!(dead.is_null());
        assert!(!ctx.identity.contains(host));
        assert_eq!(rt.dispose_count(live.foreign), 1);
    }

    #[test]
    fn test_remove_twin_disposes_exactly_once() {
        let (mut ctx, rt) = ctx_with(NullRuntime::default());
        let (host, _) = spawn_object(&mut ctx);
        let handle = find_or_create_twin(&mut ctx, host).unwrap();

        remove_twin(&mut ctx, host);
        remove_twin(&mut ctx, host);

        assert_eq!(rt.dispose_count(handle.foreign), 1);
    }

    #[test]
    fn test_notification_queue_drains_once() {
        let (mut ctx, rt) = ctx_with(NullRuntime::default());
        let (host, _) = spawn_object(&mut ctx);
        let handle = find_or_create_twin(&mut ctx, host).unwrap();

        // The collector notifies twice; only one mapping exists.
        ctx.identity.notify_destroyed(host);
        ctx.identity.notify_destroyed(host);

        assert_eq!(drain_destroyed(&mut ctx), 1);
        assert_eq!(rt.dispose_count(handle.foreign), 1);
        assert!(ctx.identity.is_empty());
    }
}
