//! Type registry
//!
//! The registry exclusively owns every known type descriptor — native and
//! synthesized — in an arena indexed by [`DescriptorId`]. Raw descriptions
//! are registered eagerly but built on demand, because a type's parent may
//! live in a module that has not loaded yet; blocked builds wait in the
//! pending queue and are replayed when the owning module becomes available.

use rustc_hash::FxHashMap;
use tether_abi::meta::{TypeDescription, TypeFlags, TypeKind, TypeRef};

use crate::builders::{self, BuildOutcome};
use crate::context::BridgeContext;
use crate::descriptor::{DescriptorId, DescriptorState, NativeInit, TypeDescriptor};
use crate::{BridgeError, BridgeResult};

/// Builds blocked on one unresolved parent reference.
#[derive(Debug)]
struct PendingEntry {
    parent: TypeRef,
    children: Vec<DescriptorId>,
}

/// Owner of all type descriptors and raw descriptions.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    descriptors: Vec<TypeDescriptor>,
    by_name: FxHashMap<String, DescriptorId>,
    descriptions: FxHashMap<String, TypeDescription>,
    pending: FxHashMap<String, PendingEntry>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw description under its qualified name.
    ///
    /// Construction is demand-driven; nothing is built here. Re-registering
    /// a name replaces the stored description (hot reload does this).
    pub fn register_description(&mut self, desc: TypeDescription) {
        self.descriptions.insert(desc.qualified_name(), desc);
    }

    /// Look up a stored description.
    pub fn description(&self, qualified: &str) -> Option<&TypeDescription> {
        self.descriptions.get(qualified)
    }

    /// Look up a descriptor id by qualified name.
    pub fn lookup(&self, qualified: &str) -> Option<DescriptorId> {
        self.by_name.get(qualified).copied()
    }

    /// Borrow a descriptor.
    pub fn descriptor(&self, id: DescriptorId) -> &TypeDescriptor {
        &self.descriptors[id.0]
    }

    /// Mutably borrow a descriptor.
    pub fn descriptor_mut(&mut self, id: DescriptorId) -> &mut TypeDescriptor {
        &mut self.descriptors[id.0]
    }

    /// Forward-declare a descriptor shell and index it by name.
    pub fn declare(
        &mut self,
        name: &str,
        namespace: &str,
        module: &str,
        kind: TypeKind,
    ) -> DescriptorId {
        let id = DescriptorId(self.descriptors.len());
        let desc = TypeDescriptor::new(id, name, namespace, module, kind);
        self.by_name.insert(desc.qualified_name(), id);
        self.descriptors.push(desc);
        id
    }

    /// Register a host-defined class descriptor.
    ///
    /// Native descriptors are born `UpToDate` and never synthesized.
    pub fn register_native_class(
        &mut self,
        name: &str,
        namespace: &str,
        parent: Option<DescriptorId>,
        instance_size: usize,
        init: NativeInit,
    ) -> DescriptorId {
        let base_size = parent.map(|p| self.descriptor(p).instance_size).unwrap_or(0);
        let id = self.declare(name, namespace, "", TypeKind::Class);
        let desc = self.descriptor_mut(id);
        desc.flags = TypeFlags::NATIVE;
        desc.state = DescriptorState::UpToDate;
        desc.parent = parent;
        desc.base_size = base_size;
        desc.instance_size = base_size + instance_size;
        desc.native_init = Some(init);
        desc.rebuild_defaults();
        id
    }

    /// Register a host-defined interface descriptor.
    pub fn register_native_interface(&mut self, name: &str, namespace: &str) -> DescriptorId {
        let id = self.declare(name, namespace, "", TypeKind::Interface);
        let desc = self.descriptor_mut(id);
        desc.flags = TypeFlags::NATIVE;
        desc.state = DescriptorState::UpToDate;
        id
    }

    /// Queue a build behind an unresolved parent reference.
    pub fn defer(&mut self, child: DescriptorId, parent: TypeRef) {
        let entry = self
            .pending
            .entry(parent.qualified_name())
            .or_insert_with(|| PendingEntry {
                parent,
                children: Vec::new(),
            });
        if !entry.children.contains(&child) {
            entry.children.push(child);
        }
    }

    /// Remove and return the pending entries whose parent lives in `module`.
    ///
    /// Entries that still fail to build are re-queued by the builder.
    fn take_pending_for_module(&mut self, module: &str) -> Vec<(TypeRef, Vec<DescriptorId>)> {
        let keys: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, e)| e.parent.module == module)
            .map(|(k, _)| k.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| self.pending.remove(&k))
            .map(|e| (e.parent, e.children))
            .collect()
    }

    /// Number of builds currently blocked on unresolved parents.
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(|e| e.children.len()).sum()
    }

    /// Ids of all descriptors owned by `module`.
    pub fn ids_for_module(&self, module: &str) -> Vec<DescriptorId> {
        self.descriptors
            .iter()
            .filter(|d| d.module == module)
            .map(|d| d.id)
            .collect()
    }

    /// Mark every built descriptor of `module` structurally stale.
    ///
    /// Returns the ids that were marked.
    pub fn mark_module_stale(&mut self, module: &str) -> Vec<DescriptorId> {
        let mut stale = Vec::new();
        for desc in &mut self.descriptors {
            if desc.module == module && desc.state == DescriptorState::UpToDate {
                desc.state = DescriptorState::StructurallyStale;
                stale.push(desc.id);
            }
        }
        stale
    }

    /// Number of descriptors in the arena.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve a reference to a forward-declared descriptor, without building.
///
/// Sufficient for object-like references, which need identity but not
/// layout. Fails when the name has neither a descriptor nor a description,
/// meaning a type explicitly named by metadata does not exist.
pub fn resolve_forward(ctx: &mut BridgeContext, tref: &TypeRef) -> BridgeResult<DescriptorId> {
    let qualified = tref.qualified_name();
    if let Some(id) = ctx.registry.lookup(&qualified) {
        return Ok(id);
    }
    let Some(desc) = ctx.registry.description(&qualified) else {
        return Err(BridgeError::MissingType(qualified));
    };
    let (name, namespace, module, kind) = (
        desc.name.clone(),
        desc.namespace.clone(),
        desc.module.clone(),
        desc.kind,
    );
    Ok(ctx.registry.declare(&name, &namespace, &module, kind))
}

/// Resolve a reference to a fully built descriptor.
///
/// Host-native types resolve directly; foreign-defined types are built on
/// first use. A descriptor already `Building` is returned as-is; mutual
/// references never re-enter a build.
pub fn resolve(ctx: &mut BridgeContext, tref: &TypeRef) -> BridgeResult<DescriptorId> {
    let id = resolve_forward(ctx, tref)?;
    build_if_needed(ctx, id)?;
    Ok(id)
}

/// Build a descriptor if its state requires it.
pub fn build_if_needed(ctx: &mut BridgeContext, id: DescriptorId) -> BridgeResult<BuildOutcome> {
    match ctx.registry.descriptor(id).state {
        DescriptorState::UpToDate | DescriptorState::Building => Ok(BuildOutcome::Built),
        DescriptorState::Unbuilt | DescriptorState::StructurallyStale => builders::build(ctx, id),
    }
}

/// Replay pending builds blocked on types from a newly available module.
///
/// Re-entrant-safe: a replayed build may defer again (the builder re-queues
/// it) or queue further builds behind other unresolved parents. Replaying
/// stops when a pass makes no progress, and a successfully built child
/// cascades into a replay for its own module, so a deferral chain across
/// several modules completes as soon as its last link arrives.
pub fn module_available(ctx: &mut BridgeContext, module: &str) -> BridgeResult<()> {
    let mut cascade: Vec<String> = Vec::new();
    loop {
        let entries = ctx.registry.take_pending_for_module(module);
        if entries.is_empty() {
            break;
        }
        let mut progress = false;
        for (parent, children) in entries {
            tracing::debug!(
                module,
                parent = %parent.qualified_name(),
                count = children.len(),
                "replaying deferred builds"
            );
            for child in children {
                let child_module = ctx.registry.descriptor(child).module.clone();
                if build_if_needed(ctx, child)? == BuildOutcome::Built {
                    progress = true;
                    if child_module != module && !cascade.contains(&child_module) {
                        cascade.push(child_module);
                    }
                }
            }
        }
        if !progress {
            break;
        }
    }
    for waiting in cascade {
        module_available(ctx, &waiting)?;
    }
    Ok(())
}

/// Walk the parent chain, nearest first, excluding `id` itself.
pub fn ancestors(registry: &TypeRegistry, id: DescriptorId) -> Vec<DescriptorId> {
    let mut chain = Vec::new();
    let mut cursor = registry.descriptor(id).parent;
    while let Some(pid) = cursor {
        chain.push(pid);
        cursor = registry.descriptor(pid).parent;
    }
    chain
}

/// Nearest non-synthesized ancestor of a descriptor.
pub fn nearest_native_ancestor(registry: &TypeRegistry, id: DescriptorId) -> Option<DescriptorId> {
    ancestors(registry, id)
        .into_iter()
        .find(|pid| registry.descriptor(*pid).is_native())
}

/// Find a function by name on a class or any of its ancestors.
///
/// Returns the owning descriptor and the index into its function table.
pub fn find_function_in_chain(
    registry: &TypeRegistry,
    class: DescriptorId,
    name: &str,
) -> Option<(DescriptorId, usize)> {
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        let desc = registry.descriptor(id);
        if let Some(idx) = desc.functions.iter().position(|f| f.name == name) {
            return Some((id, idx));
        }
        cursor = desc.parent;
    }
    None
}
