//! Descriptor introspection
//!
//! Chain-aware queries over synthesized descriptors: inheritance and
//! interface conformance checks, property lookup across the full layout
//! (inherited storage included), and signature rendering for diagnostics.
//! Everything here is read-only over the registry.

use crate::descriptor::{DescriptorId, HostFunction, HostProperty};
use crate::host::HostObjectId;
use crate::registry::TypeRegistry;
use crate::BridgeContext;

/// Whether `class` is `ancestor` or inherits from it.
pub fn is_subclass_of(registry: &TypeRegistry, class: DescriptorId, ancestor: DescriptorId) -> bool {
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        if id == ancestor {
            return true;
        }
        cursor = registry.descriptor(id).parent;
    }
    false
}

/// Whether `class` or any of its ancestors implements `interface`.
pub fn conforms_to(
    registry: &TypeRegistry,
    class: DescriptorId,
    interface: DescriptorId,
) -> bool {
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        if registry.descriptor(id).implements(interface) {
            return true;
        }
        cursor = registry.descriptor(id).parent;
    }
    false
}

/// Whether a live host object is an instance of `class` (exact or derived).
pub fn instance_of(ctx: &BridgeContext, host: HostObjectId, class: DescriptorId) -> bool {
    match ctx.heap.class_of(host) {
        Some(runtime_class) => is_subclass_of(&ctx.registry, runtime_class, class),
        None => false,
    }
}

/// Find a property by name on a class or any of its ancestors.
///
/// Returns the declaring descriptor alongside the property, nearest
/// declaration first.
pub fn find_property_in_chain<'a>(
    registry: &'a TypeRegistry,
    class: DescriptorId,
    name: &str,
) -> Option<(DescriptorId, &'a HostProperty)> {
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        let desc = registry.descriptor(id);
        if let Some(prop) = desc.find_property(name) {
            return Some((id, prop));
        }
        cursor = desc.parent;
    }
    None
}

/// All properties reachable on an instance, root-most declarations first.
///
/// This is the full storage layout: inherited properties occupy the lower
/// offsets, each descriptor's own chain follows in declaration order.
pub fn all_properties(registry: &TypeRegistry, class: DescriptorId) -> Vec<&HostProperty> {
    let mut chain = Vec::new();
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        chain.push(id);
        cursor = registry.descriptor(id).parent;
    }
    chain
        .into_iter()
        .rev()
        .flat_map(|id| registry.descriptor(id).properties().iter())
        .collect()
}

/// Render a function signature for diagnostics, in declaration order.
pub fn render_signature(function: &HostFunction) -> String {
    let params: Vec<String> = function
        .params
        .iter()
        .map(|p| format!("{}: {:?}", p.name, p.kind))
        .collect();
    match &function.ret {
        Some(ret) => format!("{}({}) -> {:?}", function.name, params.join(", "), ret.kind),
        None => format!("{}({})", function.name, params.join(", ")),
    }
}
