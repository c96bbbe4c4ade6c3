//! Class builder
//!
//! Synthesizes a class descriptor: parent resolution (deferring when the
//! parent's module has not loaded), inherited layout and "within" metadata,
//! declared interfaces (a missing interface drops that capability, it never
//! fails the build), properties, functions with shadows for overridden
//! native virtuals, and the constructor hook that runs the nearest native
//! ancestor's initializer before creating the foreign twin.

use tether_abi::meta::{FunctionFlags, TypeDescription, TypeKind};

use super::{resolve_parent, synthesize_properties, BuildOutcome};
use crate::context::BridgeContext;
use crate::descriptor::{ConstructorHook, DescriptorId, HostFunction};
use crate::invoke;
use crate::registry;
use crate::{BridgeError, BridgeResult};

pub(super) fn build(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    desc: &TypeDescription,
) -> BridgeResult<BuildOutcome> {
    // Parent chain: explicit parent or the native root.
    let parent = match &desc.parent {
        Some(parent_ref) => match resolve_parent(ctx, id, parent_ref)? {
            Some(parent) => parent,
            None => return Ok(BuildOutcome::Deferred),
        },
        None => ctx.object_root(),
    };

    {
        let (base_size, parent_within) = {
            let p = ctx.registry.descriptor(parent);
            (p.instance_size, p.within.clone())
        };
        let descriptor = ctx.registry.descriptor_mut(id);
        descriptor.parent = Some(parent);
        descriptor.base_size = base_size;
        if descriptor.within.is_none() {
            descriptor.within = parent_within;
        }
    }

    // Foreign type key, when the owning module is already loaded. Left
    // unresolved otherwise; twin creation retries and treats a final miss
    // as fatal.
    if let Some(module_key) = ctx.modules.key_of(&desc.module) {
        let runtime = ctx.runtime.clone();
        if let Some(type_key) = runtime.lookup_type(module_key, &desc.namespace, &desc.name) {
            ctx.registry.descriptor_mut(id).type_key = Some(type_key);
        }
    }

    apply_interfaces(ctx, id, desc)?;
    synthesize_properties(ctx, id, desc)?;
    synthesize_functions(ctx, id, desc)?;

    // Nearest native ancestor establishes native invariants before the
    // foreign twin exists.
    let native_ancestor =
        registry::nearest_native_ancestor(&ctx.registry, id).unwrap_or_else(|| ctx.object_root());
    ctx.registry.descriptor_mut(id).ctor = Some(ConstructorHook { native_ancestor });

    Ok(BuildOutcome::Built)
}

/// Resolve and attach declared interfaces, each independently.
fn apply_interfaces(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    desc: &TypeDescription,
) -> BridgeResult<()> {
    let owner = ctx.registry.descriptor(id).qualified_name();
    for iface_ref in &desc.interfaces {
        match registry::resolve(ctx, iface_ref) {
            Ok(iface) if ctx.registry.descriptor(iface).kind == TypeKind::Interface => {
                ctx.registry.descriptor_mut(id).interfaces.push(iface);
            }
            Ok(_) => {
                tracing::warn!(owner = %owner, interface = %iface_ref.qualified_name(), "declared interface is not an interface type");
                ctx.diagnostics.warning(format!(
                    "'{}' declares '{}' as an interface, but it is not one",
                    owner,
                    iface_ref.qualified_name()
                ));
            }
            Err(BridgeError::MissingType(name)) => {
                if ctx.options.strict_interfaces {
                    return Err(BridgeError::MissingInterface(name));
                }
                tracing::warn!(owner = %owner, interface = %name, "interface missing, capability dropped");
                ctx.diagnostics.warning(format!(
                    "'{}' loses interface '{}': type not found",
                    owner, name
                ));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Synthesize declared functions, shadowing overridden native virtuals.
fn synthesize_functions(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    desc: &TypeDescription,
) -> BridgeResult<()> {
    for fdesc in &desc.functions {
        match virtual_ancestor_function(ctx, id, &fdesc.name) {
            Some(ancestor_fn) => invoke::synthesize_override(ctx, id, &ancestor_fn)?,
            None => invoke::synthesize_function(ctx, id, fdesc)?,
        }
    }
    Ok(())
}

/// Nearest ancestor declaration of `name`, if it is virtual.
fn virtual_ancestor_function(
    ctx: &BridgeContext,
    id: DescriptorId,
    name: &str,
) -> Option<HostFunction> {
    for ancestor in registry::ancestors(&ctx.registry, id) {
        if let Some(f) = ctx.registry.descriptor(ancestor).find_function(name) {
            if f.flags.contains(FunctionFlags::VIRTUAL) {
                return Some(f.clone());
            }
            return None;
        }
    }
    None
}
