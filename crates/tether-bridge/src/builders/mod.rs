//! Dynamic type builders
//!
//! One builder per type kind. A builder consumes an immutable description
//! and synthesizes the host-native descriptor in place: inheritance chain,
//! property layout, function table, default instance. Builders run inside
//! the registry's `Unbuilt → Building` transition, which is what makes
//! mutually-referencing types safe to construct.

mod class;
mod delegate;
mod enums;
mod interface;
mod strukt;

use tether_abi::meta::{TypeDescription, TypeFlags, TypeKind, TypeRef};

use crate::context::BridgeContext;
use crate::descriptor::{DescriptorId, DescriptorState};
use crate::property;
use crate::registry;
use crate::{BridgeError, BridgeResult};

/// Result of one build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The descriptor is fully synthesized and `UpToDate`.
    Built,
    /// Construction is blocked on an unavailable parent and queued for
    /// replay; the descriptor stays `Unbuilt`.
    Deferred,
}

/// Build a descriptor from its registered description.
///
/// Dispatches to the builder matching the description's kind. The
/// `Building` state is entered before any property or function synthesis,
/// so resolution never constructs a descriptor twice.
pub fn build(ctx: &mut BridgeContext, id: DescriptorId) -> BridgeResult<BuildOutcome> {
    let qualified = ctx.registry.descriptor(id).qualified_name();
    let desc = ctx
        .registry
        .description(&qualified)
        .cloned()
        .ok_or(BridgeError::MissingDescription(qualified.clone()))?;

    {
        let descriptor = ctx.registry.descriptor_mut(id);
        if descriptor.state == DescriptorState::Building {
            return Ok(BuildOutcome::Built);
        }
        descriptor.state = DescriptorState::Building;
        descriptor.reset();
        // Descriptions never define native types.
        descriptor.flags = desc.flags & !TypeFlags::NATIVE;
        descriptor.within = desc.within.clone();
    }

    let outcome = match desc.kind {
        TypeKind::Class => class::build(ctx, id, &desc),
        TypeKind::Struct => strukt::build(ctx, id, &desc),
        TypeKind::Enum => enums::build(ctx, id, &desc),
        TypeKind::Interface => interface::build(ctx, id, &desc),
        TypeKind::Delegate => delegate::build(ctx, id, &desc),
    };

    match outcome {
        Ok(BuildOutcome::Built) => {
            let descriptor = ctx.registry.descriptor_mut(id);
            descriptor.state = DescriptorState::UpToDate;
            tracing::debug!(type_name = %qualified, kind = ?desc.kind, "descriptor built");
            Ok(BuildOutcome::Built)
        }
        Ok(BuildOutcome::Deferred) => {
            ctx.registry.descriptor_mut(id).state = DescriptorState::Unbuilt;
            Ok(BuildOutcome::Deferred)
        }
        Err(err) => {
            ctx.registry.descriptor_mut(id).state = DescriptorState::Unbuilt;
            Err(err)
        }
    }
}

/// Synthesize a description's properties onto a descriptor.
///
/// Inserts in reverse declaration order — the host allocator prepends, so
/// forward traversal of the finished chain reads in declaration order —
/// then assigns byte offsets and rebuilds the default instance.
pub(crate) fn synthesize_properties(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    desc: &TypeDescription,
) -> BridgeResult<()> {
    let owner = ctx.registry.descriptor(id).qualified_name();
    for pdesc in desc.properties.iter().rev() {
        let prop = property::create_property(ctx, &owner, pdesc)?;
        ctx.registry.descriptor_mut(id).link_property(prop);
    }
    ctx.registry.descriptor_mut(id).assign_layout();
    Ok(())
}

/// Resolve a parent reference, deferring the build when it is unavailable.
///
/// Returns `None` after queuing `id` for replay; an unresolved parent is
/// never fatal. A parent that resolved but is itself still blocked defers
/// the child as well.
pub(crate) fn resolve_parent(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    parent_ref: &TypeRef,
) -> BridgeResult<Option<DescriptorId>> {
    match registry::resolve(ctx, parent_ref) {
        Ok(parent) => {
            if ctx.registry.descriptor(parent).state == DescriptorState::Unbuilt {
                ctx.registry.defer(id, parent_ref.clone());
                return Ok(None);
            }
            Ok(Some(parent))
        }
        Err(BridgeError::MissingType(_)) => {
            tracing::debug!(
                child = %ctx.registry.descriptor(id).qualified_name(),
                parent = %parent_ref.qualified_name(),
                "parent unavailable, deferring build"
            );
            ctx.registry.defer(id, parent_ref.clone());
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
