//! Struct builder
//!
//! Structs are plain value aggregates: no virtual dispatch, no constructor
//! hook, no foreign twin. The default value is recomputed after property
//! synthesis so by-value containment picks up nested layouts.

use tether_abi::meta::TypeDescription;

use super::{resolve_parent, synthesize_properties, BuildOutcome};
use crate::context::BridgeContext;
use crate::descriptor::DescriptorId;
use crate::BridgeResult;

pub(super) fn build(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    desc: &TypeDescription,
) -> BridgeResult<BuildOutcome> {
    if let Some(parent_ref) = &desc.parent {
        let Some(parent) = resolve_parent(ctx, id, parent_ref)? else {
            return Ok(BuildOutcome::Deferred);
        };
        let base_size = ctx.registry.descriptor(parent).instance_size;
        let descriptor = ctx.registry.descriptor_mut(id);
        descriptor.parent = Some(parent);
        descriptor.base_size = base_size;
    }

    synthesize_properties(ctx, id, desc)?;
    ctx.registry.descriptor_mut(id).rebuild_defaults();
    Ok(BuildOutcome::Built)
}
