//! Interface builder
//!
//! Interfaces synthesize only functions; data properties in the
//! description are ignored with a warning. The parent is always the
//! abstract interface base.

use tether_abi::meta::TypeDescription;

use super::BuildOutcome;
use crate::context::BridgeContext;
use crate::descriptor::DescriptorId;
use crate::invoke;
use crate::BridgeResult;

pub(super) fn build(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    desc: &TypeDescription,
) -> BridgeResult<BuildOutcome> {
    let interface_root = ctx.interface_root();
    ctx.registry.descriptor_mut(id).parent = Some(interface_root);

    if !desc.properties.is_empty() {
        let owner = ctx.registry.descriptor(id).qualified_name();
        tracing::warn!(owner = %owner, count = desc.properties.len(), "interface declares data properties, ignored");
        ctx.diagnostics.warning(format!(
            "Interface '{}' declares {} data properties; interfaces carry functions only",
            owner,
            desc.properties.len()
        ));
    }

    for fdesc in &desc.functions {
        invoke::synthesize_function(ctx, id, fdesc)?;
    }
    Ok(BuildOutcome::Built)
}
