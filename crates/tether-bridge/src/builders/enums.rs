//! Enum builder
//!
//! One integral entry per declared item, in declared order; an entry's
//! value is its positional index.

use tether_abi::meta::TypeDescription;

use super::BuildOutcome;
use crate::context::BridgeContext;
use crate::descriptor::{layout, DescriptorId};
use crate::BridgeResult;

pub(super) fn build(
    ctx: &mut BridgeContext,
    id: DescriptorId,
    desc: &TypeDescription,
) -> BridgeResult<BuildOutcome> {
    let descriptor = ctx.registry.descriptor_mut(id);
    descriptor.items = desc.items.clone();
    descriptor.instance_size = layout::ENUM_SIZE;
    descriptor.rebuild_defaults();
    Ok(BuildOutcome::Built)
}
