//! Delegate builder
//!
//! A delegate descriptor is a callable signature with no owning object
//! semantics: parameters plus an optional return, nothing else.

use tether_abi::meta::{FunctionDescription, TypeDescription};

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
    let owner = ctx.registry.descriptor(id).qualified_name();
    // The signature rides as the description's sole function; a delegate
    // declared without one is callable with no arguments.
    let signature_desc = desc
        .functions
        .first()
        .cloned()
        .unwrap_or_else(|| FunctionDescription::new(desc.name.clone()));
    let signature = invoke::synthesize_signature(ctx, &owner, &signature_desc)?;
    ctx.registry.descriptor_mut(id).signature = Some(signature);
    Ok(BuildOutcome::Built)
}
