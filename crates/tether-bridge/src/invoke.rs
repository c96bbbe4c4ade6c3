//! Function synthesis and cross-boundary invocation
//!
//! Synthesized functions are marked native so the host always dispatches
//! them through the bridge. A call walks the parameter block of a flat call
//! frame into an outgoing buffer, crosses the boundary with the receiver's
//! twin and a method key, then copies output-parameter slices and the
//! return value back into the frame — the foreign runtime never sees host
//! memory addresses during the call.
//!
//! Call-frame layout: parameter storage in declaration order, then the
//! return slot. The foreign return buffer is the output-parameter slots in
//! recorded order followed by the return slot.

use tether_abi::meta::{FunctionDescription, FunctionFlags, PropertyFlags};
use tether_abi::{CallStatus, ForeignRef, MethodKey};

use crate::context::BridgeContext;
use crate::descriptor::{DescriptorId, HostFunction};
use crate::host::HostObjectId;
use crate::identity;
use crate::property;
use crate::registry;
use crate::{BridgeError, BridgeResult};

// ============================================================================
// Synthesis
// ============================================================================

/// Synthesize a standalone callable signature.
///
/// Parameters are inserted in reverse declaration order (the host allocator
/// prepends), so the resulting parameter list reads in declaration order.
/// `owner` is the qualified name used in diagnostics.
pub fn synthesize_signature(
    ctx: &mut BridgeContext,
    owner: &str,
    desc: &FunctionDescription,
) -> BridgeResult<HostFunction> {
    let mut params: Vec<_> = Vec::with_capacity(desc.params.len());
    for pdesc in desc.params.iter().rev() {
        params.insert(0, property::create_property(ctx, owner, pdesc)?);
    }

    let mut ret = match &desc.ret {
        Some(rdesc) => {
            let mut prop = property::create_property(ctx, owner, rdesc)?;
            prop.flags |= PropertyFlags::RETURN_PARAM;
            Some(prop)
        }
        None => None,
    };

    let mut offset = 0;
    for param in &mut params {
        param.offset = offset;
        offset += param.size;
    }
    if let Some(ret) = &mut ret {
        ret.offset = offset;
        offset += ret.size;
    }

    Ok(HostFunction {
        name: desc.name.clone(),
        flags: desc.flags | FunctionFlags::NATIVE,
        params,
        ret,
        frame_size: offset,
        method_key: None,
    })
}

/// Synthesize a function and link it into the owner's function table.
pub fn synthesize_function(
    ctx: &mut BridgeContext,
    owner: DescriptorId,
    desc: &FunctionDescription,
) -> BridgeResult<()> {
    let qualified = ctx.registry.descriptor(owner).qualified_name();
    let function = synthesize_signature(ctx, &qualified, desc)?;
    ctx.registry.descriptor_mut(owner).functions.push(function);
    Ok(())
}

/// Synthesize a shadow for a virtual function overridden by foreign code.
///
/// The shadow copies the ancestor's signature and flags, minus the flags
/// that would make it independently invocable, so native call sites that
/// dispatch through the virtual slot transparently reach the foreign
/// override.
pub fn synthesize_override(
    ctx: &mut BridgeContext,
    owner: DescriptorId,
    ancestor_fn: &HostFunction,
) -> BridgeResult<()> {
    let shadow = HostFunction {
        name: ancestor_fn.name.clone(),
        flags: (ancestor_fn.flags & !FunctionFlags::DIRECT_CALL)
            | FunctionFlags::NATIVE
            | FunctionFlags::OVERRIDE,
        params: ancestor_fn.params.clone(),
        ret: ancestor_fn.ret.clone(),
        frame_size: ancestor_fn.frame_size,
        method_key: None,
    };
    ctx.registry.descriptor_mut(owner).functions.push(shadow);
    Ok(())
}

// ============================================================================
// Invocation
// ============================================================================

/// Resolve and cache the foreign method key for a function on `owner`.
pub fn ensure_method_key(
    ctx: &mut BridgeContext,
    owner: DescriptorId,
    function: &str,
) -> BridgeResult<MethodKey> {
    if let Some(key) = ctx
        .registry
        .descriptor(owner)
        .find_function(function)
        .and_then(|f| f.method_key)
    {
        return Ok(key);
    }

    let type_key = identity::ensure_type_key(ctx, owner)?;
    let runtime = ctx.runtime.clone();
    let type_name = ctx.registry.descriptor(owner).qualified_name();
    let key = runtime
        .lookup_method(type_key, function)
        .ok_or_else(|| BridgeError::MissingMethod {
            type_name: type_name.clone(),
            method: function.to_string(),
        })?;

    if let Some(f) = ctx.registry.descriptor_mut(owner).find_function_mut(function) {
        f.method_key = Some(key);
    }
    Ok(key)
}

/// Marshal a call across the boundary.
///
/// `frame` holds the parameter block and return slot per the layout rule
/// above; output parameters and the return value are written back into it.
pub fn dispatch(
    ctx: &mut BridgeContext,
    twin: ForeignRef,
    function: &HostFunction,
    key: MethodKey,
    frame: &mut [u8],
) -> BridgeResult<()> {
    if frame.len() < function.frame_size {
        return Err(BridgeError::FrameTooSmall {
            need: function.frame_size,
            got: frame.len(),
        });
    }

    let runtime = ctx.runtime.clone();

    // Zero-parameter functions skip buffer construction entirely.
    if function.is_nullary() {
        let status = runtime.invoke_method(twin, key, &[], &mut []);
        return finish(function, status);
    }

    // Walk parameters in storage order into the flat outgoing buffer,
    // recording output parameters as they pass.
    let mut outgoing = Vec::with_capacity(function.params_size());
    let mut outputs: Vec<(usize, usize)> = Vec::new();
    let mut return_len = 0;
    for param in &function.params {
        outgoing.extend_from_slice(&frame[param.offset..param.offset + param.size]);
        if param.is_output() {
            outputs.push((param.offset, param.size));
            return_len += param.size;
        }
    }
    return_len += function.ret_size();

    let mut returned = vec![0u8; return_len];
    let status = runtime.invoke_method(twin, key, &outgoing, &mut returned);
    if status != CallStatus::Ok {
        return finish(function, status);
    }

    // Copy output slices back to their original frame addresses, in the
    // order they were recorded.
    let mut cursor = 0;
    for (offset, size) in outputs {
        frame[offset..offset + size].copy_from_slice(&returned[cursor..cursor + size]);
        cursor += size;
    }
    if let Some(ret) = &function.ret {
        frame[ret.offset..ret.offset + ret.size]
            .copy_from_slice(&returned[cursor..cursor + ret.size]);
    }
    Ok(())
}

fn finish(function: &HostFunction, status: CallStatus) -> BridgeResult<()> {
    if status == CallStatus::Ok {
        Ok(())
    } else {
        Err(BridgeError::CallFailed {
            function: function.name.clone(),
            status,
        })
    }
}

/// Invoke a named function on a host object through the bridge.
///
/// Resolves the receiver's twin (creating one if needed), finds the
/// function on the object's class chain, and marshals the call.
pub fn invoke(
    ctx: &mut BridgeContext,
    host: HostObjectId,
    function: &str,
    frame: &mut [u8],
) -> BridgeResult<()> {
    let class = ctx
        .heap
        .class_of(host)
        .ok_or(BridgeError::UnknownObject(host))?;
    let (owner, index) = registry::find_function_in_chain(&ctx.registry, class, function)
        .ok_or_else(|| BridgeError::MissingFunction(function.to_string()))?;
    let func = ctx.registry.descriptor(owner).functions[index].clone();

    let twin = identity::find_or_create_twin(ctx, host)?;
    if twin.is_null() {
        return Err(BridgeError::DeadObject(host));
    }

    let key = ensure_method_key(ctx, owner, function)?;
    dispatch(ctx, twin.foreign, &func, key, frame)
}
