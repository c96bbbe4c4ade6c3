//! Property synthesis engine
//!
//! Maps an abstract property-kind tag to a concrete host property through a
//! fixed constructor table, then performs kind-specific linkage: registry
//! resolution for referenced types, recursive synthesis for container
//! elements, and signature synthesis for delegates. Composite kinds own
//! their inner properties outright.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use tether_abi::meta::{InnerType, PropertyDescription, PropertyKind};

use crate::context::BridgeContext;
use crate::descriptor::{layout, DescriptorState, HostProperty};
use crate::invoke;
use crate::registry;
use crate::{BridgeError, BridgeResult};

/// Constructor for one property kind.
type PropertyCtor = fn(&mut BridgeContext, &str, &PropertyDescription) -> BridgeResult<HostProperty>;

/// Fixed dispatch table, one entry per property kind.
static CONSTRUCTORS: Lazy<FxHashMap<PropertyKind, PropertyCtor>> = Lazy::new(|| {
    use PropertyKind::*;
    let mut table: FxHashMap<PropertyKind, PropertyCtor> = FxHashMap::default();
    for kind in [
        Bool, Int8, Int16, Int32, Int64, UInt8, UInt16, UInt32, UInt64, Float32, Float64, Str,
        Text, Name,
    ] {
        table.insert(kind, ctor_scalar);
    }
    table.insert(Enum, ctor_enum);
    table.insert(Struct, ctor_struct);
    for kind in [Object, WeakObject, SoftObject] {
        table.insert(kind, ctor_object);
    }
    for kind in [Class, SoftClass] {
        table.insert(kind, ctor_metaclass);
    }
    table.insert(Interface, ctor_interface);
    for kind in [Array, Set, Optional] {
        table.insert(kind, ctor_element_container);
    }
    table.insert(Map, ctor_map);
    for kind in [Delegate, MulticastDelegate] {
        table.insert(kind, ctor_delegate);
    }
    table
});

/// Synthesize a host property from its description.
///
/// `owner` is the qualified name of the type or function being built, used
/// in surfaced diagnostics. Post-construction, uniformly for every kind:
/// flags are copied, the notify-function name is attached, and metadata
/// pairs are applied.
pub fn create_property(
    ctx: &mut BridgeContext,
    owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let ctor = CONSTRUCTORS
        .get(&desc.kind)
        .ok_or_else(|| malformed(desc, "no constructor for kind"))?;
    let mut prop = ctor(ctx, owner, desc)?;
    prop.flags = desc.flags;
    prop.notify = desc.notify.clone();
    prop.metadata = desc.metadata.clone();
    Ok(prop)
}

/// Storage size of a scalar kind.
fn scalar_size(kind: PropertyKind) -> usize {
    use PropertyKind::*;
    match kind {
        Bool | Int8 | UInt8 => 1,
        Int16 | UInt16 => 2,
        Int32 | UInt32 | Float32 => 4,
        Int64 | UInt64 | Float64 => 8,
        Str | Name => layout::STRING_SIZE,
        Text => layout::TEXT_SIZE,
        _ => 0,
    }
}

fn malformed(desc: &PropertyDescription, detail: &str) -> BridgeError {
    BridgeError::MalformedDescription {
        property: desc.name.clone(),
        detail: detail.to_string(),
    }
}

// ============================================================================
// Kind Constructors
// ============================================================================

fn ctor_scalar(
    _ctx: &mut BridgeContext,
    _owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    Ok(HostProperty::new(&desc.name, desc.kind, scalar_size(desc.kind)))
}

/// Enum property: resolves the enum and attaches its integral storage.
fn ctor_enum(
    ctx: &mut BridgeContext,
    _owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Enum(tref) = &desc.inner else {
        return Err(malformed(desc, "enum property without enum reference"));
    };
    let enum_id = registry::resolve(ctx, tref)?;
    let mut prop = HostProperty::new(&desc.name, desc.kind, layout::ENUM_SIZE);
    prop.referenced = Some(enum_id);
    Ok(prop)
}

/// Struct property: resolves the struct and adopts its instance size.
fn ctor_struct(
    ctx: &mut BridgeContext,
    owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Struct(tref) = &desc.inner else {
        return Err(malformed(desc, "struct property without struct reference"));
    };
    let struct_id = registry::resolve(ctx, tref)?;
    let strukt = ctx.registry.descriptor(struct_id);
    if strukt.state == DescriptorState::Building {
        // Self-containing struct metadata; layout of such a cycle is
        // undefined, so the property links against the in-progress size.
        tracing::warn!(owner, property = %desc.name, "struct property closes a by-value cycle");
        ctx.diagnostics.warning(format!(
            "Property '{}' on '{}' nests struct '{}' inside itself",
            desc.name,
            owner,
            tref.qualified_name()
        ));
    }
    let size = ctx.registry.descriptor(struct_id).instance_size;
    let mut prop = HostProperty::new(&desc.name, desc.kind, size);
    prop.referenced = Some(struct_id);
    Ok(prop)
}

/// Object-like property: attaches the referenced class.
///
/// Object references need identity, not layout, so a forward-declared
/// descriptor is enough — this is what makes mutually-referencing types
/// buildable.
fn ctor_object(
    ctx: &mut BridgeContext,
    _owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Object(tref) = &desc.inner else {
        return Err(malformed(desc, "object property without class reference"));
    };
    let class_id = registry::resolve_forward(ctx, tref)?;
    let mut prop = HostProperty::new(&desc.name, desc.kind, layout::OBJECT_REF_SIZE);
    prop.referenced = Some(class_id);
    Ok(prop)
}

/// Metaclass property: attaches the referenced base class.
fn ctor_metaclass(
    ctx: &mut BridgeContext,
    _owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Class(tref) = &desc.inner else {
        return Err(malformed(desc, "class property without base-class reference"));
    };
    let class_id = registry::resolve_forward(ctx, tref)?;
    let mut prop = HostProperty::new(&desc.name, desc.kind, layout::OBJECT_REF_SIZE);
    prop.referenced = Some(class_id);
    Ok(prop)
}

/// Interface reference property.
fn ctor_interface(
    ctx: &mut BridgeContext,
    _owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Object(tref) = &desc.inner else {
        return Err(malformed(desc, "interface property without interface reference"));
    };
    let iface_id = registry::resolve_forward(ctx, tref)?;
    let mut prop = HostProperty::new(&desc.name, desc.kind, layout::INTERFACE_SIZE);
    prop.referenced = Some(iface_id);
    Ok(prop)
}

/// Array, set, and optional: exactly one recursively synthesized element,
/// owned by the container.
fn ctor_element_container(
    ctx: &mut BridgeContext,
    owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Element(element) = &desc.inner else {
        return Err(malformed(desc, "container property without element"));
    };
    let inner = create_property(ctx, owner, element)?;
    let size = match desc.kind {
        PropertyKind::Array => layout::ARRAY_SIZE,
        PropertyKind::Set => layout::SET_SIZE,
        // Optionals store the value inline plus an engaged flag.
        PropertyKind::Optional => inner.size + 1,
        _ => return Err(malformed(desc, "element payload on non-container kind")),
    };
    let mut prop = HostProperty::new(&desc.name, desc.kind, size);
    prop.inner.push(inner);
    Ok(prop)
}

/// Map: two recursively synthesized inner properties (key, value). An
/// unhashable key is a configuration warning surfaced to the user, not a
/// hard failure; the property is created but flagged unsafe.
fn ctor_map(
    ctx: &mut BridgeContext,
    owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Pair(key_desc, value_desc) = &desc.inner else {
        return Err(malformed(desc, "map property without key/value pair"));
    };
    let key = create_property(ctx, owner, key_desc)?;
    let value = create_property(ctx, owner, value_desc)?;

    let mut prop = HostProperty::new(&desc.name, desc.kind, layout::MAP_SIZE);
    if !key_is_hashable(ctx, &key) {
        tracing::warn!(owner, property = %desc.name, key_kind = ?key.kind, "map key is not hashable");
        ctx.diagnostics.warning(format!(
            "Map property '{}' on '{}' uses a key of kind {:?} that cannot be hashed",
            desc.name, owner, key.kind
        ));
        prop.unsafe_key = true;
    }
    prop.inner.push(key);
    prop.inner.push(value);
    Ok(prop)
}

/// Delegate kinds: synthesize the signature function and attach it.
fn ctor_delegate(
    ctx: &mut BridgeContext,
    owner: &str,
    desc: &PropertyDescription,
) -> BridgeResult<HostProperty> {
    let InnerType::Signature(fdesc) = &desc.inner else {
        return Err(malformed(desc, "delegate property without signature"));
    };
    let signature = invoke::synthesize_signature(ctx, owner, fdesc)?;
    let size = match desc.kind {
        PropertyKind::MulticastDelegate => layout::MULTICAST_SIZE,
        _ => layout::DELEGATE_SIZE,
    };
    let mut prop = HostProperty::new(&desc.name, desc.kind, size);
    prop.signature = Some(Box::new(signature));
    Ok(prop)
}

/// Whether a property's concrete kind can serve as a hash-map key.
///
/// Structs delegate to their own hash capability; the bridge never inspects
/// struct internals to decide.
fn key_is_hashable(ctx: &BridgeContext, key: &HostProperty) -> bool {
    use PropertyKind::*;
    match key.kind {
        Float32 | Float64 | Text => false,
        Array | Set | Map | Optional | Delegate | MulticastDelegate => false,
        Struct => key
            .referenced
            .map(|id| {
                ctx.registry
                    .descriptor(id)
                    .flags
                    .contains(tether_abi::meta::TypeFlags::HASHABLE)
            })
            .unwrap_or(false),
        _ => true,
    }
}
