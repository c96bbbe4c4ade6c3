//! Synthesized host-native type descriptors
//!
//! A [`TypeDescriptor`] is the mutable, host-side type object built from an
//! immutable `TypeDescription`. Descriptors live in the type registry's
//! arena and are referenced everywhere by [`DescriptorId`]; builders mutate
//! them in place through the registry and never hold them past a build call.
//!
//! Property layout follows the host allocator's insertion convention: new
//! properties are logically prepended, so builders insert in reverse
//! declaration order and forward traversal of the chain yields declaration
//! order.

use tether_abi::meta::{qualify, FunctionFlags, PropertyFlags, PropertyKind, TypeFlags, TypeKind};
use tether_abi::{MethodKey, TypeKey};

/// Byte sizes of host property storage, by concrete kind.
pub mod layout {
    /// Object, weak-object, soft-object, class, and soft-class references.
    pub const OBJECT_REF_SIZE: usize = 8;
    /// Owned strings, interned names.
    pub const STRING_SIZE: usize = 16;
    /// Localizable text.
    pub const TEXT_SIZE: usize = 24;
    /// Interface reference (object + conformance record).
    pub const INTERFACE_SIZE: usize = 16;
    /// Dynamic array header.
    pub const ARRAY_SIZE: usize = 24;
    /// Hash set header.
    pub const SET_SIZE: usize = 56;
    /// Hash map header.
    pub const MAP_SIZE: usize = 72;
    /// Single-bound delegate.
    pub const DELEGATE_SIZE: usize = 16;
    /// Multicast delegate header.
    pub const MULTICAST_SIZE: usize = 24;
    /// Enum integral storage.
    pub const ENUM_SIZE: usize = 1;
}

// ============================================================================
// Identity and Lifecycle
// ============================================================================

/// Arena index of a descriptor inside the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(pub(crate) usize);

impl DescriptorId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle state of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    /// Declared but never built; only name and kind are meaningful.
    Unbuilt,
    /// A builder is currently synthesizing this descriptor.
    Building,
    /// Fully synthesized and safe to use.
    UpToDate,
    /// The owning module was reloaded; must be rebuilt before use.
    StructurallyStale,
}

// ============================================================================
// Host Properties
// ============================================================================

/// A synthesized host property.
///
/// Container kinds own their element properties in `inner` (one for array/
/// set/optional, key then value for map). Delegate kinds own their
/// signature function.
#[derive(Debug, Clone)]
pub struct HostProperty {
    /// Property name.
    pub name: String,
    /// Concrete kind.
    pub kind: PropertyKind,
    /// Flags copied from the description.
    pub flags: PropertyFlags,
    /// Byte offset inside the owning storage (instance or call frame).
    pub offset: usize,
    /// Byte size of the stored value.
    pub size: usize,
    /// Referenced descriptor for object/struct/enum/class/interface kinds.
    pub referenced: Option<DescriptorId>,
    /// Owned element properties for container kinds.
    pub inner: Vec<HostProperty>,
    /// Owned signature for delegate kinds.
    pub signature: Option<Box<HostFunction>>,
    /// Change-notification function name, if declared.
    pub notify: Option<String>,
    /// Opaque key/value metadata pairs.
    pub metadata: Vec<(String, String)>,
    /// Map whose key kind cannot be hashed; created but flagged unsafe.
    pub unsafe_key: bool,
}

impl HostProperty {
    /// Create a property of the given kind and size; linkage fields start
    /// empty and are filled by the synthesis engine.
    pub fn new(name: impl Into<String>, kind: PropertyKind, size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: PropertyFlags::empty(),
            offset: 0,
            size,
            referenced: None,
            inner: Vec::new(),
            signature: None,
            notify: None,
            metadata: Vec::new(),
            unsafe_key: false,
        }
    }

    /// Whether this parameter's value flows back to the caller.
    pub fn is_output(&self) -> bool {
        self.flags.contains(PropertyFlags::OUT_PARAM)
    }
}

// ============================================================================
// Host Functions
// ============================================================================

/// A synthesized host-callable function.
///
/// Parameters sit in a flat call frame: parameter storage first, in
/// declaration order, then the return slot (if any). `frame_size` covers
/// both.
#[derive(Debug, Clone)]
pub struct HostFunction {
    /// Function name.
    pub name: String,
    /// Function flags; synthesized functions always carry `NATIVE`.
    pub flags: FunctionFlags,
    /// Parameters in declaration order with frame offsets assigned.
    pub params: Vec<HostProperty>,
    /// Return-value property, offset at the end of the frame.
    pub ret: Option<HostProperty>,
    /// Total call-frame size in bytes (parameters plus return slot).
    pub frame_size: usize,
    /// Cached foreign method key, resolved on first invocation.
    pub method_key: Option<MethodKey>,
}

impl HostFunction {
    /// Byte size of the parameter block (frame without the return slot).
    pub fn params_size(&self) -> usize {
        self.frame_size - self.ret_size()
    }

    /// Byte size of the return slot, zero when the function returns nothing.
    pub fn ret_size(&self) -> usize {
        self.ret.as_ref().map(|r| r.size).unwrap_or(0)
    }

    /// Output parameters in declaration order.
    pub fn output_params(&self) -> impl Iterator<Item = &HostProperty> {
        self.params.iter().filter(|p| p.is_output())
    }

    /// Whether the zero-argument fast path applies.
    pub fn is_nullary(&self) -> bool {
        self.params.is_empty() && self.ret.is_none()
    }
}

/// Constructor hook installed on synthesized classes.
///
/// The host's normal construction path runs the nearest native ancestor's
/// initializer first, then creates the foreign twin.
#[derive(Debug, Clone, Copy)]
pub struct ConstructorHook {
    /// Nearest non-synthesized ancestor whose initializer establishes
    /// native invariants before the twin exists.
    pub native_ancestor: DescriptorId,
}

/// Initializer run on native descriptors' fresh instance storage.
pub type NativeInit = fn(&mut [u8]);

// ============================================================================
// Type Descriptors
// ============================================================================

/// A synthesized host-native type.
#[derive(Debug)]
pub struct TypeDescriptor {
    /// Arena id of this descriptor.
    pub id: DescriptorId,
    /// Type name.
    pub name: String,
    /// Namespace (may be empty).
    pub namespace: String,
    /// Owning module name.
    pub module: String,
    /// Kind of the type.
    pub kind: TypeKind,
    /// Type flags; `NATIVE` marks host-defined descriptors.
    pub flags: TypeFlags,
    /// Lifecycle state.
    pub state: DescriptorState,
    /// Parent descriptor, if any.
    pub parent: Option<DescriptorId>,
    /// Outer-object constraint, inherited from the parent when unset.
    pub within: Option<String>,
    /// Implemented interfaces.
    pub interfaces: Vec<DescriptorId>,
    /// Property chain in forward (declaration) order.
    properties: Vec<HostProperty>,
    /// Function table.
    pub functions: Vec<HostFunction>,
    /// Instance size of the parent; own properties start here.
    pub base_size: usize,
    /// Total instance size including inherited storage.
    pub instance_size: usize,
    /// Default instance bytes, rebuilt after property synthesis.
    pub defaults: Vec<u8>,
    /// Foreign type key, when the owning module is loaded.
    pub type_key: Option<TypeKey>,
    /// Constructor hook (synthesized classes only).
    pub ctor: Option<ConstructorHook>,
    /// Native initializer (native descriptors only).
    pub native_init: Option<NativeInit>,
    /// Enum entries in declared order; value is the positional index.
    pub items: Vec<String>,
    /// Delegate signature (delegate descriptors only).
    pub signature: Option<HostFunction>,
}

impl TypeDescriptor {
    /// Create an unbuilt descriptor shell.
    pub fn new(
        id: DescriptorId,
        name: impl Into<String>,
        namespace: impl Into<String>,
        module: impl Into<String>,
        kind: TypeKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            namespace: namespace.into(),
            module: module.into(),
            kind,
            flags: TypeFlags::empty(),
            state: DescriptorState::Unbuilt,
            parent: None,
            within: None,
            interfaces: Vec::new(),
            properties: Vec::new(),
            functions: Vec::new(),
            base_size: 0,
            instance_size: 0,
            defaults: Vec::new(),
            type_key: None,
            ctor: None,
            native_init: None,
            items: Vec::new(),
            signature: None,
        }
    }

    /// Namespace-qualified name used as the registry key.
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    /// Whether this descriptor was defined by the host rather than
    /// synthesized from foreign metadata.
    pub fn is_native(&self) -> bool {
        self.flags.contains(TypeFlags::NATIVE)
    }

    /// Insert a property at the head of the chain.
    ///
    /// The host allocator logically prepends new properties; callers insert
    /// in reverse declaration order so that forward traversal yields
    /// declaration order.
    pub fn link_property(&mut self, property: HostProperty) {
        self.properties.insert(0, property);
    }

    /// Properties in forward (declaration) order.
    pub fn properties(&self) -> &[HostProperty] {
        &self.properties
    }

    /// Mutable access to the property chain, forward order.
    pub fn properties_mut(&mut self) -> &mut [HostProperty] {
        &mut self.properties
    }

    /// Assign byte offsets in forward order, starting after inherited
    /// storage, and rebuild the default instance.
    pub fn assign_layout(&mut self) {
        let mut offset = self.base_size;
        for prop in &mut self.properties {
            prop.offset = offset;
            offset += prop.size;
        }
        self.instance_size = offset;
        self.rebuild_defaults();
    }

    /// Rebuild the default instance bytes for the current layout.
    pub fn rebuild_defaults(&mut self) {
        self.defaults = vec![0u8; self.instance_size];
    }

    /// Clear synthesized content ahead of a rebuild. Name, kind, and arena
    /// id survive; everything layout-related is dropped.
    pub fn reset(&mut self) {
        self.parent = None;
        self.within = None;
        self.interfaces.clear();
        self.properties.clear();
        self.functions.clear();
        self.base_size = 0;
        self.instance_size = 0;
        self.defaults.clear();
        self.type_key = None;
        self.ctor = None;
        self.items.clear();
        self.signature = None;
    }

    /// Find an own property by name.
    pub fn find_property(&self, name: &str) -> Option<&HostProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Find an own function by name.
    pub fn find_function(&self, name: &str) -> Option<&HostFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Mutable lookup of an own function by name.
    pub fn find_function_mut(&mut self, name: &str) -> Option<&mut HostFunction> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Positional value of an enum entry.
    pub fn enum_value(&self, item: &str) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    /// Whether this descriptor implements the given interface.
    pub fn implements(&self, interface: DescriptorId) -> bool {
        self.interfaces.contains(&interface)
    }
}
