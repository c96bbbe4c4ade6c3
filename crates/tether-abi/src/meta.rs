//! Metadata description model
//!
//! Immutable descriptions of foreign-defined types, as delivered by the
//! external metadata parser. A description may reference types that are not
//! yet resolved — references are carried by name ([`TypeRef`]) and resolved
//! lazily by the bridge's type registry.

use serde::{Deserialize, Serialize};

// ============================================================================
// Kinds and Flags
// ============================================================================

/// Kind of a foreign-defined type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Reference type with identity, inheritance, and virtual dispatch.
    Class,
    /// Plain value aggregate without virtual dispatch.
    Struct,
    /// Integral enumeration.
    Enum,
    /// Function-only contract; classes implement it.
    Interface,
    /// Callable signature with no owning object.
    Delegate,
}

/// Kind tag of a single property.
///
/// The tag selects the concrete host property constructor; composite kinds
/// carry their payload in [`InnerType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Owned string.
    Str,
    /// Localizable text.
    Text,
    /// Interned name.
    Name,
    /// Enum value; `InnerType::Enum` names the enum.
    Enum,
    /// By-value struct; `InnerType::Struct` names the struct.
    Struct,
    /// Strong object reference; `InnerType::Object` names the class.
    Object,
    /// Weak object reference.
    WeakObject,
    /// Lazily-resolved object reference.
    SoftObject,
    /// Metaclass reference; `InnerType::Class` names the base class.
    Class,
    /// Lazily-resolved metaclass reference.
    SoftClass,
    /// Interface reference; `InnerType::Object` names the interface.
    Interface,
    /// Dynamic array; `InnerType::Element` is the element.
    Array,
    /// Hash set; `InnerType::Element` is the element.
    Set,
    /// Hash map; `InnerType::Pair` is key and value.
    Map,
    /// Optional value; `InnerType::Element` is the wrapped property.
    Optional,
    /// Single-bound delegate; `InnerType::Signature` is the signature.
    Delegate,
    /// Multicast delegate; `InnerType::Signature` is the signature.
    MulticastDelegate,
}

bitflags::bitflags! {
    /// Flags on a type description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TypeFlags: u32 {
        /// Defined by the host, not synthesized from foreign metadata.
        const NATIVE = 1 << 0;
        /// Cannot be instantiated directly.
        const ABSTRACT = 1 << 1;
        /// Struct defines equality and hashing; usable as a map key.
        const HASHABLE = 1 << 2;
        /// Not serialized with its owner.
        const TRANSIENT = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Flags on a property description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PropertyFlags: u32 {
        /// Value flows back to the caller after a cross-boundary call.
        const OUT_PARAM = 1 << 0;
        /// The function's return slot.
        const RETURN_PARAM = 1 << 1;
        /// Writable only during construction.
        const READ_ONLY = 1 << 2;
        /// Replicated; change notifications route to the notify function.
        const REPLICATED = 1 << 3;
        /// Not serialized with its owner.
        const TRANSIENT = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Flags on a function description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FunctionFlags: u32 {
        /// Dispatch crosses the bridge instead of any host bytecode path.
        const NATIVE = 1 << 0;
        /// Participates in virtual dispatch.
        const VIRTUAL = 1 << 1;
        /// Overrides a function declared on an ancestor.
        const OVERRIDE = 1 << 2;
        /// No receiver object.
        const STATIC = 1 << 3;
        /// Independently invocable by unrelated callers.
        const DIRECT_CALL = 1 << 4;
    }
}

// ============================================================================
// Type References
// ============================================================================

/// By-name reference to a type that may not be resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Type name.
    pub name: String,
    /// Namespace the type lives in (may be empty).
    #[serde(default)]
    pub namespace: String,
    /// Name of the module that owns the type.
    #[serde(default)]
    pub module: String,
}

impl TypeRef {
    /// Create a reference from name, namespace, and owning module.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            module: module.into(),
        }
    }

    /// Namespace-qualified name used as the registry key.
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }
}

/// Join a namespace and a type name into the registry key form.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

// ============================================================================
// Property Descriptions
// ============================================================================

/// Kind-specific payload of a property description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InnerType {
    /// No payload (scalar kinds).
    #[default]
    None,
    /// Referenced class or interface.
    Object(TypeRef),
    /// Referenced struct.
    Struct(TypeRef),
    /// Referenced enum.
    Enum(TypeRef),
    /// Referenced base class of a metaclass property.
    Class(TypeRef),
    /// Single nested element (array, set, optional).
    Element(Box<PropertyDescription>),
    /// Key and value (map).
    Pair(Box<PropertyDescription>, Box<PropertyDescription>),
    /// Delegate signature.
    Signature(Box<FunctionDescription>),
}

/// Immutable description of a single property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescription {
    /// Property name.
    pub name: String,
    /// Kind tag selecting the host constructor.
    pub kind: PropertyKind,
    /// Property flags.
    #[serde(default)]
    pub flags: PropertyFlags,
    /// Kind-specific payload.
    #[serde(default)]
    pub inner: InnerType,
    /// Name of the change-notification function, if declared.
    #[serde(default)]
    pub notify: Option<String>,
    /// Opaque key/value metadata pairs, passed through to the host store.
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
}

impl PropertyDescription {
    /// Create a scalar property description.
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: PropertyFlags::empty(),
            inner: InnerType::None,
            notify: None,
            metadata: Vec::new(),
        }
    }

    /// Create an object-reference property.
    pub fn object(name: impl Into<String>, class: TypeRef) -> Self {
        Self::new(name, PropertyKind::Object).with_inner(InnerType::Object(class))
    }

    /// Create a by-value struct property.
    pub fn structure(name: impl Into<String>, strukt: TypeRef) -> Self {
        Self::new(name, PropertyKind::Struct).with_inner(InnerType::Struct(strukt))
    }

    /// Create an enum property.
    pub fn enumeration(name: impl Into<String>, enum_ref: TypeRef) -> Self {
        Self::new(name, PropertyKind::Enum).with_inner(InnerType::Enum(enum_ref))
    }

    /// Create an array property with the given element.
    pub fn array(name: impl Into<String>, element: PropertyDescription) -> Self {
        Self::new(name, PropertyKind::Array).with_inner(InnerType::Element(Box::new(element)))
    }

    /// Create a map property with the given key and value.
    pub fn map(
        name: impl Into<String>,
        key: PropertyDescription,
        value: PropertyDescription,
    ) -> Self {
        Self::new(name, PropertyKind::Map)
            .with_inner(InnerType::Pair(Box::new(key), Box::new(value)))
    }

    /// Set the kind-specific payload.
    pub fn with_inner(mut self, inner: InnerType) -> Self {
        self.inner = inner;
        self
    }

    /// Set the property flags.
    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach a change-notification function name.
    pub fn with_notify(mut self, notify: impl Into<String>) -> Self {
        self.notify = Some(notify.into());
        self
    }

    /// Append an opaque metadata pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

// ============================================================================
// Function Descriptions
// ============================================================================

/// Immutable description of a single function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescription {
    /// Function name.
    pub name: String,
    /// Function flags.
    #[serde(default)]
    pub flags: FunctionFlags,
    /// Parameters in declaration order.
    #[serde(default)]
    pub params: Vec<PropertyDescription>,
    /// Return value, if the function returns one.
    #[serde(default)]
    pub ret: Option<PropertyDescription>,
}

impl FunctionDescription {
    /// Create a function description with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: FunctionFlags::empty(),
            params: Vec::new(),
            ret: None,
        }
    }

    /// Append a parameter.
    pub fn with_param(mut self, param: PropertyDescription) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return value.
    pub fn returns(mut self, ret: PropertyDescription) -> Self {
        self.ret = Some(ret);
        self
    }

    /// Set the function flags.
    pub fn with_flags(mut self, flags: FunctionFlags) -> Self {
        self.flags = flags;
        self
    }
}

// ============================================================================
// Type Descriptions
// ============================================================================

/// Immutable description of a foreign-defined type.
///
/// Produced once per type by metadata ingestion; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescription {
    /// Type name.
    pub name: String,
    /// Namespace the type lives in (may be empty).
    #[serde(default)]
    pub namespace: String,
    /// Name of the module that owns the type.
    #[serde(default)]
    pub module: String,
    /// Kind of the described type.
    pub kind: TypeKind,
    /// Parent type, if any. Classes default to the native root when absent.
    #[serde(default)]
    pub parent: Option<TypeRef>,
    /// Outer-object constraint inherited by subclasses.
    #[serde(default)]
    pub within: Option<String>,
    /// Properties in declaration order.
    #[serde(default)]
    pub properties: Vec<PropertyDescription>,
    /// Functions in declaration order.
    #[serde(default)]
    pub functions: Vec<FunctionDescription>,
    /// Interfaces the type declares.
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    /// Enum items in declaration order (enum kinds only).
    #[serde(default)]
    pub items: Vec<String>,
    /// Type flags.
    #[serde(default)]
    pub flags: TypeFlags,
}

impl TypeDescription {
    /// Create an empty description of the given kind.
    pub fn new(name: impl Into<String>, module: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            module: module.into(),
            kind,
            parent: None,
            within: None,
            properties: Vec::new(),
            functions: Vec::new(),
            interfaces: Vec::new(),
            items: Vec::new(),
            flags: TypeFlags::empty(),
        }
    }

    /// Namespace-qualified name used as the registry key.
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    /// A reference to this type.
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.name.clone(), self.namespace.clone(), self.module.clone())
    }

    /// Set the namespace.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the parent type reference.
    pub fn with_parent(mut self, parent: TypeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Append a property.
    pub fn with_property(mut self, property: PropertyDescription) -> Self {
        self.properties.push(property);
        self
    }

    /// Append a function.
    pub fn with_function(mut self, function: FunctionDescription) -> Self {
        self.functions.push(function);
        self
    }

    /// Declare an interface.
    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Append an enum item.
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Set the type flags.
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags = flags;
        self
    }
}
