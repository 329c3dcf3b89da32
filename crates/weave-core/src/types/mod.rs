//! Explicit type model for the composition engine.
//!
//! Mixin composition needs to ask questions about classes that a language
//! with runtime reflection answers for free: which interfaces a class
//! implements, which method a given method overrides, which methods with a
//! given name exist anywhere in an inheritance chain. The [`TypeUniverse`]
//! records all of that as plain data, built once through
//! [`TypeUniverseBuilder`] and then shared read-only.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod builder;

pub use builder::{Accessors, TypeUniverseBuilder};

/// Type model errors, raised while building a [`TypeUniverse`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeModelError {
    #[error("Type '{name}' is already registered")]
    DuplicateType { name: String },

    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("'{name}' is an interface and cannot be used as a base class")]
    InterfaceAsBase { name: String },

    #[error("'{name}' is not an interface")]
    NotAnInterface { name: String },

    #[error("'{name}' is not a generic type definition")]
    NotAGenericDefinition { name: String },

    #[error("Generic definition '{name}' expects {expected} type arguments, got {actual}")]
    GenericArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Method '{signature}' is declared twice on '{declaring_type}'")]
    DuplicateMethod {
        declaring_type: String,
        signature: String,
    },

    #[error("Member '{name}' is declared twice on '{declaring_type}'")]
    DuplicateMember { declaring_type: String, name: String },

    #[error("'{method}' cannot override '{base}': {reason}")]
    InvalidOverride {
        method: String,
        base: String,
        reason: String,
    },

    #[error("'{class}' does not implement '{method}' of interface '{interface}'")]
    MissingInterfaceImplementation {
        class: String,
        interface: String,
        method: String,
    },

    #[error("'{class}' does not implement interface '{interface}'")]
    InterfaceNotImplemented { class: String, interface: String },

    #[error("'{name}' is not an attribute type")]
    NotAnAttribute { name: String },
}

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_handle!(
    /// Handle of a type registered in a [`TypeUniverse`]
    TypeRef,
    "T#"
);
arena_handle!(
    /// Handle of a method registered in a [`TypeUniverse`]
    MethodRef,
    "M#"
);
arena_handle!(PropertyRef, "P#");
arena_handle!(EventRef, "E#");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
}

/// Generic identity of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenericShape {
    NonGeneric,
    /// Open generic type definition such as `Repository<T>`
    Definition { parameters: Vec<String> },
    /// Closed specialization such as `Repository<Customer>`
    Specialization {
        definition: TypeRef,
        arguments: Vec<TypeRef>,
    },
}

/// Usage metadata of an attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeUsage {
    /// Whether the attribute is inherited by overriding members
    pub inherited: bool,
    /// Whether the attribute may be applied more than once per member
    pub allow_multiple: bool,
}

impl Default for AttributeUsage {
    fn default() -> Self {
        Self {
            inherited: true,
            allow_multiple: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeArgument {
    Type(TypeRef),
    Text(String),
    Flag(bool),
}

/// One custom attribute applied to a type or member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInstance {
    pub attribute_type: TypeRef,
    pub arguments: Vec<AttributeArgument>,
}

impl AttributeInstance {
    pub fn new(attribute_type: TypeRef) -> Self {
        Self {
            attribute_type,
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: AttributeArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn type_arguments(&self) -> impl Iterator<Item = TypeRef> + '_ {
        self.arguments.iter().filter_map(|arg| match arg {
            AttributeArgument::Type(ty) => Some(*ty),
            _ => None,
        })
    }

    pub fn text_argument(&self) -> Option<&str> {
        self.arguments.iter().find_map(|arg| match arg {
            AttributeArgument::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Exact method signature. No covariance: two signatures match only if
/// every parameter type and the return type are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature {
    pub parameters: Vec<TypeRef>,
    pub return_type: Option<TypeRef>,
}

impl Signature {
    pub fn new(parameters: Vec<TypeRef>, return_type: Option<TypeRef>) -> Self {
        Self {
            parameters,
            return_type,
        }
    }

    pub fn void() -> Self {
        Self::default()
    }

    pub fn returning(return_type: TypeRef) -> Self {
        Self::new(Vec::new(), Some(return_type))
    }
}

/// Mixin-side requirements on the composed object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinRequirements {
    /// Interfaces the composed object (`This`) must provide
    pub target_call: Vec<TypeRef>,
    /// Interfaces the next element of the override chain (`Next`) must provide
    pub next_call: Vec<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub base: Option<TypeRef>,
    /// Directly declared interfaces (for an interface: the interfaces it extends)
    pub interfaces: Vec<TypeRef>,
    pub generic: GenericShape,
    pub methods: Vec<MethodRef>,
    pub properties: Vec<PropertyRef>,
    pub events: Vec<EventRef>,
    pub attributes: Vec<AttributeInstance>,
    pub attribute_usage: Option<AttributeUsage>,
    pub requirements: MixinRequirements,
}

impl TypeDescriptor {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_generic_definition(&self) -> bool {
        matches!(self.generic, GenericShape::Definition { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub declaring_type: TypeRef,
    pub signature: Signature,
    pub is_virtual: bool,
    /// The base-class method this method overrides
    pub overrides: Option<MethodRef>,
    /// Set on mixin methods that override a member of the target class
    pub overrides_target: bool,
    pub attributes: Vec<AttributeInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub declaring_type: TypeRef,
    pub property_type: TypeRef,
    pub getter: Option<MethodRef>,
    pub setter: Option<MethodRef>,
    pub attributes: Vec<AttributeInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub name: String,
    pub declaring_type: TypeRef,
    pub handler_type: TypeRef,
    pub add_method: MethodRef,
    pub remove_method: MethodRef,
    pub attributes: Vec<AttributeInstance>,
}

/// Any member an attribute can be attached to or retrieved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberRef {
    Type(TypeRef),
    Method(MethodRef),
    Property(PropertyRef),
    Event(EventRef),
}

/// Pairs each interface method with the class method implementing it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceMapping {
    pub pairs: Vec<(MethodRef, MethodRef)>,
}

impl InterfaceMapping {
    pub fn target_of(&self, interface_method: MethodRef) -> Option<MethodRef> {
        self.pairs
            .iter()
            .find(|(iface, _)| *iface == interface_method)
            .map(|(_, target)| *target)
    }
}

/// Capability of resolving a method's immediate base-class override target.
///
/// The attribute retriever depends on this to walk override chains; the
/// universe provides it from the explicit override links recorded at
/// registration time.
pub trait OverrideChainResolver {
    fn base_definition(&self, method: MethodRef) -> Option<MethodRef>;
}

/// Frozen, read-only type model
#[derive(Debug, Clone, Default)]
pub struct TypeUniverse {
    pub(crate) types: Vec<TypeDescriptor>,
    pub(crate) methods: Vec<MethodDescriptor>,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) events: Vec<EventDescriptor>,
    pub(crate) by_name: HashMap<String, TypeRef>,
    pub(crate) interface_maps: HashMap<(TypeRef, TypeRef), InterfaceMapping>,
}

impl TypeUniverse {
    pub fn builder() -> TypeUniverseBuilder {
        TypeUniverseBuilder::new()
    }

    pub fn find(&self, name: &str) -> Option<TypeRef> {
        self.by_name.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> Result<TypeRef, TypeModelError> {
        self.find(name).ok_or_else(|| TypeModelError::UnknownType {
            name: name.to_string(),
        })
    }

    pub fn descriptor(&self, ty: TypeRef) -> &TypeDescriptor {
        &self.types[ty.index()]
    }

    pub fn method(&self, method: MethodRef) -> &MethodDescriptor {
        &self.methods[method.index()]
    }

    pub fn property(&self, property: PropertyRef) -> &PropertyDescriptor {
        &self.properties[property.index()]
    }

    pub fn event(&self, event: EventRef) -> &EventDescriptor {
        &self.events[event.index()]
    }

    pub fn name(&self, ty: TypeRef) -> &str {
        &self.descriptor(ty).name
    }

    pub fn types(&self) -> impl Iterator<Item = TypeRef> + '_ {
        (0..self.types.len()).map(|idx| TypeRef(idx as u32))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn is_interface(&self, ty: TypeRef) -> bool {
        self.descriptor(ty).is_interface()
    }

    /// The type followed by all of its base classes, most-derived first
    pub fn base_chain(&self, ty: TypeRef) -> Vec<TypeRef> {
        let mut chain = vec![ty];
        let mut current = self.descriptor(ty).base;
        while let Some(base) = current {
            chain.push(base);
            current = self.descriptor(base).base;
        }
        chain
    }

    /// Every interface implemented by `ty`, including interfaces declared
    /// on base classes and interfaces extended by other interfaces, in
    /// discovery order.
    pub fn all_interfaces(&self, ty: TypeRef) -> Vec<TypeRef> {
        let mut result = Vec::new();
        let mut pending: Vec<TypeRef> = Vec::new();
        for t in self.base_chain(ty) {
            pending.extend(self.descriptor(t).interfaces.iter().rev());
            while let Some(iface) = pending.pop() {
                if iface == ty || result.contains(&iface) {
                    continue;
                }
                result.push(iface);
                pending.extend(self.descriptor(iface).interfaces.iter().rev());
            }
        }
        result
    }

    /// Whether a value of type `source` can be used where `target` is expected
    pub fn is_assignable_from(&self, target: TypeRef, source: TypeRef) -> bool {
        if target == source {
            return true;
        }
        if self.is_interface(target) {
            return self.all_interfaces(source).contains(&target);
        }
        self.base_chain(source).contains(&target)
    }

    pub fn generic_definition(&self, ty: TypeRef) -> Option<TypeRef> {
        match &self.descriptor(ty).generic {
            GenericShape::Specialization { definition, .. } => Some(*definition),
            _ => None,
        }
    }

    pub fn is_specialization_of(&self, ty: TypeRef, definition: TypeRef) -> bool {
        self.generic_definition(ty) == Some(definition)
    }

    /// Type matching used by suppression and inheritance rules: `ty` ascribes
    /// to `target` if it is assignable to it, or if `target` is an open
    /// generic definition and `ty` or one of its bases specializes it.
    pub fn can_ascribe_to(&self, ty: TypeRef, target: TypeRef) -> bool {
        if self.descriptor(target).is_generic_definition() {
            let mut candidates = self.base_chain(ty);
            if self.is_interface(target) {
                candidates.extend(self.all_interfaces(ty));
            }
            return candidates
                .into_iter()
                .any(|t| t == target || self.is_specialization_of(t, target));
        }
        self.is_assignable_from(target, ty)
    }

    pub fn implements_interface(&self, class: TypeRef, interface: TypeRef) -> bool {
        self.interface_maps.contains_key(&(class, interface))
    }

    pub fn interface_map(&self, class: TypeRef, interface: TypeRef) -> Option<&InterfaceMapping> {
        self.interface_maps.get(&(class, interface))
    }

    /// All methods named `name` anywhere in the base chain of `ty`, tagged
    /// with their inheritance offset (0 = `ty` itself).
    pub fn methods_named(&self, ty: TypeRef, name: &str) -> Vec<(usize, MethodRef)> {
        self.base_chain(ty)
            .into_iter()
            .enumerate()
            .flat_map(|(offset, t)| {
                self.descriptor(t)
                    .methods
                    .iter()
                    .filter(|m| self.method(**m).name == name)
                    .map(move |m| (offset, *m))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn declared_method(&self, ty: TypeRef, name: &str, signature: &Signature) -> Option<MethodRef> {
        self.descriptor(ty).methods.iter().copied().find(|m| {
            let method = self.method(*m);
            method.name == name && &method.signature == signature
        })
    }

    /// Most-derived method with the given name and signature
    pub fn find_method(&self, ty: TypeRef, name: &str, signature: &Signature) -> Option<MethodRef> {
        self.base_chain(ty)
            .into_iter()
            .find_map(|t| self.declared_method(t, name, signature))
    }

    pub fn declared_property(&self, ty: TypeRef, name: &str) -> Option<PropertyRef> {
        self.descriptor(ty)
            .properties
            .iter()
            .copied()
            .find(|p| self.property(*p).name == name)
    }

    pub fn declared_event(&self, ty: TypeRef, name: &str) -> Option<EventRef> {
        self.descriptor(ty)
            .events
            .iter()
            .copied()
            .find(|e| self.event(*e).name == name)
    }

    pub fn attribute_usage(&self, attribute_type: TypeRef) -> AttributeUsage {
        self.descriptor(attribute_type)
            .attribute_usage
            .unwrap_or_default()
    }

    pub fn attributes_of(&self, member: MemberRef) -> &[AttributeInstance] {
        match member {
            MemberRef::Type(ty) => &self.descriptor(ty).attributes,
            MemberRef::Method(m) => &self.method(m).attributes,
            MemberRef::Property(p) => &self.property(p).attributes,
            MemberRef::Event(e) => &self.event(e).attributes,
        }
    }

    /// `Name(Param1, Param2): Return`
    pub fn signature_display(&self, name: &str, signature: &Signature) -> String {
        let params: Vec<&str> = signature.parameters.iter().map(|p| self.name(*p)).collect();
        match signature.return_type {
            Some(ret) => format!("{}({}): {}", name, params.join(", "), self.name(ret)),
            None => format!("{}({})", name, params.join(", ")),
        }
    }

    /// `Declaring.Name(Param): Return`
    pub fn method_display(&self, method: MethodRef) -> String {
        let descriptor = self.method(method);
        format!(
            "{}.{}",
            self.name(descriptor.declaring_type),
            self.signature_display(&descriptor.name, &descriptor.signature)
        )
    }

    pub fn member_display(&self, member: MemberRef) -> String {
        match member {
            MemberRef::Type(ty) => self.name(ty).to_string(),
            MemberRef::Method(m) => self.method_display(m),
            MemberRef::Property(p) => {
                let property = self.property(p);
                format!("{}.{}", self.name(property.declaring_type), property.name)
            }
            MemberRef::Event(e) => {
                let event = self.event(e);
                format!("{}.{}", self.name(event.declaring_type), event.name)
            }
        }
    }
}

impl OverrideChainResolver for TypeUniverse {
    fn base_definition(&self, method: MethodRef) -> Option<MethodRef> {
        self.method(method).overrides
    }
}
