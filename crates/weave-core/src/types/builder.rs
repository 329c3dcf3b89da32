use super::{
    AttributeInstance, AttributeUsage, EventDescriptor, EventRef, GenericShape, InterfaceMapping,
    MemberRef, MethodDescriptor, MethodRef, MixinRequirements, PropertyDescriptor, PropertyRef,
    Signature, TypeDescriptor, TypeKind, TypeModelError, TypeRef, TypeUniverse,
};

type Result<T> = std::result::Result<T, TypeModelError>;

/// Which accessors a property declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessors {
    pub get: bool,
    pub set: bool,
}

impl Accessors {
    pub const READ_ONLY: Accessors = Accessors { get: true, set: false };
    pub const WRITE_ONLY: Accessors = Accessors { get: false, set: true };
    pub const READ_WRITE: Accessors = Accessors { get: true, set: true };
}

/// Registration API for a [`TypeUniverse`].
///
/// Types must be registered before they are referenced, so base-class
/// cycles cannot be expressed. Generic specializations share the member
/// handles of their definition: members, interfaces, attributes and
/// requirements added to a definition reach every specialization created
/// from it, before or after the addition.
#[derive(Debug, Default)]
pub struct TypeUniverseBuilder {
    universe: TypeUniverse,
    explicit_implementations: Vec<(TypeRef, MethodRef, MethodRef)>,
}

impl TypeUniverseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the universe under construction
    pub fn universe(&self) -> &TypeUniverse {
        &self.universe
    }

    fn add_type(&mut self, descriptor: TypeDescriptor) -> Result<TypeRef> {
        if self.universe.by_name.contains_key(&descriptor.name) {
            return Err(TypeModelError::DuplicateType {
                name: descriptor.name,
            });
        }
        let ty = TypeRef(self.universe.types.len() as u32);
        self.universe.by_name.insert(descriptor.name.clone(), ty);
        self.universe.types.push(descriptor);
        Ok(ty)
    }

    fn blank(name: &str, kind: TypeKind, base: Option<TypeRef>) -> TypeDescriptor {
        TypeDescriptor {
            name: name.to_string(),
            kind,
            base,
            interfaces: Vec::new(),
            generic: GenericShape::NonGeneric,
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            attributes: Vec::new(),
            attribute_usage: None,
            requirements: MixinRequirements::default(),
        }
    }

    /// `ty` plus, for a generic definition, its specializations so far
    fn sharing_members(&self, ty: TypeRef) -> Vec<TypeRef> {
        let mut targets = vec![ty];
        if self.universe.descriptor(ty).is_generic_definition() {
            targets.extend(
                self.universe
                    .types()
                    .filter(|t| self.universe.is_specialization_of(*t, ty)),
            );
        }
        targets
    }

    fn check_base(&self, base: Option<TypeRef>) -> Result<()> {
        if let Some(base) = base {
            if self.universe.is_interface(base) {
                return Err(TypeModelError::InterfaceAsBase {
                    name: self.universe.name(base).to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_interface(&self, ty: TypeRef) -> Result<()> {
        if !self.universe.is_interface(ty) {
            return Err(TypeModelError::NotAnInterface {
                name: self.universe.name(ty).to_string(),
            });
        }
        Ok(())
    }

    pub fn add_class(&mut self, name: &str, base: Option<TypeRef>) -> Result<TypeRef> {
        self.check_base(base)?;
        self.add_type(Self::blank(name, TypeKind::Class, base))
    }

    pub fn add_interface(&mut self, name: &str, extends: &[TypeRef]) -> Result<TypeRef> {
        for iface in extends {
            self.check_interface(*iface)?;
        }
        let mut descriptor = Self::blank(name, TypeKind::Interface, None);
        descriptor.interfaces = extends.to_vec();
        self.add_type(descriptor)
    }

    pub fn add_attribute_class(
        &mut self,
        name: &str,
        base: Option<TypeRef>,
        usage: AttributeUsage,
    ) -> Result<TypeRef> {
        self.check_base(base)?;
        let mut descriptor = Self::blank(name, TypeKind::Class, base);
        descriptor.attribute_usage = Some(usage);
        self.add_type(descriptor)
    }

    pub fn add_generic_definition(
        &mut self,
        name: &str,
        kind: TypeKind,
        parameters: &[&str],
        base: Option<TypeRef>,
    ) -> Result<TypeRef> {
        self.check_base(base)?;
        let mut descriptor = Self::blank(name, kind, base);
        descriptor.generic = GenericShape::Definition {
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
        };
        self.add_type(descriptor)
    }

    /// Closes a generic definition over `arguments`. Requesting the same
    /// specialization twice returns the existing type.
    pub fn specialize(&mut self, definition: TypeRef, arguments: &[TypeRef]) -> Result<TypeRef> {
        let def = self.universe.descriptor(definition).clone();
        let expected = match &def.generic {
            GenericShape::Definition { parameters } => parameters.len(),
            _ => {
                return Err(TypeModelError::NotAGenericDefinition {
                    name: def.name.clone(),
                });
            }
        };
        if expected != arguments.len() {
            return Err(TypeModelError::GenericArity {
                name: def.name.clone(),
                expected,
                actual: arguments.len(),
            });
        }

        let stem = def.name.split('<').next().unwrap_or(&def.name);
        let args: Vec<&str> = arguments.iter().map(|a| self.universe.name(*a)).collect();
        let name = format!("{}<{}>", stem, args.join(", "));
        if let Some(existing) = self.universe.find(&name) {
            return Ok(existing);
        }

        self.add_type(TypeDescriptor {
            name,
            generic: GenericShape::Specialization {
                definition,
                arguments: arguments.to_vec(),
            },
            ..def
        })
    }

    pub fn implement(&mut self, class: TypeRef, interface: TypeRef) -> Result<()> {
        self.check_interface(interface)?;
        for ty in self.sharing_members(class) {
            let descriptor = &mut self.universe.types[ty.index()];
            if !descriptor.interfaces.contains(&interface) {
                descriptor.interfaces.push(interface);
            }
        }
        Ok(())
    }

    fn push_method(&mut self, ty: TypeRef, descriptor: MethodDescriptor) -> Result<MethodRef> {
        if self
            .universe
            .declared_method(ty, &descriptor.name, &descriptor.signature)
            .is_some()
        {
            return Err(TypeModelError::DuplicateMethod {
                declaring_type: self.universe.name(ty).to_string(),
                signature: self
                    .universe
                    .signature_display(&descriptor.name, &descriptor.signature),
            });
        }
        let method = MethodRef(self.universe.methods.len() as u32);
        self.universe.methods.push(descriptor);
        for t in self.sharing_members(ty) {
            self.universe.types[t.index()].methods.push(method);
        }
        Ok(method)
    }

    fn new_method(ty: TypeRef, name: &str, signature: Signature, is_virtual: bool) -> MethodDescriptor {
        MethodDescriptor {
            name: name.to_string(),
            declaring_type: ty,
            signature,
            is_virtual,
            overrides: None,
            overrides_target: false,
            attributes: Vec::new(),
        }
    }

    pub fn add_method(&mut self, ty: TypeRef, name: &str, signature: Signature) -> Result<MethodRef> {
        let is_virtual = self.universe.is_interface(ty);
        self.push_method(ty, Self::new_method(ty, name, signature, is_virtual))
    }

    pub fn add_virtual_method(
        &mut self,
        ty: TypeRef,
        name: &str,
        signature: Signature,
    ) -> Result<MethodRef> {
        self.push_method(ty, Self::new_method(ty, name, signature, true))
    }

    /// Declares on `ty` an override of `base_method`, which must be a
    /// virtual method of one of `ty`'s base classes. A closed generic base
    /// counts as declaring the methods of its definition.
    pub fn add_override(&mut self, ty: TypeRef, base_method: MethodRef) -> Result<MethodRef> {
        let base = self.universe.method(base_method).clone();
        let invalid = |reason: &str, universe: &TypeUniverse| TypeModelError::InvalidOverride {
            method: format!("{}.{}", universe.name(ty), base.name),
            base: universe.method_display(base_method),
            reason: reason.to_string(),
        };

        if !base.is_virtual {
            return Err(invalid("base method is not virtual", &self.universe));
        }
        if self.universe.is_interface(base.declaring_type) {
            return Err(invalid("interface methods are implemented, not overridden", &self.universe));
        }
        let inherited = self.universe.base_chain(ty)[1..]
            .iter()
            .any(|t| self.universe.descriptor(*t).methods.contains(&base_method));
        if !inherited {
            return Err(invalid("base method is not declared on a base class", &self.universe));
        }

        let mut descriptor = Self::new_method(ty, &base.name, base.signature.clone(), true);
        descriptor.overrides = Some(base_method);
        self.push_method(ty, descriptor)
    }

    /// Declares a mixin method that overrides the target-class member with
    /// the same name and signature.
    pub fn add_target_override(
        &mut self,
        mixin: TypeRef,
        name: &str,
        signature: Signature,
    ) -> Result<MethodRef> {
        let mut descriptor = Self::new_method(mixin, name, signature, true);
        descriptor.overrides_target = true;
        self.push_method(mixin, descriptor)
    }

    fn check_member_name(&self, ty: TypeRef, name: &str) -> Result<()> {
        if self.universe.declared_property(ty, name).is_some()
            || self.universe.declared_event(ty, name).is_some()
        {
            return Err(TypeModelError::DuplicateMember {
                declaring_type: self.universe.name(ty).to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Declares a property with virtual `get_<name>` / `set_<name>` accessors
    pub fn add_property(
        &mut self,
        ty: TypeRef,
        name: &str,
        property_type: TypeRef,
        accessors: Accessors,
    ) -> Result<PropertyRef> {
        self.check_member_name(ty, name)?;
        let getter = if accessors.get {
            Some(self.add_virtual_method(ty, &format!("get_{name}"), Signature::returning(property_type))?)
        } else {
            None
        };
        let setter = if accessors.set {
            Some(self.add_virtual_method(
                ty,
                &format!("set_{name}"),
                Signature::new(vec![property_type], None),
            )?)
        } else {
            None
        };
        Ok(self.push_property(PropertyDescriptor {
            name: name.to_string(),
            declaring_type: ty,
            property_type,
            getter,
            setter,
            attributes: Vec::new(),
        }))
    }

    /// Overrides a base-class property; each accessor overrides the base accessor
    pub fn add_property_override(&mut self, ty: TypeRef, base_property: PropertyRef) -> Result<PropertyRef> {
        let base = self.universe.property(base_property).clone();
        self.check_member_name(ty, &base.name)?;
        let getter = match base.getter {
            Some(get) => Some(self.add_override(ty, get)?),
            None => None,
        };
        let setter = match base.setter {
            Some(set) => Some(self.add_override(ty, set)?),
            None => None,
        };
        Ok(self.push_property(PropertyDescriptor {
            name: base.name,
            declaring_type: ty,
            property_type: base.property_type,
            getter,
            setter,
            attributes: Vec::new(),
        }))
    }

    fn push_property(&mut self, descriptor: PropertyDescriptor) -> PropertyRef {
        let property = PropertyRef(self.universe.properties.len() as u32);
        let ty = descriptor.declaring_type;
        self.universe.properties.push(descriptor);
        for t in self.sharing_members(ty) {
            self.universe.types[t.index()].properties.push(property);
        }
        property
    }

    /// Declares an event with virtual `add_<name>` / `remove_<name>` accessors
    pub fn add_event(&mut self, ty: TypeRef, name: &str, handler_type: TypeRef) -> Result<EventRef> {
        self.check_member_name(ty, name)?;
        let handler = Signature::new(vec![handler_type], None);
        let add_method = self.add_virtual_method(ty, &format!("add_{name}"), handler.clone())?;
        let remove_method = self.add_virtual_method(ty, &format!("remove_{name}"), handler)?;
        Ok(self.push_event(EventDescriptor {
            name: name.to_string(),
            declaring_type: ty,
            handler_type,
            add_method,
            remove_method,
            attributes: Vec::new(),
        }))
    }

    pub fn add_event_override(&mut self, ty: TypeRef, base_event: EventRef) -> Result<EventRef> {
        let base = self.universe.event(base_event).clone();
        self.check_member_name(ty, &base.name)?;
        let add_method = self.add_override(ty, base.add_method)?;
        let remove_method = self.add_override(ty, base.remove_method)?;
        Ok(self.push_event(EventDescriptor {
            name: base.name,
            declaring_type: ty,
            handler_type: base.handler_type,
            add_method,
            remove_method,
            attributes: Vec::new(),
        }))
    }

    fn push_event(&mut self, descriptor: EventDescriptor) -> EventRef {
        let event = EventRef(self.universe.events.len() as u32);
        let ty = descriptor.declaring_type;
        self.universe.events.push(descriptor);
        for t in self.sharing_members(ty) {
            self.universe.types[t.index()].events.push(event);
        }
        event
    }

    /// Applies a custom attribute to a type or member
    pub fn add_attribute(&mut self, member: MemberRef, attribute: AttributeInstance) -> Result<()> {
        if self
            .universe
            .descriptor(attribute.attribute_type)
            .attribute_usage
            .is_none()
        {
            return Err(TypeModelError::NotAnAttribute {
                name: self.universe.name(attribute.attribute_type).to_string(),
            });
        }
        let attributes = match member {
            MemberRef::Type(ty) => {
                for t in self.sharing_members(ty) {
                    self.universe.types[t.index()].attributes.push(attribute.clone());
                }
                return Ok(());
            }
            MemberRef::Method(m) => &mut self.universe.methods[m.index()].attributes,
            MemberRef::Property(p) => &mut self.universe.properties[p.index()].attributes,
            MemberRef::Event(e) => &mut self.universe.events[e.index()].attributes,
        };
        attributes.push(attribute);
        Ok(())
    }

    /// Maps `interface_method` to `implementation` on `class` explicitly
    /// instead of by name and signature.
    pub fn map_interface_method(
        &mut self,
        class: TypeRef,
        interface_method: MethodRef,
        implementation: MethodRef,
    ) -> Result<()> {
        self.explicit_implementations
            .push((class, interface_method, implementation));
        Ok(())
    }

    pub fn require_target_call(&mut self, mixin: TypeRef, interface: TypeRef) -> Result<()> {
        self.check_interface(interface)?;
        for ty in self.sharing_members(mixin) {
            let requirements = &mut self.universe.types[ty.index()].requirements;
            if !requirements.target_call.contains(&interface) {
                requirements.target_call.push(interface);
            }
        }
        Ok(())
    }

    pub fn require_next_call(&mut self, mixin: TypeRef, interface: TypeRef) -> Result<()> {
        self.check_interface(interface)?;
        for ty in self.sharing_members(mixin) {
            let requirements = &mut self.universe.types[ty.index()].requirements;
            if !requirements.next_call.contains(&interface) {
                requirements.next_call.push(interface);
            }
        }
        Ok(())
    }

    /// Validates interface implementations and freezes the model
    pub fn build(mut self) -> Result<TypeUniverse> {
        for (class, interface_method, _) in &self.explicit_implementations {
            let interface = self.universe.method(*interface_method).declaring_type;
            if !self.universe.all_interfaces(*class).contains(&interface) {
                return Err(TypeModelError::InterfaceNotImplemented {
                    class: self.universe.name(*class).to_string(),
                    interface: self.universe.name(interface).to_string(),
                });
            }
        }

        let classes: Vec<TypeRef> = self
            .universe
            .types()
            .filter(|ty| !self.universe.is_interface(*ty))
            .collect();

        for class in classes {
            let chain = self.universe.base_chain(class);
            for interface in self.universe.all_interfaces(class) {
                let mut mapping = InterfaceMapping::default();
                for interface_method in self.universe.descriptor(interface).methods.clone() {
                    let explicit = chain.iter().find_map(|t| {
                        self.explicit_implementations
                            .iter()
                            .find(|(c, m, _)| c == t && *m == interface_method)
                            .map(|(_, _, target)| *target)
                    });
                    let descriptor = self.universe.method(interface_method);
                    let target = explicit.or_else(|| {
                        self.universe
                            .find_method(class, &descriptor.name, &descriptor.signature)
                    });
                    match target {
                        Some(target) => mapping.pairs.push((interface_method, target)),
                        None => {
                            return Err(TypeModelError::MissingInterfaceImplementation {
                                class: self.universe.name(class).to_string(),
                                interface: self.universe.name(interface).to_string(),
                                method: self.universe.method_display(interface_method),
                            });
                        }
                    }
                }
                self.universe.interface_maps.insert((class, interface), mapping);
            }
        }

        tracing::debug!(
            types = self.universe.types.len(),
            methods = self.universe.methods.len(),
            "type universe built"
        );
        Ok(self.universe)
    }
}
