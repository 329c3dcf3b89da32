//! JSON manifests describing a type model and its mixin configuration
//!
//! A manifest lists types in declaration order. Base classes and extended
//! interfaces must be declared before the types that reference them; member
//! and attribute types may refer to any type in the manifest. Closed generic
//! types such as `Repository<Customer>` are created on first reference from
//! the open definition `Repository<T>` and share its members, including the
//! ones declared after the first reference.
//!
//! Mixin associations come from two sources: the explicit `mixins`,
//! `composed_interfaces` and `suppressions` lists, and marker attributes
//! (`UsesAttribute`, `ExtendsAttribute`, ...) applied to types.

use std::{fs, path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use weave_core::{
    configuration::ComposedInterfaceDeclaration,
    types::{
        Accessors, AttributeArgument, AttributeInstance, AttributeUsage, GenericShape, TypeKind,
    },
    AttributeDeclarationScanner, Declarations, MemberRef, MemberVisibility, MixinConfiguration,
    MixinConfigurationBuilder, MixinContextOrigin, MixinDeclaration, MixinKind, Signature,
    SuppressionDeclaration, TypeRef, TypeUniverse, TypeUniverseBuilder,
};

/// Top-level manifest document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    #[serde(default)]
    pub mixins: Vec<MixinEntry>,
    #[serde(default)]
    pub composed_interfaces: Vec<ComposedInterfaceEntry>,
    #[serde(default)]
    pub suppressions: Vec<SuppressionEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Class,
    Interface,
    Attribute,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeEntry {
    pub name: String,
    #[serde(default)]
    pub kind: EntryKind,
    #[serde(default)]
    pub base: Option<String>,
    /// Non-empty for an open generic definition
    #[serde(default)]
    pub generic_parameters: Vec<String>,
    /// Implemented interfaces; for an interface, the interfaces it extends
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
    #[serde(default)]
    pub properties: Vec<PropertyEntry>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
    #[serde(default)]
    pub requires_target_call: Vec<String>,
    #[serde(default)]
    pub requires_next_call: Vec<String>,
    /// Attribute types only
    #[serde(default)]
    pub inherited: Option<bool>,
    /// Attribute types only
    #[serde(default)]
    pub allow_multiple: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideEntry {
    /// Overrides the virtual method of a base class with the same signature
    Base,
    /// A mixin method overriding the target class member
    Target,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodEntry {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub overrides: Option<OverrideEntry>,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyEntry {
    pub name: String,
    /// Property type; ignored for overrides
    #[serde(default, rename = "type")]
    pub property_type: Option<String>,
    #[serde(default = "yes")]
    pub get: bool,
    #[serde(default = "yes")]
    pub set: bool,
    #[serde(default)]
    pub overrides: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventEntry {
    pub name: String,
    /// Handler type; ignored for overrides
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub overrides: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeEntry {
    #[serde(rename = "type")]
    pub attribute_type: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentEntry {
    Type(String),
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixinKindEntry {
    #[default]
    Extends,
    Uses,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityEntry {
    #[default]
    Private,
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixinEntry {
    pub target: String,
    pub mixin: String,
    #[serde(default)]
    pub kind: MixinKindEntry,
    #[serde(default)]
    pub visibility: VisibilityEntry,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposedInterfaceEntry {
    pub target: String,
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuppressionEntry {
    pub target: String,
    pub replacing: String,
    pub suppressed: String,
}

/// A manifest turned into a frozen type model and a validated configuration
#[derive(Debug)]
pub struct LoadedManifest {
    pub universe: Arc<TypeUniverse>,
    pub configuration: MixinConfiguration,
}

impl TypeEntry {
    /// `Repository<T>` for a generic definition declared as `Repository`
    pub fn qualified_name(&self) -> String {
        if self.generic_parameters.is_empty() || self.name.contains('<') {
            self.name.clone()
        } else {
            format!("{}<{}>", self.name, self.generic_parameters.join(", "))
        }
    }
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid manifest JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("In manifest {}", path.display()))
    }

    /// Builds the type model, then the mixin configuration
    pub fn load(&self, origin: &str) -> Result<LoadedManifest> {
        let mut loader = Loader {
            builder: TypeUniverseBuilder::new(),
        };
        let declared = self
            .types
            .iter()
            .map(|entry| loader.declare_type(entry))
            .collect::<Result<Vec<TypeRef>>>()?;

        // implementations and members, in declaration order so bases come first
        for (entry, ty) in self.types.iter().zip(&declared) {
            loader.declare_members(entry, *ty)?;
        }
        for (entry, ty) in self.types.iter().zip(&declared) {
            loader.declare_attributes_and_requirements(entry, *ty)?;
        }
        let explicit = self.declarations(&mut loader, origin)?;

        let universe = Arc::new(loader.builder.build()?);
        let mut declarations = AttributeDeclarationScanner::new(&universe).scan();
        declarations.extend(explicit);

        let mut builder = MixinConfigurationBuilder::new();
        builder.apply_declarations(&declarations);
        let configuration = builder.build(&universe)?;

        tracing::info!(
            types = universe.type_count(),
            classes = configuration.len(),
            "manifest loaded"
        );
        Ok(LoadedManifest {
            universe,
            configuration,
        })
    }

    fn declarations(&self, loader: &mut Loader, origin: &str) -> Result<Declarations> {
        let mut declarations = Declarations::default();
        for entry in &self.mixins {
            let dependencies = entry
                .dependencies
                .iter()
                .map(|d| loader.resolve(d))
                .collect::<Result<Vec<_>>>()?;
            declarations.mixins.push(MixinDeclaration {
                target: loader.resolve(&entry.target)?,
                mixin: loader.resolve(&entry.mixin)?,
                kind: match entry.kind {
                    MixinKindEntry::Extends => MixinKind::Extending,
                    MixinKindEntry::Uses => MixinKind::Used,
                },
                visibility: match entry.visibility {
                    VisibilityEntry::Private => MemberVisibility::Private,
                    VisibilityEntry::Public => MemberVisibility::Public,
                },
                dependencies,
                origin: MixinContextOrigin::new("Manifest", "weave-repl", origin),
            });
        }
        for entry in &self.composed_interfaces {
            declarations.composed_interfaces.push(ComposedInterfaceDeclaration {
                target: loader.resolve(&entry.target)?,
                interface: loader.resolve(&entry.interface)?,
            });
        }
        for entry in &self.suppressions {
            declarations.suppressions.push(SuppressionDeclaration {
                target: loader.resolve(&entry.target)?,
                replacing: loader.resolve(&entry.replacing)?,
                suppressed: loader.resolve(&entry.suppressed)?,
            });
        }
        Ok(declarations)
    }
}

struct Loader {
    builder: TypeUniverseBuilder,
}

impl Loader {
    /// Looks a type up by name, closing a generic definition on demand
    fn resolve(&mut self, name: &str) -> Result<TypeRef> {
        let name = name.trim();
        if let Some(ty) = self.builder.universe().find(name) {
            return Ok(ty);
        }
        let (stem, arguments) = split_generic(name).ok_or_else(|| anyhow!("Unknown type '{name}'"))?;
        let definition = self
            .builder
            .universe()
            .types()
            .find(|ty| {
                let descriptor = self.builder.universe().descriptor(*ty);
                matches!(descriptor.generic, GenericShape::Definition { .. })
                    && descriptor.name.split('<').next() == Some(stem)
            })
            .ok_or_else(|| anyhow!("Unknown generic type definition '{stem}' in '{name}'"))?;
        let arguments = arguments
            .into_iter()
            .map(|argument| self.resolve(argument))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.builder.specialize(definition, &arguments)?)
    }

    fn resolve_all(&mut self, names: &[String]) -> Result<Vec<TypeRef>> {
        names.iter().map(|name| self.resolve(name)).collect()
    }

    fn declare_type(&mut self, entry: &TypeEntry) -> Result<TypeRef> {
        let base = entry.base.as_deref().map(|b| self.resolve(b)).transpose()?;
        let name = entry.qualified_name();
        let parameters: Vec<&str> = entry.generic_parameters.iter().map(String::as_str).collect();
        let ty = match entry.kind {
            EntryKind::Interface => {
                let extends = self.resolve_all(&entry.implements)?;
                if parameters.is_empty() {
                    self.builder.add_interface(&name, &extends)?
                } else {
                    let ty = self.builder.add_generic_definition(
                        &name,
                        TypeKind::Interface,
                        &parameters,
                        None,
                    )?;
                    for interface in extends {
                        self.builder.implement(ty, interface)?;
                    }
                    ty
                }
            }
            EntryKind::Attribute => {
                let defaults = AttributeUsage::default();
                let usage = AttributeUsage {
                    inherited: entry.inherited.unwrap_or(defaults.inherited),
                    allow_multiple: entry.allow_multiple.unwrap_or(defaults.allow_multiple),
                };
                self.builder.add_attribute_class(&name, base, usage)?
            }
            EntryKind::Class if parameters.is_empty() => self.builder.add_class(&name, base)?,
            EntryKind::Class => {
                self.builder
                    .add_generic_definition(&name, TypeKind::Class, &parameters, base)?
            }
        };
        Ok(ty)
    }

    fn signature(&mut self, method: &MethodEntry) -> Result<Signature> {
        let parameters = self.resolve_all(&method.parameters)?;
        let return_type = method.returns.as_deref().map(|r| self.resolve(r)).transpose()?;
        Ok(Signature::new(parameters, return_type))
    }

    fn declare_members(&mut self, entry: &TypeEntry, ty: TypeRef) -> Result<()> {
        if entry.kind != EntryKind::Interface {
            for interface in self.resolve_all(&entry.implements)? {
                self.builder.implement(ty, interface)?;
            }
        }

        for method in &entry.methods {
            let signature = self.signature(method)?;
            let declared = match method.overrides {
                Some(OverrideEntry::Target) => {
                    self.builder.add_target_override(ty, &method.name, signature)?
                }
                Some(OverrideEntry::Base) => {
                    let base_method = self
                        .base_of(ty)
                        .and_then(|base| self.builder.universe().find_method(base, &method.name, &signature))
                        .ok_or_else(|| {
                            anyhow!(
                                "'{}' overrides no base method {}",
                                entry.name,
                                self.builder.universe().signature_display(&method.name, &signature)
                            )
                        })?;
                    self.builder.add_override(ty, base_method)?
                }
                None if method.is_virtual => {
                    self.builder.add_virtual_method(ty, &method.name, signature)?
                }
                None => self.builder.add_method(ty, &method.name, signature)?,
            };
            self.attach(MemberRef::Method(declared), &method.attributes)?;
        }

        for property in &entry.properties {
            let declared = if property.overrides {
                let base_property = self
                    .ancestors(ty)
                    .into_iter()
                    .find_map(|t| self.builder.universe().declared_property(t, &property.name))
                    .ok_or_else(|| anyhow!("'{}' overrides no base property '{}'", entry.name, property.name))?;
                self.builder.add_property_override(ty, base_property)?
            } else {
                let type_name = property
                    .property_type
                    .as_deref()
                    .ok_or_else(|| anyhow!("Property '{}.{}' needs a type", entry.name, property.name))?;
                let property_type = self.resolve(type_name)?;
                let accessors = Accessors {
                    get: property.get,
                    set: property.set,
                };
                self.builder.add_property(ty, &property.name, property_type, accessors)?
            };
            self.attach(MemberRef::Property(declared), &property.attributes)?;
        }

        for event in &entry.events {
            let declared = if event.overrides {
                let base_event = self
                    .ancestors(ty)
                    .into_iter()
                    .find_map(|t| self.builder.universe().declared_event(t, &event.name))
                    .ok_or_else(|| anyhow!("'{}' overrides no base event '{}'", entry.name, event.name))?;
                self.builder.add_event_override(ty, base_event)?
            } else {
                let handler_name = event
                    .handler
                    .as_deref()
                    .ok_or_else(|| anyhow!("Event '{}.{}' needs a handler type", entry.name, event.name))?;
                let handler = self.resolve(handler_name)?;
                self.builder.add_event(ty, &event.name, handler)?
            };
            self.attach(MemberRef::Event(declared), &event.attributes)?;
        }
        Ok(())
    }

    fn declare_attributes_and_requirements(&mut self, entry: &TypeEntry, ty: TypeRef) -> Result<()> {
        self.attach(MemberRef::Type(ty), &entry.attributes)?;
        for interface in self.resolve_all(&entry.requires_target_call)? {
            self.builder.require_target_call(ty, interface)?;
        }
        for interface in self.resolve_all(&entry.requires_next_call)? {
            self.builder.require_next_call(ty, interface)?;
        }
        Ok(())
    }

    fn attach(&mut self, member: MemberRef, attributes: &[AttributeEntry]) -> Result<()> {
        for attribute in attributes {
            let mut instance = AttributeInstance::new(self.resolve(&attribute.attribute_type)?);
            for argument in &attribute.arguments {
                instance = instance.with_argument(match argument {
                    ArgumentEntry::Type(name) => AttributeArgument::Type(self.resolve(name)?),
                    ArgumentEntry::Text(text) => AttributeArgument::Text(text.clone()),
                    ArgumentEntry::Flag(flag) => AttributeArgument::Flag(*flag),
                });
            }
            self.builder.add_attribute(member, instance)?;
        }
        Ok(())
    }

    fn base_of(&self, ty: TypeRef) -> Option<TypeRef> {
        self.builder.universe().descriptor(ty).base
    }

    /// Base classes of `ty`, nearest first
    fn ancestors(&self, ty: TypeRef) -> Vec<TypeRef> {
        self.builder.universe().base_chain(ty).into_iter().skip(1).collect()
    }
}

/// Splits `Stem<A, B<C>>` into `("Stem", ["A", "B<C>"])`
fn split_generic(name: &str) -> Option<(&str, Vec<&str>)> {
    let open = name.find('<')?;
    let inner = name[open + 1..].strip_suffix('>')?;
    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                arguments.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    arguments.push(inner[start..].trim());
    if arguments.iter().any(|a| a.is_empty()) {
        return None;
    }
    Some((name[..open].trim(), arguments))
}

/// Loads a manifest file in one step
pub fn load_file(path: &Path) -> Result<LoadedManifest> {
    let manifest = Manifest::from_file(path)?;
    let origin = path.display().to_string();
    manifest
        .load(&origin)
        .with_context(|| format!("Failed to load manifest {origin}"))
}

/// Fails if `name` is not a type of the loaded model
pub fn lookup(universe: &TypeUniverse, name: &str) -> Result<TypeRef> {
    match universe.find(name.trim()) {
        Some(ty) => Ok(ty),
        None => bail!("Unknown type '{}'", name.trim()),
    }
}
