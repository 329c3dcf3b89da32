//! Declaration tuples consumed by the configuration builder, and a
//! discovery front-end that extracts them from marker attributes.

use crate::context::{MemberVisibility, MixinContextOrigin, MixinKind};
use crate::types::{AttributeInstance, TypeRef, TypeUniverse};

/// `target` is configured with `mixin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixinDeclaration {
    pub target: TypeRef,
    pub mixin: TypeRef,
    pub kind: MixinKind,
    pub visibility: MemberVisibility,
    pub dependencies: Vec<TypeRef>,
    pub origin: MixinContextOrigin,
}

/// On `target`, `replacing` suppresses `suppressed` and everything derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionDeclaration {
    pub target: TypeRef,
    pub replacing: TypeRef,
    pub suppressed: TypeRef,
}

/// The composed object of `target` must expose `interface`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposedInterfaceDeclaration {
    pub target: TypeRef,
    pub interface: TypeRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub mixins: Vec<MixinDeclaration>,
    pub suppressions: Vec<SuppressionDeclaration>,
    pub composed_interfaces: Vec<ComposedInterfaceDeclaration>,
}

impl Declarations {
    pub fn is_empty(&self) -> bool {
        self.mixins.is_empty() && self.suppressions.is_empty() && self.composed_interfaces.is_empty()
    }

    pub fn extend(&mut self, other: Declarations) {
        self.mixins.extend(other.mixins);
        self.suppressions.extend(other.suppressions);
        self.composed_interfaces.extend(other.composed_interfaces);
    }
}

pub const USES_ATTRIBUTE: &str = "UsesAttribute";
pub const EXTENDS_ATTRIBUTE: &str = "ExtendsAttribute";
pub const COMPOSED_INTERFACE_ATTRIBUTE: &str = "ComposedInterfaceAttribute";
pub const SUPPRESSES_ATTRIBUTE: &str = "SuppressesMixinAttribute";

/// Attribute types that mark mixin relationships in a universe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerAttributes {
    /// On a target class: `[Uses(mixin, dependencies...)]`
    pub uses: Option<TypeRef>,
    /// On a mixin: `[Extends(target, dependencies...)]`
    pub extends: Option<TypeRef>,
    /// On an interface: `[ComposedInterface(target)]`
    pub composed_interface: Option<TypeRef>,
    /// On a mixin: `[SuppressesMixin(suppressed)]`, applied wherever the mixin is configured
    pub suppresses: Option<TypeRef>,
}

impl MarkerAttributes {
    /// Looks the marker attribute types up by their conventional names
    pub fn resolve(universe: &TypeUniverse) -> Self {
        Self {
            uses: universe.find(USES_ATTRIBUTE),
            extends: universe.find(EXTENDS_ATTRIBUTE),
            composed_interface: universe.find(COMPOSED_INTERFACE_ATTRIBUTE),
            suppresses: universe.find(SUPPRESSES_ATTRIBUTE),
        }
    }
}

/// Discovers declarations from marker attributes on types.
///
/// Type arguments of `Uses`/`Extends` name the related type first and
/// ordering dependencies after it; a text argument `"public"` makes the
/// introduced members public.
pub struct AttributeDeclarationScanner<'u> {
    universe: &'u TypeUniverse,
    markers: MarkerAttributes,
}

impl<'u> AttributeDeclarationScanner<'u> {
    pub fn new(universe: &'u TypeUniverse) -> Self {
        Self::with_markers(universe, MarkerAttributes::resolve(universe))
    }

    pub fn with_markers(universe: &'u TypeUniverse, markers: MarkerAttributes) -> Self {
        Self { universe, markers }
    }

    fn is_marker(&self, attribute: &AttributeInstance, marker: Option<TypeRef>) -> bool {
        marker.map_or(false, |m| self.universe.is_assignable_from(m, attribute.attribute_type))
    }

    fn mixin_declaration(
        &self,
        attribute: &AttributeInstance,
        declaring_type: TypeRef,
        kind: MixinKind,
        attribute_name: &str,
    ) -> Option<MixinDeclaration> {
        let mut type_args = attribute.type_arguments();
        let related = type_args.next()?;
        let (target, mixin) = match kind {
            MixinKind::Used => (declaring_type, related),
            MixinKind::Extending => (related, declaring_type),
        };
        let visibility = match attribute.text_argument() {
            Some(text) if text.eq_ignore_ascii_case("public") => MemberVisibility::Public,
            _ => MemberVisibility::Private,
        };
        Some(MixinDeclaration {
            target,
            mixin,
            kind,
            visibility,
            dependencies: type_args.collect(),
            origin: MixinContextOrigin::new(
                attribute_name,
                "declarative",
                self.universe.name(declaring_type),
            ),
        })
    }

    pub fn scan(&self) -> Declarations {
        let mut declarations = Declarations::default();

        for ty in self.universe.types() {
            for attribute in &self.universe.descriptor(ty).attributes {
                if self.is_marker(attribute, self.markers.uses) {
                    declarations.mixins.extend(self.mixin_declaration(
                        attribute,
                        ty,
                        MixinKind::Used,
                        USES_ATTRIBUTE,
                    ));
                } else if self.is_marker(attribute, self.markers.extends) {
                    declarations.mixins.extend(self.mixin_declaration(
                        attribute,
                        ty,
                        MixinKind::Extending,
                        EXTENDS_ATTRIBUTE,
                    ));
                } else if self.is_marker(attribute, self.markers.composed_interface) {
                    declarations.composed_interfaces.extend(
                        attribute
                            .type_arguments()
                            .map(|target| ComposedInterfaceDeclaration { target, interface: ty }),
                    );
                }
            }
        }

        let mut suppressions = Vec::new();
        for declaration in &declarations.mixins {
            for attribute in &self.universe.descriptor(declaration.mixin).attributes {
                if self.is_marker(attribute, self.markers.suppresses) {
                    suppressions.extend(attribute.type_arguments().map(|suppressed| {
                        SuppressionDeclaration {
                            target: declaration.target,
                            replacing: declaration.mixin,
                            suppressed,
                        }
                    }));
                }
            }
        }
        declarations.suppressions = suppressions;

        tracing::debug!(
            mixins = declarations.mixins.len(),
            suppressions = declarations.suppressions.len(),
            composed_interfaces = declarations.composed_interfaces.len(),
            "scanned marker attributes"
        );
        declarations
    }
}
