use pretty_assertions::assert_eq;

use super::*;
use crate::types::{Signature, TypeUniverseBuilder};

struct Fixture {
    universe: TypeUniverse,
    root: TypeRef,
    mid: TypeRef,
    leaf: TypeRef,
    mid_name: MethodRef,
    leaf_name: MethodRef,
    root_id: MethodRef,
    named: TypeRef,
    identified: TypeRef,
    entity: TypeRef,
    versioned: TypeRef,
    versioned_class: TypeRef,
    versioned_class_version: MethodRef,
}

/// `Leaf : Mid : Root`; `Mid` and `Leaf` both declare `GetName(): String`
fn fixture() -> Fixture {
    let mut b = TypeUniverseBuilder::new();
    let string = b.add_class("String", None).unwrap();
    let int = b.add_class("Int32", None).unwrap();

    let named = b.add_interface("INamed", &[]).unwrap();
    b.add_method(named, "GetName", Signature::returning(string)).unwrap();
    let identified = b.add_interface("IIdentified", &[]).unwrap();
    b.add_method(identified, "GetId", Signature::returning(int)).unwrap();
    let entity = b.add_interface("IEntity", &[named, identified]).unwrap();
    let versioned = b.add_interface("IVersioned", &[]).unwrap();
    b.add_method(versioned, "GetVersion", Signature::returning(int)).unwrap();

    let root = b.add_class("Root", None).unwrap();
    let root_id = b.add_method(root, "GetId", Signature::returning(int)).unwrap();
    b.add_method(root, "GetName", Signature::new(vec![int], Some(string)))
        .unwrap();
    let mid = b.add_class("Mid", Some(root)).unwrap();
    let mid_name = b.add_method(mid, "GetName", Signature::returning(string)).unwrap();
    let leaf = b.add_class("Leaf", Some(mid)).unwrap();
    let leaf_name = b.add_method(leaf, "GetName", Signature::returning(string)).unwrap();

    let versioned_class = b.add_class("VersionedRoot", Some(root)).unwrap();
    let versioned_class_version = b
        .add_method(versioned_class, "GetVersion", Signature::returning(int))
        .unwrap();
    b.implement(versioned_class, versioned).unwrap();

    Fixture {
        universe: b.build().unwrap(),
        root,
        mid,
        leaf,
        mid_name,
        leaf_name,
        root_id,
        named,
        identified,
        entity,
        versioned,
        versioned_class,
        versioned_class_version,
    }
}

fn no_introductions() -> IndexMap<TypeRef, InterfaceIntroductionDefinition> {
    IndexMap::new()
}

#[test]
fn test_duck_typing_picks_smallest_offset() {
    let f = fixture();
    let introductions = no_introductions();
    let resolver = RequirementResolver::new();

    let leaf_scope = RequirementScope::new(&f.universe, f.leaf, &introductions);
    let methods = resolver
        .collect(&leaf_scope, f.named, Requirer::TargetClass(f.leaf))
        .unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].implementing_method, f.leaf_name);
    assert_eq!(methods[0].source, ImplementationSource::DuckTyped { offset: 0 });

    let mid_scope = RequirementScope::new(&f.universe, f.mid, &introductions);
    let methods = resolver
        .collect(&mid_scope, f.named, Requirer::TargetClass(f.mid))
        .unwrap();
    assert_eq!(methods[0].implementing_method, f.mid_name);
}

#[test]
fn test_duck_typing_requires_exact_signature() {
    let f = fixture();
    let introductions = no_introductions();
    let scope = RequirementScope::new(&f.universe, f.root, &introductions);
    // Root.GetName takes a parameter and does not match INamed.GetName()
    let err = RequirementResolver::new()
        .collect(&scope, f.named, Requirer::Mixin(f.mid))
        .unwrap_err();
    assert_eq!(
        err,
        CompositionError::Configuration(ConfigurationError::UnresolvedRequirement {
            interface: "INamed".to_string(),
            requirer: "mixin 'Mid'".to_string(),
            target: "Root".to_string(),
            method: "GetName(): String".to_string(),
        })
    );
}

#[test]
fn test_offset_counts_hops_to_declaring_type() {
    let f = fixture();
    let introductions = no_introductions();
    let scope = RequirementScope::new(&f.universe, f.leaf, &introductions);
    let methods = RequirementResolver::new()
        .collect(&scope, f.identified, Requirer::TargetClass(f.leaf))
        .unwrap();
    assert_eq!(methods[0].implementing_method, f.root_id);
    assert_eq!(methods[0].source, ImplementationSource::DuckTyped { offset: 2 });
}

#[test]
fn test_implemented_interface_uses_interface_map() {
    let f = fixture();
    let introductions = no_introductions();
    let scope = RequirementScope::new(&f.universe, f.versioned_class, &introductions);
    assert!(ImplementedInterfaceCollector.applies(&scope, f.versioned));
    assert!(!IntroducedInterfaceCollector.applies(&scope, f.versioned));

    let methods = RequirementResolver::new()
        .collect(&scope, f.versioned, Requirer::TargetClass(f.versioned_class))
        .unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].implementing_method, f.versioned_class_version);
    assert_eq!(methods[0].source, ImplementationSource::Implemented);
}

#[test]
fn test_requirement_includes_extended_interfaces() {
    let f = fixture();
    let introductions = no_introductions();
    let scope = RequirementScope::new(&f.universe, f.leaf, &introductions);
    let resolved = RequirementResolver::new()
        .resolve(&scope, RequirementKind::TargetCall, f.entity, Requirer::Mixin(f.root))
        .unwrap();
    let interfaces: Vec<TypeRef> = resolved.iter().map(|r| r.interface).collect();
    assert_eq!(interfaces, vec![f.entity, f.named, f.identified]);
    assert!(resolved[0].methods.is_empty());
    assert_eq!(resolved[1].implementation_of(f.universe.descriptor(f.named).methods[0]), Some(f.leaf_name));
}

#[test]
fn test_requirement_set_merges_requirers() {
    let f = fixture();
    let introductions = no_introductions();
    let scope = RequirementScope::new(&f.universe, f.leaf, &introductions);
    let resolver = RequirementResolver::new();
    let mut set = RequirementSet::new();

    set.require(&resolver, &scope, RequirementKind::TargetCall, f.named, Requirer::Mixin(f.root))
        .unwrap();
    set.require(&resolver, &scope, RequirementKind::TargetCall, f.entity, Requirer::Mixin(f.mid))
        .unwrap();
    set.require(&resolver, &scope, RequirementKind::NextCall, f.named, Requirer::Mixin(f.mid))
        .unwrap();
    assert_eq!(set.len(), 4);

    let requirements = set.into_vec();
    let named = &requirements[0];
    assert_eq!((named.kind, named.interface), (RequirementKind::TargetCall, f.named));
    assert_eq!(named.requirers, vec![Requirer::Mixin(f.root), Requirer::Mixin(f.mid)]);
    assert_eq!(requirements[3].kind, RequirementKind::NextCall);
}

struct RefuseEverything;

impl RequiredMethodCollector for RefuseEverything {
    fn name(&self) -> &'static str {
        "refuse"
    }

    fn applies(&self, _scope: &RequirementScope<'_>, _interface: TypeRef) -> bool {
        false
    }

    fn collect(
        &self,
        _scope: &RequirementScope<'_>,
        _interface: TypeRef,
        _requirer: Requirer,
    ) -> Result<Vec<RequiredMethodDefinition>, CompositionError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_custom_collectors_replace_the_defaults() {
    let f = fixture();
    let introductions = no_introductions();
    let scope = RequirementScope::new(&f.universe, f.leaf, &introductions);
    let resolver = RequirementResolver::with_collectors(vec![Box::new(RefuseEverything)]);
    assert_eq!(format!("{resolver:?}"), "RequirementResolver { collectors: [\"refuse\"] }");
    let err = resolver
        .collect(&scope, f.named, Requirer::TargetClass(f.leaf))
        .unwrap_err();
    assert!(err.is_configuration_error());
}

#[test]
fn test_requirer_descriptions() {
    let f = fixture();
    assert_eq!(Requirer::TargetClass(f.leaf).describe(&f.universe), "class 'Leaf'");
    assert_eq!(Requirer::Mixin(f.mid).describe(&f.universe), "mixin 'Mid'");
    assert_eq!(Requirer::Mixin(f.mid).type_ref(), f.mid);
    assert_eq!(RequirementKind::NextCall.to_string(), "next call");
}
