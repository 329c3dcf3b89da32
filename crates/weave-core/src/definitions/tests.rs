use pretty_assertions::assert_eq;

use super::*;
use crate::context::{ClassContext, MixinContext};
use crate::error::{CompositionError, ConfigurationError, InternalFault};
use crate::requirements::{ImplementationSource, Requirer};
use crate::types::{Accessors, MethodDescriptor, TypeUniverseBuilder};
use crate::WeaveConfig;

struct Fixture {
    universe: TypeUniverse,
    root: TypeRef,
    mid: TypeRef,
    leaf: TypeRef,
    root_save: MethodRef,
    leaf_describe: MethodRef,
    describable: TypeRef,
    describable_describe: MethodRef,
    auditable: TypeRef,
    logging: TypeRef,
    logging_save: MethodRef,
    caching: TypeRef,
    caching_save: MethodRef,
    audit: TypeRef,
    second_audit: TypeRef,
    next_caller: TypeRef,
    printing: TypeRef,
    deleting: TypeRef,
    describing: TypeRef,
}

fn fixture() -> Fixture {
    let mut b = TypeUniverseBuilder::new();
    let string = b.add_class("String", None).unwrap();
    let root = b.add_class("Root", None).unwrap();
    let mid = b.add_class("Mid", Some(root)).unwrap();
    let leaf = b.add_class("Leaf", Some(mid)).unwrap();
    let root_save = b.add_virtual_method(root, "Save", Signature::void()).unwrap();
    b.add_method(root, "Describe", Signature::returning(string)).unwrap();
    b.add_method(mid, "Describe", Signature::returning(string)).unwrap();
    let leaf_describe = b.add_method(leaf, "Describe", Signature::returning(string)).unwrap();

    let describable = b.add_interface("IDescribable", &[]).unwrap();
    let describable_describe = b
        .add_method(describable, "Describe", Signature::returning(string))
        .unwrap();
    let printable = b.add_interface("IPrintable", &[]).unwrap();
    b.add_method(printable, "Print", Signature::returning(string)).unwrap();

    let auditable = b.add_interface("IAuditable", &[]).unwrap();
    b.add_method(auditable, "Audit", Signature::void()).unwrap();
    b.add_property(auditable, "Trail", string, Accessors::READ_ONLY).unwrap();
    b.add_event(auditable, "Audited", string).unwrap();

    let logging = b.add_class("LoggingMixin", None).unwrap();
    let logging_save = b.add_target_override(logging, "Save", Signature::void()).unwrap();
    b.require_target_call(logging, describable).unwrap();

    let caching = b.add_class("CachingMixin", None).unwrap();
    let caching_save = b.add_target_override(caching, "Save", Signature::void()).unwrap();

    let auditing_mixin = |b: &mut TypeUniverseBuilder, name: &str| {
        let mixin = b.add_class(name, None).unwrap();
        b.add_method(mixin, "Audit", Signature::void()).unwrap();
        b.add_property(mixin, "Trail", string, Accessors::READ_ONLY).unwrap();
        b.add_event(mixin, "Audited", string).unwrap();
        b.implement(mixin, auditable).unwrap();
        mixin
    };
    let audit = auditing_mixin(&mut b, "AuditMixin");
    let second_audit = auditing_mixin(&mut b, "SecondAuditMixin");

    let next_caller = b.add_class("NextCallerMixin", None).unwrap();
    b.require_next_call(next_caller, auditable).unwrap();

    let printing = b.add_class("PrintingMixin", None).unwrap();
    b.require_target_call(printing, printable).unwrap();

    let deleting = b.add_class("DeletingMixin", None).unwrap();
    b.add_target_override(deleting, "Delete", Signature::void()).unwrap();

    let describing = b.add_class("DescribingMixin", None).unwrap();
    b.add_target_override(describing, "Describe", Signature::returning(string))
        .unwrap();

    Fixture {
        universe: b.build().unwrap(),
        root,
        mid,
        leaf,
        root_save,
        leaf_describe,
        describable,
        describable_describe,
        auditable,
        logging,
        logging_save,
        caching,
        caching_save,
        audit,
        second_audit,
        next_caller,
        printing,
        deleting,
        describing,
    }
}

fn mixin(ty: TypeRef) -> MixinContext {
    MixinContext::new(ty, MixinContextOrigin::imperative("tests"))
}

fn context(f: &Fixture, target: TypeRef, mixins: Vec<MixinContext>) -> ClassContext {
    ClassContext::new(&f.universe, target, mixins, []).unwrap()
}

fn build(f: &Fixture, context: &ClassContext) -> crate::error::Result<TargetClassDefinition> {
    TargetClassDefinition::build(&f.universe, context)
}

#[test]
fn test_member_index_prefers_most_derived_declaration() {
    let f = fixture();
    let members = MemberIndex::collect(&f.universe, f.leaf);
    let string = f.universe.find("String").unwrap();
    assert_eq!(
        members.find_method("Describe", &Signature::returning(string)),
        Some(f.leaf_describe)
    );
    assert_eq!(members.find_method("Save", &Signature::void()), Some(f.root_save));
    assert_eq!(members.method_count(), 2);
}

#[test]
fn test_empty_context_builds_validated_definition() {
    let f = fixture();
    let mut builder = TargetClassDefinitionBuilder::new(&f.universe);
    assert_eq!(builder.stage(), BuildStage::Unbuilt);
    let definition = builder.build(&ClassContext::empty(f.mid)).unwrap();
    assert_eq!(builder.stage(), BuildStage::Validated);
    assert_eq!(definition.target_type(), f.mid);
    assert!(!definition.has_mixins());
    assert!(definition.required_interfaces().is_empty());
}

#[test]
fn test_declaration_order_is_kept_without_dependencies() {
    let f = fixture();
    let ctx = context(&f, f.leaf, vec![mixin(f.caching), mixin(f.audit), mixin(f.logging)]);
    let definition = build(&f, &ctx).unwrap();
    assert_eq!(definition.mixin_order(), vec![f.caching, f.audit, f.logging]);
}

#[test]
fn test_explicit_dependency_reorders_and_is_deterministic() {
    let f = fixture();
    let ctx = context(
        &f,
        f.leaf,
        vec![
            mixin(f.logging).with_dependency(f.audit),
            mixin(f.caching),
            mixin(f.audit),
        ],
    );
    let first = build(&f, &ctx).unwrap();
    assert_eq!(first.mixin_order(), vec![f.caching, f.audit, f.logging]);
    assert_eq!(first.mixin(f.logging).unwrap().dependencies, vec![f.audit]);
    assert_eq!(first.mixin(f.logging).unwrap().declaration_index, 0);

    for _ in 0..5 {
        assert_eq!(build(&f, &ctx).unwrap(), first);
    }
}

#[test]
fn test_interface_dependency_resolves_to_introducing_mixin() {
    let f = fixture();
    let ctx = context(
        &f,
        f.leaf,
        vec![mixin(f.caching).with_dependency(f.auditable), mixin(f.audit)],
    );
    let definition = build(&f, &ctx).unwrap();
    assert_eq!(definition.mixin_order(), vec![f.audit, f.caching]);
}

#[test]
fn test_dependency_cycle_names_the_cycle() {
    let f = fixture();
    let ctx = context(
        &f,
        f.leaf,
        vec![
            mixin(f.logging).with_dependency(f.caching),
            mixin(f.caching).with_dependency(f.logging),
        ],
    );
    let mut builder = TargetClassDefinitionBuilder::new(&f.universe);
    let err = builder.build(&ctx).unwrap_err();
    assert_eq!(builder.stage(), BuildStage::Unbuilt);
    assert_eq!(
        err,
        CompositionError::Configuration(ConfigurationError::DependencyCycle {
            target: "Leaf".to_string(),
            cycle: vec![
                "CachingMixin".to_string(),
                "LoggingMixin".to_string(),
                "CachingMixin".to_string(),
            ],
        })
    );
    assert_eq!(
        err.to_string(),
        "Configuration error: Circular mixin dependencies on class 'Leaf': \
         CachingMixin -> LoggingMixin -> CachingMixin"
    );
}

#[test]
fn test_override_chain_follows_application_order() {
    let f = fixture();
    let ctx = context(&f, f.leaf, vec![mixin(f.logging), mixin(f.caching)]);
    let definition = build(&f, &ctx).unwrap();

    let chain = definition.override_of(f.root_save).unwrap();
    assert_eq!(
        chain.overrides,
        vec![(f.logging, f.logging_save), (f.caching, f.caching_save)]
    );
    assert_eq!(chain.entry_point(), Some(f.caching_save));
    assert_eq!(chain.next_after(f.caching), Some(f.logging_save));
    assert_eq!(chain.next_after(f.logging), Some(f.root_save));
    assert_eq!(chain.next_after(f.audit), None);
}

#[test]
fn test_used_mixin_may_not_override() {
    let f = fixture();
    let ctx = context(&f, f.leaf, vec![mixin(f.caching).with_kind(MixinKind::Used)]);
    let err = build(&f, &ctx).unwrap_err();
    assert_eq!(
        err,
        CompositionError::Configuration(ConfigurationError::OverrideNotAllowed {
            target: "Leaf".to_string(),
            mixin: "CachingMixin".to_string(),
            member: "CachingMixin.Save()".to_string(),
        })
    );
}

#[test]
fn test_override_needs_virtual_target_member() {
    let f = fixture();
    let missing = build(&f, &context(&f, f.leaf, vec![mixin(f.deleting)])).unwrap_err();
    assert!(matches!(
        missing,
        CompositionError::Configuration(ConfigurationError::OverrideTargetNotFound { ref member, .. })
            if member == "DeletingMixin.Delete()"
    ));

    let not_virtual = build(&f, &context(&f, f.leaf, vec![mixin(f.describing)])).unwrap_err();
    assert!(matches!(
        not_virtual,
        CompositionError::Configuration(ConfigurationError::OverrideTargetNotFound { .. })
    ));
}

#[test]
fn test_introduction_maps_methods_properties_and_events() {
    let f = fixture();
    let ctx = context(
        &f,
        f.leaf,
        vec![mixin(f.audit).with_visibility(MemberVisibility::Public)],
    );
    let definition = build(&f, &ctx).unwrap();

    let introduction = definition.introduction(f.auditable).unwrap();
    assert_eq!(introduction.implementer, f.audit);
    assert_eq!(introduction.visibility, MemberVisibility::Public);
    assert_eq!(introduction.methods.len(), 1);
    assert_eq!(introduction.properties.len(), 1);
    assert!(introduction.properties[0].setter.is_none());
    assert_eq!(introduction.events.len(), 1);
    assert_eq!(introduction.method_count(), 4);
    for (interface_method, implementation) in [
        introduction.events[0].add,
        introduction.events[0].remove,
    ] {
        assert_eq!(
            f.universe.method(interface_method).name,
            f.universe.method(implementation).name
        );
        assert_eq!(f.universe.method(implementation).declaring_type, f.audit);
    }
}

#[test]
fn test_two_mixins_introducing_same_interface_fail() {
    let f = fixture();
    let ctx = context(&f, f.leaf, vec![mixin(f.audit), mixin(f.second_audit)]);
    assert_eq!(
        build(&f, &ctx).unwrap_err(),
        CompositionError::Configuration(ConfigurationError::DuplicateIntroduction {
            target: "Leaf".to_string(),
            interface: "IAuditable".to_string(),
            first: "AuditMixin".to_string(),
            second: "SecondAuditMixin".to_string(),
        })
    );
}

#[test]
fn test_duck_typing_prefers_closest_declaration() {
    let f = fixture();
    let ctx = context(&f, f.leaf, vec![mixin(f.logging)]);
    let definition = build(&f, &ctx).unwrap();

    let requirement = definition
        .required_interface(RequirementKind::TargetCall, f.describable)
        .unwrap();
    assert!(requirement.is_required_by(Requirer::Mixin(f.logging)));
    assert_eq!(requirement.methods.len(), 1);
    assert_eq!(requirement.methods[0].interface_method, f.describable_describe);
    assert_eq!(requirement.methods[0].implementing_method, f.leaf_describe);
    assert_eq!(
        requirement.methods[0].source,
        ImplementationSource::DuckTyped { offset: 0 }
    );
}

#[test]
fn test_unresolved_requirement_names_everything() {
    let f = fixture();
    let ctx = context(&f, f.root, vec![mixin(f.printing)]);
    let err = build(&f, &ctx).unwrap_err();
    assert!(err.is_configuration_error());
    assert_eq!(
        err.to_string(),
        "Configuration error: The dependency 'IPrintable' (required by mixin 'PrintingMixin' on \
         class 'Root') is not fulfilled: no public or protected method matching 'Print(): String' \
         was found"
    );
}

#[test]
fn test_next_call_on_introduced_interface_orders_mixins() {
    let f = fixture();
    let ctx = context(&f, f.leaf, vec![mixin(f.next_caller), mixin(f.audit)]);
    let definition = build(&f, &ctx).unwrap();
    assert_eq!(definition.mixin_order(), vec![f.audit, f.next_caller]);

    let requirement = definition
        .required_interface(RequirementKind::NextCall, f.auditable)
        .unwrap();
    assert_eq!(requirement.methods.len(), 4);
    assert!(requirement
        .methods
        .iter()
        .all(|m| m.source == ImplementationSource::Introduced { mixin: f.audit }));
}

#[test]
fn test_composed_interface_requirement_is_resolved() {
    let f = fixture();
    let ctx = ClassContext::new(&f.universe, f.mid, [mixin(f.audit)], [f.describable, f.auditable]).unwrap();
    let definition = build(&f, &ctx).unwrap();
    assert_eq!(definition.composed_interfaces(), &[f.describable, f.auditable]);

    let describable = definition
        .required_interface(RequirementKind::ComposedInterface, f.describable)
        .unwrap();
    assert_eq!(describable.requirers, vec![Requirer::TargetClass(f.mid)]);
    assert_eq!(
        describable.methods[0].source,
        ImplementationSource::DuckTyped { offset: 0 }
    );
    assert!(definition
        .required_interface(RequirementKind::ComposedInterface, f.auditable)
        .is_some());
}

#[test]
fn test_ambiguous_duck_typing_is_an_internal_fault() {
    let mut f = fixture();
    // Only reachable by bypassing the builder's duplicate-method check
    let duplicate = MethodRef(f.universe.methods.len() as u32);
    let descriptor: MethodDescriptor = f.universe.method(f.leaf_describe).clone();
    f.universe.methods.push(descriptor);
    f.universe.types[f.leaf.index()].methods.push(duplicate);

    let ctx = context(&f, f.leaf, vec![mixin(f.logging)]);
    let err = build(&f, &ctx).unwrap_err();
    assert_eq!(
        err,
        CompositionError::Internal(InternalFault::AmbiguousDuckTypeMatch {
            target: "Leaf".to_string(),
            interface: "IDescribable".to_string(),
            method: "Describe(): String".to_string(),
            offset: 0,
            count: 2,
        })
    );
}

#[test]
fn test_limits_are_enforced() {
    let f = fixture();
    let config = WeaveConfig {
        max_mixins_per_class: 1,
        ..WeaveConfig::default()
    };
    let ctx = context(&f, f.leaf, vec![mixin(f.logging), mixin(f.caching)]);
    let err = TargetClassDefinitionBuilder::new(&f.universe)
        .with_config(&config)
        .build(&ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        CompositionError::Configuration(ConfigurationError::LimitExceeded { what: "mixins", limit: 1, .. })
    ));

    let config = WeaveConfig {
        max_inheritance_depth: 1,
        ..WeaveConfig::default()
    };
    let err = TargetClassDefinitionBuilder::new(&f.universe)
        .with_config(&config)
        .build(&ClassContext::empty(f.leaf))
        .unwrap_err();
    assert!(matches!(
        err,
        CompositionError::Configuration(ConfigurationError::LimitExceeded {
            what: "inheritance levels",
            ..
        })
    ));
}

#[test]
fn test_describe_lists_mixins_and_overrides() {
    let f = fixture();
    let ctx = context(&f, f.leaf, vec![mixin(f.logging), mixin(f.caching), mixin(f.audit)]);
    let text = build(&f, &ctx).unwrap().describe(&f.universe);
    assert!(text.starts_with("Leaf\n"));
    assert!(text.contains("    LoggingMixin (extends)\n"));
    assert!(text.contains("    Root.Save() <- LoggingMixin <- CachingMixin\n"));
    assert!(text.contains("    IAuditable by AuditMixin\n"));
    assert!(text.contains("    IDescribable (target call, 1 methods)\n"));
}
