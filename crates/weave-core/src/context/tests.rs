use pretty_assertions::assert_eq;

use super::serialization::{
    ArrayClassContextDeserializer, ArrayClassContextSerializer, ContextValue, SerializationError,
    MAX_NESTING,
};
use super::*;
use crate::types::{TypeKind, TypeUniverseBuilder};

struct Fixture {
    universe: TypeUniverse,
    customer: TypeRef,
    premium: TypeRef,
    logging: TypeRef,
    verbose: TypeRef,
    caching: TypeRef,
    audit: TypeRef,
    audit_customer: TypeRef,
    disposable: TypeRef,
}

fn fixture() -> Fixture {
    let mut b = TypeUniverseBuilder::new();
    let customer = b.add_class("Customer", None).unwrap();
    let premium = b.add_class("PremiumCustomer", Some(customer)).unwrap();
    let logging = b.add_class("LoggingMixin", None).unwrap();
    let verbose = b.add_class("VerboseLoggingMixin", Some(logging)).unwrap();
    let caching = b.add_class("CachingMixin", None).unwrap();
    let audit = b
        .add_generic_definition("AuditMixin<T>", TypeKind::Class, &["T"], None)
        .unwrap();
    let audit_customer = b.specialize(audit, &[customer]).unwrap();
    let disposable = b.add_interface("IDisposable", &[]).unwrap();
    Fixture {
        universe: b.build().unwrap(),
        customer,
        premium,
        logging,
        verbose,
        caching,
        audit,
        audit_customer,
        disposable,
    }
}

fn mixin(ty: TypeRef) -> MixinContext {
    MixinContext::new(ty, MixinContextOrigin::imperative("tests"))
}

#[test]
fn test_empty_context() {
    let f = fixture();
    let context = ClassContext::empty(f.customer);
    assert!(context.is_empty());

    let with_interface = ClassContext::new(&f.universe, f.customer, [], [f.disposable]).unwrap();
    assert!(!with_interface.is_empty());
}

#[test]
fn test_duplicate_mixin_is_rejected() {
    let f = fixture();
    let err = ClassContext::new(
        &f.universe,
        f.customer,
        [mixin(f.logging), mixin(f.logging).with_kind(MixinKind::Used)],
        [],
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::DuplicateMixin {
            target: "Customer".to_string(),
            mixin: "LoggingMixin".to_string(),
        }
    );
}

#[test]
fn test_duplicate_composed_interface_is_rejected() {
    let f = fixture();
    let err = ClassContext::new(&f.universe, f.customer, [], [f.disposable, f.disposable]).unwrap_err();
    assert!(matches!(err, ConfigurationError::DuplicateComposedInterface { .. }));
}

#[test]
fn test_mixins_keep_declaration_order() {
    let f = fixture();
    let context = ClassContext::new(
        &f.universe,
        f.customer,
        [mixin(f.caching), mixin(f.logging), mixin(f.audit_customer)],
        [],
    )
    .unwrap();
    let order: Vec<TypeRef> = context.mixins().map(|m| m.mixin_type()).collect();
    assert_eq!(order, vec![f.caching, f.logging, f.audit_customer]);
    assert!(context.contains_assignable_mixin(&f.universe, f.logging));
    assert!(!context.contains_assignable_mixin(&f.universe, f.verbose));
}

#[test]
fn test_equality_ignores_order() {
    let f = fixture();
    let a = ClassContext::new(
        &f.universe,
        f.customer,
        [mixin(f.caching), mixin(f.logging)],
        [f.disposable],
    )
    .unwrap();
    let b = ClassContext::new(
        &f.universe,
        f.customer,
        [mixin(f.logging), mixin(f.caching)],
        [f.disposable],
    )
    .unwrap();
    assert_eq!(a, b);

    let c = ClassContext::new(
        &f.universe,
        f.customer,
        [mixin(f.logging).with_kind(MixinKind::Used), mixin(f.caching)],
        [f.disposable],
    )
    .unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_inherit_from_skips_overridden_mixins() {
    let f = fixture();
    let base = ClassContext::new(
        &f.universe,
        f.customer,
        [mixin(f.logging), mixin(f.caching), mixin(f.audit_customer)],
        [f.disposable],
    )
    .unwrap();
    let derived = ClassContext::new(&f.universe, f.premium, [mixin(f.verbose)], []).unwrap();

    let combined = derived.inherit_from(&f.universe, [&base]);
    let order: Vec<TypeRef> = combined.mixins().map(|m| m.mixin_type()).collect();
    assert_eq!(order, vec![f.caching, f.audit_customer, f.verbose]);
    assert_eq!(combined.class_type(), f.premium);
    assert_eq!(combined.composed_interfaces(), &[f.disposable]);
}

#[test]
fn test_inherit_from_generic_definition_override() {
    let f = fixture();
    let base = ClassContext::new(&f.universe, f.customer, [mixin(f.audit)], []).unwrap();
    let derived = ClassContext::new(&f.universe, f.premium, [mixin(f.audit_customer)], []).unwrap();
    let combined = derived.inherit_from(&f.universe, [&base]);
    assert_eq!(combined.mixin_count(), 1);
    assert!(combined.contains_mixin(f.audit_customer));
}

#[test]
fn test_suppress_mixins_returns_filtered_copy() {
    let f = fixture();
    let context = ClassContext::new(
        &f.universe,
        f.customer,
        [mixin(f.verbose), mixin(f.caching)],
        [],
    )
    .unwrap();
    let rule = SuppressionRule::new(&f.universe, f.caching, f.logging).unwrap();
    let suppressed = context.suppress_mixins(&f.universe, &[rule]);
    assert_eq!(suppressed.mixin_count(), 1);
    assert!(suppressed.contains_mixin(f.caching));
    assert_eq!(context.mixin_count(), 2);
}

#[test]
fn test_array_round_trip_preserves_everything() {
    let f = fixture();
    let context = ClassContext::new(
        &f.universe,
        f.customer,
        [
            mixin(f.logging)
                .with_kind(MixinKind::Used)
                .with_visibility(MemberVisibility::Public)
                .with_dependency(f.caching)
                .with_dependency(f.disposable),
            MixinContext::new(
                f.audit_customer,
                MixinContextOrigin::new("UsesAttribute", "billing", "Customer"),
            ),
        ],
        [f.disposable],
    )
    .unwrap();

    let array = ArrayClassContextSerializer::new(&f.universe).serialize(&context);
    let bytes = array.to_bytes().unwrap();
    let decoded = ContextValue::from_bytes(&bytes).unwrap();
    let restored = ArrayClassContextDeserializer::new(&f.universe)
        .deserialize(&decoded)
        .unwrap();

    assert_eq!(restored, context);
    let logging = restored.mixin(f.logging).unwrap();
    assert_eq!(logging.explicit_dependencies(), &[f.caching, f.disposable]);
    assert_eq!(logging.origin(), &MixinContextOrigin::imperative("tests"));
}

#[test]
fn test_deserialize_rejects_unknown_types() {
    let f = fixture();
    let value = ContextValue::Array(vec![
        ContextValue::Text("Missing".to_string()),
        ContextValue::Array(Vec::new()),
        ContextValue::Array(Vec::new()),
    ]);
    let err = ArrayClassContextDeserializer::new(&f.universe)
        .deserialize(&value)
        .unwrap_err();
    assert_eq!(
        err,
        SerializationError::UnknownType {
            name: "Missing".to_string()
        }
    );
}

#[test]
fn test_deserialize_rejects_malformed_arrays() {
    let f = fixture();
    let value = ContextValue::Array(vec![
        ContextValue::Text("Customer".to_string()),
        ContextValue::Array(vec![ContextValue::Array(vec![ContextValue::Text(
            "LoggingMixin".to_string(),
        )])]),
        ContextValue::Array(Vec::new()),
    ]);
    let err = ArrayClassContextDeserializer::new(&f.universe)
        .deserialize(&value)
        .unwrap_err();
    assert!(matches!(err, SerializationError::Malformed { ref path, .. } if path == "context[1][0]"));
}

/// Same wire layout as the encoder's tokens, for hand-built inputs
#[derive(serde::Serialize)]
enum Wire {
    #[allow(dead_code)]
    Text(String),
    Number(u32),
    Array(u32),
}

fn encode(wire: &[Wire]) -> Vec<u8> {
    use bincode::Options;
    bincode::DefaultOptions::new().serialize(wire).unwrap()
}

#[test]
fn test_bytes_round_trip_at_nesting_limit() {
    let mut value = ContextValue::Number(7);
    for _ in 0..MAX_NESTING {
        value = ContextValue::Array(vec![value]);
    }
    let bytes = value.to_bytes().unwrap();
    assert_eq!(ContextValue::from_bytes(&bytes).unwrap(), value);

    let deeper = ContextValue::Array(vec![value]);
    let bytes = deeper.to_bytes().unwrap();
    assert_eq!(
        ContextValue::from_bytes(&bytes).unwrap_err(),
        SerializationError::TooDeep { limit: MAX_NESTING }
    );
}

#[test]
fn test_deeply_nested_bytes_are_rejected_without_recursion() {
    let mut wire: Vec<Wire> = (0..200_000).map(|_| Wire::Array(1)).collect();
    wire.push(Wire::Number(1));
    let err = ContextValue::from_bytes(&encode(&wire)).unwrap_err();
    assert_eq!(err, SerializationError::TooDeep { limit: MAX_NESTING });
}

#[test]
fn test_truncated_and_trailing_bytes_are_rejected() {
    let truncated = encode(&[Wire::Array(2), Wire::Number(1)]);
    assert!(matches!(
        ContextValue::from_bytes(&truncated),
        Err(SerializationError::Encoding(_))
    ));

    let trailing = encode(&[Wire::Array(1), Wire::Number(1), Wire::Number(2)]);
    assert!(matches!(
        ContextValue::from_bytes(&trailing),
        Err(SerializationError::Encoding(_))
    ));

    let empty = encode(&[Wire::Array(0)]);
    assert_eq!(
        ContextValue::from_bytes(&empty).unwrap(),
        ContextValue::Array(Vec::new())
    );
}
