//! Inheritance-aware custom attribute retrieval.
//!
//! Walks a member's override chain and merges declared and inherited
//! attributes according to the [`AttributeUsage`] of each concrete
//! attribute type.

use std::collections::HashMap;

use crate::types::{
    AttributeInstance, AttributeUsage, MemberRef, MethodRef, OverrideChainResolver, TypeRef,
    TypeUniverse,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("Member '{member}' carries {count} attributes of type '{attribute}', expected at most one")]
    AmbiguousAttribute {
        member: String,
        attribute: String,
        count: usize,
    },
}

/// Retrieves attributes of members of a [`TypeUniverse`], resolving base
/// members through `R`.
pub struct AttributeRetriever<'u, R: OverrideChainResolver = TypeUniverse> {
    universe: &'u TypeUniverse,
    resolver: &'u R,
}

impl<'u> AttributeRetriever<'u, TypeUniverse> {
    pub fn new(universe: &'u TypeUniverse) -> Self {
        Self {
            universe,
            resolver: universe,
        }
    }
}

impl<'u, R: OverrideChainResolver> AttributeRetriever<'u, R> {
    pub fn with_resolver(universe: &'u TypeUniverse, resolver: &'u R) -> Self {
        Self { universe, resolver }
    }

    fn matching(&self, member: MemberRef, attribute_type: TypeRef) -> impl Iterator<Item = &'u AttributeInstance> + '_ {
        let universe = self.universe;
        universe
            .attributes_of(member)
            .iter()
            .filter(move |a| universe.is_assignable_from(attribute_type, a.attribute_type))
    }

    /// Resolves a base accessor back to the property or event declaring it
    fn base_accessor_owner(
        &self,
        accessor: Option<MethodRef>,
        name: &str,
        lookup: impl Fn(TypeRef, &str) -> Option<MemberRef>,
    ) -> Option<MemberRef> {
        let base = self.resolver.base_definition(accessor?)?;
        lookup(self.universe.method(base).declaring_type, name)
    }

    /// The member `member` overrides, if any
    pub fn base_member(&self, member: MemberRef) -> Option<MemberRef> {
        let universe = self.universe;
        match member {
            MemberRef::Type(ty) => universe.descriptor(ty).base.map(MemberRef::Type),
            MemberRef::Method(method) => self.resolver.base_definition(method).map(MemberRef::Method),
            MemberRef::Property(property) => {
                let p = universe.property(property);
                self.base_accessor_owner(p.getter.or(p.setter), &p.name, |ty, name| {
                    universe.declared_property(ty, name).map(MemberRef::Property)
                })
            }
            MemberRef::Event(event) => {
                let e = universe.event(event);
                self.base_accessor_owner(Some(e.add_method), &e.name, |ty, name| {
                    universe.declared_event(ty, name).map(MemberRef::Event)
                })
            }
        }
    }

    /// Attributes of `attribute_type` (or a subtype) on `member`.
    ///
    /// With `inherit`, attributes from base members follow, nearest first.
    /// A base attribute is included only if its type is inherited, and a
    /// type already contributed by a closer declaration only if it also
    /// allows multiple instances.
    pub fn get_custom_attributes(
        &self,
        member: MemberRef,
        attribute_type: TypeRef,
        inherit: bool,
    ) -> Vec<&'u AttributeInstance> {
        let mut result: Vec<&'u AttributeInstance> = self.matching(member, attribute_type).collect();
        if !inherit {
            return result;
        }

        let mut visited: HashMap<TypeRef, AttributeUsage> = result
            .iter()
            .map(|a| (a.attribute_type, self.universe.attribute_usage(a.attribute_type)))
            .collect();

        let mut current = self.base_member(member);
        while let Some(base) = current {
            for attribute in self.matching(base, attribute_type) {
                let concrete = attribute.attribute_type;
                match visited.get(&concrete) {
                    None => {
                        let usage = self.universe.attribute_usage(concrete);
                        visited.insert(concrete, usage);
                        if usage.inherited {
                            result.push(attribute);
                        }
                    }
                    Some(usage) if usage.inherited && usage.allow_multiple => result.push(attribute),
                    Some(_) => {}
                }
            }
            current = self.base_member(base);
        }
        result
    }

    pub fn is_defined(&self, member: MemberRef, attribute_type: TypeRef, inherit: bool) -> bool {
        !self.get_custom_attributes(member, attribute_type, inherit).is_empty()
    }

    /// The single matching attribute, if any
    pub fn get_custom_attribute(
        &self,
        member: MemberRef,
        attribute_type: TypeRef,
        inherit: bool,
    ) -> Result<Option<&'u AttributeInstance>, AttributeError> {
        let attributes = self.get_custom_attributes(member, attribute_type, inherit);
        match attributes.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(*single)),
            many => Err(AttributeError::AmbiguousAttribute {
                member: self.universe.member_display(member),
                attribute: self.universe.name(attribute_type).to_string(),
                count: many.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{Accessors, AttributeArgument, PropertyRef, Signature, TypeUniverseBuilder};

    const SINGLE: AttributeUsage = AttributeUsage {
        inherited: true,
        allow_multiple: false,
    };

    struct Chain {
        universe: TypeUniverse,
        marker: TypeRef,
        attrs: [TypeRef; 3],
        properties: [PropertyRef; 3],
    }

    /// `Top : Middle : Bottom`, each level overriding `Name` and declaring
    /// its own attribute type derived from `Marker`.
    fn property_chain(usages: [AttributeUsage; 3]) -> Chain {
        let mut b = TypeUniverseBuilder::new();
        let string = b.add_class("String", None).unwrap();
        let marker = b.add_attribute_class("MarkerAttribute", None, SINGLE).unwrap();
        let attrs = [
            b.add_attribute_class("TopAttribute", Some(marker), usages[0]).unwrap(),
            b.add_attribute_class("MiddleAttribute", Some(marker), usages[1]).unwrap(),
            b.add_attribute_class("BottomAttribute", Some(marker), usages[2]).unwrap(),
        ];
        let bottom = b.add_class("Bottom", None).unwrap();
        let middle = b.add_class("Middle", Some(bottom)).unwrap();
        let top = b.add_class("Top", Some(middle)).unwrap();

        let p_bottom = b.add_property(bottom, "Name", string, Accessors::READ_WRITE).unwrap();
        let p_middle = b.add_property_override(middle, p_bottom).unwrap();
        let p_top = b.add_property_override(top, p_middle).unwrap();
        let properties = [p_top, p_middle, p_bottom];

        for (property, attr) in properties.iter().zip(attrs.iter()) {
            b.add_attribute(MemberRef::Property(*property), AttributeInstance::new(*attr))
                .unwrap();
        }
        Chain {
            universe: b.build().unwrap(),
            marker,
            attrs,
            properties,
        }
    }

    fn types_of(attributes: &[&AttributeInstance]) -> Vec<TypeRef> {
        attributes.iter().map(|a| a.attribute_type).collect()
    }

    #[test]
    fn test_three_level_chain_returns_nearest_first() {
        let chain = property_chain([SINGLE; 3]);
        let retriever = AttributeRetriever::new(&chain.universe);
        let result = retriever.get_custom_attributes(MemberRef::Property(chain.properties[0]), chain.marker, true);
        assert_eq!(types_of(&result), chain.attrs.to_vec());
    }

    #[test]
    fn test_non_inherited_base_attribute_is_excluded() {
        let chain = property_chain([
            SINGLE,
            SINGLE,
            AttributeUsage {
                inherited: false,
                allow_multiple: false,
            },
        ]);
        let retriever = AttributeRetriever::new(&chain.universe);
        let result = retriever.get_custom_attributes(MemberRef::Property(chain.properties[0]), chain.marker, true);
        assert_eq!(types_of(&result), vec![chain.attrs[0], chain.attrs[1]]);
    }

    #[test]
    fn test_without_inherit_only_declared_attributes() {
        let chain = property_chain([SINGLE; 3]);
        let retriever = AttributeRetriever::new(&chain.universe);
        for (idx, property) in chain.properties.iter().enumerate() {
            let result = retriever.get_custom_attributes(MemberRef::Property(*property), chain.marker, false);
            assert_eq!(types_of(&result), vec![chain.attrs[idx]]);
        }
    }

    #[test]
    fn test_filter_by_concrete_attribute_type() {
        let chain = property_chain([SINGLE; 3]);
        let retriever = AttributeRetriever::new(&chain.universe);
        let top = MemberRef::Property(chain.properties[0]);
        assert!(retriever.is_defined(top, chain.attrs[2], true));
        assert!(!retriever.is_defined(top, chain.attrs[2], false));
        assert_eq!(
            retriever.base_member(top),
            Some(MemberRef::Property(chain.properties[1]))
        );
        assert_eq!(retriever.base_member(MemberRef::Property(chain.properties[2])), None);
    }

    struct Methods {
        universe: TypeUniverse,
        tag: TypeRef,
        unique: TypeRef,
        derived_method: MethodRef,
    }

    fn method_chain() -> Methods {
        let mut b = TypeUniverseBuilder::new();
        let tag = b
            .add_attribute_class("TagAttribute", None, AttributeUsage {
                inherited: true,
                allow_multiple: true,
            })
            .unwrap();
        let unique = b.add_attribute_class("UniqueAttribute", None, SINGLE).unwrap();
        let base = b.add_class("Base", None).unwrap();
        let derived = b.add_class("Derived", Some(base)).unwrap();
        let base_method = b.add_virtual_method(base, "Run", Signature::void()).unwrap();
        let derived_method = b.add_override(derived, base_method).unwrap();

        let tagged = |text: &str| {
            AttributeInstance::new(tag).with_argument(AttributeArgument::Text(text.to_string()))
        };
        b.add_attribute(MemberRef::Method(derived_method), tagged("derived")).unwrap();
        b.add_attribute(MemberRef::Method(derived_method), AttributeInstance::new(unique))
            .unwrap();
        b.add_attribute(MemberRef::Method(base_method), tagged("base")).unwrap();
        b.add_attribute(MemberRef::Method(base_method), AttributeInstance::new(unique))
            .unwrap();
        Methods {
            universe: b.build().unwrap(),
            tag,
            unique,
            derived_method,
        }
    }

    #[test]
    fn test_allow_multiple_accumulates_across_levels() {
        let m = method_chain();
        let retriever = AttributeRetriever::new(&m.universe);
        let result = retriever.get_custom_attributes(MemberRef::Method(m.derived_method), m.tag, true);
        let texts: Vec<Option<&str>> = result.iter().map(|a| a.text_argument()).collect();
        assert_eq!(texts, vec![Some("derived"), Some("base")]);
    }

    #[test]
    fn test_single_use_attribute_is_not_repeated() {
        let m = method_chain();
        let retriever = AttributeRetriever::new(&m.universe);
        let member = MemberRef::Method(m.derived_method);
        assert_eq!(retriever.get_custom_attributes(member, m.unique, true).len(), 1);
        assert!(retriever.get_custom_attribute(member, m.unique, true).unwrap().is_some());

        let err = retriever.get_custom_attribute(member, m.tag, true).unwrap_err();
        assert_eq!(
            err,
            AttributeError::AmbiguousAttribute {
                member: "Derived.Run()".to_string(),
                attribute: "TagAttribute".to_string(),
                count: 2,
            }
        );
    }

    struct NoOverrides;

    impl OverrideChainResolver for NoOverrides {
        fn base_definition(&self, _method: MethodRef) -> Option<MethodRef> {
            None
        }
    }

    #[test]
    fn test_resolver_controls_the_walk() {
        let m = method_chain();
        let resolver = NoOverrides;
        let retriever = AttributeRetriever::with_resolver(&m.universe, &resolver);
        let result = retriever.get_custom_attributes(MemberRef::Method(m.derived_method), m.tag, true);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_events_walk_through_add_accessor() {
        let mut b = TypeUniverseBuilder::new();
        let handler = b.add_class("Handler", None).unwrap();
        let note = b.add_attribute_class("NoteAttribute", None, SINGLE).unwrap();
        let base = b.add_class("Base", None).unwrap();
        let derived = b.add_class("Derived", Some(base)).unwrap();
        let base_event = b.add_event(base, "Changed", handler).unwrap();
        let derived_event = b.add_event_override(derived, base_event).unwrap();
        b.add_attribute(MemberRef::Event(base_event), AttributeInstance::new(note))
            .unwrap();
        let universe = b.build().unwrap();

        let retriever = AttributeRetriever::new(&universe);
        let derived = MemberRef::Event(derived_event);
        assert!(retriever.get_custom_attributes(derived, note, false).is_empty());
        assert_eq!(retriever.get_custom_attributes(derived, note, true).len(), 1);
    }
}
