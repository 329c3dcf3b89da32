//! Mixin suppression rules.
//!
//! A rule `(replacing, suppressed)` removes every association whose type is
//! `suppressed` or derives from it. When `suppressed` is an open generic
//! definition, a type whose base chain contains one of its specializations
//! is removed too. The replacing type and anything derived from it
//! always survive, so a mixin can replace the tree it belongs to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::types::{TypeRef, TypeUniverse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuppressionRule {
    replacing: TypeRef,
    suppressed: TypeRef,
}

impl SuppressionRule {
    /// Fails when a mixin would suppress itself
    pub fn new(
        universe: &TypeUniverse,
        replacing: TypeRef,
        suppressed: TypeRef,
    ) -> Result<Self, ConfigurationError> {
        if replacing == suppressed {
            return Err(ConfigurationError::SelfSuppression {
                mixin: universe.name(replacing).to_string(),
            });
        }
        Ok(Self {
            replacing,
            suppressed,
        })
    }

    pub fn replacing(&self) -> TypeRef {
        self.replacing
    }

    pub fn suppressed(&self) -> TypeRef {
        self.suppressed
    }

    /// Whether the association registered under `key` is removed by this rule
    pub fn affects(&self, universe: &TypeUniverse, key: TypeRef) -> bool {
        let protected = key == self.replacing || universe.is_assignable_from(self.replacing, key);
        if protected {
            return false;
        }
        key == self.suppressed
            || universe.is_specialization_of(key, self.suppressed)
            || universe.can_ascribe_to(key, self.suppressed)
    }

    /// Removes the affected entries of `configured` in place, keeping order
    pub fn remove_affected_mixins<V>(&self, universe: &TypeUniverse, configured: &mut IndexMap<TypeRef, V>) {
        configured.retain(|key, _| {
            let remove = self.affects(universe, *key);
            if remove {
                tracing::debug!(
                    suppressed = universe.name(*key),
                    replacing = universe.name(self.replacing),
                    "mixin suppressed"
                );
            }
            !remove
        });
    }
}

/// Applies `rules` in order, each to the entries surviving the previous one
pub fn remove_affected_mixins<V>(
    universe: &TypeUniverse,
    rules: &[SuppressionRule],
    mut configured: IndexMap<TypeRef, V>,
) -> IndexMap<TypeRef, V> {
    for rule in rules {
        rule.remove_affected_mixins(universe, &mut configured);
    }
    configured
}
