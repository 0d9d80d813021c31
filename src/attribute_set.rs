//! `AttributeSet`: a named bag of attributes registered on an entity (§3).

use std::collections::HashMap;

use crate::attribute::{Attribute, AttributeKey};

/// A named collection of [`Attribute`]s. Invariants (enforced by
/// construction of the attributes it holds, not re-checked here): keys
/// unique per set, `Min <= Base <= Max`, `CurrentValue in [Min, Max]`.
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    name: String,
    attributes: HashMap<AttributeKey, Attribute>,
}

impl AttributeSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers an attribute. Returns the previous attribute under the same
    /// key, if any (keys are unique per entity per §3, so callers that don't
    /// intend a replace should check for `None`).
    pub fn register(&mut self, attribute: Attribute) -> Option<Attribute> {
        self.attributes.insert(attribute.key().clone(), attribute)
    }

    pub fn get(&self, key: &AttributeKey) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    pub fn get_mut(&mut self, key: &AttributeKey) -> Option<&mut Attribute> {
        self.attributes.get_mut(key)
    }

    pub fn contains(&self, key: &AttributeKey) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Attribute> {
        self.attributes.values_mut()
    }
}
