//! The tag registry / tag-container collaborator.
//!
//! Spec §1 scopes the tag registry and tag-container algebra out as an
//! external collaborator with a stated interface (§6): interned tags,
//! hierarchical containment (`"color" ⊇ "color.red"`), set operations
//! (`∪, ∩, ⊆`), and a small query language. This module implements exactly
//! that interface — nothing about tag editing, asset-backed tag trees, or
//! tag-driven UI lives here.

use std::collections::HashMap;
use std::fmt;

use string_cache::DefaultAtom;

/// An interned, dot-hierarchical gameplay tag (e.g. `"Status.Debuff.Burning"`).
///
/// Equality and hashing are by interned key, matching §6 ("Tags are
/// interned; equality is by interned key").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameplayTag(DefaultAtom);

impl GameplayTag {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(DefaultAtom::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments of the dotted path, e.g. `"a.b.c"` -> `["a", "b", "c"]`.
    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// `self ⊇ other`: true when `other` is this tag or a descendant of it.
    ///
    /// `GameplayTag::new("color").is_ancestor_of(&GameplayTag::new("color.red"))`
    /// is `true`; containment is reflexive.
    pub fn is_ancestor_of(&self, other: &GameplayTag) -> bool {
        let mut mine = self.segments();
        let mut theirs = other.segments();
        loop {
            match (mine.next(), theirs.next()) {
                (None, _) => return true,
                (Some(_), None) => return false,
                (Some(a), Some(b)) if a == b => continue,
                _ => return false,
            }
        }
    }
}

impl fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameplayTag {
    fn from(value: &str) -> Self {
        GameplayTag::new(value)
    }
}

/// A set of tags, each held with a reference count (adding the same tag
/// twice keeps it present until it's removed twice). This is what an
/// `Entity`'s combined tag state and an effect's granted-tags set are built
/// from.
#[derive(Debug, Clone, Default)]
pub struct GameplayTagContainer {
    counts: HashMap<GameplayTag, u32>,
}

impl GameplayTagContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one reference to `tag`.
    pub fn add(&mut self, tag: GameplayTag) {
        *self.counts.entry(tag).or_insert(0) += 1;
    }

    /// Removes one reference to `tag`. A no-op if the tag isn't present.
    pub fn remove(&mut self, tag: &GameplayTag) {
        if let Some(count) = self.counts.get_mut(tag) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(tag);
            }
        }
    }

    /// True if `tag`, or any tag this container holds that `tag` is an
    /// ancestor of, is present (hierarchical match).
    pub fn has_matching_tag(&self, tag: &GameplayTag) -> bool {
        self.counts.keys().any(|held| tag.is_ancestor_of(held))
    }

    /// True if every tag in `required` matches (§6: `⊆`, hierarchical).
    pub fn contains_all(&self, required: &[GameplayTag]) -> bool {
        required.iter().all(|t| self.has_matching_tag(t))
    }

    /// True if at least one tag in `tags` matches.
    pub fn contains_any(&self, tags: &[GameplayTag]) -> bool {
        tags.iter().any(|t| self.has_matching_tag(t))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `self ∪ other`, as a fresh container (reference counts summed).
    pub fn union(&self, other: &GameplayTagContainer) -> GameplayTagContainer {
        let mut result = self.clone();
        for (tag, count) in &other.counts {
            *result.counts.entry(tag.clone()).or_insert(0) += count;
        }
        result
    }
}

/// An `application` / `removal` / `ongoing` tag-requirement set for a single
/// gate (§4.7): `(required ⊆ combined?) AND (ignored ∩ combined == ∅) AND
/// query.Matches(combined)`.
#[derive(Debug, Clone, Default)]
pub struct TagRequirements {
    pub required: Vec<GameplayTag>,
    pub ignored: Vec<GameplayTag>,
    pub query: Option<TagQuery>,
}

impl TagRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.required.push(tag.into());
        self
    }

    pub fn ignore(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.ignored.push(tag.into());
        self
    }

    pub fn with_query(mut self, query: TagQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.ignored.is_empty() && self.query.is_none()
    }

    /// Evaluates this requirement set against a combined tag container.
    pub fn is_satisfied_by(&self, combined: &GameplayTagContainer) -> bool {
        if !combined.contains_all(&self.required) {
            return false;
        }
        if combined.contains_any(&self.ignored) {
            return false;
        }
        match &self.query {
            Some(query) => query.matches(combined),
            None => true,
        }
    }
}

/// The query language named in §6: `AllExpressionsMatch`, `AnyTagsMatch`,
/// `NoExpressionsMatch`, `AllTagsMatch`.
#[derive(Debug, Clone)]
pub enum TagQuery {
    /// Every sub-expression must match.
    AllExpressionsMatch(Vec<TagQuery>),
    /// Every one of these tags must be present.
    AllTagsMatch(Vec<GameplayTag>),
    /// At least one of these tags must be present.
    AnyTagsMatch(Vec<GameplayTag>),
    /// None of these sub-expressions may match.
    NoExpressionsMatch(Vec<TagQuery>),
}

impl TagQuery {
    pub fn matches(&self, container: &GameplayTagContainer) -> bool {
        match self {
            TagQuery::AllExpressionsMatch(exprs) => exprs.iter().all(|e| e.matches(container)),
            TagQuery::AllTagsMatch(tags) => container.contains_all(tags),
            TagQuery::AnyTagsMatch(tags) => container.contains_any(tags),
            TagQuery::NoExpressionsMatch(exprs) => !exprs.iter().any(|e| e.matches(container)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchical_containment() {
        let color = GameplayTag::new("color");
        let red = GameplayTag::new("color.red");
        let blue = GameplayTag::new("color.blue");
        assert!(color.is_ancestor_of(&red));
        assert!(color.is_ancestor_of(&color));
        assert!(!red.is_ancestor_of(&color));
        assert!(!red.is_ancestor_of(&blue));
    }

    #[test]
    fn container_ref_counting() {
        let mut container = GameplayTagContainer::new();
        let stunned = GameplayTag::new("State.Stunned");
        container.add(stunned.clone());
        container.add(stunned.clone());
        assert!(container.has_matching_tag(&stunned));
        container.remove(&stunned);
        assert!(container.has_matching_tag(&stunned));
        container.remove(&stunned);
        assert!(!container.has_matching_tag(&stunned));
    }

    #[test]
    fn hierarchical_match_via_container() {
        let mut container = GameplayTagContainer::new();
        container.add(GameplayTag::new("Status.Debuff.Burning"));
        assert!(container.has_matching_tag(&GameplayTag::new("Status")));
        assert!(container.has_matching_tag(&GameplayTag::new("Status.Debuff")));
        assert!(!container.has_matching_tag(&GameplayTag::new("Status.Buff")));
    }

    #[test]
    fn requirement_gate() {
        let mut container = GameplayTagContainer::new();
        container.add(GameplayTag::new("State.Alive"));

        let requirements = TagRequirements::new()
            .require(GameplayTag::new("State.Alive"))
            .ignore(GameplayTag::new("State.Stunned"));
        assert!(requirements.is_satisfied_by(&container));

        container.add(GameplayTag::new("State.Stunned"));
        assert!(!requirements.is_satisfied_by(&container));
    }

    #[test]
    fn query_combinators() {
        let mut container = GameplayTagContainer::new();
        container.add(GameplayTag::new("A"));
        container.add(GameplayTag::new("B"));

        let all = TagQuery::AllTagsMatch(vec![GameplayTag::new("A"), GameplayTag::new("B")]);
        assert!(all.matches(&container));

        let any = TagQuery::AnyTagsMatch(vec![GameplayTag::new("C"), GameplayTag::new("B")]);
        assert!(any.matches(&container));

        let none = TagQuery::NoExpressionsMatch(vec![all.clone()]);
        assert!(!none.matches(&container));
    }
}
