//! `Entity` and `World`: a concrete collaborator record pairing an
//! attribute set, a tag container, and an effects manager (§3), plus a
//! minimal in-process registry hosts and tests can drive without building
//! their own `SourceLookup` (§9 Design Notes).
//!
//! Forge's core types never own an entity or dereference a [`SourceId`]
//! directly — a host with its own ECS/storage calls [`crate::manager::EffectsManager`]
//! methods straight against its own `AttributeSet`s. `World` below is a
//! convenience for callers who don't have that storage already: it resolves
//! cross-entity `source` reads by cloning the snapshot rather than trying to
//! hold two live borrows into the same map, which is a tradeoff only worth
//! making here, not in the core manager path.

use std::collections::HashMap;

use crate::attribute_set::AttributeSet;
use crate::cue::CueSink;
use crate::effect::{ContextPayload, Effect};
use crate::error::ForgeResult;
use crate::handle::EffectHandle;
use crate::magnitude::{SourceId, SourceLookup};
use crate::manager::{EffectsManager, EffectsManagerConfig};
use crate::tags::GameplayTagContainer;

/// One gameplay entity: its attributes, its base tags (distinct from the
/// tags effects grant it, tracked separately by `effects.modifier_tags()`),
/// and its own effects manager.
pub struct Entity {
    attributes: AttributeSet,
    tags: GameplayTagContainer,
    effects: EffectsManager,
}

impl Entity {
    pub fn new(attributes: AttributeSet) -> Self {
        Self {
            attributes,
            tags: GameplayTagContainer::new(),
            effects: EffectsManager::default(),
        }
    }

    pub fn with_config(attributes: AttributeSet, config: EffectsManagerConfig) -> Self {
        Self {
            attributes,
            tags: GameplayTagContainer::new(),
            effects: EffectsManager::new(config),
        }
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    pub fn tags(&self) -> &GameplayTagContainer {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut GameplayTagContainer {
        &mut self.tags
    }

    pub fn effects(&self) -> &EffectsManager {
        &self.effects
    }

    /// The union of this entity's own tags and the tags its active effects
    /// grant it — what application/ongoing requirement gates are checked
    /// against (§4.7).
    pub fn combined_tags(&self) -> GameplayTagContainer {
        self.tags.union(self.effects.modifier_tags())
    }
}

/// A [`SourceLookup`] over a fixed snapshot of attribute sets, cloned once
/// per [`World::update_all`] call so every entity's recompute/tick sees a
/// consistent cross-entity view for that tick without aliasing the entity
/// it's currently mutating.
struct SnapshotSources(HashMap<SourceId, AttributeSet>);

impl SourceLookup for SnapshotSources {
    fn attribute_set(&self, source: SourceId) -> Option<&AttributeSet> {
        self.0.get(&source)
    }
}

/// A minimal in-process entity registry. Assigns [`SourceId`]s on
/// [`World::spawn`] and keeps every [`Entity`] keyed by it.
#[derive(Default)]
pub struct World {
    entities: HashMap<SourceId, Entity>,
    next_id: SourceId,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, attributes: AttributeSet) -> SourceId {
        let id = self.next_id;
        self.next_id += 1;
        self.entities.insert(id, Entity::new(attributes));
        id
    }

    pub fn despawn(&mut self, id: SourceId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: SourceId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Applies `effect` to `target`. `effect.source` (if set and live) is
    /// resolved to a cloned attribute-set snapshot taken before `target` is
    /// touched — including when `source == target`, i.e. a self-targeted
    /// effect reading its own attributes for an `AttributeBased` magnitude.
    pub fn apply_effect(
        &mut self,
        target: SourceId,
        effect: Effect,
        payload: Option<&ContextPayload>,
        cues: &mut dyn CueSink,
    ) -> ForgeResult<Option<EffectHandle>> {
        let source_snapshot = effect
            .source
            .and_then(|source| self.entities.get(&source))
            .map(|entity| entity.attributes.clone());

        let Some(entity) = self.entities.get_mut(&target) else {
            return Ok(None);
        };
        entity.effects.apply_effect(
            effect,
            &mut entity.attributes,
            &entity.tags,
            source_snapshot.as_ref(),
            payload,
            cues,
        )
    }

    pub fn unapply_effect(
        &mut self,
        target: SourceId,
        handle: EffectHandle,
        force_remove_all_stacks: bool,
        cues: &mut dyn CueSink,
    ) -> ForgeResult<()> {
        let source_snapshot = self
            .entities
            .get(&target)
            .and_then(|entity| entity.effects.source_of(handle))
            .and_then(|source| self.entities.get(&source))
            .map(|entity| entity.attributes.clone());

        let Some(entity) = self.entities.get_mut(&target) else {
            return Ok(());
        };
        entity.effects.unapply_effect(
            handle,
            &mut entity.attributes,
            force_remove_all_stacks,
            source_snapshot.as_ref(),
            cues,
        )
    }

    /// Advances every entity's effects by `dt` seconds. Cross-entity
    /// `source` captures see a snapshot taken at the start of this call, not
    /// a live view — any attribute change another entity's tick makes this
    /// same frame is visible starting next frame, not retroactively within
    /// it. This matches how most hosts batch a tick already (resolve, then
    /// apply), and sidesteps needing two live borrows into `self.entities`.
    pub fn update_all(&mut self, dt: f64, cues: &mut dyn CueSink) {
        let snapshot: HashMap<SourceId, AttributeSet> = self
            .entities
            .iter()
            .map(|(id, entity)| (*id, entity.attributes.clone()))
            .collect();
        let sources = SnapshotSources(snapshot);

        for entity in self.entities.values_mut() {
            let base_tags = entity.tags.clone();
            entity
                .effects
                .update_effects(dt, &mut entity.attributes, &base_tags, &sources, cues);
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl SourceLookup for World {
    fn attribute_set(&self, source: SourceId) -> Option<&AttributeSet> {
        self.entities.get(&source).map(|entity| &entity.attributes)
    }
}
