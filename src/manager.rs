//! `EffectsManager`: the public surface one target's effect storage is
//! driven through — `apply_effect`, `unapply_effect`, `update_effects`,
//! `get_effect_info` (§3, §4.7).

use slotmap::SlotMap;
use tracing::{error, instrument, trace, warn};

use crate::active_effect::{ActiveEffect, ActiveEffectState, TickOutcome};
use crate::attribute_set::AttributeSet;
use crate::cue::{CueEvent, CueSink};
use crate::effect::{ContextPayload, Effect};
use crate::effect_data::StackExpirationPolicy;
use crate::error::{ForgeError, ForgeResult};
use crate::handle::EffectHandle;
use crate::magnitude::{MagnitudeContext, SourceId, SourceLookup};
use crate::stacking::{StackDecision, StackTable};
use crate::tags::GameplayTagContainer;

/// Tunables for one manager instance (SPEC_FULL.md ambient-stack section).
#[derive(Debug, Clone, Copy)]
pub struct EffectsManagerConfig {
    /// When `true`, an [`ForgeError::InvariantViolation`] reaching the
    /// manager is logged at `error!` instead of `warn!` — for hosts that
    /// treat it as a hard bug rather than a recoverable desync.
    pub strict_invariants: bool,
}

impl Default for EffectsManagerConfig {
    fn default() -> Self {
        Self {
            strict_invariants: false,
        }
    }
}

/// One target's effect storage: every [`ActiveEffect`] currently applied,
/// its stacking bookkeeping, and the union of tags its effects grant.
pub struct EffectsManager {
    active: SlotMap<EffectHandle, ActiveEffect>,
    stacks: StackTable,
    /// Union of every active effect's granted tags, ref-counted so two
    /// effects granting the same tag don't clash on removal.
    modifier_tags: GameplayTagContainer,
    config: EffectsManagerConfig,
}

impl Default for EffectsManager {
    fn default() -> Self {
        Self::new(EffectsManagerConfig::default())
    }
}

impl EffectsManager {
    pub fn new(config: EffectsManagerConfig) -> Self {
        Self {
            active: SlotMap::with_key(),
            stacks: StackTable::new(),
            modifier_tags: GameplayTagContainer::new(),
            config,
        }
    }

    /// Tags granted by currently-applied effects, independent of whatever
    /// base tags the target itself carries.
    pub fn modifier_tags(&self) -> &GameplayTagContainer {
        &self.modifier_tags
    }

    fn combined_tags(&self, base_tags: &GameplayTagContainer) -> GameplayTagContainer {
        base_tags.union(&self.modifier_tags)
    }

    fn log_error(&self, err: &ForgeError) {
        if self.config.strict_invariants {
            error!(%err, "forge invariant violation");
        } else {
            warn!(%err, "forge invariant violation");
        }
    }

    /// Applies `effect` to `target`. Returns `Ok(None)` if the effect's
    /// application requirements weren't satisfied, or if a stacking policy
    /// denied it (§4.5, §4.7) — both are ordinary outcomes, not errors.
    /// Returns `Err` only for a fatal data-shape problem (§7).
    #[instrument(skip_all, fields(effect = %effect.data.name))]
    pub fn apply_effect(
        &mut self,
        effect: Effect,
        target: &mut AttributeSet,
        base_tags: &GameplayTagContainer,
        source_attrs: Option<&AttributeSet>,
        payload: Option<&ContextPayload>,
        cues: &mut dyn CueSink,
    ) -> ForgeResult<Option<EffectHandle>> {
        let combined = self.combined_tags(base_tags);
        if !effect.data.components.application_requirements.is_empty()
            && !effect.data.components.application_requirements.is_satisfied_by(&combined)
        {
            trace!("application requirements not satisfied, skipping");
            return Ok(None);
        }

        if let Some(stacking) = &effect.data.stacking {
            let initial_count = stacking.initial_count.evaluate(effect.level).max(1) as u32;
            match self
                .stacks
                .decide(&effect.data, effect.source, effect.level, initial_count)
            {
                StackDecision::Denied => return Ok(None),
                StackDecision::MergeInto {
                    handle,
                    new_count,
                    transfer_owner_to,
                    new_level,
                } => {
                    let old_count = self.stacks.count_of(handle).unwrap_or(new_count);
                    self.stacks.update(handle, new_count, transfer_owner_to, new_level);
                    let refresh = stacking.refresh_duration_on_successful_application;
                    let reset_period = stacking.reset_period_on_successful_application;
                    let execute_now = stacking.execute_on_successful_application;
                    if let Some(active) = self.active.get_mut(handle) {
                        if let Some(source) = transfer_owner_to {
                            active.effect.source = Some(source);
                        }
                        if let Some(level) = new_level {
                            active.effect.level = level;
                        }
                        active.rescale(source_attrs, target, new_count);
                        if refresh {
                            active.refresh_duration();
                        }
                        if reset_period {
                            active.reset_period_accumulator();
                        }
                        if execute_now {
                            active.execute_now(target);
                        }
                    }
                    cues.on_cue(CueEvent::OnStackChange {
                        handle,
                        effect: effect.data.name.clone(),
                        old_count,
                        new_count,
                    });
                    return Ok(Some(handle));
                }
                StackDecision::NewIndependent => {}
            }
        }

        self.remove_on_apply(&effect, target, cues);

        let stack_count = effect
            .data
            .stacking
            .as_ref()
            .map(|s| s.initial_count.evaluate(effect.level).max(1) as u32)
            .unwrap_or(1);

        if matches!(effect.data.duration, crate::effect_data::DurationData::Instant) {
            // Two-phase: resolve every magnitude against the pre-application
            // snapshot first, then mutate. Interleaving read and write per
            // modifier would let an earlier modifier's write shift what a
            // later modifier captures from the same target.
            let resolved: Vec<(crate::attribute::AttributeKey, crate::attribute::ModifierOperation, f64)> = {
                let ctx = MagnitudeContext {
                    source: source_attrs,
                    target: &*target,
                    level: effect.level,
                    caller_magnitudes: &effect.caller_magnitudes,
                    payload,
                };
                effect
                    .data
                    .modifiers
                    .iter()
                    .map(|m| (m.attribute.clone(), m.operation, m.magnitude.evaluate(&ctx)))
                    .collect()
            };
            let mut modified = Vec::with_capacity(resolved.len());
            for (attribute_key, operation, magnitude) in resolved {
                if let Some(attribute) = target.get_mut(&attribute_key) {
                    attribute.apply_instant(operation, magnitude);
                    modified.push((attribute_key, magnitude));
                }
            }
            cues.on_cue(CueEvent::OnExecute {
                handle: None,
                effect: effect.data.name.clone(),
                modified,
            });
            return Ok(None);
        }

        let data = effect.data.clone();
        let source = effect.source;
        let level = effect.level;
        let granted = data.components.granted_tags.clone();
        let name = data.name.clone();

        let active = match ActiveEffect::apply(effect, source_attrs, payload, target, stack_count) {
            Ok(active) => active,
            Err(err) => {
                self.log_error(&err);
                return Err(err);
            }
        };

        let handle = self.active.insert(active);
        for tag in &granted {
            self.modifier_tags.add(tag.clone());
        }
        if data.stacking.is_some() {
            self.stacks.register(data, source, level, handle, stack_count);
        }
        cues.on_cue(CueEvent::OnApply {
            handle,
            effect: name,
            source,
        });
        Ok(Some(handle))
    }

    fn remove_on_apply(&mut self, effect: &Effect, target: &mut AttributeSet, cues: &mut dyn CueSink) {
        if effect.data.components.remove_on_apply_tags.is_empty() {
            return;
        }
        let victims: Vec<EffectHandle> = self
            .active
            .iter()
            .filter(|(_, active)| {
                active
                    .granted_tags()
                    .iter()
                    .any(|tag| effect.data.components.remove_on_apply_tags.contains(tag))
            })
            .map(|(handle, _)| handle)
            .collect();
        for handle in victims {
            let _ = self.unapply_effect(handle, target, true, None, cues);
        }
    }

    /// Removes `handle` from `target`. `force_remove_all_stacks` clears
    /// the whole stack regardless of `StackExpirationPolicy`; otherwise a
    /// stacked effect honors its expiration policy (§4.5). `source_attrs`
    /// is only consulted when a partial removal survives and needs its
    /// remaining stack's magnitude re-evaluated.
    pub fn unapply_effect(
        &mut self,
        handle: EffectHandle,
        target: &mut AttributeSet,
        force_remove_all_stacks: bool,
        source_attrs: Option<&AttributeSet>,
        cues: &mut dyn CueSink,
    ) -> ForgeResult<()> {
        let should_fully_remove = if force_remove_all_stacks {
            true
        } else {
            match self.active.get(handle).and_then(|a| a.effect.data.stacking.as_ref()) {
                Some(stacking) => match stacking.expiration_policy {
                    StackExpirationPolicy::ClearEntireStack => true,
                    StackExpirationPolicy::RemoveSingleStackAndRefreshDuration
                    | StackExpirationPolicy::RemoveSingleStackAndNotRefreshDuration => {
                        let remaining = self.stacks.decrement(handle).unwrap_or(0);
                        if remaining > 0 {
                            if let Some(active) = self.active.get_mut(handle) {
                                active.rescale(source_attrs, target, remaining);
                                if stacking.expiration_policy
                                    == StackExpirationPolicy::RemoveSingleStackAndRefreshDuration
                                {
                                    active.refresh_duration();
                                }
                                // A natural-expiry-triggered partial removal
                                // reaches here via `tick()` already having set
                                // `Expired`; since the effect survives with
                                // fewer stacks, it needs to stay eligible for
                                // ongoing-requirement propagation.
                                active.state = ActiveEffectState::Active;
                            }
                            false
                        } else {
                            true
                        }
                    }
                },
                None => true,
            }
        };

        if !should_fully_remove {
            if let Some(active) = self.active.get(handle) {
                let new_count = self.stacks.count_of(handle).unwrap_or(0);
                cues.on_cue(CueEvent::OnStackChange {
                    handle,
                    effect: active.effect.data.name.clone(),
                    old_count: new_count + 1,
                    new_count,
                });
            }
            return Ok(());
        }

        let Some(mut active) = self.active.remove(handle) else {
            return Ok(());
        };
        for tag in active.granted_tags() {
            self.modifier_tags.remove(tag);
        }
        self.stacks.remove(handle);
        let name = active.effect.data.name.clone();
        let result = active.unapply(target);
        if let Err(err) = &result {
            self.log_error(err);
        }
        cues.on_cue(CueEvent::OnRemove { handle, effect: name });
        result
    }

    /// Advances every active effect on `target` by `dt` seconds, fires
    /// periodic cues, recomputes non-snapshot-capture effects, expires
    /// finished effects, then re-derives inhibition for everyone against
    /// the fresh combined tag set (§4.7's fixed-point propagation — bounded
    /// here to at most `len + 1` passes, since granted tags only change via
    /// the explicit removal already performed above, not as a side effect
    /// of inhibition itself).
    #[instrument(skip_all)]
    pub fn update_effects(
        &mut self,
        dt: f64,
        target: &mut AttributeSet,
        base_tags: &GameplayTagContainer,
        sources: &dyn SourceLookup,
        cues: &mut dyn CueSink,
    ) {
        let expired: Vec<EffectHandle> = {
            let mut expired = Vec::new();
            let handles: Vec<EffectHandle> = self.active.keys().collect();
            for handle in handles {
                let Some(active) = self.active.get_mut(handle) else {
                    continue;
                };
                match active.tick(dt, target) {
                    TickOutcome::Unchanged => {}
                    TickOutcome::Periodic(modified) => {
                        cues.on_cue(CueEvent::OnExecute {
                            handle: Some(handle),
                            effect: active.effect.data.name.clone(),
                            modified: modified.iter().map(|m| (m.attribute.clone(), m.magnitude)).collect(),
                        });
                    }
                    TickOutcome::Expired => expired.push(handle),
                }
            }
            expired
        };
        for handle in expired {
            let source = self.active.get(handle).and_then(|a| a.source());
            let source_attrs = source.and_then(|s| sources.attribute_set(s));
            let _ = self.unapply_effect(handle, target, false, source_attrs, cues);
        }

        // §4.7: a satisfied `removal_requirements` query expires the whole
        // effect outright, regardless of stack count — distinct from
        // `ongoing_requirements` merely inhibiting it below.
        let combined = self.combined_tags(base_tags);
        let to_remove: Vec<EffectHandle> = self
            .active
            .iter()
            .filter(|(_, active)| {
                !active.components.removal_requirements.is_empty()
                    && active.components.removal_requirements.is_satisfied_by(&combined)
            })
            .map(|(handle, _)| handle)
            .collect();
        for handle in to_remove {
            let source = self.active.get(handle).and_then(|a| a.source());
            let source_attrs = source.and_then(|s| sources.attribute_set(s));
            let _ = self.unapply_effect(handle, target, true, source_attrs, cues);
        }

        let handles: Vec<EffectHandle> = self.active.keys().collect();
        for handle in handles {
            let source = self.active.get(handle).and_then(|a| a.source());
            let source_attrs = source.and_then(|s| sources.attribute_set(s));
            let Some(active) = self.active.get_mut(handle) else {
                continue;
            };
            if !active.watches_attributes() {
                continue;
            }
            if let Err(err) = active.recompute(source_attrs, target) {
                self.log_error(&err);
            }
        }

        self.propagate_ongoing_requirements(base_tags);
    }

    fn propagate_ongoing_requirements(&mut self, base_tags: &GameplayTagContainer) {
        let mut iterations = 0;
        loop {
            let combined = self.combined_tags(base_tags);
            let mut changed = false;
            for (_, active) in self.active.iter_mut() {
                if active.state == ActiveEffectState::Expired {
                    continue;
                }
                if active.components.ongoing_requirements.is_empty() {
                    continue;
                }
                let satisfied = active.components.ongoing_requirements.is_satisfied_by(&combined);
                if satisfied == active.is_inhibited() {
                    active.set_inhibited(!satisfied);
                    changed = true;
                }
            }
            iterations += 1;
            if !changed || iterations > self.active.len() + 1 {
                break;
            }
        }
    }

    /// Every active application of effects sharing `effect_name`, for
    /// UI/debugging use (§3's `GetEffectInfo`).
    pub fn get_effect_info(&self, effect_name: &str) -> Vec<EffectInfo> {
        self.active
            .iter()
            .filter(|(_, active)| active.effect.data.name == effect_name)
            .map(|(handle, active)| EffectInfo {
                handle,
                level: active.level(),
                source: active.source(),
                stack_count: active.stack_count(),
                inhibited: active.is_inhibited(),
                remaining_duration: active.remaining_duration(),
            })
            .collect()
    }

    /// Total stacks across every active application of `effect_name` —
    /// the SPEC_FULL.md convenience addition over raw `get_effect_info`.
    pub fn total_stack_count(&self, effect_name: &str) -> u32 {
        self.get_effect_info(effect_name).iter().map(|i| i.stack_count).sum()
    }

    /// Changes an active effect's level and re-evaluates its magnitude
    /// against it (§8 scenario 5's "LevelUp"). `Err(StaleHandle)` if
    /// `handle` isn't live.
    pub fn set_level(
        &mut self,
        handle: EffectHandle,
        level: u32,
        target: &mut AttributeSet,
        source_attrs: Option<&AttributeSet>,
    ) -> ForgeResult<()> {
        let Some(active) = self.active.get_mut(handle) else {
            return Err(ForgeError::StaleHandle);
        };
        active.set_level(source_attrs, target, level);
        Ok(())
    }

    pub fn is_active(&self, handle: EffectHandle) -> bool {
        self.active.contains_key(handle)
    }

    /// The source a still-live effect was applied from, if any — for a
    /// caller that needs to resolve `source_attrs` before removing it.
    pub fn source_of(&self, handle: EffectHandle) -> Option<SourceId> {
        self.active.get(handle).and_then(|a| a.source())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EffectInfo {
    pub handle: EffectHandle,
    pub level: u32,
    pub source: Option<crate::magnitude::SourceId>,
    pub stack_count: u32,
    pub inhibited: bool,
    pub remaining_duration: Option<f64>,
}
