//! `ActiveEffect`: the lifecycle record for one non-instant application
//! (§4, §4.3, §4.4). Instant effects never produce one of these — they
//! mutate `Base` once and are done.

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::attribute::ContributionId;
use crate::attribute_set::AttributeSet;
use crate::effect::{ContextPayload, Effect};
use crate::effect_data::{EffectComponents, InhibitionRemovedPolicy};
use crate::error::{ForgeError, ForgeResult};
use crate::evaluated::{EvaluatedDuration, EvaluatedEffect, EvaluatedModifierEntry};
use crate::magnitude::{AttributeCaptureDefinition, MagnitudeContext, SourceId};
use crate::tags::GameplayTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveEffectState {
    /// Registered but not yet ticked once.
    Applied,
    /// Ticking normally (or inhibited, see `inhibited`).
    Active,
    /// Duration elapsed or explicitly unapplied; awaiting removal from the
    /// manager's storage. An expired effect's contributions are already
    /// gone by the time it reaches this state.
    Expired,
}

/// What happened during one [`ActiveEffect::tick`] call, for the manager
/// to react to (fire cues, recompute stacking bookkeeping).
pub enum TickOutcome {
    Unchanged,
    /// A periodic fire applied these deltas to `Base` this tick.
    Periodic(SmallVec<[EvaluatedModifierEntry; 4]>),
    Expired,
}

pub struct ActiveEffect {
    pub effect: Effect,
    pub components: EffectComponents,
    evaluated: EvaluatedEffect,
    watch_set: Vec<AttributeCaptureDefinition>,
    /// Continuous contributions registered on the target's attributes.
    /// Empty for periodic effects, which apply instant per-tick deltas
    /// instead (§4: periodic ticks are discrete executions, not standing
    /// modifiers).
    contributions: SmallVec<[(usize, ContributionId); 4]>,
    elapsed: f64,
    period_accumulator: f64,
    /// Set by `ExecuteAndResetPeriod` on un-inhibit; consumed at the start
    /// of the next `tick`, since `set_inhibited` has no `target` to fire
    /// against immediately.
    pending_immediate_fire: bool,
    inhibited: bool,
    pub state: ActiveEffectState,
}

impl ActiveEffect {
    /// Evaluates `effect` against `source`/`target`, registers continuous
    /// modifiers on `target`, grants tags, and optionally fires the
    /// apply-time periodic tick. Returns [`ForgeError::InvalidPeriod`] if a
    /// periodic effect resolves to a non-positive period (§7).
    ///
    /// Takes `source`/`payload` rather than a pre-built [`MagnitudeContext`]
    /// because a context borrows `target` immutably for the whole
    /// evaluation, which would otherwise overlap the mutable borrow this
    /// function needs to register contributions.
    pub fn apply(
        effect: Effect,
        source: Option<&AttributeSet>,
        payload: Option<&ContextPayload>,
        target: &mut AttributeSet,
        stack_count: u32,
    ) -> ForgeResult<Self> {
        let data = effect.data.clone();
        let evaluated = {
            let ctx = MagnitudeContext {
                source,
                target: &*target,
                level: effect.level,
                caller_magnitudes: &effect.caller_magnitudes,
                payload,
            };
            EvaluatedEffect::evaluate(&data, &ctx, stack_count)
        };

        if let Some(period) = evaluated.period {
            if period <= 0.0 {
                warn!(effect = %data.name, period, "periodic effect resolved to a non-positive period");
                return Err(ForgeError::InvalidPeriod {
                    effect: data.name.clone(),
                    period,
                    level: effect.level,
                });
            }
        }

        let watch_set = EvaluatedEffect::watch_set(&data);
        let is_periodic = data.periodic.is_some();

        let mut contributions = SmallVec::new();
        if !is_periodic {
            for (index, modifier) in evaluated.modifiers.iter().enumerate() {
                if let Some(attribute) = target.get_mut(&modifier.attribute) {
                    let id = attribute.apply(modifier.operation, modifier.magnitude, modifier.channel);
                    contributions.push((index, id));
                } else {
                    debug!(attribute = %modifier.attribute, "effect targets an attribute the target doesn't have");
                }
            }
        }

        let mut active = Self {
            effect,
            components: data.components.clone(),
            evaluated,
            watch_set,
            contributions,
            elapsed: 0.0,
            period_accumulator: 0.0,
            pending_immediate_fire: false,
            inhibited: false,
            state: ActiveEffectState::Applied,
        };

        if let Some(periodic) = &data.periodic {
            if periodic.execute_on_apply {
                active.fire_periodic_tick(target);
            }
        }

        active.state = ActiveEffectState::Active;
        Ok(active)
    }

    pub fn stack_count(&self) -> u32 {
        self.evaluated.stack_count
    }

    pub fn level(&self) -> u32 {
        self.effect.level
    }

    pub fn source(&self) -> Option<SourceId> {
        self.effect.source
    }

    pub fn granted_tags(&self) -> &[GameplayTag] {
        &self.components.granted_tags
    }

    fn fire_periodic_tick(&mut self, target: &mut AttributeSet) -> SmallVec<[EvaluatedModifierEntry; 4]> {
        for entry in &self.evaluated.modifiers {
            if let Some(attribute) = target.get_mut(&entry.attribute) {
                attribute.apply_instant(entry.operation, entry.magnitude);
            }
        }
        trace!(effect = %self.effect.data.name, "periodic tick fired");
        self.evaluated.modifiers.clone()
    }

    /// Advances this effect by `dt` seconds. Infinite non-periodic effects
    /// never change. `HasDuration` counts down toward expiry; periodic
    /// effects accumulate and may fire zero, one, or several times if `dt`
    /// spans multiple periods.
    pub fn tick(&mut self, dt: f64, target: &mut AttributeSet) -> TickOutcome {
        if self.inhibited {
            return TickOutcome::Unchanged;
        }

        let mut fired = SmallVec::new();

        if std::mem::take(&mut self.pending_immediate_fire) {
            fired.extend(self.fire_periodic_tick(target));
        }

        // No execution fires beyond expiry: cap the interval fed to the
        // accumulator at whatever of `dt` precedes a `HasDuration` effect's
        // expiry point, rather than the raw `dt` (which may span it).
        let periodic_dt = match self.evaluated.duration {
            EvaluatedDuration::Timed(duration) => dt.min((duration - self.elapsed).max(0.0)),
            _ => dt,
        };

        if let Some(period) = self.evaluated.period {
            self.period_accumulator += periodic_dt;
            while self.period_accumulator >= period {
                self.period_accumulator -= period;
                fired.extend(self.fire_periodic_tick(target));
            }
        }

        if let EvaluatedDuration::Timed(duration) = self.evaluated.duration {
            self.elapsed += dt;
            if self.elapsed >= duration {
                if !fired.is_empty() {
                    return TickOutcome::Periodic(fired);
                }
                self.state = ActiveEffectState::Expired;
                return TickOutcome::Expired;
            }
        }

        if fired.is_empty() {
            TickOutcome::Unchanged
        } else {
            TickOutcome::Periodic(fired)
        }
    }

    /// Sets the inhibition state (§4.7 ongoing-requirements gate). A
    /// newly-uninhibited effect follows its [`InhibitionRemovedPolicy`].
    pub fn set_inhibited(&mut self, inhibited: bool) {
        if self.inhibited == inhibited {
            return;
        }
        let was_inhibited = self.inhibited;
        self.inhibited = inhibited;

        if was_inhibited && !inhibited {
            if let Some(periodic) = &self.effect.data.periodic {
                match periodic.inhibition_removed_policy {
                    InhibitionRemovedPolicy::ResumeAccumulating => {}
                    InhibitionRemovedPolicy::ResetPeriod => self.period_accumulator = 0.0,
                    InhibitionRemovedPolicy::ExecuteAndResetPeriod => {
                        self.period_accumulator = 0.0;
                        self.pending_immediate_fire = true;
                    }
                }
            }
        }
    }

    pub fn is_inhibited(&self) -> bool {
        self.inhibited
    }

    /// Seconds remaining before a `HasDuration` effect expires, or `None`
    /// for `Infinite` (§6's `GetEffectInfo` introspection).
    pub fn remaining_duration(&self) -> Option<f64> {
        match self.evaluated.duration {
            EvaluatedDuration::Timed(duration) => Some((duration - self.elapsed).max(0.0)),
            _ => None,
        }
    }

    /// Whether any declared capture is non-snapshot — if empty, this
    /// effect never needs [`ActiveEffect::recompute`].
    pub fn watches_attributes(&self) -> bool {
        !self.watch_set.is_empty()
    }

    /// Restarts the duration countdown from zero (§4.5's
    /// `refresh_duration_on_successful_application`).
    pub fn refresh_duration(&mut self) {
        self.elapsed = 0.0;
    }

    /// Zeroes the periodic accumulator (§4.5's
    /// `reset_period_on_successful_application`).
    pub fn reset_period_accumulator(&mut self) {
        self.period_accumulator = 0.0;
    }

    /// Fires an immediate periodic tick outside the normal schedule (§4.5's
    /// `execute_on_successful_application`). A no-op for non-periodic
    /// effects.
    pub fn execute_now(&mut self, target: &mut AttributeSet) {
        if self.effect.data.periodic.is_some() {
            self.fire_periodic_tick(target);
        }
    }

    /// Drops every registered contribution and re-registers fresh ones
    /// from a newly-evaluated snapshot at `stack_count`. Shared by
    /// `recompute` and `rescale`, which differ only in when they call it.
    ///
    /// Unapplies old contributions first, then builds a context that
    /// reborrows `target` immutably to evaluate, then drops that context
    /// before re-applying — so the immutable read pass and the mutable
    /// write passes never overlap.
    fn re_register(&mut self, source: Option<&AttributeSet>, target: &mut AttributeSet, stack_count: u32) {
        for (index, id) in self.contributions.drain(..) {
            if let Some(entry) = self.evaluated.modifiers.get(index) {
                if let Some(attribute) = target.get_mut(&entry.attribute) {
                    let _ = attribute.unapply(id);
                }
            }
        }
        self.evaluated = {
            let ctx = MagnitudeContext {
                source,
                target: &*target,
                level: self.effect.level,
                caller_magnitudes: &self.effect.caller_magnitudes,
                payload: None,
            };
            EvaluatedEffect::evaluate(&self.effect.data, &ctx, stack_count)
        };
        let mut contributions = SmallVec::new();
        for (index, modifier) in self.evaluated.modifiers.iter().enumerate() {
            if let Some(attribute) = target.get_mut(&modifier.attribute) {
                let id = attribute.apply(modifier.operation, modifier.magnitude, modifier.channel);
                contributions.push((index, id));
            }
        }
        self.contributions = contributions;
    }

    /// Re-evaluates `self.evaluated` in place without touching registered
    /// contributions — the periodic-effect half of `re_register`, since a
    /// periodic effect has none to reconcile (§4: its magnitude is frozen
    /// between fires, not a standing contribution).
    fn refresh_snapshot(&mut self, source: Option<&AttributeSet>, target: &AttributeSet, stack_count: u32) {
        self.evaluated = {
            let ctx = MagnitudeContext {
                source,
                target,
                level: self.effect.level,
                caller_magnitudes: &self.effect.caller_magnitudes,
                payload: None,
            };
            EvaluatedEffect::evaluate(&self.effect.data, &ctx, stack_count)
        };
    }

    /// Re-evaluates this effect's modifiers at a new stack count,
    /// reconciling registered contributions to match (§4.5's
    /// `StackMagnitudePolicy::ScaleWithStackCount`). Periodic effects have
    /// no contributions to reconcile, so only the frozen per-tick snapshot
    /// is refreshed.
    pub fn rescale(&mut self, source: Option<&AttributeSet>, target: &mut AttributeSet, stack_count: u32) {
        if self.effect.data.periodic.is_some() {
            self.refresh_snapshot(source, target, stack_count);
            return;
        }
        self.re_register(source, target, stack_count);
    }

    /// Re-evaluates the whole snapshot against fresh captures and
    /// reconciles continuous contributions to match (§4.3). For periodic
    /// effects this refreshes the frozen per-tick magnitude that the next
    /// `fire_periodic_tick` will apply, without registering contributions.
    pub fn recompute(&mut self, source: Option<&AttributeSet>, target: &mut AttributeSet) -> ForgeResult<()> {
        if !self.watches_attributes() {
            return Ok(());
        }
        let stack_count = self.evaluated.stack_count;
        if self.effect.data.periodic.is_some() {
            self.refresh_snapshot(source, target, stack_count);
        } else {
            self.re_register(source, target, stack_count);
        }
        Ok(())
    }

    /// Changes this effect's level and re-evaluates against it — a host
    /// explicitly driven "level up" event, distinct from `recompute`'s
    /// attribute-change trigger since the level isn't itself a captured
    /// attribute (§4.2, §8 scenario 5).
    pub fn set_level(&mut self, source: Option<&AttributeSet>, target: &mut AttributeSet, level: u32) {
        self.effect.level = level;
        let stack_count = self.evaluated.stack_count;
        if self.effect.data.periodic.is_some() {
            self.refresh_snapshot(source, target, stack_count);
        } else {
            self.re_register(source, target, stack_count);
        }
    }

    /// Removes every continuous contribution this effect registered and
    /// marks it expired. Safe to call more than once.
    pub fn unapply(&mut self, target: &mut AttributeSet) -> ForgeResult<()> {
        let mut first_err = None;
        for (index, id) in self.contributions.drain(..) {
            let Some(entry) = self.evaluated.modifiers.get(index) else {
                continue;
            };
            if let Some(attribute) = target.get_mut(&entry.attribute) {
                if let Err(err) = attribute.unapply(id) {
                    first_err.get_or_insert(err);
                }
            }
        }
        self.state = ActiveEffectState::Expired;
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
