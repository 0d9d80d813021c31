//! `EffectData`: the immutable, reusable definition of an effect (§3, §4).
//! An [`crate::effect::Effect`] instance pairs one of these with a level,
//! source/owner handles, and caller-set magnitudes.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::attribute::{AttributeKey, ModifierOperation};
use crate::curve::ScalableInt;
use crate::execution::Execution;
use crate::magnitude::ModifierMagnitude;
use crate::tags::{GameplayTag, TagRequirements};

/// One attribute contribution an effect registers while active (or applies
/// once, for instant effects).
#[derive(Debug, Clone)]
pub struct Modifier {
    pub attribute: AttributeKey,
    pub operation: ModifierOperation,
    pub magnitude: ModifierMagnitude,
    pub channel: u8,
}

impl Modifier {
    pub fn new(
        attribute: impl Into<AttributeKey>,
        operation: ModifierOperation,
        magnitude: ModifierMagnitude,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operation,
            magnitude,
            channel: 0,
        }
    }

    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
}

/// How long an effect remains active once applied (§4, §8 scenario 2).
#[derive(Clone)]
pub enum DurationData {
    /// Applied once, never becomes an `ActiveEffect`.
    Instant,
    /// Active until explicitly unapplied.
    Infinite,
    /// Active for a duration resolved at apply time from the magnitude.
    HasDuration(ModifierMagnitude),
}

impl std::fmt::Debug for DurationData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationData::Instant => write!(f, "Instant"),
            DurationData::Infinite => write!(f, "Infinite"),
            DurationData::HasDuration(_) => write!(f, "HasDuration"),
        }
    }
}

/// Policy for what happens to a periodic effect's accumulator when
/// inhibition (a tag-gated ongoing-requirement failure, §4.7) is lifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InhibitionRemovedPolicy {
    /// Resume accumulating where the accumulator was left.
    ResumeAccumulating,
    /// Restart the accumulator at zero.
    ResetPeriod,
    /// Fire immediately and restart the accumulator at zero. If this
    /// un-inhibit lands in the same update pass as a successful stack
    /// reapply with `execute_on_successful_application`, both fire — an
    /// intentional double-execution (§9 design notes).
    ExecuteAndResetPeriod,
}

/// Periodic execution for a `HasDuration`/`Infinite` effect (§4).
#[derive(Debug, Clone)]
pub struct PeriodicData {
    pub period: ModifierMagnitude,
    pub execute_on_apply: bool,
    pub inhibition_removed_policy: InhibitionRemovedPolicy,
}

/// How multiple applications of the same effect definition to the same
/// target combine (§4.5). Orthogonal axes, matching §4.5's description of
/// independent policies rather than one enum of combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPolicy {
    /// Every application is its own `ActiveEffect`; no stacking.
    None,
    /// Applications from the same source aggregate into one stack.
    AggregateBySource,
    /// All applications, regardless of source, aggregate into one stack.
    AggregateByTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackLevelPolicy {
    /// Every stack shares the level of the effect that created the stack.
    AggregateLevels,
    /// Applications at a different level than the current stack start a
    /// separate, segregated stack.
    SegregateLevels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMagnitudePolicy {
    /// Modifier magnitudes are evaluated once and multiplied by stack count.
    ScaleWithStackCount,
    /// Modifier magnitudes don't change as the stack grows.
    DontStack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOverflowPolicy {
    /// A reapplication past the stack limit is rejected outright.
    DenyApplication,
    /// Applied anyway; the stack is clamped to the limit.
    AllowApplicationAndClamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackExpirationPolicy {
    /// Duration expiry clears every stack at once.
    ClearEntireStack,
    /// Duration expiry removes one stack and, if any remain, refreshes.
    RemoveSingleStackAndRefreshDuration,
    /// Duration expiry removes one stack without refreshing; the stack as
    /// a whole keeps ticking down on its own independent timer.
    RemoveSingleStackAndNotRefreshDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOwnerDenialPolicy {
    /// A different source may add to an existing stack.
    AlwaysAllow,
    /// Only the original source may add to an existing stack.
    DenyIfDifferentOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOwnerOverridePolicy {
    /// The stack keeps its original source.
    KeepCurrent,
    /// A new application transfers ownership of the whole stack to itself.
    Override,
}

/// Whether a reapplication at a different level than the existing stack is
/// rejected outright, keyed on the direction of the level change (§4.5,
/// §8). The `AggregateLevels` counterpart to `StackOwnerDenialPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackLevelDenialPolicy {
    /// A different level may always add to an existing stack.
    AlwaysAllow,
    /// A reapplication at a lower level than the stack's current level is
    /// rejected.
    DenyIfLower,
    /// A reapplication at a higher level than the stack's current level is
    /// rejected.
    DenyIfHigher,
}

/// Whether a reapplication at a different level transfers the whole stack
/// to that level, keyed on the direction of the change. The
/// `AggregateLevels` counterpart to `StackOwnerOverridePolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackLevelOverridePolicy {
    /// The stack keeps its original level.
    KeepCurrent,
    /// A reapplication at a higher level overrides the stack's level.
    OverrideIfHigher,
    /// A reapplication at a lower level overrides the stack's level.
    OverrideIfLower,
    /// Any different level overrides the stack's level.
    AlwaysOverride,
}

/// What happens to the stack count when `StackLevelOverridePolicy` actually
/// overrides the level. The `AggregateLevels` counterpart to
/// `owner_override_resets_stack_count`, expressed as a policy rather than a
/// bool since the spec names it as its own axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackLevelOverrideStackCountPolicy {
    /// The stack count is unaffected by the level change.
    Preserve,
    /// The stack count resets to the overriding application's initial count.
    ResetToApplicationCount,
}

/// All the stacking-related axes of an [`EffectData`] with a [`StackPolicy`]
/// other than `None` (§4.5).
#[derive(Debug, Clone)]
pub struct StackingData {
    pub policy: StackPolicy,
    pub limit: ScalableInt,
    pub initial_count: ScalableInt,
    pub level_policy: StackLevelPolicy,
    pub magnitude_policy: StackMagnitudePolicy,
    pub overflow_policy: StackOverflowPolicy,
    pub expiration_policy: StackExpirationPolicy,
    pub owner_denial_policy: StackOwnerDenialPolicy,
    pub owner_override_policy: StackOwnerOverridePolicy,
    /// Whether an ownership override also resets the stack count to the
    /// overriding application's initial count, rather than preserving it.
    pub owner_override_resets_stack_count: bool,
    /// Denies a reapplication at a different level, under `AggregateLevels`
    /// (`SegregateLevels` never reaches this — it starts an independent
    /// stack instead).
    pub level_denial_policy: StackLevelDenialPolicy,
    /// Whether a reapplication at a different level transfers the stack to
    /// that level, under `AggregateLevels`.
    pub level_override_policy: StackLevelOverridePolicy,
    /// What happens to the stack count when a level override fires.
    pub level_override_stack_count_policy: StackLevelOverrideStackCountPolicy,
    /// Whether a reapplication onto an existing stack refreshes the
    /// duration timer.
    pub refresh_duration_on_successful_application: bool,
    /// Whether a reapplication resets a periodic effect's accumulator.
    pub reset_period_on_successful_application: bool,
    /// Whether a reapplication onto an existing stack fires
    /// `execute_on_apply`/periodic execution again.
    pub execute_on_successful_application: bool,
}

impl Default for StackingData {
    fn default() -> Self {
        Self {
            policy: StackPolicy::None,
            limit: ScalableInt::constant(1),
            initial_count: ScalableInt::constant(1),
            level_policy: StackLevelPolicy::AggregateLevels,
            magnitude_policy: StackMagnitudePolicy::ScaleWithStackCount,
            overflow_policy: StackOverflowPolicy::DenyApplication,
            expiration_policy: StackExpirationPolicy::ClearEntireStack,
            owner_denial_policy: StackOwnerDenialPolicy::AlwaysAllow,
            owner_override_policy: StackOwnerOverridePolicy::KeepCurrent,
            owner_override_resets_stack_count: false,
            level_denial_policy: StackLevelDenialPolicy::AlwaysAllow,
            level_override_policy: StackLevelOverridePolicy::KeepCurrent,
            level_override_stack_count_policy: StackLevelOverrideStackCountPolicy::Preserve,
            refresh_duration_on_successful_application: true,
            reset_period_on_successful_application: true,
            execute_on_successful_application: false,
        }
    }
}

/// Tags this effect carries on its target while active, and the tag gates
/// it checks (§4.7).
#[derive(Debug, Clone, Default)]
pub struct EffectComponents {
    /// Added to the target's tag container for the lifetime of the effect.
    pub granted_tags: Vec<GameplayTag>,
    /// Must be satisfied by the target for the effect to be applied at all.
    pub application_requirements: TagRequirements,
    /// Must stay satisfied by the target for a HasDuration/Infinite effect
    /// to keep ticking; failing inhibits it without removing it.
    pub ongoing_requirements: TagRequirements,
    /// Satisfied at any moment while this effect is active ⇒ the effect
    /// expires and is removed outright, distinct from `ongoing_requirements`
    /// merely inhibiting it.
    pub removal_requirements: TagRequirements,
    /// Any `ActiveEffect` on the target carrying one of these tags is
    /// removed when this effect is applied.
    pub remove_on_apply_tags: Vec<GameplayTag>,
}

/// The reusable, immutable definition of an effect (§3): everything an
/// [`crate::effect::Effect`] instance shares across every application.
#[derive(Clone)]
pub struct EffectData {
    pub name: String,
    pub modifiers: SmallVec<[Modifier; 4]>,
    pub duration: DurationData,
    pub periodic: Option<PeriodicData>,
    pub stacking: Option<StackingData>,
    pub components: EffectComponents,
    pub execution: Option<Arc<dyn Execution>>,
    /// Whether non-snapshot attribute captures are forced to snapshot
    /// anyway (§4.3's per-effect override of the per-capture default).
    pub force_snapshot_captures: bool,
}

impl std::fmt::Debug for EffectData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectData")
            .field("name", &self.name)
            .field("duration", &self.duration)
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

impl EffectData {
    pub fn builder(name: impl Into<String>) -> EffectDataBuilder {
        EffectDataBuilder::new(name)
    }
}

/// Fluent construction (SPEC_FULL.md §C) — `EffectData` has enough optional
/// axes that positional construction reads poorly.
pub struct EffectDataBuilder {
    data: EffectData,
}

impl EffectDataBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            data: EffectData {
                name: name.into(),
                modifiers: SmallVec::new(),
                duration: DurationData::Instant,
                periodic: None,
                stacking: None,
                components: EffectComponents::default(),
                execution: None,
                force_snapshot_captures: false,
            },
        }
    }

    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.data.modifiers.push(modifier);
        self
    }

    pub fn duration(mut self, duration: DurationData) -> Self {
        self.data.duration = duration;
        self
    }

    pub fn periodic(mut self, periodic: PeriodicData) -> Self {
        self.data.periodic = Some(periodic);
        self
    }

    pub fn stacking(mut self, stacking: StackingData) -> Self {
        self.data.stacking = Some(stacking);
        self
    }

    pub fn grant_tag(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.data.components.granted_tags.push(tag.into());
        self
    }

    pub fn application_requirements(mut self, requirements: TagRequirements) -> Self {
        self.data.components.application_requirements = requirements;
        self
    }

    pub fn ongoing_requirements(mut self, requirements: TagRequirements) -> Self {
        self.data.components.ongoing_requirements = requirements;
        self
    }

    pub fn removal_requirements(mut self, requirements: TagRequirements) -> Self {
        self.data.components.removal_requirements = requirements;
        self
    }

    pub fn remove_on_apply_tag(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.data.components.remove_on_apply_tags.push(tag.into());
        self
    }

    pub fn execution(mut self, execution: Arc<dyn Execution>) -> Self {
        self.data.execution = Some(execution);
        self
    }

    pub fn force_snapshot_captures(mut self) -> Self {
        self.data.force_snapshot_captures = true;
        self
    }

    pub fn build(self) -> EffectData {
        self.data
    }
}
