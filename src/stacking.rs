//! Stacking (§4.5): when a second application of the same [`EffectData`]
//! lands on a target that already has one active, the policies here decide
//! whether it starts a new, independent effect, merges into the existing
//! one, or is rejected outright.

use std::sync::Arc;

use tracing::debug;

use crate::effect_data::{
    EffectData, StackLevelDenialPolicy, StackLevelOverridePolicy, StackLevelOverrideStackCountPolicy,
    StackLevelPolicy, StackOverflowPolicy, StackOwnerDenialPolicy, StackOwnerOverridePolicy, StackPolicy,
    StackingData,
};
use crate::handle::EffectHandle;
use crate::magnitude::SourceId;

/// Identifies the stack group a new application either joins or misses.
/// Two applications are the same group only if they share the same
/// `EffectData` (compared by `Arc` identity — definitions are expected to
/// be shared singletons, not rebuilt per application) and, depending on
/// policy, the same source and/or level.
#[derive(Clone)]
struct GroupKey {
    data: Arc<EffectData>,
    source: Option<SourceId>,
    level: u32,
}

pub struct StackGroup {
    key: GroupKey,
    pub handle: EffectHandle,
    pub count: u32,
}

/// What an application attempt should do to an existing
/// [`crate::active_effect::ActiveEffect`], decided against [`StackingData`].
pub enum StackDecision {
    /// No stacking policy on this effect, or no existing stack matched:
    /// create an independent `ActiveEffect`.
    NewIndependent,
    /// Rejected — stack limit overflow under `DenyApplication`, or a
    /// different source denied by `StackOwnerDenialPolicy`.
    Denied,
    /// Merge into the existing stack at `handle`, with the given resulting
    /// count and whether ownership/level transfer to the new application.
    MergeInto {
        handle: EffectHandle,
        new_count: u32,
        transfer_owner_to: Option<SourceId>,
        new_level: Option<u32>,
    },
}

/// Direction of a reapplication's level relative to the existing stack's
/// level — what `StackLevelDenialPolicy`/`StackLevelOverridePolicy` key on.
#[derive(Clone, Copy, PartialEq, Eq)]
enum LevelComparison {
    Lower,
    Equal,
    Higher,
}

fn compare_level(existing: u32, incoming: u32) -> LevelComparison {
    match incoming.cmp(&existing) {
        std::cmp::Ordering::Less => LevelComparison::Lower,
        std::cmp::Ordering::Equal => LevelComparison::Equal,
        std::cmp::Ordering::Greater => LevelComparison::Higher,
    }
}

/// Tracks every stack group currently active on one target.
#[derive(Default)]
pub struct StackTable {
    groups: Vec<StackGroup>,
}

impl StackTable {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    fn find(&self, data: &Arc<EffectData>, source: Option<SourceId>, level: u32, stacking: &StackingData) -> Option<usize> {
        self.groups.iter().position(|g| {
            if !Arc::ptr_eq(&g.key.data, data) {
                return false;
            }
            if stacking.level_policy == StackLevelPolicy::SegregateLevels && g.key.level != level {
                return false;
            }
            match stacking.policy {
                StackPolicy::AggregateBySource => g.key.source == source,
                StackPolicy::AggregateByTarget => true,
                StackPolicy::None => false,
            }
        })
    }

    /// Decides what a new application of `data` (at `level`, from `source`,
    /// requesting `initial_count` more stacks) should do against whatever
    /// is currently tracked for this target.
    pub fn decide(
        &self,
        data: &Arc<EffectData>,
        source: Option<SourceId>,
        level: u32,
        initial_count: u32,
    ) -> StackDecision {
        let Some(stacking) = &data.stacking else {
            return StackDecision::NewIndependent;
        };
        if stacking.policy == StackPolicy::None {
            return StackDecision::NewIndependent;
        }

        let Some(index) = self.find(data, source, level, stacking) else {
            return StackDecision::NewIndependent;
        };
        let group = &self.groups[index];

        if stacking.owner_denial_policy == StackOwnerDenialPolicy::DenyIfDifferentOwner
            && group.key.source != source
        {
            debug!(effect = %data.name, "stack application denied: different owner");
            return StackDecision::Denied;
        }

        let level_comparison = compare_level(group.key.level, level);
        let denied_by_level = matches!(
            (stacking.level_denial_policy, level_comparison),
            (StackLevelDenialPolicy::DenyIfLower, LevelComparison::Lower)
                | (StackLevelDenialPolicy::DenyIfHigher, LevelComparison::Higher)
        );
        if denied_by_level {
            debug!(effect = %data.name, "stack application denied: level");
            return StackDecision::Denied;
        }

        let limit = stacking.limit.evaluate(level).max(1) as u32;
        let requested = group.count.saturating_add(initial_count);
        let new_count = if requested > limit {
            match stacking.overflow_policy {
                StackOverflowPolicy::DenyApplication => return StackDecision::Denied,
                StackOverflowPolicy::AllowApplicationAndClamp => limit,
            }
        } else {
            requested
        };

        let transfer_owner_to = if stacking.owner_override_policy == StackOwnerOverridePolicy::Override
            && group.key.source != source
        {
            source
        } else {
            None
        };

        let level_overrides = matches!(
            (stacking.level_override_policy, level_comparison),
            (StackLevelOverridePolicy::AlwaysOverride, LevelComparison::Lower | LevelComparison::Higher)
                | (StackLevelOverridePolicy::OverrideIfHigher, LevelComparison::Higher)
                | (StackLevelOverridePolicy::OverrideIfLower, LevelComparison::Lower)
        );
        let new_level = if level_overrides { Some(level) } else { None };

        let resets_stack_count = (transfer_owner_to.is_some() && stacking.owner_override_resets_stack_count)
            || (level_overrides
                && stacking.level_override_stack_count_policy
                    == StackLevelOverrideStackCountPolicy::ResetToApplicationCount);
        let new_count = if resets_stack_count {
            initial_count.min(limit)
        } else {
            new_count
        };

        StackDecision::MergeInto {
            handle: group.handle,
            new_count,
            transfer_owner_to,
            new_level,
        }
    }

    pub fn register(
        &mut self,
        data: Arc<EffectData>,
        source: Option<SourceId>,
        level: u32,
        handle: EffectHandle,
        count: u32,
    ) {
        if data.stacking.as_ref().map(|s| s.policy) == Some(StackPolicy::None) || data.stacking.is_none() {
            return;
        }
        self.groups.push(StackGroup {
            key: GroupKey { data, source, level },
            handle,
            count,
        });
    }

    /// Updates the tracked count after a merge, and the owner/level if
    /// either transferred.
    pub fn update(
        &mut self,
        handle: EffectHandle,
        new_count: u32,
        new_source: Option<SourceId>,
        new_level: Option<u32>,
    ) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.handle == handle) {
            group.count = new_count;
            if let Some(source) = new_source {
                group.key.source = Some(source);
            }
            if let Some(level) = new_level {
                group.key.level = level;
            }
        }
    }

    /// Decrements a stack by one (§4.5's `RemoveSingleStack*` policies).
    /// Returns the remaining count, or `None` if the group wasn't found.
    pub fn decrement(&mut self, handle: EffectHandle) -> Option<u32> {
        let group = self.groups.iter_mut().find(|g| g.handle == handle)?;
        group.count = group.count.saturating_sub(1);
        Some(group.count)
    }

    pub fn remove(&mut self, handle: EffectHandle) {
        self.groups.retain(|g| g.handle != handle);
    }

    pub fn count_of(&self, handle: EffectHandle) -> Option<u32> {
        self.groups.iter().find(|g| g.handle == handle).map(|g| g.count)
    }
}
