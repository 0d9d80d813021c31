//! Stacking-policy axis combinations (§4.5) exercised end to end, plus the
//! `ExecuteAndResetPeriod` + `execute_on_successful_application` double-fire
//! design note from §9.

use std::sync::Arc;

use forge::prelude::*;

fn target_with_attr1(min: i64, max: i64, base: i64) -> AttributeSet {
    let mut set = AttributeSet::new("Test");
    set.register(Attribute::new("Test.Attr1", min, max, base));
    set
}

fn base_of(set: &AttributeSet) -> i64 {
    set.get(&"Test.Attr1".into()).unwrap().base_value()
}

fn stacking(overrides: impl FnOnce(&mut StackingData)) -> StackingData {
    let mut data = StackingData {
        policy: StackPolicy::AggregateByTarget,
        limit: ScalableInt::constant(5),
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
        refresh_duration_on_successful_application: false,
        reset_period_on_successful_application: false,
        execute_on_successful_application: false,
    };
    overrides(&mut data);
    data
}

#[test]
fn deny_if_different_owner_rejects_a_second_source() {
    let mut target = target_with_attr1(0, 999, 0);
    let mut manager = EffectsManager::default();
    let tags = GameplayTagContainer::new();
    let mut sink = NullCueSink;

    let data = Arc::new(
        EffectData::builder("Buff")
            .modifier(Modifier::new(
                "Test.Attr1",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(1.0)),
            ))
            .duration(DurationData::Infinite)
            .stacking(stacking(|s| s.owner_denial_policy = StackOwnerDenialPolicy::DenyIfDifferentOwner))
            .build(),
    );

    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap()
        .unwrap();
    assert_eq!(manager.total_stack_count("Buff"), 1);

    let result = manager
        .apply_effect(Effect::new(data, 1).with_source(2), &mut target, &tags, None, None, &mut sink)
        .unwrap();
    assert!(result.is_none());
    assert_eq!(manager.total_stack_count("Buff"), 1);
}

#[test]
fn owner_override_transfers_source_and_resets_count() {
    let mut target = target_with_attr1(0, 999, 0);
    let mut manager = EffectsManager::default();
    let tags = GameplayTagContainer::new();
    let mut sink = NullCueSink;

    let data = Arc::new(
        EffectData::builder("Buff")
            .modifier(Modifier::new(
                "Test.Attr1",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(1.0)),
            ))
            .duration(DurationData::Infinite)
            .stacking(stacking(|s| {
                s.owner_override_policy = StackOwnerOverridePolicy::Override;
                s.owner_override_resets_stack_count = true;
            }))
            .build(),
    );

    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap()
        .unwrap();
    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap();
    assert_eq!(manager.total_stack_count("Buff"), 2);

    manager
        .apply_effect(Effect::new(data, 1).with_source(2), &mut target, &tags, None, None, &mut sink)
        .unwrap();
    // Ownership transferred to source 2, and the override resets the count
    // to the new application's initial_count rather than preserving 2+1.
    assert_eq!(manager.total_stack_count("Buff"), 1);
    let info = manager.get_effect_info("Buff");
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].source, Some(2));
}

#[test]
fn segregate_levels_keeps_separate_stacks_independent() {
    let mut target = target_with_attr1(0, 999, 0);
    let mut manager = EffectsManager::default();
    let tags = GameplayTagContainer::new();
    let mut sink = NullCueSink;

    let data = Arc::new(
        EffectData::builder("Buff")
            .modifier(Modifier::new(
                "Test.Attr1",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(1.0)),
            ))
            .duration(DurationData::Infinite)
            .stacking(stacking(|s| s.level_policy = StackLevelPolicy::SegregateLevels))
            .build(),
    );

    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap()
        .unwrap();
    manager
        .apply_effect(Effect::new(data, 2).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap()
        .unwrap();

    // Two independent `ActiveEffect`s, one stack each, rather than a merge.
    assert_eq!(manager.get_effect_info("Buff").len(), 2);
    assert_eq!(manager.total_stack_count("Buff"), 2);
}

#[test]
fn dont_stack_magnitude_ignores_growing_stack_count() {
    let mut target = target_with_attr1(0, 999, 0);
    let mut manager = EffectsManager::default();
    let tags = GameplayTagContainer::new();
    let mut sink = NullCueSink;

    let data = Arc::new(
        EffectData::builder("Buff")
            .modifier(Modifier::new(
                "Test.Attr1",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(3.0)),
            ))
            .duration(DurationData::Infinite)
            .stacking(stacking(|s| s.magnitude_policy = StackMagnitudePolicy::DontStack))
            .build(),
    );

    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap()
        .unwrap();
    assert_eq!(target.get(&"Test.Attr1".into()).unwrap().current_value(), 3);

    manager
        .apply_effect(Effect::new(data, 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap();
    assert_eq!(manager.total_stack_count("Buff"), 2);
    // Three stacks would be +6 under ScaleWithStackCount; DontStack holds at +3.
    assert_eq!(target.get(&"Test.Attr1".into()).unwrap().current_value(), 3);
}

// §9 design note: un-inhibiting via `ExecuteAndResetPeriod` fires one period,
// and if that lands around a successful stack reapply with
// `execute_on_successful_application`, both fire — not deduplicated.
#[test]
fn execute_and_reset_period_plus_successful_reapply_both_fire() {
    let mut target = target_with_attr1(-999, 999, 0);
    let mut manager = EffectsManager::default();
    let mut sink = NullCueSink;

    let data = Arc::new(
        EffectData::builder("Poison")
            .modifier(Modifier::new(
                "Test.Attr1",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(-1.0)),
            ))
            .duration(DurationData::Infinite)
            .periodic(PeriodicData {
                period: ModifierMagnitude::ScalableFloat(ScalableFloat::constant(1.0)),
                execute_on_apply: false,
                inhibition_removed_policy: InhibitionRemovedPolicy::ExecuteAndResetPeriod,
            })
            .ongoing_requirements(TagRequirements::new().require("Buff.Active"))
            .stacking(stacking(|s| {
                s.magnitude_policy = StackMagnitudePolicy::DontStack;
                s.execute_on_successful_application = true;
            }))
            .build(),
    );

    let no_tag = GameplayTagContainer::new();
    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &no_tag, None, None, &mut sink)
        .unwrap()
        .unwrap();

    // Not yet ticked, so not inhibited yet at apply time; this first update
    // sees the ongoing requirement unmet and inhibits it.
    manager.update_effects(0.5, &mut target, &no_tag, &NoSources, &mut sink);
    assert_eq!(base_of(&target), 0);

    // A successful reapply fires immediately regardless of inhibition.
    manager
        .apply_effect(Effect::new(data, 1).with_source(1), &mut target, &no_tag, None, None, &mut sink)
        .unwrap();
    assert_eq!(base_of(&target), -1);

    // The requirement becomes satisfied; this update un-inhibits, which
    // arms (but does not yet fire) `ExecuteAndResetPeriod`'s immediate tick.
    let mut with_tag = GameplayTagContainer::new();
    with_tag.add(GameplayTag::new("Buff.Active"));
    manager.update_effects(0.1, &mut target, &with_tag, &NoSources, &mut sink);
    assert_eq!(base_of(&target), -1);

    // The next tick consumes the armed immediate fire: a second execution
    // distinct from the reapply's, landing right after un-inhibition.
    manager.update_effects(0.1, &mut target, &with_tag, &NoSources, &mut sink);
    assert_eq!(base_of(&target), -2);
}

#[test]
fn deny_if_higher_level_rejects_a_level_up_reapply() {
    let mut target = target_with_attr1(0, 999, 0);
    let mut manager = EffectsManager::default();
    let tags = GameplayTagContainer::new();
    let mut sink = NullCueSink;

    let data = Arc::new(
        EffectData::builder("Buff")
            .modifier(Modifier::new(
                "Test.Attr1",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(1.0)),
            ))
            .duration(DurationData::Infinite)
            .stacking(stacking(|s| s.level_denial_policy = StackLevelDenialPolicy::DenyIfHigher))
            .build(),
    );

    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap()
        .unwrap();
    assert_eq!(manager.total_stack_count("Buff"), 1);

    let result = manager
        .apply_effect(Effect::new(data, 2).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap();
    assert!(result.is_none());
    assert_eq!(manager.total_stack_count("Buff"), 1);
    assert_eq!(manager.get_effect_info("Buff")[0].level, 1);
}

#[test]
fn override_if_higher_level_transfers_level_and_resets_stack_count() {
    let mut target = target_with_attr1(0, 999, 0);
    let mut manager = EffectsManager::default();
    let tags = GameplayTagContainer::new();
    let mut sink = NullCueSink;

    let data = Arc::new(
        EffectData::builder("Buff")
            .modifier(Modifier::new(
                "Test.Attr1",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(1.0)),
            ))
            .duration(DurationData::Infinite)
            .stacking(stacking(|s| {
                s.level_override_policy = StackLevelOverridePolicy::OverrideIfHigher;
                s.level_override_stack_count_policy = StackLevelOverrideStackCountPolicy::ResetToApplicationCount;
            }))
            .build(),
    );

    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap()
        .unwrap();
    manager
        .apply_effect(Effect::new(data.clone(), 1).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap();
    assert_eq!(manager.total_stack_count("Buff"), 2);

    manager
        .apply_effect(Effect::new(data, 2).with_source(1), &mut target, &tags, None, None, &mut sink)
        .unwrap();
    // The higher-level reapply overrides the stack's level and, per
    // `ResetToApplicationCount`, resets the count to its own initial count
    // rather than adding onto the existing 2.
    assert_eq!(manager.total_stack_count("Buff"), 1);
    assert_eq!(manager.get_effect_info("Buff")[0].level, 2);
}
