//! Performance benchmarks for the effects engine.
//!
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use forge::prelude::*;

fn make_target(num_attributes: usize) -> AttributeSet {
    let mut set = AttributeSet::new("Bench");
    for i in 0..num_attributes {
        set.register(Attribute::new(format!("Bench.Attr{i}"), i64::MIN, i64::MAX, 100));
    }
    set
}

fn flat_effect(magnitude: f64) -> Arc<EffectData> {
    Arc::new(
        EffectData::builder("BenchEffect")
            .modifier(Modifier::new(
                "Bench.Attr0",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(magnitude)),
            ))
            .duration(DurationData::Infinite)
            .build(),
    )
}

// Direct attribute modification throughput, no effects involved.
fn bench_attribute_modification(c: &mut Criterion) {
    let mut group = c.benchmark_group("attribute_modification");

    for num_attributes in [10, 50, 100].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_attributes),
            num_attributes,
            |b, &num_attributes| {
                let mut set = make_target(num_attributes);
                b.iter(|| {
                    for i in 0..num_attributes {
                        let key: AttributeKey = format!("Bench.Attr{i}").into();
                        if let Some(attribute) = set.get_mut(&key) {
                            attribute.apply_instant(ModifierOperation::FlatBonus, black_box(1.0));
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

// Per-tick cost of advancing many infinite-duration effects on one target.
fn bench_duration_effect_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("duration_effect_updates");

    for num_effects in [10, 50, 100].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_effects),
            num_effects,
            |b, &num_effects| {
                let mut target = make_target(1);
                let tags = GameplayTagContainer::new();
                let mut manager = EffectsManager::default();
                let mut sink = NullCueSink;
                for _ in 0..num_effects {
                    let data = flat_effect(1.0);
                    manager
                        .apply_effect(Effect::new(data, 1), &mut target, &tags, None, None, &mut sink)
                        .unwrap();
                }

                b.iter(|| {
                    manager.update_effects(black_box(1.0 / 60.0), &mut target, &tags, &NoSources, &mut sink);
                });
            },
        );
    }

    group.finish();
}

// Channel-aggregation cost as the number of live modifiers on one attribute
// grows (the fold-per-channel-then-apply pipeline).
fn bench_attribute_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("attribute_aggregation");

    for num_modifiers in [5, 10, 20, 50].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_modifiers),
            num_modifiers,
            |b, &num_modifiers| {
                let mut target = make_target(1);
                let tags = GameplayTagContainer::new();
                let mut manager = EffectsManager::default();
                let mut sink = NullCueSink;
                for _ in 0..num_modifiers {
                    let data = flat_effect(1.0);
                    manager
                        .apply_effect(Effect::new(data, 1), &mut target, &tags, None, None, &mut sink)
                        .unwrap();
                }

                b.iter(|| {
                    manager.update_effects(black_box(1.0 / 60.0), &mut target, &tags, &NoSources, &mut sink);
                });
            },
        );
    }

    group.finish();
}

// Apply/unapply round-trip throughput across many independent targets.
fn bench_effect_application(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_application");

    for num_targets in [10, 50, 100].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_targets),
            num_targets,
            |b, &num_targets| {
                let tags = GameplayTagContainer::new();
                let data = flat_effect(5.0);
                let mut sink = NullCueSink;

                b.iter(|| {
                    for _ in 0..num_targets {
                        let mut target = make_target(1);
                        let mut manager = EffectsManager::default();
                        let handle = manager
                            .apply_effect(
                                Effect::new(data.clone(), 1),
                                &mut target,
                                &tags,
                                None,
                                None,
                                &mut sink,
                            )
                            .unwrap()
                            .unwrap();
                        manager
                            .unapply_effect(handle, &mut target, true, None, &mut sink)
                            .unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_attribute_modification,
    bench_duration_effect_updates,
    bench_attribute_aggregation,
    bench_effect_application,
);
criterion_main!(benches);
