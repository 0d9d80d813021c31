//! `EvaluatedEffect`: the frozen, numeric snapshot an [`crate::effect::Effect`]
//! resolves to against one target (§4.3).
//!
//! §9 open question: whether non-snapshot captures are tracked per-modifier
//! or as one combined watch-set on the whole evaluated effect. Resolved
//! here in favor of a single combined set — on any relevant attribute
//! write, the whole snapshot is recomputed and diffed, rather than patching
//! individual modifier entries. Simpler to reason about and correct for
//! the common case of one or two non-snapshot captures per effect; the
//! cost is re-evaluating snapshot captures that didn't need to change,
//! which is cheap relative to a contribution re-apply.

use smallvec::SmallVec;

use crate::attribute::{AttributeKey, ModifierOperation};
use crate::effect_data::{DurationData, EffectData, StackMagnitudePolicy};
use crate::execution;
use crate::magnitude::{AttributeCaptureDefinition, MagnitudeContext};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluatedDuration {
    Instant,
    Infinite,
    Timed(f64),
}

/// One resolved modifier magnitude, ready to hand to
/// [`crate::attribute::Attribute::apply`] or
/// [`crate::attribute::Attribute::apply_instant`].
#[derive(Debug, Clone)]
pub struct EvaluatedModifierEntry {
    pub attribute: AttributeKey,
    pub operation: ModifierOperation,
    pub channel: u8,
    pub magnitude: f64,
}

/// The numeric snapshot of one application of an effect to one target.
#[derive(Debug, Clone)]
pub struct EvaluatedEffect {
    pub duration: EvaluatedDuration,
    pub period: Option<f64>,
    pub modifiers: SmallVec<[EvaluatedModifierEntry; 4]>,
    pub stack_count: u32,
}

impl EvaluatedEffect {
    /// Evaluates `data` against `ctx` at the given stack count. Capture
    /// failures inside individual magnitudes resolve to zero (§4.2, §7);
    /// a whole-execution capture failure drops just that execution's
    /// modifiers, not the rest of the effect (§4.6).
    pub fn evaluate(data: &EffectData, ctx: &MagnitudeContext, stack_count: u32) -> Self {
        let duration = match &data.duration {
            DurationData::Instant => EvaluatedDuration::Instant,
            DurationData::Infinite => EvaluatedDuration::Infinite,
            DurationData::HasDuration(magnitude) => {
                EvaluatedDuration::Timed(magnitude.evaluate(ctx))
            }
        };

        let period = data.periodic.as_ref().map(|p| p.period.evaluate(ctx));

        let scale = match data.stacking.as_ref().map(|s| s.magnitude_policy) {
            Some(StackMagnitudePolicy::ScaleWithStackCount) => stack_count.max(1) as f64,
            _ => 1.0,
        };

        let mut modifiers: SmallVec<[EvaluatedModifierEntry; 4]> = data
            .modifiers
            .iter()
            .map(|m| EvaluatedModifierEntry {
                attribute: m.attribute.clone(),
                operation: m.operation,
                channel: m.channel,
                magnitude: m.magnitude.evaluate(ctx) * scale,
            })
            .collect();

        if let Some(exec) = &data.execution {
            if let Some(produced) = execution::run_execution(exec.as_ref(), ctx) {
                modifiers.extend(produced.into_iter().map(|m| EvaluatedModifierEntry {
                    attribute: m.attribute,
                    operation: m.operation,
                    channel: m.channel,
                    magnitude: m.magnitude * scale,
                }));
            }
        }

        Self {
            duration,
            period,
            modifiers,
            stack_count,
        }
    }

    /// Every non-snapshot attribute capture this effect's modifiers,
    /// duration, period, and execution declare. An empty watch set means
    /// the snapshot never needs to be recomputed once applied.
    pub fn watch_set(data: &EffectData) -> Vec<AttributeCaptureDefinition> {
        if data.force_snapshot_captures {
            return Vec::new();
        }
        let mut watch = Vec::new();
        for modifier in &data.modifiers {
            watch.extend(modifier.magnitude.non_snapshot_captures());
        }
        if let DurationData::HasDuration(magnitude) = &data.duration {
            watch.extend(magnitude.non_snapshot_captures());
        }
        if let Some(periodic) = &data.periodic {
            watch.extend(periodic.period.non_snapshot_captures());
        }
        if let Some(exec) = &data.execution {
            watch.extend(exec.capture_definitions().into_iter().filter(|c| !c.snapshot));
        }
        watch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::attribute_set::AttributeSet;
    use crate::curve::ScalableFloat;
    use crate::effect_data::{Modifier, StackingData};
    use crate::magnitude::ModifierMagnitude;
    use std::collections::HashMap;

    fn ctx<'a>(target: &'a AttributeSet) -> MagnitudeContext<'a> {
        MagnitudeContext {
            source: None,
            target,
            level: 1,
            caller_magnitudes: &HashMap::new(),
            payload: None,
        }
    }

    #[test]
    fn scales_with_stack_count_by_default() {
        let mut target = AttributeSet::new("Test");
        target.register(Attribute::new("Test.Health", 0, 999, 0));
        let data = EffectData::builder("DamageOverTime")
            .modifier(Modifier::new(
                "Test.Health",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(-5.0)),
            ))
            .stacking(StackingData::default())
            .build();
        let ctx = ctx(&target);
        let evaluated = EvaluatedEffect::evaluate(&data, &ctx, 3);
        assert_eq!(evaluated.modifiers[0].magnitude, -15.0);
    }

    #[test]
    fn empty_watch_set_when_every_capture_is_snapshot() {
        let data = EffectData::builder("Simple")
            .modifier(Modifier::new(
                "Test.Health",
                ModifierOperation::FlatBonus,
                ModifierMagnitude::ScalableFloat(ScalableFloat::constant(5.0)),
            ))
            .build();
        assert!(EvaluatedEffect::watch_set(&data).is_empty());
    }
}
