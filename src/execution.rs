//! Capability traits for custom logic (§4.6, §9): [`MagnitudeCalculator`]
//! for a single modifier's `CustomCalculatorClass`, [`Execution`] for an
//! effect component that produces several modifiers at once (damage-over-
//! several-attributes, life-steal, and similar cross-attribute math).
//!
//! Both are host-authored, `Send + Sync` trait objects registered on an
//! [`crate::effect_data::EffectData`] — Forge never constructs one.

use crate::curve::Curve;
use crate::magnitude::{AttributeCaptureDefinition, MagnitudeContext};

/// A pluggable replacement for the closed-form magnitude formula (§4.2's
/// `CustomCalculatorClass` variant). `calculate_base_magnitude` plays the
/// same role `AttributeBased`'s captured value plays: it feeds into the
/// shared `(value + pre_add) * coefficient + post_add`, then `curve`.
pub trait MagnitudeCalculator: Send + Sync {
    /// The attributes this calculator reads. Declared up front so the
    /// engine can build the non-snapshot watch-set and the apply-time
    /// capture failure check (§4.6) without invoking the calculator.
    fn capture_definitions(&self) -> Vec<AttributeCaptureDefinition>;

    /// Returns `None` on capture failure, absorbed the same way a single
    /// `AttributeBased` capture failure is (§7).
    fn calculate_base_magnitude(&self, ctx: &MagnitudeContext) -> Option<f64>;

    fn pre_add(&self) -> f64 {
        0.0
    }

    fn coefficient(&self) -> f64 {
        1.0
    }

    fn post_add(&self) -> f64 {
        0.0
    }

    fn curve(&self) -> Option<&Curve> {
        None
    }
}

/// One modifier an [`Execution`] produces: the attribute it targets, the
/// operation, the resolved magnitude, and the channel.
#[derive(Debug, Clone)]
pub struct EvaluatedModifier {
    pub attribute: crate::attribute::AttributeKey,
    pub operation: crate::attribute::ModifierOperation,
    pub magnitude: f64,
    pub channel: u8,
}

/// A component that computes several modifiers from one pass over the
/// captured attributes (§4.6) — e.g. "deal damage equal to AttackPower
/// minus target Armor, and heal the source for 20% of that". If any
/// declared capture is unsatisfiable, the whole execution is skipped: no
/// partial set of modifiers is ever applied.
pub trait Execution: Send + Sync {
    fn capture_definitions(&self) -> Vec<AttributeCaptureDefinition>;

    fn execute(&self, ctx: &MagnitudeContext) -> Vec<EvaluatedModifier>;
}

/// Runs an execution's capture-satisfiability gate, then its body.
/// Returns `None` (skip) rather than an empty `Vec` when a declared
/// capture fails, so callers can distinguish "ran, produced nothing" from
/// "didn't run" for logging.
pub fn run_execution(execution: &dyn Execution, ctx: &MagnitudeContext) -> Option<Vec<EvaluatedModifier>> {
    for def in execution.capture_definitions() {
        if ctx.capture(&def).is_none() {
            return None;
        }
    }
    Some(execution.execute(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, AttributeKey, ModifierOperation};
    use crate::attribute_set::AttributeSet;
    use crate::magnitude::{AttributeCalculationType, CaptureSide};
    use std::collections::HashMap;

    struct Drain(AttributeKey);

    impl Execution for Drain {
        fn capture_definitions(&self) -> Vec<AttributeCaptureDefinition> {
            vec![AttributeCaptureDefinition::new(
                self.0.clone(),
                CaptureSide::Target,
                true,
                AttributeCalculationType::CurrentValue,
            )]
        }

        fn execute(&self, ctx: &MagnitudeContext) -> Vec<EvaluatedModifier> {
            let current = ctx
                .capture(&self.capture_definitions()[0])
                .unwrap_or(0.0);
            vec![EvaluatedModifier {
                attribute: self.0.clone(),
                operation: ModifierOperation::FlatBonus,
                magnitude: -(current / 2.0).trunc(),
                channel: 0,
            }]
        }
    }

    #[test]
    fn skips_entirely_on_unsatisfied_capture() {
        let execution = Drain(AttributeKey::from("Missing.Attr"));
        let target = AttributeSet::new("Test");
        let ctx = MagnitudeContext {
            source: None,
            target: &target,
            level: 1,
            caller_magnitudes: &HashMap::new(),
            payload: None,
        };
        assert!(run_execution(&execution, &ctx).is_none());
    }

    #[test]
    fn runs_when_captures_satisfied() {
        let execution = Drain(AttributeKey::from("Test.Health"));
        let mut target = AttributeSet::new("Test");
        target.register(Attribute::new("Test.Health", 0, 100, 40));
        let ctx = MagnitudeContext {
            source: None,
            target: &target,
            level: 1,
            caller_magnitudes: &HashMap::new(),
            payload: None,
        };
        let modifiers = run_execution(&execution, &ctx).unwrap();
        assert_eq!(modifiers.len(), 1);
        assert_eq!(modifiers[0].magnitude, -20.0);
    }
}
