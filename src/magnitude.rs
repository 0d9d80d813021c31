//! The magnitude evaluator (§4.2): resolves a [`ModifierMagnitude`] to a
//! scalar for a given `(effect, target)` pair.

use std::collections::HashMap;
use std::sync::Arc;

use crate::attribute_set::AttributeSet;
use crate::curve::{Curve, ScalableFloat};
use crate::effect::ContextPayload;
use crate::execution::MagnitudeCalculator;
use crate::tags::GameplayTag;

/// Opaque identity of a source or owner entity, assigned and interpreted by
/// the host. Forge never dereferences it except through [`SourceLookup`];
/// per §9's ownership-cycle note, this is how `ActiveEffect -> source` stays
/// a weak reference rather than an owning one.
pub type SourceId = u64;

/// Resolves a [`SourceId`] to that entity's current attribute set. The host
/// implements this however it stores entities; Forge calls it once per
/// non-snapshot recompute and once per periodic/tick evaluation.
pub trait SourceLookup {
    fn attribute_set(&self, source: SourceId) -> Option<&AttributeSet>;
}

/// A [`SourceLookup`] that never has a live source — used for effects with
/// no source-dependent magnitudes.
pub struct NoSources;

impl SourceLookup for NoSources {
    fn attribute_set(&self, _source: SourceId) -> Option<&AttributeSet> {
        None
    }
}

/// Which side of the application an [`AttributeCaptureDefinition`] reads
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureSide {
    Source,
    Target,
}

/// How a captured attribute's scalar is derived (§4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeCalculationType {
    BaseValue,
    CurrentValue,
    Min,
    Max,
    Modifier,
    Overflow,
    /// `Modifier` clamped to the range that keeps `Current` in `[Min, Max]`.
    ValidModifier,
    /// Current value folded only through channels `0..=k`.
    MagnitudeEvaluatedUpToChannel(u8),
}

/// Declares which attribute, on which side, under which snapshot policy and
/// calculation type, a magnitude or execution wants to read.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeCaptureDefinition {
    pub attribute: crate::attribute::AttributeKey,
    pub side: CaptureSide,
    /// `true`: captured once at apply time. `false`: re-read on every
    /// recompute, and the attribute is subscribed to (§4.3).
    pub snapshot: bool,
    pub calculation: AttributeCalculationType,
}

impl AttributeCaptureDefinition {
    pub fn new(
        attribute: impl Into<crate::attribute::AttributeKey>,
        side: CaptureSide,
        snapshot: bool,
        calculation: AttributeCalculationType,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            side,
            snapshot,
            calculation,
        }
    }
}

/// The context a magnitude (or execution) evaluates against: the two
/// attribute sets, the effect's level, its caller-set magnitudes, and the
/// optional application-context payload (§4.8).
pub struct MagnitudeContext<'a> {
    pub source: Option<&'a AttributeSet>,
    pub target: &'a AttributeSet,
    pub level: u32,
    pub caller_magnitudes: &'a HashMap<GameplayTag, f64>,
    pub payload: Option<&'a ContextPayload>,
}

impl<'a> MagnitudeContext<'a> {
    fn side(&self, side: CaptureSide) -> Option<&'a AttributeSet> {
        match side {
            CaptureSide::Source => self.source,
            CaptureSide::Target => Some(self.target),
        }
    }

    /// Resolves a capture definition to a scalar, or `None` on capture
    /// failure (null owner, or the attribute absent on that side) — §4.2,
    /// §7: a non-fatal, silently-absorbed condition.
    pub fn capture(&self, def: &AttributeCaptureDefinition) -> Option<f64> {
        let set = self.side(def.side)?;
        let attribute = set.get(&def.attribute)?;
        Some(match def.calculation {
            AttributeCalculationType::BaseValue => attribute.base_value() as f64,
            AttributeCalculationType::CurrentValue => attribute.current_value() as f64,
            AttributeCalculationType::Min => attribute.min() as f64,
            AttributeCalculationType::Max => attribute.max() as f64,
            AttributeCalculationType::Modifier => attribute.modifier() as f64,
            AttributeCalculationType::Overflow => attribute.overflow() as f64,
            AttributeCalculationType::ValidModifier => attribute.valid_modifier() as f64,
            AttributeCalculationType::MagnitudeEvaluatedUpToChannel(k) => {
                attribute.current_value_up_to_channel(k)
            }
        })
    }
}

/// The sum-type magnitude a [`crate::effect_data::Modifier`] (or a
/// duration/period) resolves through (§3, §9 design note: modeled as a
/// tagged sum type rather than an options-struct with nullable fields).
#[derive(Clone)]
pub enum ModifierMagnitude {
    ScalableFloat(ScalableFloat),
    AttributeBased {
        capture: AttributeCaptureDefinition,
        pre_add: f64,
        coefficient: f64,
        post_add: f64,
        curve: Option<Curve>,
    },
    CustomCalculatorClass(Arc<dyn MagnitudeCalculator>),
    SetByCaller(GameplayTag),
}

impl std::fmt::Debug for ModifierMagnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModifierMagnitude::ScalableFloat(v) => f.debug_tuple("ScalableFloat").field(v).finish(),
            ModifierMagnitude::AttributeBased { capture, .. } => {
                f.debug_tuple("AttributeBased").field(capture).finish()
            }
            ModifierMagnitude::CustomCalculatorClass(_) => {
                f.debug_tuple("CustomCalculatorClass").finish()
            }
            ModifierMagnitude::SetByCaller(tag) => f.debug_tuple("SetByCaller").field(tag).finish(),
        }
    }
}

impl ModifierMagnitude {
    /// Resolves this magnitude to a scalar. Capture failures of any kind
    /// (missing attribute, null source, unknown `SetByCaller` tag) resolve
    /// to `0.0` rather than propagating an error (§4.2, §7).
    pub fn evaluate(&self, ctx: &MagnitudeContext) -> f64 {
        match self {
            ModifierMagnitude::ScalableFloat(sf) => sf.evaluate(ctx.level),
            ModifierMagnitude::AttributeBased {
                capture,
                pre_add,
                coefficient,
                post_add,
                curve,
            } => {
                let Some(captured) = ctx.capture(capture) else {
                    return 0.0;
                };
                let mut m = (captured + pre_add) * coefficient + post_add;
                if let Some(curve) = curve {
                    m = curve.evaluate(m);
                }
                m
            }
            ModifierMagnitude::CustomCalculatorClass(calculator) => {
                let Some(base) = calculator.calculate_base_magnitude(ctx) else {
                    return 0.0;
                };
                let mut m = (base + calculator.pre_add()) * calculator.coefficient() + calculator.post_add();
                if let Some(curve) = calculator.curve() {
                    m = curve.evaluate(m);
                }
                m
            }
            ModifierMagnitude::SetByCaller(tag) => {
                ctx.caller_magnitudes.get(tag).copied().unwrap_or(0.0)
            }
        }
    }

    /// Every non-snapshot attribute capture this magnitude declares, plus
    /// (for a custom calculator) everything it declares non-snapshot.
    /// Feeds the watch-set §4.3 builds.
    pub fn non_snapshot_captures(&self) -> Vec<AttributeCaptureDefinition> {
        match self {
            ModifierMagnitude::AttributeBased { capture, .. } if !capture.snapshot => {
                vec![capture.clone()]
            }
            ModifierMagnitude::CustomCalculatorClass(calculator) => calculator
                .capture_definitions()
                .into_iter()
                .filter(|c| !c.snapshot)
                .collect(),
            _ => Vec::new(),
        }
    }
}
