//! Forge
//!
//! A data-driven gameplay effects engine: attributes, modifiers, and effect
//! lifecycles, usable from any host without a dependency on a particular ECS
//! or renderer.
//!
//! # Features
//!
//! - **Attribute system**: channel-folding, clamped, integer-valued
//!   attributes with base/current value separation.
//! - **Gameplay effects**: instant, duration, and infinite effects, with
//!   periodic execution, stacking, and tag-gated application/ongoing
//!   requirements.
//! - **Custom executions**: a capability trait for effects whose modifiers
//!   can't be expressed as static magnitude formulas.
//! - **Gameplay cues**: a one-way notification sink a host drives
//!   presentation off of; Forge never blocks on it.
//! - **Tag-based gating**: a minimal hierarchical tag container and query
//!   combinators sufficient to drive application/ongoing requirements.
//!
//! # Quick start
//!
//! ```
//! use forge::prelude::*;
//! use std::sync::Arc;
//!
//! let mut target = AttributeSet::new("Player");
//! target.register(Attribute::new("Player.Health", 0, 100, 100));
//!
//! let data = Arc::new(
//!     EffectData::builder("Poison")
//!         .modifier(Modifier::new(
//!             "Player.Health",
//!             ModifierOperation::FlatBonus,
//!             ModifierMagnitude::ScalableFloat(ScalableFloat::constant(-5.0)),
//!         ))
//!         .build(),
//! );
//!
//! let mut manager = EffectsManager::default();
//! let tags = GameplayTagContainer::new();
//! let mut cues = NullCueSink;
//! manager
//!     .apply_effect(Effect::new(data, 1), &mut target, &tags, None, None, &mut cues)
//!     .unwrap();
//! ```
//!
//! # Architecture
//!
//! The engine is built on the modules below, each independently usable:
//!
//! 1. **Attributes**: base values and channel-aggregated modifier stacks.
//! 2. **Effects**: the data/instance split (`EffectData` is a shared
//!    definition, `Effect` is one application of it) and the evaluated
//!    numeric snapshot an application resolves to.
//! 3. **Stacking**: policy-driven merging of repeated applications.
//! 4. **Cues**: outbound notifications for a host's presentation layer.
//!
//! A concrete `Entity`/`World` pairing is provided for hosts without their
//! own entity storage; hosts with one call `EffectsManager` directly.

pub mod active_effect;
pub mod attribute;
pub mod attribute_set;
pub mod cue;
pub mod curve;
pub mod effect;
pub mod effect_data;
pub mod entity;
pub mod error;
pub mod evaluated;
pub mod execution;
pub mod handle;
pub mod magnitude;
pub mod manager;
pub mod stacking;
pub mod tags;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::active_effect::{ActiveEffect, ActiveEffectState, TickOutcome};
    pub use crate::attribute::{Attribute, AttributeKey, ContributionId, ModifierOperation};
    pub use crate::attribute_set::AttributeSet;
    pub use crate::cue::{CueEvent, CueSink, NullCueSink, RecordingCueSink};
    pub use crate::curve::{Curve, ScalableFloat, ScalableInt};
    pub use crate::effect::{ContextPayload, Effect};
    pub use crate::effect_data::{
        DurationData, EffectComponents, EffectData, EffectDataBuilder, InhibitionRemovedPolicy,
        Modifier, PeriodicData, StackExpirationPolicy, StackLevelDenialPolicy, StackLevelOverridePolicy,
        StackLevelOverrideStackCountPolicy, StackLevelPolicy, StackMagnitudePolicy,
        StackOverflowPolicy, StackOwnerDenialPolicy, StackOwnerOverridePolicy, StackPolicy,
        StackingData,
    };
    pub use crate::entity::{Entity, World};
    pub use crate::error::{ForgeError, ForgeResult};
    pub use crate::evaluated::{EvaluatedDuration, EvaluatedEffect, EvaluatedModifierEntry};
    pub use crate::execution::{Execution, EvaluatedModifier, MagnitudeCalculator};
    pub use crate::handle::EffectHandle;
    pub use crate::magnitude::{
        AttributeCalculationType, AttributeCaptureDefinition, CaptureSide, MagnitudeContext,
        ModifierMagnitude, NoSources, SourceId, SourceLookup,
    };
    pub use crate::manager::{EffectInfo, EffectsManager, EffectsManagerConfig};
    pub use crate::stacking::{StackDecision, StackTable};
    pub use crate::tags::{GameplayTag, GameplayTagContainer, TagQuery, TagRequirements};
}
