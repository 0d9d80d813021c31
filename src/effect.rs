//! `Effect`: a level, a source/owner, and caller-set magnitudes paired with
//! an [`EffectData`] (§3, §4.8).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::effect_data::EffectData;
use crate::magnitude::SourceId;
use crate::tags::GameplayTag;

/// Arbitrary, type-erased data an applier attaches to one application —
/// hit location, a crit flag, whatever a custom calculator or execution
/// wants to read back (§4.8). Forge never inspects the contents.
#[derive(Default)]
pub struct ContextPayload(Option<Box<dyn Any + Send + Sync>>);

impl ContextPayload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub fn try_get<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(<dyn Any>::downcast_ref)
    }
}

impl std::fmt::Debug for ContextPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPayload")
            .field("present", &self.0.is_some())
            .finish()
    }
}

/// One application of an [`EffectData`]: the definition plus everything
/// that varies per-application.
#[derive(Debug, Clone)]
pub struct Effect {
    pub data: Arc<EffectData>,
    pub level: u32,
    /// The entity whose action caused this application — read by
    /// `AttributeBased`/`CustomCalculatorClass` magnitudes on the `Source`
    /// side, and recorded for `GetEffectInfo` (§3, §9).
    pub source: Option<SourceId>,
    /// The entity credited as responsible for the effect (e.g. the player
    /// who owns a turret that fired it), distinct from `source` per §3.
    pub owner: Option<SourceId>,
    pub caller_magnitudes: HashMap<GameplayTag, f64>,
}

impl Effect {
    pub fn new(data: Arc<EffectData>, level: u32) -> Self {
        Self {
            data,
            level,
            source: None,
            owner: None,
            caller_magnitudes: HashMap::new(),
        }
    }

    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_owner(mut self, owner: SourceId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn set_by_caller(mut self, tag: impl Into<GameplayTag>, value: f64) -> Self {
        self.caller_magnitudes.insert(tag.into(), value);
        self
    }
}
