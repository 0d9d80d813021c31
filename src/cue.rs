//! Cues: fire-and-forget notifications about effect lifecycle events, for
//! a host to drive VFX/SFX/UI off of (§3). Forge never blocks on a cue and
//! never retries a failed one — `CueSink` is a one-way sink, not a
//! request/response collaborator.

use crate::attribute::AttributeKey;
use crate::handle::EffectHandle;
use crate::magnitude::SourceId;

/// One lifecycle notification. Carries just enough for a host to route a
/// presentation effect; Forge does not interpret these further once sent.
#[derive(Debug, Clone)]
pub enum CueEvent {
    OnApply {
        handle: EffectHandle,
        effect: String,
        source: Option<SourceId>,
    },
    /// Fired for an instant application, or once per periodic tick.
    OnExecute {
        handle: Option<EffectHandle>,
        effect: String,
        modified: Vec<(AttributeKey, f64)>,
    },
    OnRemove {
        handle: EffectHandle,
        effect: String,
    },
    OnStackChange {
        handle: EffectHandle,
        effect: String,
        old_count: u32,
        new_count: u32,
    },
}

/// Host-implemented sink for [`CueEvent`]s. The default no-op
/// implementation lets callers that don't care about presentation ignore
/// cues entirely.
pub trait CueSink {
    fn on_cue(&mut self, event: CueEvent);
}

/// A [`CueSink`] that discards every event.
pub struct NullCueSink;

impl CueSink for NullCueSink {
    fn on_cue(&mut self, _event: CueEvent) {}
}

/// Collects every event it receives, in order — useful for tests and for
/// hosts that want to batch-process cues once per frame.
#[derive(Default)]
pub struct RecordingCueSink {
    pub events: Vec<CueEvent>,
}

impl CueSink for RecordingCueSink {
    fn on_cue(&mut self, event: CueEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn recording_sink_preserves_order() {
        let mut keys: SlotMap<EffectHandle, ()> = SlotMap::with_key();
        let handle = keys.insert(());
        let mut sink = RecordingCueSink::default();
        sink.on_cue(CueEvent::OnApply {
            handle,
            effect: "Buff".into(),
            source: None,
        });
        sink.on_cue(CueEvent::OnRemove {
            handle,
            effect: "Buff".into(),
        });
        assert_eq!(sink.events.len(), 2);
        assert!(matches!(sink.events[0], CueEvent::OnApply { .. }));
        assert!(matches!(sink.events[1], CueEvent::OnRemove { .. }));
    }
}
