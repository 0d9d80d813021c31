//! Generation-indexed handles (spec §9 design notes).
//!
//! `EffectHandle` is the opaque token [`crate::manager::EffectsManager`]
//! hands back from `apply_effect`. It's backed by `slotmap` rather than the
//! teacher's hand-rolled `(Entity, generation)` pair — same idea (a slot
//! index plus a generation counter so a stale handle can't alias a reused
//! slot), ecosystem crate instead of reimplementing it.

use slotmap::new_key_type;

new_key_type! {
    /// A stable reference to one [`crate::active_effect::ActiveEffect`]
    /// installed on a target's [`crate::manager::EffectsManager`]. Using a
    /// handle whose slot has been freed and reused is detected by the
    /// generation counter and fails silently (§5), never aliases.
    pub struct EffectHandle;
}
