//! The attribute pipeline: `Attribute` and `AttributeSet` (spec §3, §4.1).

use smallvec::SmallVec;
use string_cache::DefaultAtom;

use crate::error::{ForgeError, ForgeResult};

/// A stable, interned attribute key, e.g. `"TestAttributeSet.Attribute1"`.
pub type AttributeKey = DefaultAtom;

/// The operation a modifier contribution performs within a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierOperation {
    FlatBonus,
    PercentBonus,
    Override,
}

/// Opaque identity of one registered contribution, returned by
/// [`Attribute::apply`] and required by [`Attribute::unapply`]. Apply/Unapply
/// are exact inverses keyed by this id, not by value — so two `+5` flat
/// bonuses from different effects are tracked and removed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContributionId(u64);

#[derive(Debug, Clone, Copy)]
struct Contribution {
    operation: ModifierOperation,
    value: f64,
    channel: u8,
    /// Insertion order, used only to break ties between overrides on the
    /// same channel (§4.1: "the one added last wins").
    order: u64,
}

/// An integer-valued, channel-folding, clamped attribute (spec §3, §4.1).
#[derive(Debug, Clone)]
pub struct Attribute {
    key: AttributeKey,
    base: i64,
    min: i64,
    max: i64,
    channel_count: u8,
    contributions: SmallVec<[(ContributionId, Contribution); 8]>,
    next_id: u64,
    next_order: u64,
}

/// The default number of channels an attribute folds through when none is
/// specified. Four channels is enough to express the common GAS layering
/// (base buffs, percent buffs, gear overrides, debuff overrides) without
/// forcing every attribute to declare one.
pub const DEFAULT_CHANNEL_COUNT: u8 = 4;

impl Attribute {
    pub fn new(key: impl Into<AttributeKey>, min: i64, max: i64, base: i64) -> Self {
        Self::with_channels(key, min, max, base, DEFAULT_CHANNEL_COUNT)
    }

    pub fn with_channels(
        key: impl Into<AttributeKey>,
        min: i64,
        max: i64,
        base: i64,
        channel_count: u8,
    ) -> Self {
        debug_assert!(min <= max, "attribute min must not exceed max");
        let base = base.clamp(min, max);
        Self {
            key: key.into(),
            base,
            min,
            max,
            channel_count: channel_count.max(1),
            contributions: SmallVec::new(),
            next_id: 0,
            next_order: 0,
        }
    }

    pub fn key(&self) -> &AttributeKey {
        &self.key
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn base_value(&self) -> i64 {
        self.base
    }

    /// Registers a modifier contribution on `channel` and returns the id
    /// needed to [`unapply`](Attribute::unapply) it later.
    pub fn apply(&mut self, operation: ModifierOperation, value: f64, channel: u8) -> ContributionId {
        let id = ContributionId(self.next_id);
        self.next_id += 1;
        let order = self.next_order;
        self.next_order += 1;
        let channel = channel.min(self.channel_count.saturating_sub(1));
        self.contributions.push((
            id,
            Contribution {
                operation,
                value,
                channel,
                order,
            },
        ));
        id
    }

    /// Removes a previously-registered contribution. Per §7, attempting to
    /// unapply a contribution that was never applied (or already removed)
    /// is a programmer error: it panics in debug builds and returns
    /// [`ForgeError::InvariantViolation`] in release builds.
    pub fn unapply(&mut self, id: ContributionId) -> ForgeResult<()> {
        match self.contributions.iter().position(|(cid, _)| *cid == id) {
            Some(index) => {
                self.contributions.remove(index);
                Ok(())
            }
            None => {
                debug_assert!(
                    false,
                    "unapplied a contribution id ({id:?}) that was never applied to '{}'",
                    self.key
                );
                Err(ForgeError::InvariantViolation {
                    attribute: self.key.to_string(),
                })
            }
        }
    }

    /// Mutates `Base` directly, as instant effects do (§4.1). Overflow is
    /// not persisted for instant application.
    pub fn apply_instant(&mut self, operation: ModifierOperation, value: f64) {
        let raw = self.base as f64;
        let next = match operation {
            ModifierOperation::FlatBonus => raw + value,
            ModifierOperation::PercentBonus => raw * (1.0 + value),
            ModifierOperation::Override => value,
        };
        self.base = round_toward_zero(next).clamp(self.min, self.max);
    }

    /// Folds all registered contributions channel by channel (§4.1) and
    /// returns `(current_value, modifier, overflow)`.
    fn fold(&self) -> (i64, i64, i64) {
        let mut v = self.base as f64;
        for channel in 0..self.channel_count {
            // At channel 0, `v` is `Base`; at channel > 0 it carries the
            // previous channel's folded value forward (§4.1 step 1).
            let flats: f64 = self
                .contributions
                .iter()
                .filter(|(_, c)| c.channel == channel && c.operation == ModifierOperation::FlatBonus)
                .map(|(_, c)| c.value)
                .sum();
            v += flats;

            let percent_factor: f64 = self
                .contributions
                .iter()
                .filter(|(_, c)| c.channel == channel && c.operation == ModifierOperation::PercentBonus)
                .map(|(_, c)| 1.0 + c.value)
                .product();
            v *= percent_factor;

            if let Some((_, last_override)) = self
                .contributions
                .iter()
                .filter(|(_, c)| c.channel == channel && c.operation == ModifierOperation::Override)
                .max_by_key(|(_, c)| c.order)
            {
                v = last_override.value;
            }
        }

        let raw = round_toward_zero(v);
        let current = raw.clamp(self.min, self.max);
        let modifier = current - self.base;
        let overflow = raw - current;
        (current, modifier, overflow)
    }

    pub fn current_value(&self) -> i64 {
        self.fold().0
    }

    /// `CurrentValue - Base`, post-clamp.
    pub fn modifier(&self) -> i64 {
        self.fold().1
    }

    /// The signed amount clamped off past `Max` or `Min`; zero when the
    /// folded value is within range.
    pub fn overflow(&self) -> i64 {
        self.fold().2
    }

    /// `Modifier` clamped to the range that keeps `CurrentValue` in
    /// `[Min, Max]` — used by [`AttributeCalculationType::ValidModifier`].
    pub fn valid_modifier(&self) -> i64 {
        let (current, modifier, _) = self.fold();
        if current == self.max && modifier > 0 {
            (self.max - self.base).max(0)
        } else if current == self.min && modifier < 0 {
            (self.min - self.base).min(0)
        } else {
            modifier
        }
    }

    /// Current value folded only through channels `0..=k` (inclusive),
    /// unclamped — `AttributeCalculationType::MagnitudeEvaluatedUpToChannel`.
    pub fn current_value_up_to_channel(&self, k: u8) -> f64 {
        let mut v = self.base as f64;
        for channel in 0..=k.min(self.channel_count.saturating_sub(1)) {
            let flats: f64 = self
                .contributions
                .iter()
                .filter(|(_, c)| c.channel == channel && c.operation == ModifierOperation::FlatBonus)
                .map(|(_, c)| c.value)
                .sum();
            v += flats;

            let percent_factor: f64 = self
                .contributions
                .iter()
                .filter(|(_, c)| c.channel == channel && c.operation == ModifierOperation::PercentBonus)
                .map(|(_, c)| 1.0 + c.value)
                .product();
            v *= percent_factor;

            if let Some((_, last_override)) = self
                .contributions
                .iter()
                .filter(|(_, c)| c.channel == channel && c.operation == ModifierOperation::Override)
                .max_by_key(|(_, c)| c.order)
            {
                v = last_override.value;
            }
        }
        v
    }
}

fn round_toward_zero(value: f64) -> i64 {
    value.trunc() as i64
}
