//! Error types for the effects engine.
//!
//! Per the spec's error-handling policy, most data-shape problems (a missing
//! attribute, a failed capture, an unsatisfiable execution) are *not* errors:
//! they are silently absorbed at the point of evaluation so the rest of an
//! effect application can proceed. Only the handful of genuinely fatal
//! conditions reach this type.

use thiserror::Error;

/// Errors the effects engine can surface.
///
/// Everything here is fatal in the sense the spec uses the word: gameplay
/// cannot sensibly continue past it for the operation in question. Anything
/// recoverable (missing attribute, failed capture, unsatisfiable execution,
/// unknown `SetByCaller` tag) is handled inline and never reaches this enum.
#[derive(Debug, Error, PartialEq)]
pub enum ForgeError {
    /// A `PeriodicData.period` evaluated to `<= 0` during apply or recompute.
    #[error("periodic effect '{effect}' evaluated to a non-positive period ({period}) at level {level}")]
    InvalidPeriod {
        effect: String,
        period: f64,
        level: u32,
    },

    /// The Apply/Unapply pipeline was asked to undo a contribution that was
    /// never registered (or was already removed). In debug builds this is
    /// also caught by a `debug_assert!` closer to the call site; this typed
    /// variant exists so a release build has a recoverable path instead of
    /// silently corrupting attribute state.
    #[error("attempted to unapply a contribution that was never applied to '{attribute}'")]
    InvariantViolation { attribute: String },

    /// A handle passed back to the manager does not (or no longer) refers to
    /// a live active effect. Per §5 this is "fails silently" for read/removal
    /// calls, but manager-internal recompute paths that require a live
    /// handle raise it.
    #[error("effect handle is stale or unknown")]
    StaleHandle,
}

pub type ForgeResult<T> = Result<T, ForgeError>;
