//! Level-scaling curves.
//!
//! A `Curve` is a monotone piecewise-linear interpolation from ordered
//! `(x, y)` keys (§6): before the first key, the first `y`; after the last,
//! the last `y`; between keys, linear. `ScalableFloat`/`ScalableInt` wrap a
//! base value with an optional curve, per level.

/// A piecewise-linear curve over ordered keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    keys: Vec<(f64, f64)>,
}

impl Curve {
    /// Builds a curve from `(x, y)` keys. Keys are sorted by `x`; callers
    /// should pass them already ordered, but this does not trust that.
    pub fn new(keys: &[(f64, f64)]) -> Self {
        let mut keys = keys.to_vec();
        keys.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("curve key is NaN"));
        Self { keys }
    }

    /// A curve that returns `value` everywhere.
    pub fn constant(value: f64) -> Self {
        Self {
            keys: vec![(0.0, value)],
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        match self.keys.as_slice() {
            [] => 1.0,
            [(_, y)] => *y,
            keys => {
                if x <= keys[0].0 {
                    return keys[0].1;
                }
                if x >= keys[keys.len() - 1].0 {
                    return keys[keys.len() - 1].1;
                }
                let upper = keys.partition_point(|(kx, _)| *kx <= x);
                let (x0, y0) = keys[upper - 1];
                let (x1, y1) = keys[upper];
                let t = (x - x0) / (x1 - x0);
                y0 + (y1 - y0) * t
            }
        }
    }
}

/// `base * curve(level)`, with `curve = 1` when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalableFloat {
    pub base: f64,
    pub curve: Option<Curve>,
}

impl ScalableFloat {
    pub fn constant(base: f64) -> Self {
        Self { base, curve: None }
    }

    pub fn scaled(base: f64, curve: Curve) -> Self {
        Self {
            base,
            curve: Some(curve),
        }
    }

    pub fn evaluate(&self, level: u32) -> f64 {
        match &self.curve {
            Some(curve) => self.base * curve.evaluate(level as f64),
            None => self.base,
        }
    }
}

/// Integer counterpart of [`ScalableFloat`], used for stack limits/initial
/// stack counts (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ScalableInt {
    pub base: i64,
    pub curve: Option<Curve>,
}

impl ScalableInt {
    pub fn constant(base: i64) -> Self {
        Self { base, curve: None }
    }

    pub fn scaled(base: i64, curve: Curve) -> Self {
        Self {
            base,
            curve: Some(curve),
        }
    }

    pub fn evaluate(&self, level: u32) -> i64 {
        match &self.curve {
            Some(curve) => ((self.base as f64) * curve.evaluate(level as f64)).trunc() as i64,
            None => self.base,
        }
    }
}
