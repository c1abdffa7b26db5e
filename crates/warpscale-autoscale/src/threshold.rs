//! Variable scale-down thresholds.
//!
//! The utilization cap is interpolated linearly between two anchor group
//! sizes, then discounted for the loss of one node:
//!
//! ```text
//! m_high = g_high * m
//! m_low  = g_low  * m
//! a = (m_high - m_low) / (n_high - n_low)
//! b = m_low - n_low * a
//! threshold(n) = (a*n + b) * (1 - 1/n)
//! ```
//!
//! Removing one of `n` nodes raises per-node load by `n/(n-1)`, so the
//! cap that permits a scale-down shrinks by `(1 - 1/n)`.

/// Interpolation parameters for one group and alarm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableThreshold {
    pub n_low: u32,
    pub n_high: u32,
    /// Nominal max utilization.
    pub m: f64,
    /// Headroom multiplier at `n_low`.
    pub g_low: f64,
    /// Headroom multiplier at `n_high`.
    pub g_high: f64,
}

impl VariableThreshold {
    /// True when the anchors cannot define a useful interpolation; callers
    /// fall back to the alarm's fixed threshold.
    pub fn is_degenerate(&self) -> bool {
        self.n_low == self.n_high || self.g_low == self.g_high
    }

    /// Threshold for a group of `n` nodes.
    ///
    /// `None` for `n == 0` or when `n_low == n_high`.
    pub fn at(&self, n: u32) -> Option<f64> {
        if n == 0 || self.n_low == self.n_high {
            return None;
        }
        let m_high = self.g_high * self.m;
        let m_low = self.g_low * self.m;
        let a = (m_high - m_low) / (f64::from(self.n_high) - f64::from(self.n_low));
        let b = m_low - f64::from(self.n_low) * a;
        let n = f64::from(n);
        Some((a * n + b) * (1.0 - 1.0 / n))
    }
}
