use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Bounded Kelly Criterion position sizing
///
/// The Kelly Criterion determines the optimal position size to maximize
/// long-term growth rate. Formula: f* = p - q / b
/// where:
///   f* = optimal fraction of capital to wager
///   b = reward:risk ratio of the trade
///   p = probability of winning (signal confidence / 100)
///   q = probability of losing (1 - p)
///
/// The result is always clamped into `[min_fraction, max_fraction]`; a
/// negative or undefined edge sizes at `min_fraction` rather than zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellyPositionSizer {
    /// Smallest fraction ever returned (e.g., 0.02 = 2%)
    pub min_fraction: f64,

    /// Largest fraction ever returned (e.g., 0.25 = 25%)
    pub max_fraction: f64,

    /// Fractional Kelly multiplier (e.g., 0.5 for half-Kelly)
    pub kelly_multiplier: f64,
}

/// Position sizing recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellySize {
    /// Kelly fraction before multiplier and bounds
    pub raw_kelly_fraction: f64,

    /// Fraction of capital to allocate, within the configured bounds
    pub fraction: f64,
}

impl Default for KellyPositionSizer {
    fn default() -> Self {
        Self {
            min_fraction: 0.02,
            max_fraction: 0.25,
            kelly_multiplier: 1.0,
        }
    }
}

impl KellyPositionSizer {
    pub fn new(min_fraction: f64, max_fraction: f64, kelly_multiplier: f64) -> Result<Self> {
        if !max_fraction.is_finite() || max_fraction <= 0.0 || max_fraction > 1.0 {
            bail!("max_fraction must be between 0 and 1, got {}", max_fraction);
        }
        if !min_fraction.is_finite() || min_fraction < 0.0 || min_fraction > max_fraction {
            bail!("min_fraction must be >= 0 and <= max_fraction, got {}", min_fraction);
        }
        if !kelly_multiplier.is_finite() || kelly_multiplier <= 0.0 || kelly_multiplier > 1.0 {
            bail!("kelly_multiplier must be between 0 and 1, got {}", kelly_multiplier);
        }

        Ok(Self {
            min_fraction,
            max_fraction,
            kelly_multiplier,
        })
    }

    /// Unbounded Kelly fraction for win probability `p` and payoff ratio `b`.
    /// `p` is clamped to [0, 1] (NaN reads as 0); a non-positive or undefined
    /// payoff has no edge and returns `-q`.
    pub fn raw_fraction(win_probability: f64, reward_risk: f64) -> f64 {
        let p = if win_probability.is_nan() {
            0.0
        } else {
            win_probability.clamp(0.0, 1.0)
        };
        let q = 1.0 - p;

        if !reward_risk.is_finite() || reward_risk <= 0.0 {
            return -q;
        }
        p - q / reward_risk
    }

    /// Size a trade from ensemble confidence (0-100) and the trade's reward:risk ratio.
    pub fn size(&self, confidence_pct: f64, reward_risk: f64) -> KellySize {
        let raw = Self::raw_fraction(confidence_pct / 100.0, reward_risk);
        let fractional = raw * self.kelly_multiplier;

        let fraction = if fractional.is_nan() || fractional < 0.0 {
            self.min_fraction
        } else {
            fractional.clamp(self.min_fraction, self.max_fraction)
        };

        KellySize {
            raw_kelly_fraction: raw,
            fraction,
        }
    }
}
