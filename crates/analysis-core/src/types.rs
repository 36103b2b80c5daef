use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::clamp_or;

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
}

/// The four prediction sources that feed the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelSource {
    Trend,
    Pattern,
    Technical,
    Sentiment,
}

impl ModelSource {
    /// Canonical order used for contributing opinions.
    pub const ALL: [ModelSource; 4] = [
        ModelSource::Trend,
        ModelSource::Pattern,
        ModelSource::Technical,
        ModelSource::Sentiment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelSource::Trend => "trend",
            ModelSource::Pattern => "pattern",
            ModelSource::Technical => "technical",
            ModelSource::Sentiment => "sentiment",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ModelSource::Trend => 0,
            ModelSource::Pattern => 1,
            ModelSource::Technical => 2,
            ModelSource::Sentiment => 3,
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a single model's opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpinionDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl OpinionDirection {
    pub fn sign(&self) -> f64 {
        match self {
            OpinionDirection::Bullish => 1.0,
            OpinionDirection::Bearish => -1.0,
            OpinionDirection::Neutral => 0.0,
        }
    }

    /// Direction from the sign of a score; zero (and NaN) is neutral.
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            OpinionDirection::Bullish
        } else if value < 0.0 {
            OpinionDirection::Bearish
        } else {
            OpinionDirection::Neutral
        }
    }
}

pub type OpinionMetadata = serde_json::Map<String, serde_json::Value>;

/// One model's directional prediction, normalized for the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOpinion {
    pub source: ModelSource,
    pub direction: OpinionDirection,
    /// 0.0 to 1.0
    pub strength: f64,
    #[serde(default)]
    pub metadata: OpinionMetadata,
}

impl ModelOpinion {
    pub fn new(source: ModelSource, direction: OpinionDirection, strength: f64) -> Self {
        Self {
            source,
            direction,
            strength: clamp_or(strength, 0.0, 1.0),
            metadata: OpinionMetadata::new(),
        }
    }

    pub fn neutral(source: ModelSource) -> Self {
        Self::new(source, OpinionDirection::Neutral, 0.0)
    }

    /// Substitute opinion for a source that failed, timed out or was not supplied.
    pub fn unavailable(source: ModelSource, reason: impl Into<String>) -> Self {
        Self::neutral(source).with_metadata("unavailable", reason.into())
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_available(&self) -> bool {
        !self.metadata.contains_key("unavailable")
    }

    /// +strength for bullish, -strength for bearish, 0 for neutral.
    pub fn signed_strength(&self) -> f64 {
        self.direction.sign() * self.strength
    }
}

/// Five-way ensemble decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalDirection {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl SignalDirection {
    /// Human-readable label for the signal
    pub fn to_label(&self) -> &'static str {
        match self {
            SignalDirection::StrongBuy => "Strong Buy",
            SignalDirection::Buy => "Buy",
            SignalDirection::Hold => "Hold",
            SignalDirection::Sell => "Sell",
            SignalDirection::StrongSell => "Strong Sell",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, SignalDirection::StrongBuy | SignalDirection::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, SignalDirection::Sell | SignalDirection::StrongSell)
    }
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_label())
    }
}

/// Weighted combination of the four opinions for one instrument at one point
/// in time. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSignal {
    instrument: String,
    timestamp: DateTime<Utc>,
    direction: SignalDirection,
    confidence: f64,
    agreement: f64,
    weighted_score: f64,
    contributing_opinions: Vec<ModelOpinion>,
}

impl EnsembleSignal {
    /// Confidence is clamped to [0, 100], agreement to [0, 1] and the
    /// weighted score to [-1, 1].
    pub fn new(
        instrument: impl Into<String>,
        timestamp: DateTime<Utc>,
        direction: SignalDirection,
        confidence: f64,
        agreement: f64,
        weighted_score: f64,
        contributing_opinions: Vec<ModelOpinion>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            timestamp,
            direction,
            confidence: clamp_or(confidence, 0.0, 100.0),
            agreement: clamp_or(agreement, 0.0, 1.0),
            weighted_score: if weighted_score.is_nan() { 0.0 } else { weighted_score.clamp(-1.0, 1.0) },
            contributing_opinions,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn direction(&self) -> SignalDirection {
        self.direction
    }

    /// 0.0 to 100.0
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// 0.0 to 1.0
    pub fn agreement(&self) -> f64 {
        self.agreement
    }

    pub fn weighted_score(&self) -> f64 {
        self.weighted_score
    }

    pub fn contributing_opinions(&self) -> &[ModelOpinion] {
        &self.contributing_opinions
    }

    pub fn opinion(&self, source: ModelSource) -> Option<&ModelOpinion> {
        self.contributing_opinions.iter().find(|o| o.source == source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn to_label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Which way the recommendation trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            TradeSide::Long => 1.0,
            TradeSide::Short => -1.0,
        }
    }
}

/// Risk-bounded trade recommendation derived from one ensemble signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    risk_level: RiskLevel,
    volatility_30d: f64,
    side: TradeSide,
    stop_pct: f64,
    stop_loss_price: f64,
    target_prices: [f64; 3],
    reward_risk_ratio: f64,
    raw_kelly_fraction: f64,
    position_size_fraction: f64,
}

impl RiskAssessment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        risk_level: RiskLevel,
        volatility_30d: f64,
        side: TradeSide,
        stop_pct: f64,
        stop_loss_price: f64,
        target_prices: [f64; 3],
        reward_risk_ratio: f64,
        raw_kelly_fraction: f64,
        position_size_fraction: f64,
    ) -> Self {
        Self {
            risk_level,
            volatility_30d,
            side,
            stop_pct,
            stop_loss_price,
            target_prices,
            reward_risk_ratio,
            raw_kelly_fraction,
            position_size_fraction,
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    pub fn volatility_30d(&self) -> f64 {
        self.volatility_30d
    }

    pub fn side(&self) -> TradeSide {
        self.side
    }

    pub fn stop_pct(&self) -> f64 {
        self.stop_pct
    }

    pub fn stop_loss_price(&self) -> f64 {
        self.stop_loss_price
    }

    /// T1, T2, T3: ascending for long, descending for short.
    pub fn target_prices(&self) -> &[f64; 3] {
        &self.target_prices
    }

    pub fn reward_risk_ratio(&self) -> f64 {
        self.reward_risk_ratio
    }

    /// Kelly fraction before the [min, max] bounds were applied.
    pub fn raw_kelly_fraction(&self) -> f64 {
        self.raw_kelly_fraction
    }

    pub fn position_size_fraction(&self) -> f64 {
        self.position_size_fraction
    }
}

/// The exported unit: one signal, its risk assessment and when it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub signal: EnsembleSignal,
    pub risk: RiskAssessment,
    pub current_price: f64,
    pub generated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn new(signal: EnsembleSignal, risk: RiskAssessment, current_price: f64) -> Self {
        Self {
            signal,
            risk,
            current_price,
            generated_at: Utc::now(),
        }
    }

    pub fn instrument(&self) -> &str {
        self.signal.instrument()
    }
}

/// Multi-step forecast returned by a trend predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendForecast {
    pub predicted_prices: Vec<f64>,
    /// 0.0 to 1.0
    pub confidence: f64,
}

/// One formation reported by a pattern detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern_name: String,
    pub bias: OpinionDirection,
    /// 0.0 to 1.0
    pub confidence: f64,
    #[serde(default)]
    pub target_price: Option<f64>,
}
