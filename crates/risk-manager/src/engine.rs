use analysis_core::{AnalysisError, EnsembleSignal, RiskAssessment, RiskLevel, TradeSide};
use anyhow::{bail, Context, Result};
use kelly_position_sizer::KellyPositionSizer;
use serde::{Deserialize, Serialize};

/// Cutoffs and ranges of the risk & sizing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// 30-day volatility (daily return stdev) below this is LOW risk
    pub low_volatility_cutoff: f64,
    /// 30-day volatility above this is HIGH risk
    pub high_volatility_cutoff: f64,
    /// Stop distance for LOW risk (e.g., 0.03 = 3%)
    pub min_stop_pct: f64,
    /// Stop distance for HIGH risk (e.g., 0.08 = 8%)
    pub max_stop_pct: f64,
    /// Target distances in multiples of the stop distance. The second one is
    /// the primary target and sets the reward:risk ratio.
    pub target_multiples: [f64; 3],
    pub min_position_fraction: f64,
    pub max_position_fraction: f64,
    pub kelly_multiplier: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            low_volatility_cutoff: 0.02,
            high_volatility_cutoff: 0.05,
            min_stop_pct: 0.03,
            max_stop_pct: 0.08,
            target_multiples: [1.0, 2.0, 3.0],
            min_position_fraction: 0.02,
            max_position_fraction: 0.25,
            kelly_multiplier: 1.0,
        }
    }
}

/// Minimum reward:risk of the primary target.
pub const MIN_REWARD_RISK: f64 = 2.0;

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.low_volatility_cutoff,
            self.high_volatility_cutoff,
            self.min_stop_pct,
            self.max_stop_pct,
        ]
        .iter()
        .chain(&self.target_multiples)
        .all(|v| v.is_finite());
        if !finite {
            bail!("risk configuration contains non-finite values: {:?}", self);
        }

        if self.low_volatility_cutoff < 0.0 || self.low_volatility_cutoff > self.high_volatility_cutoff {
            bail!(
                "volatility cutoffs must satisfy 0 <= low <= high, got {} / {}",
                self.low_volatility_cutoff,
                self.high_volatility_cutoff
            );
        }
        if self.min_stop_pct <= 0.0 || self.min_stop_pct > self.max_stop_pct || self.max_stop_pct >= 1.0 {
            bail!(
                "stop range must satisfy 0 < min <= max < 1, got {} / {}",
                self.min_stop_pct,
                self.max_stop_pct
            );
        }

        let [m1, m2, m3] = self.target_multiples;
        if !(m1 > 0.0 && m1 < m2 && m2 < m3) {
            bail!("target multiples must be positive and strictly increasing, got {:?}", self.target_multiples);
        }
        if m2 < MIN_REWARD_RISK {
            bail!("primary target multiple must be at least {}, got {}", MIN_REWARD_RISK, m2);
        }
        if m3 * self.max_stop_pct >= 1.0 {
            bail!(
                "furthest target {}x of a {} stop would put short targets at or below zero",
                m3,
                self.max_stop_pct
            );
        }
        Ok(())
    }
}

/// Turns an ensemble signal into stop, targets and a bounded position size.
/// Stateless: identical inputs give identical assessments.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
    sizer: KellyPositionSizer,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        let sizer = KellyPositionSizer::new(
            config.min_position_fraction,
            config.max_position_fraction,
            config.kelly_multiplier,
        )
        .context("invalid position sizing bounds")?;
        Ok(Self { config, sizer })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn classify(&self, volatility_30d: f64) -> RiskLevel {
        if volatility_30d < self.config.low_volatility_cutoff {
            RiskLevel::Low
        } else if volatility_30d > self.config.high_volatility_cutoff {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    /// Wider stops for riskier instruments.
    pub fn stop_pct(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::Low => self.config.min_stop_pct,
            RiskLevel::Medium => (self.config.min_stop_pct + self.config.max_stop_pct) / 2.0,
            RiskLevel::High => self.config.max_stop_pct,
        }
    }

    /// BUY family trades long, SELL family short; HOLD follows the sign of the score.
    pub fn side(signal: &EnsembleSignal) -> TradeSide {
        let direction = signal.direction();
        if direction.is_buy() {
            TradeSide::Long
        } else if direction.is_sell() || signal.weighted_score() < 0.0 {
            TradeSide::Short
        } else {
            TradeSide::Long
        }
    }

    /// Stops, targets and position size for `signal` at `current_price`.
    ///
    /// Confidence and score are taken as the signal carries them (already
    /// clamped). The two market inputs are checked instead: a negative or
    /// non-finite `volatility_30d` is `InvalidVolatility`, and a
    /// `current_price` that is not a positive finite number is `InvalidData`.
    pub fn assess(
        &self,
        signal: &EnsembleSignal,
        current_price: f64,
        volatility_30d: f64,
    ) -> Result<RiskAssessment, AnalysisError> {
        if !volatility_30d.is_finite() || volatility_30d < 0.0 {
            return Err(AnalysisError::InvalidVolatility(volatility_30d));
        }
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "current price must be positive, got {}",
                current_price
            )));
        }

        let risk_level = self.classify(volatility_30d);
        let stop_pct = self.stop_pct(risk_level);
        let side = Self::side(signal);
        let sign = side.sign();

        let stop_loss_price = current_price * (1.0 - sign * stop_pct);
        let target_prices = self
            .config
            .target_multiples
            .map(|m| current_price * (1.0 + sign * m * stop_pct));

        let reward_risk_ratio = self.config.target_multiples[1];
        let kelly = self.sizer.size(signal.confidence(), reward_risk_ratio);

        tracing::debug!(
            instrument = signal.instrument(),
            risk_level = risk_level.to_label(),
            volatility_30d,
            stop_pct,
            position = kelly.fraction,
            "risk assessed"
        );

        Ok(RiskAssessment::new(
            risk_level,
            volatility_30d,
            side,
            stop_pct,
            stop_loss_price,
            target_prices,
            reward_risk_ratio,
            kelly.raw_kelly_fraction,
            kelly.fraction,
        ))
    }
}
