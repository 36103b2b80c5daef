use analysis_core::{AnalysisError, ModelOpinion, ModelSource, OpinionDirection, PriceSeries};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use technical_analysis::{IndicatorPeriods, IndicatorSnapshot};

use crate::ModelAdapter;

/// Cutoffs of the indicator rubric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub percent_b_low: f64,
    pub percent_b_high: f64,
    pub stochastic_oversold: f64,
    pub stochastic_overbought: f64,
    pub adx_trending: f64,
}

impl Default for TechnicalThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            percent_b_low: 0.2,
            percent_b_high: 0.8,
            stochastic_oversold: 20.0,
            stochastic_overbought: 80.0,
            adx_trending: 25.0,
        }
    }
}

fn band_vote(value: f64, low: f64, high: f64) -> OpinionDirection {
    if value < low {
        OpinionDirection::Bullish
    } else if value > high {
        OpinionDirection::Bearish
    } else {
        OpinionDirection::Neutral
    }
}

impl TechnicalThresholds {
    /// One vote per indicator, in a fixed order.
    pub fn votes(&self, snap: &IndicatorSnapshot) -> Vec<(&'static str, OpinionDirection)> {
        let moving_averages = if snap.price > snap.sma_short && snap.price > snap.sma_long {
            OpinionDirection::Bullish
        } else if snap.price < snap.sma_short && snap.price < snap.sma_long {
            OpinionDirection::Bearish
        } else {
            OpinionDirection::Neutral
        };

        let trend_strength = if snap.adx < self.adx_trending || snap.plus_di == snap.minus_di {
            OpinionDirection::Neutral
        } else if snap.plus_di > snap.minus_di {
            OpinionDirection::Bullish
        } else {
            OpinionDirection::Bearish
        };

        vec![
            ("rsi", band_vote(snap.rsi, self.rsi_oversold, self.rsi_overbought)),
            ("macd_histogram", OpinionDirection::from_sign(snap.macd_histogram)),
            (
                "bollinger_percent_b",
                band_vote(snap.bollinger_percent_b, self.percent_b_low, self.percent_b_high),
            ),
            ("moving_averages", moving_averages),
            (
                "stochastic",
                band_vote(snap.stochastic_k, self.stochastic_oversold, self.stochastic_overbought),
            ),
            ("adx", trend_strength),
        ]
    }

    /// Majority of bullish vs bearish votes; strength is the winning share of all indicators.
    pub fn opinion(&self, snap: &IndicatorSnapshot) -> ModelOpinion {
        let votes = self.votes(snap);
        let count = |d: OpinionDirection| votes.iter().filter(|(_, v)| *v == d).count();
        let (bullish, bearish) = (count(OpinionDirection::Bullish), count(OpinionDirection::Bearish));

        let (direction, majority) = match bullish.cmp(&bearish) {
            std::cmp::Ordering::Greater => (OpinionDirection::Bullish, bullish),
            std::cmp::Ordering::Less => (OpinionDirection::Bearish, bearish),
            std::cmp::Ordering::Equal => (OpinionDirection::Neutral, 0),
        };

        let mut opinion = ModelOpinion::new(ModelSource::Technical, direction, majority as f64 / votes.len() as f64)
            .with_metadata("bullish_votes", bullish)
            .with_metadata("bearish_votes", bearish)
            .with_metadata("rsi", snap.rsi)
            .with_metadata("macd_histogram", snap.macd_histogram)
            .with_metadata("bollinger_percent_b", snap.bollinger_percent_b)
            .with_metadata("adx", snap.adx);
        for (name, vote) in &votes {
            opinion = opinion.with_metadata(&format!("vote_{}", name), format!("{:?}", vote).to_lowercase());
        }
        opinion
    }
}

/// TECHNICAL source: a fixed rubric over classic indicators.
#[derive(Debug, Clone, Default)]
pub struct TechnicalAdapter {
    periods: IndicatorPeriods,
    thresholds: TechnicalThresholds,
}

impl TechnicalAdapter {
    pub fn new(periods: IndicatorPeriods, thresholds: TechnicalThresholds) -> Self {
        Self { periods, thresholds }
    }
}

#[async_trait]
impl ModelAdapter for TechnicalAdapter {
    fn source(&self) -> ModelSource {
        ModelSource::Technical
    }

    fn lookback(&self) -> usize {
        self.periods.lookback()
    }

    async fn try_evaluate(&self, _instrument: &str, series: &PriceSeries) -> Result<ModelOpinion, AnalysisError> {
        let snapshot = IndicatorSnapshot::compute(series, &self.periods)?;
        Ok(self.thresholds.opinion(&snapshot))
    }
}
