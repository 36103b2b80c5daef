use analysis_core::{AnalysisError, PriceSeries};
use serde::{Deserialize, Serialize};

use crate::indicators::*;

/// Periods used by [`IndicatorSnapshot::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger: usize,
    pub bollinger_std_dev: f64,
    pub sma_short: usize,
    pub sma_long: usize,
    pub stochastic_k: usize,
    pub stochastic_d: usize,
    pub adx: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger: 20,
            bollinger_std_dev: 2.0,
            sma_short: 20,
            sma_long: 50,
            stochastic_k: 14,
            stochastic_d: 3,
            adx: 14,
        }
    }
}

impl IndicatorPeriods {
    /// Bars needed before every indicator in the snapshot has a value.
    pub fn lookback(&self) -> usize {
        [
            self.rsi + 1,
            self.macd_slow + self.macd_signal - 1,
            self.bollinger,
            self.sma_short,
            self.sma_long,
            self.stochastic_k,
            self.adx * 2 + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Latest value of each indicator the TECHNICAL model votes with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub rsi: f64,
    pub macd_histogram: f64,
    pub bollinger_percent_b: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub stochastic_k: f64,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

impl IndicatorSnapshot {
    pub fn compute(series: &PriceSeries, periods: &IndicatorPeriods) -> Result<Self, AnalysisError> {
        let required = periods.lookback();
        series.require(required)?;

        let closes = series.closes();
        let bars = series.bars();
        let available = bars.len();
        let pick = |values: &[f64]| latest(values, required, available);

        let macd_result = macd(&closes, periods.macd_fast, periods.macd_slow, periods.macd_signal);
        let stoch = stochastic(bars, periods.stochastic_k, periods.stochastic_d);
        let adx_result = adx(bars, periods.adx);

        Ok(Self {
            price: pick(&closes)?,
            rsi: pick(&rsi(&closes, periods.rsi))?,
            macd_histogram: pick(&macd_result.histogram)?,
            bollinger_percent_b: pick(&bollinger_percent_b(
                &closes,
                periods.bollinger,
                periods.bollinger_std_dev,
            ))?,
            sma_short: pick(&sma(&closes, periods.sma_short))?,
            sma_long: pick(&sma(&closes, periods.sma_long))?,
            stochastic_k: pick(&stoch.k)?,
            adx: pick(&adx_result.adx)?,
            plus_di: pick(&adx_result.plus_di)?,
            minus_di: pick(&adx_result.minus_di)?,
        })
    }
}
