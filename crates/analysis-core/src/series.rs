use serde::{Deserialize, Serialize};

use crate::stats::simple_returns;
use crate::{AnalysisError, Bar};

/// Chronological OHLCV history for one instrument.
///
/// Timestamps are strictly increasing and every close is a positive finite
/// number; both are checked once in [`PriceSeries::new`]. The series is never
/// mutated afterwards, so one fetch can be shared read-only across the
/// concurrent model adapters of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    instrument: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(instrument: impl Into<String>, bars: Vec<Bar>) -> Result<Self, AnalysisError> {
        let instrument = instrument.into();

        for pair in bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(AnalysisError::InvalidData(format!(
                    "{}: bars out of order or duplicated at {}",
                    instrument, pair[1].timestamp
                )));
            }
        }

        if let Some(bad) = bars.iter().find(|b| !b.close.is_finite() || b.close <= 0.0) {
            return Err(AnalysisError::InvalidData(format!(
                "{}: non-positive close {} at {}",
                instrument, bad.close, bad.timestamp
            )));
        }

        Ok(Self { instrument, bars })
    }

    /// Build a series from unordered bars: sorts by timestamp and keeps the
    /// last bar seen for any repeated timestamp.
    pub fn from_unsorted(instrument: impl Into<String>, mut bars: Vec<Bar>) -> Result<Self, AnalysisError> {
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self::new(instrument, deduped)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn simple_returns(&self) -> Vec<f64> {
        simple_returns(&self.closes())
    }

    /// Fail with `InsufficientHistory` unless at least `lookback` bars exist.
    pub fn require(&self, lookback: usize) -> Result<(), AnalysisError> {
        if self.bars.len() < lookback {
            return Err(AnalysisError::InsufficientHistory {
                required: lookback,
                available: self.bars.len(),
            });
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for PriceSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            instrument: String,
            bars: Vec<Bar>,
        }

        let raw = Raw::deserialize(deserializer)?;
        PriceSeries::new(raw.instrument, raw.bars).map_err(serde::de::Error::custom)
    }
}
