use analysis_core::{AnalysisError, ModelSource};
use serde::{Deserialize, Serialize};

/// Tolerance on the weight sum.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Fixed weight per model source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub trend: f64,
    pub pattern: f64,
    pub technical: f64,
    pub sentiment: f64,
}

impl Default for ModelWeights {
    fn default() -> Self {
        Self {
            trend: 0.35,
            pattern: 0.25,
            technical: 0.25,
            sentiment: 0.15,
        }
    }
}

impl ModelWeights {
    pub fn get(&self, source: ModelSource) -> f64 {
        match source {
            ModelSource::Trend => self.trend,
            ModelSource::Pattern => self.pattern,
            ModelSource::Technical => self.technical,
            ModelSource::Sentiment => self.sentiment,
        }
    }

    pub fn sum(&self) -> f64 {
        ModelSource::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Every weight finite and within [0, 1], summing to 1.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for source in ModelSource::ALL {
            let w = self.get(source);
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(AnalysisError::InvalidWeightConfiguration(format!(
                    "{} weight must be within [0, 1], got {}",
                    source, w
                )));
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AnalysisError::InvalidWeightConfiguration(format!(
                "weights must sum to 1.0, got {:.6}",
                sum
            )));
        }
        Ok(())
    }
}
