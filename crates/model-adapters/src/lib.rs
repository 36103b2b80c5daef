//! The four sub-model adapters feeding the ensemble.
//!
//! Each adapter turns one collaborator's raw output into a [`ModelOpinion`].
//! Failures never escape [`ModelAdapter::evaluate`]: an erroring or timed-out
//! source contributes a NEUTRAL opinion with zero strength.

pub mod pattern;
pub mod sentiment;
pub mod technical;
pub mod trend;

#[cfg(test)]
pub(crate) mod test_support;

pub use pattern::PatternAdapter;
pub use sentiment::SentimentAdapter;
pub use technical::{TechnicalAdapter, TechnicalThresholds};
pub use trend::{TrendAdapter, TrendConfig};

use analysis_core::{AnalysisError, ModelOpinion, ModelSource, PriceSeries};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn source(&self) -> ModelSource;

    /// Bars this model needs before it can form an opinion.
    fn lookback(&self) -> usize {
        1
    }

    async fn try_evaluate(&self, instrument: &str, series: &PriceSeries) -> Result<ModelOpinion, AnalysisError>;

    /// Like `try_evaluate`, with any error absorbed into an unavailable opinion.
    async fn evaluate(&self, instrument: &str, series: &PriceSeries) -> ModelOpinion {
        let source = self.source();
        match self.try_evaluate(instrument, series).await {
            Ok(opinion) if opinion.source == source => opinion,
            Ok(opinion) => {
                tracing::warn!(%source, reported = %opinion.source, instrument, "adapter reported a foreign source");
                ModelOpinion::unavailable(source, format!("adapter reported {}", opinion.source))
            }
            Err(e) => {
                tracing::warn!(%source, instrument, error = %e, "model unavailable, substituting neutral opinion");
                ModelOpinion::unavailable(source, e.to_string())
            }
        }
    }
}

/// Evaluate with an upper bound on wall time. Elapsed time is treated the same
/// as an unavailable source.
pub async fn evaluate_within(
    adapter: &dyn ModelAdapter,
    instrument: &str,
    series: &PriceSeries,
    timeout: Duration,
) -> ModelOpinion {
    let source = adapter.source();
    match tokio::time::timeout(timeout, adapter.evaluate(instrument, series)).await {
        Ok(opinion) => opinion,
        Err(_) => {
            let err = AnalysisError::AdapterTimeout(format!("{} after {}ms", source, timeout.as_millis()));
            tracing::warn!(%source, instrument, error = %err, "model timed out, substituting neutral opinion");
            ModelOpinion::unavailable(source, err.to_string())
        }
    }
}
