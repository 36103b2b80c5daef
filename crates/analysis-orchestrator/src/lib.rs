//! Per-instrument evaluation: fetch, indicators, the four models, ensemble, risk.

use analysis_core::{
    AnalysisError, EvaluationRecord, ModelSource, PatternDetector, PriceSeriesProvider, SentimentSource,
    TrendPredictor,
};
use model_adapters::{
    evaluate_within, ModelAdapter, PatternAdapter, SentimentAdapter, TechnicalAdapter, TrendAdapter, TrendConfig,
};
use risk_manager::RiskEngine;
use signal_ensemble::EnsembleAggregator;
use std::sync::Arc;
use std::time::{Duration, Instant};
use technical_analysis::realized_volatility;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Calendar days of history requested from the provider
    pub lookback_days: u32,
    /// Upper bound on each model adapter call
    pub adapter_timeout: Duration,
    /// Returns used for the volatility input of the risk engine
    pub volatility_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 120,
            adapter_timeout: Duration::from_secs(10),
            volatility_window: 30,
        }
    }
}

/// One adapter per model source.
#[derive(Clone)]
pub struct ModelAdapters {
    pub trend: Arc<dyn ModelAdapter>,
    pub pattern: Arc<dyn ModelAdapter>,
    pub technical: Arc<dyn ModelAdapter>,
    pub sentiment: Arc<dyn ModelAdapter>,
}

impl ModelAdapters {
    /// Standard adapters around the given collaborators.
    pub fn from_collaborators(
        predictor: Arc<dyn TrendPredictor>,
        detector: Arc<dyn PatternDetector>,
        sentiment: Arc<dyn SentimentSource>,
        trend_config: TrendConfig,
        technical: TechnicalAdapter,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            trend: Arc::new(TrendAdapter::new(predictor, trend_config)?),
            pattern: Arc::new(PatternAdapter::new(detector)),
            technical: Arc::new(technical),
            sentiment: Arc::new(SentimentAdapter::new(sentiment)),
        })
    }

    fn slots(&self) -> [(ModelSource, &Arc<dyn ModelAdapter>); 4] {
        [
            (ModelSource::Trend, &self.trend),
            (ModelSource::Pattern, &self.pattern),
            (ModelSource::Technical, &self.technical),
            (ModelSource::Sentiment, &self.sentiment),
        ]
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        for (slot, adapter) in self.slots() {
            if adapter.source() != slot {
                return Err(AnalysisError::InvalidConfiguration(format!(
                    "{} adapter placed in the {} slot",
                    adapter.source(),
                    slot
                )));
            }
        }
        Ok(())
    }

    /// Longest history any adapter needs.
    pub fn lookback(&self) -> usize {
        self.slots().iter().map(|(_, a)| a.lookback()).max().unwrap_or(1)
    }
}

pub struct SignalPipeline {
    provider: Arc<dyn PriceSeriesProvider>,
    adapters: ModelAdapters,
    aggregator: EnsembleAggregator,
    risk: RiskEngine,
    config: PipelineConfig,
}

impl SignalPipeline {
    pub fn new(
        provider: Arc<dyn PriceSeriesProvider>,
        adapters: ModelAdapters,
        aggregator: EnsembleAggregator,
        risk: RiskEngine,
        config: PipelineConfig,
    ) -> Result<Self, AnalysisError> {
        adapters.validate()?;
        if config.volatility_window < 2 {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "volatility window must cover at least 2 returns, got {}",
                config.volatility_window
            )));
        }
        if config.adapter_timeout.is_zero() {
            return Err(AnalysisError::InvalidConfiguration("adapter timeout must be positive".into()));
        }
        Ok(Self {
            provider,
            adapters,
            aggregator,
            risk,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Bars needed before an evaluation is attempted.
    pub fn required_history(&self) -> usize {
        self.adapters.lookback().max(self.config.volatility_window + 1)
    }

    /// Run one full evaluation. Provider and indicator failures abort this
    /// instrument; model failures only weaken the signal.
    pub async fn evaluate(&self, instrument: &str) -> Result<EvaluationRecord, AnalysisError> {
        let started = Instant::now();

        let series = self.provider.fetch(instrument, self.config.lookback_days).await?;
        series.require(self.required_history())?;

        let current_price = series
            .last_close()
            .ok_or(AnalysisError::InsufficientHistory { required: 1, available: 0 })?;
        let volatility = realized_volatility(&series.closes(), self.config.volatility_window)?;

        let timeout = self.config.adapter_timeout;
        let (trend, pattern, technical, sentiment) = tokio::join!(
            evaluate_within(self.adapters.trend.as_ref(), instrument, &series, timeout),
            evaluate_within(self.adapters.pattern.as_ref(), instrument, &series, timeout),
            evaluate_within(self.adapters.technical.as_ref(), instrument, &series, timeout),
            evaluate_within(self.adapters.sentiment.as_ref(), instrument, &series, timeout),
        );
        let opinions = vec![trend, pattern, technical, sentiment];
        let unavailable = opinions.iter().filter(|o| !o.is_available()).count();

        let signal = self.aggregator.aggregate(instrument, opinions)?;
        let risk = self.risk.assess(&signal, current_price, volatility)?;

        tracing::info!(
            instrument,
            direction = %signal.direction(),
            confidence = %format!("{:.1}", signal.confidence()),
            score = %format!("{:.3}", signal.weighted_score()),
            risk = risk.risk_level().to_label(),
            position = %format!("{:.3}", risk.position_size_fraction()),
            unavailable,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "evaluation complete"
        );

        Ok(EvaluationRecord::new(signal, risk, current_price))
    }
}

#[cfg(test)]
mod tests;
