use analysis_core::{
    AnalysisError, DetectedPattern, ModelOpinion, ModelSource, OpinionDirection, PatternDetector, PriceSeries,
};
use async_trait::async_trait;
use std::sync::Arc;

use crate::ModelAdapter;

/// Reduce detected formations to one opinion: the most confident pattern
/// decides. Opposite biases tied at the top confidence cancel out.
pub fn opinion_from_patterns(patterns: &[DetectedPattern]) -> ModelOpinion {
    let names: Vec<&str> = patterns.iter().map(|p| p.pattern_name.as_str()).collect();

    let top_confidence = patterns
        .iter()
        .map(|p| p.confidence)
        .filter(|c| c.is_finite())
        .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));

    let Some(top) = top_confidence else {
        return ModelOpinion::neutral(ModelSource::Pattern).with_metadata("patterns", names);
    };

    let leaders: Vec<&DetectedPattern> = patterns.iter().filter(|p| p.confidence == top).collect();
    let bullish = leaders.iter().any(|p| p.bias == OpinionDirection::Bullish);
    let bearish = leaders.iter().any(|p| p.bias == OpinionDirection::Bearish);

    let direction = match (bullish, bearish) {
        (true, false) => OpinionDirection::Bullish,
        (false, true) => OpinionDirection::Bearish,
        _ => OpinionDirection::Neutral,
    };
    let strength = if direction == OpinionDirection::Neutral { 0.0 } else { top };

    let mut opinion = ModelOpinion::new(ModelSource::Pattern, direction, strength).with_metadata("patterns", names);
    if let Some(leader) = leaders.iter().find(|p| p.bias == direction) {
        opinion = opinion.with_metadata("leading_pattern", leader.pattern_name.clone());
        if let Some(target) = leader.target_price {
            opinion = opinion.with_metadata("target_price", target);
        }
    }
    opinion
}

/// PATTERN source: chart formations from a pluggable detector.
pub struct PatternAdapter {
    detector: Arc<dyn PatternDetector>,
}

impl PatternAdapter {
    pub fn new(detector: Arc<dyn PatternDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl ModelAdapter for PatternAdapter {
    fn source(&self) -> ModelSource {
        ModelSource::Pattern
    }

    async fn try_evaluate(&self, instrument: &str, series: &PriceSeries) -> Result<ModelOpinion, AnalysisError> {
        let patterns = self.detector.detect(series).await?;
        tracing::debug!(instrument, count = patterns.len(), "patterns detected");
        Ok(opinion_from_patterns(&patterns))
    }
}
