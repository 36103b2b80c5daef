use analysis_core::{AnalysisError, EnsembleSignal, ModelOpinion, ModelSource, OpinionDirection};
use chrono::{DateTime, Utc};

use crate::{ModelWeights, SignalBands};

/// Join point of the four model adapters.
#[derive(Debug, Clone)]
pub struct EnsembleAggregator {
    weights: ModelWeights,
    bands: SignalBands,
}

impl Default for EnsembleAggregator {
    fn default() -> Self {
        Self {
            weights: ModelWeights::default(),
            bands: SignalBands::default(),
        }
    }
}

impl EnsembleAggregator {
    pub fn new(weights: ModelWeights, bands: SignalBands) -> Result<Self, AnalysisError> {
        weights.validate()?;
        bands.validate()?;
        Ok(Self { weights, bands })
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    pub fn bands(&self) -> &SignalBands {
        &self.bands
    }

    pub fn aggregate(&self, instrument: &str, opinions: Vec<ModelOpinion>) -> Result<EnsembleSignal, AnalysisError> {
        self.aggregate_at(instrument, opinions, Utc::now())
    }

    /// Fuse one opinion per source into a signal stamped with `timestamp`.
    ///
    /// A source missing from `opinions` counts as unavailable; a source given
    /// twice is rejected.
    pub fn aggregate_at(
        &self,
        instrument: &str,
        opinions: Vec<ModelOpinion>,
        timestamp: DateTime<Utc>,
    ) -> Result<EnsembleSignal, AnalysisError> {
        let opinions = canonical_order(opinions)?;

        let score = self.weighted_score(&opinions);
        let direction = self.bands.classify(score);
        let agreement = agreement(&opinions, score);
        let confidence = confidence(score, agreement);

        tracing::debug!(
            instrument,
            score,
            agreement,
            confidence,
            direction = %direction,
            "ensemble aggregated"
        );

        Ok(EnsembleSignal::new(
            instrument,
            timestamp,
            direction,
            confidence,
            agreement,
            score,
            opinions,
        ))
    }

    /// `S = Σ weight[source] · signed_strength[source]`
    pub fn weighted_score(&self, opinions: &[ModelOpinion]) -> f64 {
        let score: f64 = opinions
            .iter()
            .map(|o| self.weights.get(o.source) * o.signed_strength())
            .sum();
        score.clamp(-1.0, 1.0)
    }
}

/// Fraction of non-neutral opinions on the same side as `score`; 0 when there
/// are none or the score is exactly 0.
pub fn agreement(opinions: &[ModelOpinion], score: f64) -> f64 {
    let side = OpinionDirection::from_sign(score);
    if side == OpinionDirection::Neutral {
        return 0.0;
    }

    let directional: Vec<&ModelOpinion> = opinions
        .iter()
        .filter(|o| o.direction != OpinionDirection::Neutral)
        .collect();
    if directional.is_empty() {
        return 0.0;
    }

    let agreeing = directional.iter().filter(|o| o.direction == side).count();
    agreeing as f64 / directional.len() as f64
}

/// `100 · |S| · (0.5 + 0.5 · agreement)`, clamped to [0, 100].
pub fn confidence(score: f64, agreement: f64) -> f64 {
    (100.0 * score.abs() * (0.5 + 0.5 * agreement)).clamp(0.0, 100.0)
}

fn canonical_order(opinions: Vec<ModelOpinion>) -> Result<Vec<ModelOpinion>, AnalysisError> {
    let mut slots: [Option<ModelOpinion>; 4] = Default::default();
    for opinion in opinions {
        let slot = &mut slots[opinion.source.index()];
        if slot.is_some() {
            return Err(AnalysisError::InvalidData(format!(
                "duplicate opinion for source {}",
                opinion.source
            )));
        }
        *slot = Some(opinion);
    }

    Ok(ModelSource::ALL
        .iter()
        .zip(slots)
        .map(|(source, slot)| slot.unwrap_or_else(|| ModelOpinion::unavailable(*source, "not supplied")))
        .collect())
}
