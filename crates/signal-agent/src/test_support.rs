use analysis_core::{
    EnsembleSignal, EvaluationRecord, ModelOpinion, ModelSource, OpinionDirection, RiskAssessment, RiskLevel,
    SignalDirection, TradeSide,
};
use chrono::Utc;

pub fn record(instrument: &str, direction: SignalDirection, confidence: f64) -> EvaluationRecord {
    let side = if direction.is_sell() { TradeSide::Short } else { TradeSide::Long };
    let bias = if direction.is_sell() {
        OpinionDirection::Bearish
    } else {
        OpinionDirection::Bullish
    };
    let opinions = ModelSource::ALL
        .iter()
        .map(|s| ModelOpinion::new(*s, bias, confidence / 100.0))
        .collect();
    let score = side.sign() * confidence / 100.0;
    let signal = EnsembleSignal::new(instrument, Utc::now(), direction, confidence, 1.0, score, opinions);

    let price = 100.0;
    let risk = RiskAssessment::new(
        RiskLevel::Low,
        0.01,
        side,
        0.03,
        price * (1.0 - side.sign() * 0.03),
        [1.0, 2.0, 3.0].map(|m| price * (1.0 + side.sign() * 0.03 * m)),
        2.0,
        0.1,
        0.1,
    );
    EvaluationRecord::new(signal, risk, price)
}
