use analysis_core::{
    EnsembleSignal, EvaluationRecord, ModelOpinion, ModelSource, OpinionDirection, RiskAssessment, RiskLevel,
    SignalDirection, TradeSide,
};
use chrono::{TimeZone, Utc};

/// Record for BTC at $100 with a 6% stop on the side implied by `direction`.
pub fn record(direction: SignalDirection, confidence: f64) -> EvaluationRecord {
    let (side, bias) = if direction.is_sell() {
        (TradeSide::Short, OpinionDirection::Bearish)
    } else {
        (TradeSide::Long, OpinionDirection::Bullish)
    };
    let price = 100.0;
    let stop = 0.06;
    let targets = [1.0, 2.0, 3.0].map(|m| price * (1.0 + side.sign() * m * stop));

    let opinions = vec![
        ModelOpinion::new(ModelSource::Trend, bias, 0.9),
        ModelOpinion::new(ModelSource::Pattern, bias, 0.8),
        ModelOpinion::new(ModelSource::Technical, bias, 0.7),
        ModelOpinion::unavailable(ModelSource::Sentiment, "timeout"),
    ];
    let at = Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 0).unwrap();
    let signal = EnsembleSignal::new("BTC", at, direction, confidence, 1.0, side.sign() * 0.9, opinions);
    let risk = RiskAssessment::new(
        RiskLevel::Medium,
        0.03,
        side,
        stop,
        price * (1.0 - side.sign() * stop),
        targets,
        2.0,
        0.3,
        0.25,
    );
    EvaluationRecord::new(signal, risk, price)
}
