use super::*;
use analysis_core::{
    Bar, ModelOpinion, OpinionDirection, PriceSeries, RiskLevel, SignalDirection, TrendForecast,
};
use approx::assert_relative_eq;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use risk_manager::RiskConfig;

struct FixedSeries {
    closes: Vec<f64>,
}

#[async_trait]
impl PriceSeriesProvider for FixedSeries {
    async fn fetch(&self, instrument: &str, _lookback_days: u32) -> Result<PriceSeries, AnalysisError> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = self
            .closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + ChronoDuration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 500.0,
                vwap: None,
            })
            .collect();
        PriceSeries::new(instrument, bars)
    }
}

struct Outage;

#[async_trait]
impl PriceSeriesProvider for Outage {
    async fn fetch(&self, instrument: &str, _lookback_days: u32) -> Result<PriceSeries, AnalysisError> {
        Err(AnalysisError::DataUnavailable(format!("{}: upstream 502", instrument)))
    }
}

/// Adapter that answers with a fixed opinion after an optional delay.
struct Scripted {
    source: ModelSource,
    direction: OpinionDirection,
    strength: f64,
    delay: Duration,
}

#[async_trait]
impl ModelAdapter for Scripted {
    fn source(&self) -> ModelSource {
        self.source
    }

    async fn try_evaluate(&self, _: &str, _: &PriceSeries) -> Result<ModelOpinion, AnalysisError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ModelOpinion::new(self.source, self.direction, self.strength))
    }
}

fn scripted(source: ModelSource, direction: OpinionDirection, strength: f64) -> Arc<dyn ModelAdapter> {
    scripted_after(source, direction, strength, Duration::ZERO)
}

fn scripted_after(
    source: ModelSource,
    direction: OpinionDirection,
    strength: f64,
    delay: Duration,
) -> Arc<dyn ModelAdapter> {
    Arc::new(Scripted {
        source,
        direction,
        strength,
        delay,
    })
}

fn scenario_adapters() -> ModelAdapters {
    ModelAdapters {
        trend: scripted(ModelSource::Trend, OpinionDirection::Bullish, 0.8),
        pattern: scripted(ModelSource::Pattern, OpinionDirection::Bullish, 0.6),
        technical: scripted(ModelSource::Technical, OpinionDirection::Bullish, 0.5),
        sentiment: scripted(ModelSource::Sentiment, OpinionDirection::Neutral, 0.0),
    }
}

/// Alternating ±10% daily moves: realized volatility far above the HIGH cutoff.
fn volatile_closes(n: usize) -> Vec<f64> {
    (0..n).map(|i| if i % 2 == 0 { 100.0 } else { 110.0 }).collect()
}

/// Flat closes: zero volatility.
fn calm_closes(n: usize) -> Vec<f64> {
    vec![100.0; n]
}

fn pipeline(provider: Arc<dyn PriceSeriesProvider>, adapters: ModelAdapters, config: PipelineConfig) -> SignalPipeline {
    SignalPipeline::new(
        provider,
        adapters,
        EnsembleAggregator::default(),
        RiskEngine::new(RiskConfig::default()).unwrap(),
        config,
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_evaluation_scenario() {
    let pipeline = pipeline(
        Arc::new(FixedSeries { closes: volatile_closes(40) }),
        scenario_adapters(),
        PipelineConfig::default(),
    );

    let record = pipeline.evaluate("ETH").await.unwrap();
    assert_eq!(record.instrument(), "ETH");
    assert_eq!(record.signal.direction(), SignalDirection::Buy);
    assert_relative_eq!(record.signal.confidence(), 55.5, epsilon = 1e-7);
    assert_eq!(record.current_price, 110.0);

    assert_eq!(record.risk.risk_level(), RiskLevel::High);
    assert_relative_eq!(record.risk.stop_pct(), 0.08);
    assert!(record.risk.target_prices()[0] > record.current_price);
}

#[tokio::test]
async fn test_calm_market_is_low_risk() {
    let pipeline = pipeline(
        Arc::new(FixedSeries { closes: calm_closes(40) }),
        scenario_adapters(),
        PipelineConfig::default(),
    );
    let record = pipeline.evaluate("BTC").await.unwrap();
    assert_eq!(record.risk.risk_level(), RiskLevel::Low);
    assert_eq!(record.risk.volatility_30d(), 0.0);
}

#[tokio::test]
async fn test_timed_out_adapter_degrades_signal() {
    let config = PipelineConfig {
        adapter_timeout: Duration::from_millis(50),
        ..PipelineConfig::default()
    };
    let mut adapters = scenario_adapters();
    adapters.trend = scripted_after(
        ModelSource::Trend,
        OpinionDirection::Bullish,
        0.8,
        Duration::from_secs(5),
    );

    let degraded = pipeline(Arc::new(FixedSeries { closes: calm_closes(40) }), adapters, config.clone())
        .evaluate("BTC")
        .await
        .unwrap();
    let full = pipeline(Arc::new(FixedSeries { closes: calm_closes(40) }), scenario_adapters(), config)
        .evaluate("BTC")
        .await
        .unwrap();

    let trend = degraded.signal.opinion(ModelSource::Trend).unwrap();
    assert!(!trend.is_available());
    assert_eq!(trend.strength, 0.0);
    assert!(degraded.signal.confidence() < full.signal.confidence());
    // 0.25 * 0.6 + 0.25 * 0.5
    assert_relative_eq!(degraded.signal.weighted_score(), 0.275, epsilon = 1e-9);
}

#[tokio::test]
async fn test_adapters_run_concurrently() {
    let delay = Duration::from_millis(200);
    let adapters = ModelAdapters {
        trend: scripted_after(ModelSource::Trend, OpinionDirection::Bullish, 0.5, delay),
        pattern: scripted_after(ModelSource::Pattern, OpinionDirection::Bullish, 0.5, delay),
        technical: scripted_after(ModelSource::Technical, OpinionDirection::Bullish, 0.5, delay),
        sentiment: scripted_after(ModelSource::Sentiment, OpinionDirection::Bullish, 0.5, delay),
    };
    let pipeline = pipeline(
        Arc::new(FixedSeries { closes: calm_closes(40) }),
        adapters,
        PipelineConfig::default(),
    );

    let started = Instant::now();
    let record = pipeline.evaluate("BTC").await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(700));
    assert!(record.signal.contributing_opinions().iter().all(|o| o.is_available()));
}

#[tokio::test]
async fn test_provider_failure_aborts_instrument() {
    let pipeline = pipeline(Arc::new(Outage), scenario_adapters(), PipelineConfig::default());
    let err = pipeline.evaluate("BTC").await.unwrap_err();
    assert!(matches!(err, AnalysisError::DataUnavailable(_)));
}

#[tokio::test]
async fn test_short_history_aborts_instrument() {
    let pipeline = pipeline(
        Arc::new(FixedSeries { closes: calm_closes(20) }),
        scenario_adapters(),
        PipelineConfig::default(),
    );
    assert_eq!(pipeline.required_history(), 31);
    let err = pipeline.evaluate("BTC").await.unwrap_err();
    assert_eq!(err, AnalysisError::InsufficientHistory { required: 31, available: 20 });
}

#[tokio::test]
async fn test_technical_lookback_raises_required_history() {
    let mut adapters = scenario_adapters();
    adapters.technical = Arc::new(TechnicalAdapter::default());
    let pipeline = pipeline(
        Arc::new(FixedSeries { closes: calm_closes(40) }),
        adapters,
        PipelineConfig::default(),
    );
    assert_eq!(pipeline.required_history(), 50);
    assert!(matches!(
        pipeline.evaluate("BTC").await,
        Err(AnalysisError::InsufficientHistory { required: 50, available: 40 })
    ));
}

#[test]
fn test_misplaced_adapter_rejected() {
    let mut adapters = scenario_adapters();
    adapters.pattern = scripted(ModelSource::Sentiment, OpinionDirection::Neutral, 0.0);
    let result = SignalPipeline::new(
        Arc::new(Outage),
        adapters,
        EnsembleAggregator::default(),
        RiskEngine::new(RiskConfig::default()).unwrap(),
        PipelineConfig::default(),
    );
    assert!(matches!(result, Err(AnalysisError::InvalidConfiguration(_))));
}

/// Forecasts a 3% rise over the horizon.
struct RisingForecast;

#[async_trait]
impl TrendPredictor for RisingForecast {
    async fn forecast(&self, series: &PriceSeries, horizon_days: u32) -> Result<TrendForecast, AnalysisError> {
        let last = series.last_close().unwrap_or(1.0);
        let step = last * 0.03 / horizon_days as f64;
        Ok(TrendForecast {
            predicted_prices: (1..=horizon_days).map(|d| last + step * d as f64).collect(),
            confidence: 0.8,
        })
    }
}

struct SentimentDown;

#[async_trait]
impl SentimentSource for SentimentDown {
    async fn score(&self, instrument: &str) -> Result<f64, AnalysisError> {
        Err(AnalysisError::DataUnavailable(format!("{}: sentiment service 503", instrument)))
    }
}

#[tokio::test]
async fn test_standard_adapters_with_sentiment_outage() {
    let adapters = ModelAdapters::from_collaborators(
        Arc::new(RisingForecast),
        Arc::new(technical_analysis::CandlestickDetector::default()),
        Arc::new(SentimentDown),
        TrendConfig::default(),
        TechnicalAdapter::default(),
    )
    .unwrap();
    let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 + if i % 2 == 0 { 0.5 } else { 0.0 }).collect();
    let pipeline = pipeline(Arc::new(FixedSeries { closes }), adapters, PipelineConfig::default());
    assert_eq!(pipeline.required_history(), 50);

    let record = pipeline.evaluate("BTC").await.unwrap();

    let sources: Vec<ModelSource> = record
        .signal
        .contributing_opinions()
        .iter()
        .map(|o| o.source)
        .collect();
    assert_eq!(
        sources,
        vec![
            ModelSource::Trend,
            ModelSource::Pattern,
            ModelSource::Technical,
            ModelSource::Sentiment
        ]
    );

    let sentiment = record.signal.opinion(ModelSource::Sentiment).unwrap();
    assert!(!sentiment.is_available());
    assert_eq!(sentiment.direction, OpinionDirection::Neutral);
    assert_eq!(sentiment.strength, 0.0);

    let trend = record.signal.opinion(ModelSource::Trend).unwrap();
    assert!(trend.is_available());
    assert_eq!(trend.direction, OpinionDirection::Bullish);
    assert!(record.signal.opinion(ModelSource::Technical).unwrap().is_available());
    assert!(record.signal.opinion(ModelSource::Pattern).unwrap().is_available());
}
