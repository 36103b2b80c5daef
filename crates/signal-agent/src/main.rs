use std::sync::Arc;

use analysis_orchestrator::{ModelAdapters, SignalPipeline};
use anyhow::{Context, Result};
use ml_client::MLClient;
use model_adapters::TechnicalAdapter;
use notification_service::NotificationService;
use polygon_client::PolygonClient;
use risk_manager::RiskEngine;
use signal_ensemble::EnsembleAggregator;
use technical_analysis::CandlestickDetector;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;

mod config;
mod metrics;
mod record_sink;
mod scheduler;

#[cfg(test)]
mod test_support;

use config::AgentConfig;
use metrics::AgentMetrics;
use record_sink::JsonLinesSink;
use scheduler::{AlertGate, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting signal agent");

    // 2. Load configuration
    let config = AgentConfig::from_env().context("invalid agent configuration")?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Instruments: {}", config.instruments.join(", "));
    tracing::info!("  Evaluation interval: {} seconds", config.eval_interval_seconds);
    tracing::info!(
        "  Lookback: {} days, volatility window {} returns",
        config.lookback_days,
        config.volatility_window
    );
    tracing::info!(
        "  Weights: trend {:.2} pattern {:.2} technical {:.2} sentiment {:.2}",
        config.weights.trend,
        config.weights.pattern,
        config.weights.technical,
        config.weights.sentiment
    );
    tracing::info!(
        "  Bands: strong buy >= {} / buy >= {} / sell <= {} / strong sell <= {}",
        config.bands.strong_buy,
        config.bands.buy,
        config.bands.sell,
        config.bands.strong_sell
    );
    tracing::info!("  Alert threshold: confidence > {:.0}", config.alert_threshold);
    tracing::info!(
        "  Stops: {:.1}%-{:.1}%, targets x{:?}, position {:.0}%-{:.0}% (Kelly x{})",
        config.risk.min_stop_pct * 100.0,
        config.risk.max_stop_pct * 100.0,
        config.risk.target_multiples,
        config.risk.min_position_fraction * 100.0,
        config.risk.max_position_fraction * 100.0,
        config.risk.kelly_multiplier
    );
    tracing::info!("  Adapter timeout: {}s", config.adapter_timeout_seconds);

    // 3. Engine components. Invalid weights, bands or risk settings stop startup here.
    let aggregator = EnsembleAggregator::new(config.weights, config.bands).context("invalid ensemble configuration")?;
    let risk = RiskEngine::new(config.risk.clone()).context("invalid risk configuration")?;

    // 4. Collaborators
    let polygon = Arc::new(PolygonClient::with_config(config.polygon()));
    tracing::info!("Polygon client initialized ({:?} market)", config.polygon_market);

    let ml = MLClient::new(config.ml.clone()).context("failed to build ML clients")?;
    tracing::info!(
        "ML clients initialized (sentiment {}, price predictor {})",
        config.ml.sentiment_url,
        config.ml.price_predictor_url
    );

    let adapters = ModelAdapters::from_collaborators(
        Arc::new(ml.price_predictor.clone()),
        Arc::new(CandlestickDetector::default()),
        Arc::new(ml.sentiment.clone()),
        config.trend(),
        TechnicalAdapter::default(),
    )
    .context("invalid model adapter configuration")?;

    let pipeline = SignalPipeline::new(polygon, adapters, aggregator, risk, config.pipeline())
        .context("invalid pipeline configuration")?;
    tracing::info!(
        "Signal pipeline ready (needs {} bars per instrument)",
        pipeline.required_history()
    );

    // 5. Startup checks (warn-only, not fatal)
    for (service, healthy) in ml.health_check().await {
        if healthy {
            tracing::info!("Startup check: ML {} OK", service);
        } else {
            tracing::warn!(
                "Startup check: ML {} unreachable, its model will contribute neutral opinions",
                service
            );
        }
    }

    // 6. Scheduler
    let notifier = Arc::new(NotificationService::new(&config.notifications));
    let mut scheduler = Scheduler::new(
        Arc::new(pipeline),
        notifier,
        AlertGate::new(config.alert_threshold),
        config.instruments.clone(),
    );
    if let Some(path) = &config.records_path {
        let sink = JsonLinesSink::new(path.clone());
        tracing::info!("Exporting evaluation records to {}", sink.path().display());
        scheduler = scheduler.with_sink(Arc::new(sink));
    }

    let mut agent_metrics = AgentMetrics::new(config.metrics_log_interval_ticks);

    // Graceful shutdown (SIGINT + SIGTERM) flips the watch channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
        let _ = shutdown_tx.send(true);
    });

    tracing::info!(
        "Agent is now running. Evaluating every {}s. Press Ctrl+C to stop.",
        config.eval_interval_seconds
    );

    scheduler
        .run(config.eval_interval(), shutdown_rx, &mut agent_metrics)
        .await;

    for (instrument, entry) in scheduler.status().snapshot().await {
        tracing::info!(
            instrument = %instrument,
            last_run = ?entry.last_run,
            outcome = %serde_json::to_string(&entry.last_outcome).unwrap_or_default(),
            "final status"
        );
    }
    if let Some(at) = scheduler.last_tick() {
        tracing::info!("Last tick started at {}", at.to_rfc3339());
    }
    tracing::info!("Signal agent shut down.");
    Ok(())
}
