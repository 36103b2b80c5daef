use anyhow::{bail, Context, Result};
use ml_client::MLConfig;
use model_adapters::TrendConfig;
use notification_service::NotificationConfig;
use polygon_client::{Market, PolygonConfig};
use risk_manager::RiskConfig;
use signal_ensemble::{ModelWeights, SignalBands};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use analysis_orchestrator::PipelineConfig;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // What to evaluate, and how often
    pub instruments: Vec<String>,
    pub eval_interval_seconds: u64,
    pub lookback_days: u32,
    pub adapter_timeout_seconds: u64,
    pub volatility_window: usize,

    // Ensemble
    pub weights: ModelWeights,
    pub bands: SignalBands,
    pub alert_threshold: f64,      // 85
    pub trend_horizon_days: u32,   // 5

    // Risk and sizing
    pub risk: RiskConfig,

    // External services
    pub polygon_api_key: String,
    pub polygon_rate_limit: usize,
    pub polygon_market: Market,
    pub ml: MLConfig,
    pub notifications: NotificationConfig,

    // Optional JSON-lines export
    pub records_path: Option<PathBuf>,

    pub metrics_log_interval_ticks: u64,
}

/// Environment lookup with blank values treated as unset.
struct Vars<F: Fn(&str) -> Option<String>>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw.parse().with_context(|| format!("{} has an invalid value '{}'", key, raw)),
            None => Ok(default),
        }
    }

    fn floats<const N: usize>(&self, key: &str, default: [f64; N]) -> Result<[f64; N]> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        let values = raw
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("{} must be a comma-separated list of numbers, got '{}'", key, raw))?;
        values
            .try_into()
            .map_err(|v: Vec<f64>| anyhow::anyhow!("{} needs {} values, got {}", key, N, v.len()))
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(lookup);

        let risk_defaults = RiskConfig::default();
        let [min_stop_pct, max_stop_pct] =
            vars.floats("STOP_LOSS_RANGE", [risk_defaults.min_stop_pct, risk_defaults.max_stop_pct])?;
        let [low_volatility_cutoff, high_volatility_cutoff] = vars.floats(
            "RISK_VOLATILITY_CUTOFFS",
            [risk_defaults.low_volatility_cutoff, risk_defaults.high_volatility_cutoff],
        )?;
        let risk = RiskConfig {
            low_volatility_cutoff,
            high_volatility_cutoff,
            min_stop_pct,
            max_stop_pct,
            target_multiples: vars.floats("TARGET_MULTIPLES", risk_defaults.target_multiples)?,
            min_position_fraction: vars.parse("KELLY_MIN_FRACTION", risk_defaults.min_position_fraction)?,
            max_position_fraction: vars.parse("KELLY_MAX_FRACTION", risk_defaults.max_position_fraction)?,
            kelly_multiplier: vars.parse("KELLY_MULTIPLIER", risk_defaults.kelly_multiplier)?,
        };

        let w = ModelWeights::default();
        let [trend, pattern, technical, sentiment] =
            vars.floats("MODEL_WEIGHTS", [w.trend, w.pattern, w.technical, w.sentiment])?;
        let b = SignalBands::default();
        let [strong_buy, buy, sell, strong_sell] =
            vars.floats("SIGNAL_BANDS", [b.strong_buy, b.buy, b.sell, b.strong_sell])?;

        let polygon_market = match vars.get("POLYGON_MARKET").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("crypto") => Market::Crypto,
            Some("stocks") => Market::Stocks,
            Some(other) => bail!("POLYGON_MARKET must be 'crypto' or 'stocks', got '{}'", other),
        };

        let ml_defaults = MLConfig::default();
        let ml = MLConfig {
            sentiment_url: vars.get("ML_SENTIMENT_URL").unwrap_or(ml_defaults.sentiment_url),
            price_predictor_url: vars
                .get("ML_PRICE_PREDICTOR_URL")
                .unwrap_or(ml_defaults.price_predictor_url),
            timeout: Duration::from_secs(vars.parse("ML_TIMEOUT_SECONDS", ml_defaults.timeout.as_secs())?),
        };

        let config = Self {
            instruments: vars
                .get("INSTRUMENTS")
                .unwrap_or_else(|| "BTC,ETH".to_string())
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            eval_interval_seconds: vars.parse("EVAL_INTERVAL_SECONDS", 180)?,
            lookback_days: vars.parse("LOOKBACK_DAYS", 120)?,
            adapter_timeout_seconds: vars.parse("ADAPTER_TIMEOUT_SECONDS", 10)?,
            volatility_window: vars.parse("VOLATILITY_WINDOW", 30)?,

            weights: ModelWeights {
                trend,
                pattern,
                technical,
                sentiment,
            },
            bands: SignalBands {
                strong_buy,
                buy,
                sell,
                strong_sell,
            },
            alert_threshold: vars.parse("ALERT_THRESHOLD", 85.0)?,
            trend_horizon_days: vars.parse("TREND_HORIZON_DAYS", 5)?,

            risk,

            polygon_api_key: vars.get("POLYGON_API_KEY").context("POLYGON_API_KEY not set")?,
            polygon_rate_limit: vars.parse("POLYGON_RATE_LIMIT", 500)?,
            polygon_market,
            ml,
            notifications: NotificationConfig {
                discord_webhook_url: vars.get("DISCORD_WEBHOOK_URL"),
                webhook_timeout: Duration::from_secs(vars.parse("WEBHOOK_TIMEOUT_SECONDS", 10)?),
            },

            records_path: vars.get("RECORDS_PATH").map(PathBuf::from),
            metrics_log_interval_ticks: vars.parse("METRICS_LOG_INTERVAL_TICKS", 10)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks that only concern the agent itself. Engine settings are
    /// validated by the components that own them.
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            bail!("INSTRUMENTS must name at least one instrument");
        }
        if self.eval_interval_seconds == 0 {
            bail!("EVAL_INTERVAL_SECONDS must be positive");
        }
        if self.adapter_timeout_seconds == 0 {
            bail!("ADAPTER_TIMEOUT_SECONDS must be positive");
        }
        if !(0.0..=100.0).contains(&self.alert_threshold) {
            bail!("ALERT_THRESHOLD must be within [0, 100], got {}", self.alert_threshold);
        }
        if self.polygon_rate_limit == 0 {
            bail!("POLYGON_RATE_LIMIT must be positive");
        }
        Ok(())
    }

    pub fn eval_interval(&self) -> Duration {
        Duration::from_secs(self.eval_interval_seconds)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            lookback_days: self.lookback_days,
            adapter_timeout: Duration::from_secs(self.adapter_timeout_seconds),
            volatility_window: self.volatility_window,
        }
    }

    pub fn trend(&self) -> TrendConfig {
        TrendConfig {
            horizon_days: self.trend_horizon_days,
            ..TrendConfig::default()
        }
    }

    pub fn polygon(&self) -> PolygonConfig {
        PolygonConfig {
            rate_limit_per_minute: self.polygon_rate_limit,
            market: self.polygon_market,
            ..PolygonConfig::new(self.polygon_api_key.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AgentConfig> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AgentConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("POLYGON_API_KEY", "key")]).unwrap();
        assert_eq!(config.instruments, vec!["BTC", "ETH"]);
        assert_eq!(config.eval_interval(), Duration::from_secs(180));
        assert_eq!(config.alert_threshold, 85.0);
        assert_eq!(config.weights, ModelWeights::default());
        assert_eq!(config.risk.target_multiples, [1.0, 2.0, 3.0]);
        assert_eq!(config.polygon_market, Market::Crypto);
        assert!(config.records_path.is_none());
        assert!(config.notifications.discord_webhook_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("POLYGON_API_KEY", "key"),
            ("INSTRUMENTS", " btc , sol ,"),
            ("MODEL_WEIGHTS", "0.4,0.2,0.2,0.2"),
            ("TARGET_MULTIPLES", "1.5, 2.5, 4"),
            ("STOP_LOSS_RANGE", "0.02,0.1"),
            ("ALERT_THRESHOLD", "90"),
            ("POLYGON_MARKET", "Stocks"),
            ("DISCORD_WEBHOOK_URL", ""),
        ])
        .unwrap();
        assert_eq!(config.instruments, vec!["BTC", "SOL"]);
        assert_eq!(config.weights.trend, 0.4);
        assert_eq!(config.risk.target_multiples, [1.5, 2.5, 4.0]);
        assert_eq!(config.risk.max_stop_pct, 0.1);
        assert_eq!(config.alert_threshold, 90.0);
        assert_eq!(config.polygon().market, Market::Stocks);
        assert!(config.notifications.discord_webhook_url.is_none());
    }

    #[test]
    fn test_missing_api_key() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("POLYGON_API_KEY"));
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(load(&[("POLYGON_API_KEY", "k"), ("ALERT_THRESHOLD", "high")]).is_err());
        assert!(load(&[("POLYGON_API_KEY", "k"), ("MODEL_WEIGHTS", "0.5,0.5")]).is_err());
        assert!(load(&[("POLYGON_API_KEY", "k"), ("ALERT_THRESHOLD", "120")]).is_err());
        assert!(load(&[("POLYGON_API_KEY", "k"), ("EVAL_INTERVAL_SECONDS", "0")]).is_err());
        assert!(load(&[("POLYGON_API_KEY", "k"), ("POLYGON_MARKET", "forex")]).is_err());
    }
}
