use analysis_core::{AnalysisError, Bar, PriceSeries, PriceSeriesProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            let oldest = match ts.front() {
                Some(&oldest) if ts.len() >= self.max_requests => oldest,
                _ => {
                    ts.push_back(now);
                    return;
                }
            };

            // Wait until the oldest request falls out of the window
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Ticker namespace the instruments belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Market {
    #[default]
    Stocks,
    /// Instruments are base currencies quoted in USD (`BTC` -> `X:BTCUSD`).
    Crypto,
}

#[derive(Debug, Clone)]
pub struct PolygonConfig {
    pub api_key: String,
    pub base_url: String,
    pub rate_limit_per_minute: usize,
    pub timeout: Duration,
    pub market: Market,
}

impl PolygonConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            // Starter plan allowance; free tier users should configure 5.
            rate_limit_per_minute: 500,
            timeout: Duration::from_secs(30),
            market: Market::Stocks,
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    config: PolygonConfig,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        Self::with_config(PolygonConfig::new(api_key))
    }

    pub fn with_config(config: PolygonConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            rate_limiter: RateLimiter::new(config.rate_limit_per_minute, Duration::from_secs(60)),
            config,
            client,
        }
    }

    /// Polygon ticker for an instrument symbol.
    pub fn ticker_for(&self, instrument: &str) -> String {
        let symbol = instrument.trim().to_uppercase();
        match self.config.market {
            Market::Stocks => symbol,
            Market::Crypto if symbol.starts_with("X:") => symbol,
            Market::Crypto => format!("X:{}USD", symbol),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    /// Get aggregates (bars) for a Polygon ticker
    pub async fn get_aggregates(
        &self,
        ticker: &str,
        multiplier: u32,
        timespan: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, AnalysisError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.config.base_url,
            ticker,
            multiplier,
            timespan,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.config.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(agg_response.into_bars())
    }
}

#[async_trait]
impl PriceSeriesProvider for PolygonClient {
    /// Daily bars covering the last `lookback_days` calendar days.
    async fn fetch(&self, instrument: &str, lookback_days: u32) -> Result<PriceSeries, AnalysisError> {
        let ticker = self.ticker_for(instrument);
        let to = Utc::now();
        let from = to - chrono::Duration::days(i64::from(lookback_days));

        let bars = self
            .get_aggregates(&ticker, 1, "day", from, to)
            .await
            .map_err(|e| AnalysisError::DataUnavailable(format!("{} ({}): {}", instrument, ticker, e)))?;

        if bars.is_empty() {
            return Err(AnalysisError::DataUnavailable(format!(
                "{} ({}): no bars returned",
                instrument, ticker
            )));
        }

        tracing::debug!(instrument, ticker = %ticker, bars = bars.len(), "fetched aggregates");
        PriceSeries::from_unsorted(instrument, bars)
    }
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp (ms)
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    v: f64, // volume
    #[serde(default)]
    vw: Option<f64>, // volume weighted average
}

impl AggregateResponse {
    /// Results with an unrepresentable timestamp are dropped.
    fn into_bars(self) -> Vec<Bar> {
        self.results
            .into_iter()
            .filter_map(|r| {
                Some(Bar {
                    timestamp: DateTime::from_timestamp_millis(r.t)?,
                    open: r.o,
                    high: r.h,
                    low: r.l,
                    close: r.c,
                    volume: r.v,
                    vwap: r.vw,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_mapping() {
        let stocks = PolygonClient::new("key".to_string());
        assert_eq!(stocks.ticker_for("aapl"), "AAPL");

        let mut config = PolygonConfig::new("key");
        config.market = Market::Crypto;
        let crypto = PolygonClient::with_config(config);
        assert_eq!(crypto.ticker_for("btc"), "X:BTCUSD");
        assert_eq!(crypto.ticker_for("X:ETHUSD"), "X:ETHUSD");
    }

    #[test]
    fn test_aggregate_response_into_bars() {
        let json = r#"{
            "ticker": "AAPL",
            "status": "OK",
            "results": [
                {"t": 1704067200000, "o": 100.0, "h": 102.0, "l": 99.0, "c": 101.0, "v": 1000.0, "vw": 100.7},
                {"t": 1704153600000, "o": 101.0, "h": 103.0, "l": 100.0, "c": 102.5, "v": 900.0}
            ]
        }"#;
        let response: AggregateResponse = serde_json::from_str(json).unwrap();
        let bars = response.into_bars();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.timestamp_millis(), 1704067200000);
        assert_eq!(bars[0].vwap, Some(100.7));
        assert_eq!(bars[1].close, 102.5);
        assert_eq!(bars[1].vwap, None);
    }

    #[test]
    fn test_missing_results_is_empty() {
        let response: AggregateResponse = serde_json::from_str(r#"{"status": "OK", "resultsCount": 0}"#).unwrap();
        assert!(response.into_bars().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limiter_admits_up_to_limit_immediately() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let admitted = tokio::time::timeout(Duration::from_secs(1), async {
            for _ in 0..3 {
                limiter.acquire().await;
            }
        })
        .await;
        assert!(admitted.is_ok());

        let blocked = tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(blocked.is_err());
    }
}
