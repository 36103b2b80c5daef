use analysis_core::{AnalysisError, SentimentSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MLError, MLResult};

/// Aggregated news/social sentiment for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSentimentResponse {
    pub symbol: String,
    /// -1.0 (bearish) to 1.0 (bullish)
    pub score: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub article_count: usize,
}

impl SymbolSentimentResponse {
    fn checked_score(&self) -> MLResult<f64> {
        if !self.score.is_finite() {
            return Err(MLError::InvalidResponse(format!(
                "sentiment score for {} is not finite",
                self.symbol
            )));
        }
        Ok(self.score.clamp(-1.0, 1.0))
    }
}

#[derive(Clone)]
pub struct SentimentClient {
    client: reqwest::Client,
    base_url: String,
}

impl SentimentClient {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// Current sentiment for a symbol
    pub async fn symbol_sentiment(&self, symbol: &str) -> MLResult<SymbolSentimentResponse> {
        let response = self
            .client
            .get(format!("{}/sentiment/{}", self.base_url, symbol))
            .send()
            .await
            .map_err(MLError::from_request)?;

        if !response.status().is_success() {
            return Err(MLError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let result = response
            .json::<SymbolSentimentResponse>()
            .await
            .map_err(MLError::from_request)?;
        Ok(result)
    }

    /// Check service health
    pub async fn health(&self) -> MLResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl SentimentSource for SentimentClient {
    async fn score(&self, instrument: &str) -> Result<f64, AnalysisError> {
        let sentiment = self.symbol_sentiment(instrument).await?;
        tracing::debug!(
            instrument,
            score = sentiment.score,
            articles = sentiment.article_count,
            "sentiment service responded"
        );
        Ok(sentiment.checked_score()?)
    }
}
