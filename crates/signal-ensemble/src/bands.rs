use analysis_core::{AnalysisError, SignalDirection};
use serde::{Deserialize, Serialize};

/// Score thresholds between the five signal directions. A score exactly on a
/// threshold falls into the stronger band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalBands {
    pub strong_buy: f64,
    pub buy: f64,
    pub sell: f64,
    pub strong_sell: f64,
}

impl Default for SignalBands {
    fn default() -> Self {
        Self {
            strong_buy: 0.6,
            buy: 0.2,
            sell: -0.2,
            strong_sell: -0.6,
        }
    }
}

impl SignalBands {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let ordered = self.strong_sell < self.sell && self.sell < 0.0 && 0.0 < self.buy && self.buy < self.strong_buy;
        let finite = [self.strong_buy, self.buy, self.sell, self.strong_sell]
            .iter()
            .all(|v| v.is_finite());
        if !(ordered && finite) {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "signal bands must satisfy strong_sell < sell < 0 < buy < strong_buy, got {:?}",
                self
            )));
        }
        Ok(())
    }

    pub fn classify(&self, score: f64) -> SignalDirection {
        if score >= self.strong_buy {
            SignalDirection::StrongBuy
        } else if score >= self.buy {
            SignalDirection::Buy
        } else if score > self.sell {
            SignalDirection::Hold
        } else if score > self.strong_sell {
            SignalDirection::Sell
        } else {
            SignalDirection::StrongSell
        }
    }
}
