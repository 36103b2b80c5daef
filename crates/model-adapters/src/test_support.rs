use analysis_core::{Bar, PriceSeries};
use chrono::{Duration, TimeZone, Utc};

/// Daily series whose bars span one point around each close.
pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: start + Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
            vwap: None,
        })
        .collect();
    PriceSeries::new("TEST", bars).unwrap()
}
