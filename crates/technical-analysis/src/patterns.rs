use analysis_core::{AnalysisError, Bar, DetectedPattern, OpinionDirection, PatternDetector, PriceSeries};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandlestickPattern {
    Doji,
    Hammer,
    InvertedHammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    Piercing,
    DarkCloudCover,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
}

impl CandlestickPattern {
    pub fn name(&self) -> &'static str {
        match self {
            CandlestickPattern::Doji => "Doji",
            CandlestickPattern::Hammer => "Hammer",
            CandlestickPattern::InvertedHammer => "Inverted Hammer",
            CandlestickPattern::ShootingStar => "Shooting Star",
            CandlestickPattern::BullishEngulfing => "Bullish Engulfing",
            CandlestickPattern::BearishEngulfing => "Bearish Engulfing",
            CandlestickPattern::Piercing => "Piercing",
            CandlestickPattern::DarkCloudCover => "Dark Cloud Cover",
            CandlestickPattern::MorningStar => "Morning Star",
            CandlestickPattern::EveningStar => "Evening Star",
            CandlestickPattern::ThreeWhiteSoldiers => "Three White Soldiers",
            CandlestickPattern::ThreeBlackCrows => "Three Black Crows",
        }
    }

    /// Canonical bias of the formation.
    pub fn bias(&self) -> OpinionDirection {
        match self {
            CandlestickPattern::Doji => OpinionDirection::Neutral,
            CandlestickPattern::Hammer
            | CandlestickPattern::InvertedHammer
            | CandlestickPattern::BullishEngulfing
            | CandlestickPattern::Piercing
            | CandlestickPattern::MorningStar
            | CandlestickPattern::ThreeWhiteSoldiers => OpinionDirection::Bullish,
            CandlestickPattern::ShootingStar
            | CandlestickPattern::BearishEngulfing
            | CandlestickPattern::DarkCloudCover
            | CandlestickPattern::EveningStar
            | CandlestickPattern::ThreeBlackCrows => OpinionDirection::Bearish,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub pattern: CandlestickPattern,
    pub index: usize,
    pub strength: f64, // 0.0 to 1.0
}

/// Body and shadow geometry of one bar.
struct Candle {
    open: f64,
    close: f64,
    high: f64,
    low: f64,
    body: f64,
    range: f64,
    upper_shadow: f64,
    lower_shadow: f64,
}

impl Candle {
    fn of(bar: &Bar) -> Self {
        Self {
            open: bar.open,
            close: bar.close,
            high: bar.high,
            low: bar.low,
            body: (bar.close - bar.open).abs(),
            range: bar.high - bar.low,
            upper_shadow: bar.high - bar.open.max(bar.close),
            lower_shadow: bar.open.min(bar.close) - bar.low,
        }
    }

    fn rising(&self) -> bool {
        self.close > self.open
    }

    fn falling(&self) -> bool {
        self.close < self.open
    }

    fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    fn small_body(&self) -> bool {
        self.range > 0.0 && self.body / self.range < 0.3
    }
}

fn single_bar_patterns(c: &Candle) -> Vec<(CandlestickPattern, f64)> {
    let mut found = Vec::new();
    if c.range <= 0.0 {
        return found;
    }

    if c.body / c.range < 0.1 {
        found.push((CandlestickPattern::Doji, 0.5));
    }

    if c.small_body() && c.body > 0.0 {
        let shadow_ratio = |shadow: f64| (shadow / c.body).min(5.0) / 5.0;

        // Long lower shadow, little upper shadow
        if c.lower_shadow > 2.0 * c.body && c.upper_shadow < c.body * 0.5 {
            found.push((CandlestickPattern::Hammer, shadow_ratio(c.lower_shadow)));
        }
        // Long upper shadow, little lower shadow. The same shape reads as a
        // bullish inverted hammer after a down bar and a shooting star after an up bar.
        if c.upper_shadow > 2.0 * c.body && c.lower_shadow < c.body * 0.5 {
            found.push((CandlestickPattern::InvertedHammer, shadow_ratio(c.upper_shadow)));
            found.push((CandlestickPattern::ShootingStar, shadow_ratio(c.upper_shadow)));
        }
    }

    found
}

fn two_bar_patterns(prev: &Candle, curr: &Candle) -> Vec<(CandlestickPattern, f64)> {
    let mut found = Vec::new();

    if prev.falling() && curr.rising() {
        if curr.open <= prev.close && curr.close >= prev.open {
            let ratio = curr.body / prev.body;
            found.push((CandlestickPattern::BullishEngulfing, ratio.min(2.0) / 2.0));
        } else if curr.open < prev.low && curr.close > prev.midpoint() && curr.close < prev.open {
            let penetration = (curr.close - prev.close) / prev.body;
            found.push((CandlestickPattern::Piercing, penetration.min(1.0)));
        }
    }

    if prev.rising() && curr.falling() {
        if curr.open >= prev.close && curr.close <= prev.open {
            let ratio = curr.body / prev.body;
            found.push((CandlestickPattern::BearishEngulfing, ratio.min(2.0) / 2.0));
        } else if curr.open > prev.high && curr.close < prev.midpoint() && curr.close > prev.open {
            let penetration = (prev.close - curr.close) / prev.body;
            found.push((CandlestickPattern::DarkCloudCover, penetration.min(1.0)));
        }
    }

    found
}

fn three_bar_patterns(first: &Candle, second: &Candle, third: &Candle) -> Vec<(CandlestickPattern, f64)> {
    let mut found = Vec::new();
    let star = second.body < first.body * 0.3 && first.range > 0.0;

    if first.falling() && third.rising() && star && third.close > first.midpoint() {
        found.push((CandlestickPattern::MorningStar, 0.8));
    }
    if first.rising() && third.falling() && star && third.close < first.midpoint() {
        found.push((CandlestickPattern::EveningStar, 0.8));
    }

    let bars = [first, second, third];
    let opens_inside_previous_body = |rising: bool| {
        bars.windows(2).all(|w| {
            let (lo, hi) = if rising { (w[0].open, w[0].close) } else { (w[0].close, w[0].open) };
            w[1].open > lo && w[1].open < hi
        })
    };

    if bars.iter().all(|c| c.rising())
        && bars.windows(2).all(|w| w[1].close > w[0].close)
        && opens_inside_previous_body(true)
    {
        found.push((CandlestickPattern::ThreeWhiteSoldiers, 0.8));
    }
    if bars.iter().all(|c| c.falling())
        && bars.windows(2).all(|w| w[1].close < w[0].close)
        && opens_inside_previous_body(false)
    {
        found.push((CandlestickPattern::ThreeBlackCrows, 0.8));
    }

    found
}

/// Detect formations completed by the most recent bar.
pub fn detect_patterns(bars: &[Bar]) -> Vec<PatternMatch> {
    let n = bars.len();
    if n == 0 {
        return Vec::new();
    }

    let candles: Vec<Candle> = bars[n.saturating_sub(3)..].iter().map(Candle::of).collect();
    let last = &candles[candles.len() - 1];

    let mut found = single_bar_patterns(last);

    // Hammer-family shapes need the preceding bar for context.
    if candles.len() >= 2 {
        let prev = &candles[candles.len() - 2];
        found.retain(|(p, _)| match p {
            CandlestickPattern::InvertedHammer => prev.falling(),
            CandlestickPattern::ShootingStar => prev.rising(),
            _ => true,
        });
        found.extend(two_bar_patterns(prev, last));
    } else {
        found.retain(|(p, _)| {
            !matches!(p, CandlestickPattern::InvertedHammer | CandlestickPattern::ShootingStar)
        });
    }

    if candles.len() == 3 {
        found.extend(three_bar_patterns(&candles[0], &candles[1], &candles[2]));
    }

    found
        .into_iter()
        .map(|(pattern, strength)| PatternMatch {
            pattern,
            index: n - 1,
            strength: strength.clamp(0.0, 1.0),
        })
        .collect()
}

/// Local candlestick-based implementation of the PATTERN detector contract.
///
/// Targets are the nearest swing extreme over `target_lookback` bars in the
/// pattern's direction, when one lies beyond the current close.
#[derive(Debug, Clone)]
pub struct CandlestickDetector {
    pub target_lookback: usize,
}

impl Default for CandlestickDetector {
    fn default() -> Self {
        Self { target_lookback: 20 }
    }
}

impl CandlestickDetector {
    pub fn new(target_lookback: usize) -> Self {
        Self { target_lookback }
    }

    fn target_for(&self, bars: &[Bar], bias: OpinionDirection) -> Option<f64> {
        let close = bars.last()?.close;
        let recent = &bars[bars.len().saturating_sub(self.target_lookback)..];
        match bias {
            OpinionDirection::Bullish => recent
                .iter()
                .map(|b| b.high)
                .fold(None, |acc: Option<f64>, h| Some(acc.map_or(h, |a| a.max(h))))
                .filter(|&h| h > close),
            OpinionDirection::Bearish => recent
                .iter()
                .map(|b| b.low)
                .fold(None, |acc: Option<f64>, l| Some(acc.map_or(l, |a| a.min(l))))
                .filter(|&l| l < close),
            OpinionDirection::Neutral => None,
        }
    }
}

#[async_trait]
impl PatternDetector for CandlestickDetector {
    async fn detect(&self, series: &PriceSeries) -> Result<Vec<DetectedPattern>, AnalysisError> {
        let bars = series.bars();
        Ok(detect_patterns(bars)
            .into_iter()
            .map(|m| {
                let bias = m.pattern.bias();
                DetectedPattern {
                    pattern_name: m.pattern.name().to_string(),
                    bias,
                    confidence: m.strength,
                    target_price: self.target_for(bars, bias),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        ohlc.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: start + Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 10.0,
                vwap: None,
            })
            .collect()
    }

    fn names(found: &[PatternMatch]) -> Vec<CandlestickPattern> {
        found.iter().map(|m| m.pattern).collect()
    }

    #[test]
    fn test_bullish_engulfing() {
        let found = detect_patterns(&bars(&[(105.0, 106.0, 100.0, 101.0), (100.5, 108.0, 100.0, 107.0)]));
        assert!(names(&found).contains(&CandlestickPattern::BullishEngulfing));
        assert_eq!(CandlestickPattern::BullishEngulfing.bias(), OpinionDirection::Bullish);
    }

    #[test]
    fn test_bearish_engulfing() {
        let found = detect_patterns(&bars(&[(100.0, 106.0, 99.0, 105.0), (106.0, 107.0, 98.0, 99.0)]));
        assert!(names(&found).contains(&CandlestickPattern::BearishEngulfing));
    }

    #[test]
    fn test_hammer() {
        // body 1, lower shadow 6, upper shadow 0.2
        let found = detect_patterns(&bars(&[(100.0, 100.2, 93.0, 99.0)]));
        let hammer = found.iter().find(|m| m.pattern == CandlestickPattern::Hammer).unwrap();
        assert!((hammer.strength - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_shooting_star_needs_prior_up_bar() {
        let shape = (100.0, 106.0, 99.9, 101.0);
        let after_up = detect_patterns(&bars(&[(95.0, 100.5, 94.5, 100.0), shape]));
        assert!(names(&after_up).contains(&CandlestickPattern::ShootingStar));
        assert!(!names(&after_up).contains(&CandlestickPattern::InvertedHammer));

        let after_down = detect_patterns(&bars(&[(105.0, 105.5, 99.5, 100.0), shape]));
        assert!(names(&after_down).contains(&CandlestickPattern::InvertedHammer));
        assert!(!names(&after_down).contains(&CandlestickPattern::ShootingStar));
    }

    #[test]
    fn test_three_white_soldiers() {
        let found = detect_patterns(&bars(&[
            (100.0, 104.5, 99.5, 104.0),
            (102.0, 107.5, 101.5, 107.0),
            (105.0, 110.5, 104.5, 110.0),
        ]));
        assert!(names(&found).contains(&CandlestickPattern::ThreeWhiteSoldiers));
    }

    #[test]
    fn test_no_pattern_on_flat_bar() {
        assert!(detect_patterns(&bars(&[(100.0, 100.0, 100.0, 100.0)])).is_empty());
        assert!(detect_patterns(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_detector_reports_bias_and_target() {
        let series = PriceSeries::new(
            "BTC",
            bars(&[
                (110.0, 112.0, 108.0, 109.0),
                (105.0, 106.0, 100.0, 101.0),
                (100.5, 108.0, 100.0, 107.0),
            ]),
        )
        .unwrap();
        let detected = CandlestickDetector::default().detect(&series).await.unwrap();
        let engulfing = detected
            .iter()
            .find(|p| p.pattern_name == "Bullish Engulfing")
            .unwrap();
        assert_eq!(engulfing.bias, OpinionDirection::Bullish);
        assert_eq!(engulfing.target_price, Some(112.0));
    }
}
