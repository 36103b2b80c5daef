use analysis_core::stats::{simple_returns, std_dev};
use analysis_core::{AnalysisError, Bar};

/// Simple Moving Average. Output index 0 lines up with input index `period - 1`.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    let mut window_sum: f64 = data[..period].iter().sum();
    result.push(window_sum / period as f64);

    for i in period..data.len() {
        window_sum += data[i] - data[i - period];
        result.push(window_sum / period as f64);
    }
    result
}

/// Exponential Moving Average seeded with the SMA of the first `period` values.
/// Output index 0 lines up with input index `period - 1`.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(data.len() - period + 1);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result.push(prev);

    for &value in &data[period..] {
        prev = (value - prev) * multiplier + prev;
        result.push(prev);
    }

    result
}

/// Relative Strength Index (Wilder smoothing), bounded to [0, 100].
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period + 1 {
        return vec![];
    }

    let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;

    let to_rsi = |g: f64, l: f64| {
        if l == 0.0 {
            if g == 0.0 { 50.0 } else { 100.0 }
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        }
    };

    let mut rsi_values = Vec::with_capacity(changes.len() - period + 1);
    rsi_values.push(to_rsi(avg_gain, avg_loss));

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        rsi_values.push(to_rsi(avg_gain, avg_loss));
    }

    rsi_values
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let empty = MacdResult { macd_line: vec![], signal_line: vec![], histogram: vec![] };
    if fast_period == 0 || signal_period == 0 || slow_period <= fast_period {
        return empty;
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);
    if ema_slow.is_empty() {
        return empty;
    }

    // ema_slow starts (slow - fast) samples later than ema_fast
    let offset = slow_period - fast_period;
    let macd_line: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, slow)| ema_fast[i + offset] - slow)
        .collect();

    let signal_line = ema(&macd_line, signal_period);
    let hist_offset = signal_period - 1;
    let histogram = signal_line
        .iter()
        .enumerate()
        .map(|(i, signal)| macd_line[i + hist_offset] - signal)
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    if period == 0 || data.len() < period {
        return BollingerBands { upper: vec![], middle: vec![], lower: vec![] };
    }

    let middle = sma(data, period);
    let mut upper = Vec::with_capacity(middle.len());
    let mut lower = Vec::with_capacity(middle.len());

    for (window, &mean) in data.windows(period).zip(&middle) {
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let band = std_dev * variance.sqrt();
        upper.push(mean + band);
        lower.push(mean - band);
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Position of each close inside its Bollinger envelope: 0 at the lower band,
/// 1 at the upper band (can leave [0, 1] when price breaks out). A collapsed
/// band reports 0.5.
pub fn bollinger_percent_b(data: &[f64], period: usize, std_dev: f64) -> Vec<f64> {
    let bands = bollinger_bands(data, period, std_dev);
    let closes = data.get(period.saturating_sub(1)..).unwrap_or_default();

    closes
        .iter()
        .zip(bands.upper.iter().zip(&bands.lower))
        .map(|(&price, (&upper, &lower))| {
            let width = upper - lower;
            if width <= 0.0 {
                0.5
            } else {
                (price - lower) / width
            }
        })
        .collect()
}

fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| {
            let (prev, curr) = (&w[0], &w[1]);
            let high_low = curr.high - curr.low;
            let high_close = (curr.high - prev.close).abs();
            let low_close = (curr.low - prev.close).abs();
            high_low.max(high_close).max(low_close)
        })
        .collect()
}

/// Average True Range
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    if period == 0 || bars.len() < period + 1 {
        return vec![];
    }

    let trs = true_ranges(bars);
    let mut atr = trs[..period].iter().sum::<f64>() / period as f64;
    let mut atr_values = Vec::with_capacity(trs.len() - period + 1);
    atr_values.push(atr);

    for &tr in &trs[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
        atr_values.push(atr);
    }

    atr_values
}

/// Stochastic Oscillator
pub struct StochasticResult {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> StochasticResult {
    if k_period == 0 || bars.len() < k_period {
        return StochasticResult { k: vec![], d: vec![] };
    }

    let k: Vec<f64> = bars
        .windows(k_period)
        .map(|window| {
            let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let close = window[k_period - 1].close;
            if highest == lowest {
                50.0
            } else {
                100.0 * (close - lowest) / (highest - lowest)
            }
        })
        .collect();

    let d = sma(&k, d_period);
    StochasticResult { k, d }
}

/// Average Directional Index (ADX) with +DI/-DI directional strength.
pub struct AdxResult {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

pub fn adx(bars: &[Bar], period: usize) -> AdxResult {
    if period == 0 || bars.len() < period * 2 + 1 {
        return AdxResult { adx: vec![], plus_di: vec![], minus_di: vec![] };
    }

    let mut plus_dm = Vec::with_capacity(bars.len() - 1);
    let mut minus_dm = Vec::with_capacity(bars.len() - 1);
    for w in bars.windows(2) {
        let up_move = w[1].high - w[0].high;
        let down_move = w[0].low - w[1].low;
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
    }
    let true_range = true_ranges(bars);

    // Wilder smoothing
    let mut smoothed_plus_dm: f64 = plus_dm[..period].iter().sum();
    let mut smoothed_minus_dm: f64 = minus_dm[..period].iter().sum();
    let mut smoothed_tr: f64 = true_range[..period].iter().sum();

    let mut plus_di = Vec::new();
    let mut minus_di = Vec::new();
    let mut dx_values = Vec::new();

    for i in period..plus_dm.len() {
        smoothed_plus_dm += plus_dm[i] - smoothed_plus_dm / period as f64;
        smoothed_minus_dm += minus_dm[i] - smoothed_minus_dm / period as f64;
        smoothed_tr += true_range[i] - smoothed_tr / period as f64;

        let (pdi, mdi) = if smoothed_tr > 0.0 {
            (100.0 * smoothed_plus_dm / smoothed_tr, 100.0 * smoothed_minus_dm / smoothed_tr)
        } else {
            (0.0, 0.0)
        };
        plus_di.push(pdi);
        minus_di.push(mdi);

        let di_sum = pdi + mdi;
        dx_values.push(if di_sum > 0.0 { 100.0 * (pdi - mdi).abs() / di_sum } else { 0.0 });
    }

    if dx_values.len() < period {
        return AdxResult { adx: vec![], plus_di, minus_di };
    }

    let mut adx_val = dx_values[..period].iter().sum::<f64>() / period as f64;
    let mut adx_values = vec![adx_val];
    for &dx in &dx_values[period..] {
        adx_val = (adx_val * (period - 1) as f64 + dx) / period as f64;
        adx_values.push(adx_val);
    }

    AdxResult {
        adx: adx_values,
        plus_di,
        minus_di,
    }
}

/// Sample standard deviation of the last `window` simple returns.
///
/// Needs `window + 1` closes; fails with `InsufficientHistory` otherwise.
pub fn realized_volatility(closes: &[f64], window: usize) -> Result<f64, AnalysisError> {
    let required = window + 1;
    if window < 2 || closes.len() < required {
        return Err(AnalysisError::InsufficientHistory {
            required: required.max(3),
            available: closes.len(),
        });
    }

    let returns = simple_returns(&closes[closes.len() - required..]);
    let vol = std_dev(&returns);
    if !vol.is_finite() {
        return Err(AnalysisError::CalculationError(format!(
            "volatility over {} returns is not finite",
            window
        )));
    }
    Ok(vol)
}

/// Last value of an indicator series, or `InsufficientHistory` when the
/// series came back empty because the input was too short.
pub fn latest(values: &[f64], required: usize, available: usize) -> Result<f64, AnalysisError> {
    values
        .last()
        .copied()
        .ok_or(AnalysisError::InsufficientHistory { required, available })
}
