/// Small statistics helpers shared by the indicator library and the risk engine.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Simple period-over-period returns. Pairs with a non-positive base are skipped.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Clamp to [lo, hi], mapping NaN to `lo`.
pub fn clamp_or(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_std_dev() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // sample variance = 32 / 7
        assert_relative_eq!(std_dev(&data), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn test_simple_returns() {
        let returns = simple_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert_relative_eq!(returns[0], 0.10, epsilon = 1e-12);
        assert_relative_eq!(returns[1], -0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_clamp_or_nan() {
        assert_eq!(clamp_or(f64::NAN, 0.0, 1.0), 0.0);
        assert_eq!(clamp_or(3.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp_or(-3.0, 0.0, 1.0), 0.0);
    }
}
