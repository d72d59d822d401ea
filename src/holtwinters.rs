//! Triple exponential smoothing (Holt-Winters) with multiplicative
//! seasonality
//!
//! The level, trend, and seasonal components are initialized the classic
//! way: the first observation seeds the level, the averaged first-season
//! deltas seed the trend, and per-season normalized means seed the seasonal
//! indices. `forecast` returns the fitted sequence extended by `m` steps;
//! callers keep the last `m` values as the prediction window.

/// Forecast `m` steps past the end of `y` with season length `period`.
///
/// `alpha` smooths the level, `beta` the trend, `gamma` the seasonal
/// indices. Returns `None` when the input is too short to seed the model
/// (it needs at least two full seasons).
pub fn forecast(
    y: &[f64],
    alpha: f64,
    beta: f64,
    gamma: f64,
    period: usize,
    m: usize,
) -> Option<Vec<f64>> {
    if period == 0 || m == 0 || y.len() < 2 * period {
        return None;
    }

    let seasons = y.len() / period;
    let a0 = y[0];
    let b0 = initial_trend(y, period);
    let mut seasonal = seasonal_indices(y, period, seasons);

    let n = y.len();
    let mut forecast = vec![0.0; n + m];
    let mut level = vec![0.0; n + m];
    let mut trend = vec![0.0; n + m];
    seasonal.resize(n + m, 0.0);

    level[1] = a0;
    trend[1] = b0;

    for i in 2..n {
        if i >= period {
            level[i] =
                alpha * y[i] / seasonal[i - period] + (1.0 - alpha) * (level[i - 1] + trend[i - 1]);
        } else {
            level[i] = alpha * y[i] + (1.0 - alpha) * (level[i - 1] + trend[i - 1]);
        }

        trend[i] = beta * (level[i] - level[i - 1]) + (1.0 - beta) * trend[i - 1];

        if i >= period {
            seasonal[i] = gamma * y[i] / level[i] + (1.0 - gamma) * seasonal[i - period];
        }

        if i + m >= period {
            forecast[i + m] = (level[i] + m as f64 * trend[i]) * seasonal[i + m - period];
        }
    }

    Some(forecast)
}

/// Average first-season step: mean of `(y[period+i] - y[i]) / period`
fn initial_trend(y: &[f64], period: usize) -> f64 {
    let mut sum = 0.0;
    for i in 0..period {
        sum += (y[period + i] - y[i]) / period as f64;
    }
    sum / period as f64
}

/// Seasonal indices: per-slot means of observations normalized by their
/// season's average
fn seasonal_indices(y: &[f64], period: usize, seasons: usize) -> Vec<f64> {
    let mut season_average = vec![0.0; seasons];
    for (k, avg) in season_average.iter_mut().enumerate() {
        for i in 0..period {
            *avg += y[k * period + i];
        }
        *avg /= period as f64;
    }

    let mut indices = vec![0.0; period];
    for (i, idx) in indices.iter_mut().enumerate() {
        for k in 0..seasons {
            *idx += y[k * period + i] / season_average[k];
        }
        *idx /= seasons as f64;
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_short_input_rejected() {
        assert!(forecast(&[1.0; 5], 0.1, 0.0035, 0.1, 4, 3).is_none());
        assert!(forecast(&[1.0; 8], 0.1, 0.0035, 0.1, 0, 3).is_none());
    }

    #[test]
    fn test_output_length_is_input_plus_horizon() {
        let y: Vec<f64> = (0..24).map(|i| 10.0 + (i % 6) as f64).collect();
        let out = forecast(&y, 0.1, 0.0035, 0.1, 6, 4).unwrap();
        assert_eq!(out.len(), 28);
    }

    #[test]
    fn test_seasonal_pattern_carries_forward() {
        // Strong 4-sample season repeated 8 times; the forecast horizon
        // should reproduce the high/low alternation.
        let season = [10.0, 20.0, 30.0, 20.0];
        let y: Vec<f64> = (0..32).map(|i| season[i % 4]).collect();
        let out = forecast(&y, 0.1, 0.0035, 0.1, 4, 4).unwrap();
        let tail = &out[32..];
        assert!(
            tail[2] > tail[0],
            "peak slot should stay above trough slot: {:?}",
            tail
        );
    }

    #[test]
    fn test_flat_series_forecasts_flat() {
        let y = vec![5.0; 20];
        let out = forecast(&y, 0.1, 0.0035, 0.1, 5, 5).unwrap();
        for &v in &out[20..] {
            assert!((v - 5.0).abs() < 0.5, "flat input drifted to {}", v);
        }
    }
}
