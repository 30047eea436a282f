use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};

use super::forecaster::{validate_series, Forecaster};
use super::FitError;

/// Bound on |φ| so the differenced process stays stationary
const MAX_AR_COEFFICIENT: f64 = 0.99;

/// Non-seasonal ARIMA(1,1,0) with an intercept.
///
/// Fitted by conditional least squares on first differences:
/// `Δy_t = c + φ·Δy_{t-1} + ε_t`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arima110;

impl Arima110 {
    /// 4 differences leave 3 regression rows, one more than the parameter count
    pub const MIN_SERIES_LEN: usize = 5;
}

/// Everything needed to forecast from a fitted ARIMA(1,1,0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaState {
    pub ar_coefficient: f64,
    pub intercept: f64,
    pub sigma2: f64,
    pub last_value: f64,
    pub last_diff: f64,
    pub observations: usize,
}

impl Forecaster for Arima110 {
    type State = ArimaState;

    const NAME: &'static str = "arima_1_1_0";

    fn min_series_len(&self) -> usize {
        Self::MIN_SERIES_LEN
    }

    fn fit(&self, series: &[f64]) -> Result<ArimaState, FitError> {
        validate_series(series, Self::MIN_SERIES_LEN)?;

        let levels = Array1::from_vec(series.to_vec());
        let diffs = &levels.slice(s![1..]) - &levels.slice(s![..-1]);
        let lagged = diffs.slice(s![..-1]);
        let current = diffs.slice(s![1..]);
        let rows = current.len() as f64;

        let x_mean = lagged.mean().unwrap_or(0.0);
        let y_mean = current.mean().unwrap_or(0.0);
        let x_centered = &lagged - x_mean;
        let y_centered = &current - y_mean;
        let sxx = x_centered.dot(&x_centered);
        let sxy = x_centered.dot(&y_centered);

        // No variation in the lagged differences: the slope is unidentified,
        // fall back to a drift-only model.
        let (ar_coefficient, intercept) = if sxx <= f64::EPSILON * (1.0 + lagged.dot(&lagged)) {
            (0.0, y_mean)
        } else {
            let phi = (sxy / sxx).clamp(-MAX_AR_COEFFICIENT, MAX_AR_COEFFICIENT);
            (phi, y_mean - phi * x_mean)
        };

        let residuals = &current - &lagged.mapv(|x| intercept + ar_coefficient * x);
        let sigma2 = residuals.dot(&residuals) / (rows - 2.0);

        if !(ar_coefficient.is_finite() && intercept.is_finite() && sigma2.is_finite()) {
            return Err(FitError::NotConverged(format!(
                "non-finite estimates: phi={}, c={}, sigma2={}",
                ar_coefficient, intercept, sigma2
            )));
        }

        Ok(ArimaState {
            ar_coefficient,
            intercept,
            sigma2,
            last_value: series[series.len() - 1],
            last_diff: diffs[diffs.len() - 1],
            observations: series.len(),
        })
    }

    fn forecast(&self, state: &ArimaState, horizon: usize) -> Vec<f64> {
        let mut level = state.last_value;
        let mut diff = state.last_diff;
        (0..horizon)
            .map(|_| {
                diff = state.intercept + state.ar_coefficient * diff;
                level += diff;
                level
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn simulate(phi: f64, c: f64, len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut level = 1500.0;
        let mut diff = 0.0;
        let mut series = Vec::with_capacity(len);
        for _ in 0..len {
            let noise: f64 = StandardNormal.sample(&mut rng);
            diff = c + phi * diff + noise;
            level += diff;
            series.push(level);
        }
        series
    }

    #[test]
    fn test_rejects_short_series() {
        let err = Arima110.fit(&[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert_eq!(err, FitError::TooShort { len: 4, min: 5 });
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let err = Arima110.fit(&[1.0, 2.0, f64::NAN, 4.0, 5.0]).unwrap_err();
        assert_eq!(err, FitError::NonFinite { index: 2 });

        let err = Arima110.fit(&[1.0, 2.0, 3.0, 4.0, f64::INFINITY]).unwrap_err();
        assert_eq!(err, FitError::NonFinite { index: 4 });
    }

    #[test]
    fn test_constant_series_forecasts_constant() {
        let state = Arima110.fit(&[1850.25; 10]).unwrap();
        assert_eq!(state.ar_coefficient, 0.0);
        assert_eq!(Arima110.forecast(&state, 3), vec![1850.25; 3]);
    }

    #[test]
    fn test_linear_series_continues_trend() {
        let series: Vec<f64> = (0..10).map(|t| 10.0 + 2.0 * t as f64).collect();
        let state = Arima110.fit(&series).unwrap();
        assert_eq!(state.intercept, 2.0);
        assert_eq!(Arima110.forecast(&state, 3), vec![30.0, 32.0, 34.0]);
    }

    #[test]
    fn test_recovers_ar_coefficient() {
        let series = simulate(0.5, 0.3, 3000, 7);
        let state = Arima110.fit(&series).unwrap();
        assert!((state.ar_coefficient - 0.5).abs() < 0.1, "phi = {}", state.ar_coefficient);
        assert!((state.intercept - 0.3).abs() < 0.2, "c = {}", state.intercept);
        assert!(state.sigma2 > 0.5 && state.sigma2 < 1.5);
        assert_eq!(state.observations, 3000);
    }

    #[test]
    fn test_explosive_coefficient_is_clamped() {
        // Differences 1, -2, 4, -8, 16 fit phi = -2 exactly
        let state = Arima110.fit(&[0.0, 1.0, -1.0, 3.0, -5.0, 11.0]).unwrap();
        assert_eq!(state.ar_coefficient, -MAX_AR_COEFFICIENT);
    }

    #[test]
    fn test_forecast_prefix_is_stable() {
        let state = Arima110.fit(&simulate(0.4, 0.0, 50, 11)).unwrap();
        let long = Arima110.forecast(&state, 10);
        assert_eq!(long.len(), 10);
        for k in 1..10 {
            assert_eq!(Arima110.forecast(&state, k), long[..k].to_vec());
        }
    }
}
