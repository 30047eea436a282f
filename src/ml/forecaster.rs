use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use super::FitError;

/// A univariate forecasting algorithm.
///
/// Implementations are stateless estimators: `fit` turns a chronological
/// series into a fitted state, and `forecast` projects that state forward.
/// The fitted state is what gets persisted, so it must serialize losslessly.
pub trait Forecaster: Clone + Default + Send + Sync + 'static {
    type State: Serialize + DeserializeOwned + Clone + Debug + Send + Sync;

    /// Identifier written into persisted models
    const NAME: &'static str;

    /// Fewest observations `fit` accepts
    fn min_series_len(&self) -> usize;

    fn fit(&self, series: &[f64]) -> Result<Self::State, FitError>;

    /// Point forecasts for steps `1..=horizon` after the last fitted observation
    fn forecast(&self, state: &Self::State, horizon: usize) -> Vec<f64>;
}

/// Reject series the estimator cannot use
pub fn validate_series(series: &[f64], min_len: usize) -> Result<(), FitError> {
    if series.len() < min_len {
        return Err(FitError::TooShort { len: series.len(), min: min_len });
    }
    if let Some(index) = series.iter().position(|v| !v.is_finite()) {
        return Err(FitError::NonFinite { index });
    }
    Ok(())
}
