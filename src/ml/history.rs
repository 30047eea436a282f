use async_trait::async_trait;

use super::HistoryError;

/// Source of observed price history for training.
///
/// Implementations return the series in chronological order, oldest
/// observation first. A reversed series fits without error but forecasts
/// nonsense, so ordering is the provider's responsibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn get_history(&self, instrument: &str) -> Result<Vec<f64>, HistoryError>;
}
