use tracing::{info, warn};

use super::{FitSummary, ModelError};

/// Receives model lifecycle events from a `ModelManager`.
///
/// All methods default to no-ops so observers only implement what they need.
pub trait ModelObserver: Send + Sync {
    fn model_fitted(&self, _summary: &FitSummary) {}

    fn fit_failed(&self, _instrument: &str, _error: &ModelError) {}

    fn model_saved(&self, _instrument: &str, _location: &str) {}

    fn save_skipped(&self, _instrument: &str) {}

    fn save_failed(&self, _instrument: &str, _error: &ModelError) {}

    fn model_loaded(&self, _instrument: &str, _location: &str) {}

    fn load_skipped(&self, _instrument: &str, _reason: &str) {}
}

/// Forwards lifecycle events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ModelObserver for TracingObserver {
    fn model_fitted(&self, summary: &FitSummary) {
        info!("{} model fitted on {} observations", summary.instrument, summary.observations);
    }

    fn fit_failed(&self, instrument: &str, error: &ModelError) {
        warn!("Failed to train {} model: {}", instrument, error);
    }

    fn model_saved(&self, instrument: &str, location: &str) {
        info!("{} model saved to {}", instrument, location);
    }

    fn save_skipped(&self, instrument: &str) {
        info!("{} has no fitted model, skipping save", instrument);
    }

    fn save_failed(&self, instrument: &str, error: &ModelError) {
        warn!("Failed to save {} model: {}", instrument, error);
    }

    fn model_loaded(&self, instrument: &str, location: &str) {
        info!("{} model loaded from {}", instrument, location);
    }

    fn load_skipped(&self, instrument: &str, reason: &str) {
        info!("Model for {} not loaded: {}", instrument, reason);
    }
}
