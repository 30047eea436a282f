use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{
    Arima110, FitSummary, Forecaster, HistoryProvider, ModelError, ModelObserver, ModelStore,
    SeriesGenerator, TickerModel, TracingObserver,
};

/// Decimal places kept in served forecasts
pub const FORECAST_DECIMALS: i32 = 2;

/// Result of training one instrument
#[derive(Debug)]
pub struct TrainOutcome {
    pub instrument: String,
    pub result: Result<FitSummary, ModelError>,
}

/// Per-instrument outcomes of one `train` call, in configured order
#[derive(Debug, Default)]
pub struct TrainReport {
    pub outcomes: Vec<TrainOutcome>,
}

impl TrainReport {
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.instrument.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<(&str, &ModelError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.instrument.as_str(), e)))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Fail with `TrainingFailed` if any instrument failed
    pub fn into_result(self) -> Result<Vec<FitSummary>, ModelError> {
        let mut fitted = Vec::new();
        let mut failed = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(summary) => fitted.push(summary),
                Err(_) => failed.push(outcome.instrument),
            }
        }
        if failed.is_empty() {
            Ok(fitted)
        } else {
            Err(ModelError::TrainingFailed { failed })
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SaveReport {
    pub saved: Vec<String>,
    /// Instruments without a fitted model
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub missing: Vec<String>,
    /// Blobs that exist but could not be restored
    pub rejected: Vec<(String, String)>,
}

/// Owns one `TickerModel` per configured instrument and coordinates
/// training, persistence and prediction across them.
pub struct ModelManager<F: Forecaster = Arima110> {
    instruments: Vec<String>,
    x_size: usize,
    y_size: usize,
    forecaster: F,
    history: Arc<dyn HistoryProvider>,
    generator: SeriesGenerator,
    observer: Arc<dyn ModelObserver>,
    models: HashMap<String, TickerModel<F>>,
}

impl ModelManager<Arima110> {
    pub fn new(
        instruments: Vec<String>,
        x_size: usize,
        y_size: usize,
        history: Arc<dyn HistoryProvider>,
    ) -> Self {
        Self::with_forecaster(Arima110, instruments, x_size, y_size, history)
    }
}

impl<F: Forecaster> ModelManager<F> {
    pub fn with_forecaster(
        forecaster: F,
        instruments: Vec<String>,
        x_size: usize,
        y_size: usize,
        history: Arc<dyn HistoryProvider>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            if !unique.contains(&instrument) {
                unique.push(instrument);
            }
        }

        Self {
            instruments: unique,
            x_size,
            y_size,
            forecaster,
            history,
            generator: SeriesGenerator::from_entropy(),
            observer: Arc::new(TracingObserver),
            models: HashMap::new(),
        }
    }

    pub fn with_generator(mut self, generator: SeriesGenerator) -> Self {
        self.generator = generator;
        self
    }

    #[allow(dead_code)]
    pub fn with_observer(mut self, observer: Arc<dyn ModelObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    pub fn is_fitted(&self, instrument: &str) -> bool {
        self.models.contains_key(instrument)
    }

    /// Instruments with a fitted model, in configured order
    pub fn fitted_instruments(&self) -> Vec<String> {
        self.instruments
            .iter()
            .filter(|i| self.models.contains_key(*i))
            .cloned()
            .collect()
    }

    pub fn model_summaries(&self) -> Vec<FitSummary> {
        self.instruments
            .iter()
            .filter_map(|i| self.models.get(i))
            .filter_map(|m| m.summary().ok())
            .collect()
    }

    /// Fit every instrument, either on synthetic data or on provider history.
    ///
    /// Instruments are trained independently: a failure is recorded in the
    /// report and leaves that instrument's previous model (if any) in place.
    pub async fn train(&mut self, use_generated_data: bool) -> TrainReport {
        let mut inputs: Vec<(String, Result<Vec<f64>, ModelError>)> =
            Vec::with_capacity(self.instruments.len());

        if use_generated_data {
            let mut data = self
                .generator
                .generate(&self.instruments, self.x_size, self.y_size);
            for instrument in &self.instruments {
                let series = data.train.remove(instrument).unwrap_or_default();
                inputs.push((instrument.clone(), Ok(series)));
            }
        } else {
            for instrument in &self.instruments {
                let series = self
                    .history
                    .get_history(instrument)
                    .await
                    .map_err(ModelError::from);
                inputs.push((instrument.clone(), series));
            }
        }

        let mut report = TrainReport::default();
        for (instrument, series) in inputs {
            let result = series.and_then(|series| {
                let mut model = TickerModel::new(instrument.clone(), self.forecaster.clone());
                let summary = model.fit(&series)?;
                self.models.insert(instrument.clone(), model);
                Ok(summary)
            });

            match &result {
                Ok(summary) => self.observer.model_fitted(summary),
                Err(e) => self.observer.fit_failed(&instrument, e),
            }
            report.outcomes.push(TrainOutcome { instrument, result });
        }

        report
    }

    /// Persist every fitted model; unfitted instruments are skipped.
    ///
    /// Only an unusable store fails the call; a single failed write is
    /// recorded in the report.
    pub async fn save(&self, store: &dyn ModelStore) -> Result<SaveReport, ModelError> {
        store.ensure_writable().await?;

        let mut report = SaveReport::default();
        for instrument in &self.instruments {
            let Some(model) = self.models.get(instrument) else {
                self.observer.save_skipped(instrument);
                report.skipped.push(instrument.clone());
                continue;
            };

            let result = match model.serialize() {
                Ok(bytes) => store.put(instrument, &bytes).await.map_err(ModelError::from),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    self.observer.model_saved(instrument, &store.location(instrument));
                    report.saved.push(instrument.clone());
                }
                Err(e) => {
                    self.observer.save_failed(instrument, &e);
                    report.failed.push((instrument.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Restore stored models for the configured instruments.
    ///
    /// Missing or unreadable blobs are skipped so a partial warm start is
    /// possible; instruments without a stored model keep their current state.
    pub async fn load(&mut self, store: &dyn ModelStore) -> Result<LoadReport, ModelError> {
        store.ensure_readable().await?;

        let mut report = LoadReport::default();
        for instrument in &self.instruments {
            let location = store.location(instrument);
            let restored = match store.get(instrument).await {
                Ok(None) => {
                    self.observer.load_skipped(instrument, &format!("not found at {}", location));
                    report.missing.push(instrument.clone());
                    continue;
                }
                Ok(Some(bytes)) => TickerModel::<F>::deserialize(&bytes),
                Err(e) => Err(ModelError::from(e)),
            };

            let restored = restored.and_then(|model| {
                if model.instrument() == instrument {
                    Ok(model)
                } else {
                    Err(ModelError::InstrumentMismatch {
                        expected: instrument.clone(),
                        found: model.instrument().to_string(),
                    })
                }
            });

            match restored {
                Ok(model) => {
                    self.models.insert(instrument.clone(), model);
                    self.observer.model_loaded(instrument, &location);
                    report.loaded.push(instrument.clone());
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.observer.load_skipped(instrument, &reason);
                    report.rejected.push((instrument.clone(), reason));
                }
            }
        }

        Ok(report)
    }

    /// Forecast `horizon` steps for the requested instruments (default: all),
    /// rounded to `FORECAST_DECIMALS`. Any instrument without a model fails
    /// the whole request.
    pub fn predict(
        &self,
        horizon: usize,
        instruments: Option<&[String]>,
    ) -> Result<BTreeMap<String, Vec<f64>>, ModelError> {
        if horizon == 0 {
            return Err(ModelError::InvalidHorizon(0));
        }

        let requested = instruments.unwrap_or(self.instruments.as_slice());
        let mut predictions = BTreeMap::new();
        for instrument in requested {
            let model = self
                .models
                .get(instrument)
                .ok_or_else(|| ModelError::UnknownModel {
                    instrument: instrument.clone(),
                })?;
            let values = model
                .predict(horizon)?
                .into_iter()
                .map(|v| round_to(v, FORECAST_DECIMALS))
                .collect();
            predictions.insert(instrument.clone(), values);
        }

        Ok(predictions)
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{FileModelStore, HistoryError, MockHistoryProvider, StoreError};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn tickers() -> Vec<String> {
        vec!["xauusd".to_string(), "xagusd".to_string()]
    }

    fn no_history() -> Arc<dyn HistoryProvider> {
        Arc::new(MockHistoryProvider::new())
    }

    fn generated_manager(seed: u64) -> ModelManager {
        ModelManager::new(tickers(), 12, 1, no_history()).with_generator(SeriesGenerator::seeded(seed))
    }

    fn long_series() -> Vec<f64> {
        (0..30).map(|t| 1900.0 + (t as f64 * 0.7).sin() * 5.0 + t as f64).collect()
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ModelObserver for RecordingObserver {
        fn fit_failed(&self, instrument: &str, _error: &ModelError) {
            self.events.lock().unwrap().push(format!("fit_failed:{}", instrument));
        }

        fn save_skipped(&self, instrument: &str) {
            self.events.lock().unwrap().push(format!("save_skipped:{}", instrument));
        }

        fn model_saved(&self, instrument: &str, _location: &str) {
            self.events.lock().unwrap().push(format!("saved:{}", instrument));
        }
    }

    #[tokio::test]
    async fn test_train_on_generated_data_and_predict() {
        let mut manager = generated_manager(42);
        assert!(manager.fitted_instruments().is_empty());

        let report = manager.train(true).await;
        assert!(report.is_complete());
        assert_eq!(report.succeeded(), vec!["xauusd", "xagusd"]);
        assert_eq!(manager.fitted_instruments(), tickers());

        let predictions = manager.predict(3, None).unwrap();
        assert_eq!(predictions.len(), 2);
        for ticker in tickers() {
            let values = &predictions[&ticker];
            assert_eq!(values.len(), 3);
            for v in values {
                assert!(v.is_finite());
                assert_eq!(round_to(*v, 2), *v);
            }
        }
    }

    #[tokio::test]
    async fn test_save_then_load_into_fresh_manager() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("models");
        let store = FileModelStore::new(&dir);

        let mut original = generated_manager(7);
        original.train(true).await;
        let saved = original.save(&store).await.unwrap();
        assert_eq!(saved.saved, tickers());
        assert!(saved.skipped.is_empty());

        let mut fresh = ModelManager::new(tickers(), 12, 1, no_history());
        let loaded = fresh.load(&store).await.unwrap();
        assert_eq!(loaded.loaded, tickers());
        assert!(loaded.missing.is_empty());

        assert_eq!(fresh.predict(1, None).unwrap(), original.predict(1, None).unwrap());
        assert_eq!(fresh.predict(6, None).unwrap(), original.predict(6, None).unwrap());
    }

    #[tokio::test]
    async fn test_load_twice_is_idempotent() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("models");
        let store = FileModelStore::new(&dir);
        let mut original = generated_manager(8);
        original.train(true).await;
        original.save(&store).await.unwrap();

        let mut manager = ModelManager::new(tickers(), 12, 1, no_history());
        manager.load(&store).await.unwrap();
        let first = manager.predict(4, None).unwrap();
        manager.load(&store).await.unwrap();
        assert_eq!(manager.predict(4, None).unwrap(), first);
    }

    #[tokio::test]
    async fn test_partial_training_and_subset_prediction() {
        let mut history = MockHistoryProvider::new();
        history.expect_get_history().times(2).returning(|instrument| match instrument {
            "xauusd" => Ok(long_series()),
            other => Err(HistoryError::Unavailable { instrument: other.to_string() }),
        });
        let observer = Arc::new(RecordingObserver::default());
        let mut manager = ModelManager::new(tickers(), 12, 1, Arc::new(history))
            .with_observer(observer.clone());

        let report = manager.train(false).await;
        assert_eq!(report.succeeded(), vec!["xauusd"]);
        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "xagusd");
        assert!(matches!(failed[0].1, ModelError::History(HistoryError::Unavailable { .. })));
        assert!(matches!(
            report.into_result(),
            Err(ModelError::TrainingFailed { failed }) if failed == vec!["xagusd".to_string()]
        ));
        assert_eq!(observer.events(), vec!["fit_failed:xagusd".to_string()]);

        let subset = vec!["xauusd".to_string()];
        let predictions = manager.predict(2, Some(subset.as_slice())).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions["xauusd"].len(), 2);

        let err = manager.predict(2, None).unwrap_err();
        assert!(matches!(err, ModelError::UnknownModel { ref instrument } if instrument == "xagusd"));

        let missing = vec!["xagusd".to_string()];
        let err = manager.predict(2, Some(missing.as_slice())).unwrap_err();
        assert_eq!(err.instrument(), Some("xagusd"));
    }

    #[tokio::test]
    async fn test_failed_refit_keeps_previous_model() {
        let mut history = MockHistoryProvider::new();
        history.expect_get_history().returning(|instrument| match instrument {
            "xauusd" => Ok(vec![1900.0, 1901.0]),
            _ => Ok(long_series()),
        });
        let mut manager = ModelManager::new(tickers(), 12, 1, Arc::new(history))
            .with_generator(SeriesGenerator::seeded(3));

        manager.train(true).await;
        let before = manager.predict(3, None).unwrap();

        let report = manager.train(false).await;
        assert_eq!(report.succeeded(), vec!["xagusd"]);
        assert!(matches!(report.failed()[0].1, ModelError::Fit { .. }));

        let after = manager.predict(3, None).unwrap();
        assert_eq!(after["xauusd"], before["xauusd"]);
        assert_ne!(after["xagusd"], before["xagusd"]);
    }

    #[tokio::test]
    async fn test_failed_first_fit_leaves_instrument_absent() {
        let mut history = MockHistoryProvider::new();
        history
            .expect_get_history()
            .returning(|_| Ok(vec![1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0]));
        let mut manager = ModelManager::new(tickers(), 12, 1, Arc::new(history));

        let report = manager.train(false).await;
        assert!(report.succeeded().is_empty());
        assert!(manager.fitted_instruments().is_empty());
        assert!(!manager.is_fitted("xauusd"));
    }

    #[tokio::test]
    async fn test_save_skips_unfitted_instruments() {
        let mut history = MockHistoryProvider::new();
        history.expect_get_history().returning(|instrument| match instrument {
            "xauusd" => Ok(long_series()),
            other => Err(HistoryError::Unavailable { instrument: other.to_string() }),
        });
        let observer = Arc::new(RecordingObserver::default());
        let mut manager = ModelManager::new(tickers(), 12, 1, Arc::new(history))
            .with_observer(observer.clone());
        manager.train(false).await;

        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("models");
        let store = FileModelStore::new(&dir);
        let report = manager.save(&store).await.unwrap();
        assert_eq!(report.saved, vec!["xauusd".to_string()]);
        assert_eq!(report.skipped, vec!["xagusd".to_string()]);
        assert!(report.failed.is_empty());
        assert!(observer.events().contains(&"save_skipped:xagusd".to_string()));
        assert!(observer.events().contains(&"saved:xauusd".to_string()));

        // Partial warm start: the missing instrument is not an error
        let mut fresh = ModelManager::new(tickers(), 12, 1, no_history());
        let loaded = fresh.load(&store).await.unwrap();
        assert_eq!(loaded.loaded, vec!["xauusd".to_string()]);
        assert_eq!(loaded.missing, vec!["xagusd".to_string()]);
        assert!(matches!(fresh.predict(1, None), Err(ModelError::UnknownModel { .. })));
    }

    #[tokio::test]
    async fn test_load_rejects_blob_for_other_instrument() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("models");
        let store = FileModelStore::new(&dir);
        let mut original = generated_manager(9);
        original.train(true).await;
        original.save(&store).await.unwrap();
        std::fs::copy(dir.join("xauusd.json"), dir.join("xagusd.json")).unwrap();

        let mut fresh = ModelManager::new(tickers(), 12, 1, no_history());
        let report = fresh.load(&store).await.unwrap();
        assert_eq!(report.loaded, vec!["xauusd".to_string()]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "xagusd");
        assert!(!fresh.is_fitted("xagusd"));
    }

    #[tokio::test]
    async fn test_unusable_store_is_hard_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("models");
        std::fs::write(&path, b"occupied").unwrap();
        let store = FileModelStore::new(&path);

        let mut manager = generated_manager(10);
        manager.train(true).await;
        assert!(matches!(manager.save(&store).await, Err(ModelError::Store(_))));
        assert!(matches!(manager.load(&store).await, Err(ModelError::Store(_))));
    }

    #[tokio::test]
    async fn test_failed_write_is_reported_per_instrument() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("models");
        // A directory squatting on the blob path makes that one write fail
        std::fs::create_dir_all(dir.join("xauusd.json")).unwrap();
        let store = FileModelStore::new(&dir);

        let mut manager = generated_manager(12);
        manager.train(true).await;
        let report = manager.save(&store).await.unwrap();
        assert_eq!(report.saved, vec!["xagusd".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "xauusd");
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_rejected_on_load() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("models");
        let store = FileModelStore::new(&dir);
        let mut original = generated_manager(13);
        original.train(true).await;
        original.save(&store).await.unwrap();
        std::fs::write(dir.join("xagusd.json"), b"{corrupt").unwrap();

        let mut fresh = ModelManager::new(tickers(), 12, 1, no_history());
        let report = fresh.load(&store).await.unwrap();
        assert_eq!(report.loaded, vec!["xauusd".to_string()]);
        assert!(report.missing.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "xagusd");
        assert!(fresh.is_fitted("xauusd"));
        assert!(!fresh.is_fitted("xagusd"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_save_into_unwritable_directory_fails() {
        let mut manager = generated_manager(14);
        manager.train(true).await;
        let result = manager.save(&FileModelStore::new("/proc")).await;
        assert!(matches!(result, Err(ModelError::Store(StoreError::Io { .. }))));
    }

    #[tokio::test]
    async fn test_instrument_name_cannot_escape_models_dir() {
        let tmp = tempdir().unwrap();
        let store = FileModelStore::new(tmp.path().join("models"));
        let mut manager = ModelManager::new(vec!["../escaped".to_string()], 12, 1, no_history())
            .with_generator(SeriesGenerator::seeded(15));
        manager.train(true).await;

        let report = manager.save(&store).await.unwrap();
        assert!(report.saved.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "../escaped");
        assert!(!tmp.path().join("escaped.json").exists());
    }

    #[tokio::test]
    async fn test_prediction_argument_checks() {
        let mut manager = generated_manager(11);
        manager.train(true).await;

        assert!(matches!(manager.predict(0, None), Err(ModelError::InvalidHorizon(0))));

        let unknown = vec!["btcusd".to_string()];
        assert!(matches!(
            manager.predict(1, Some(unknown.as_slice())),
            Err(ModelError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_duplicate_instruments_collapse() {
        let manager = ModelManager::new(
            vec!["xauusd".to_string(), "xagusd".to_string(), "xauusd".to_string()],
            12,
            1,
            no_history(),
        );
        assert_eq!(manager.instruments(), tickers().as_slice());
        assert_eq!((manager.x_size(), manager.y_size()), (12, 1));
    }

    #[test]
    fn test_round_to_two_decimals() {
        assert_eq!(round_to(1912.3456, 2), 1912.35);
        assert_eq!(round_to(-0.004, 2), -0.0);
        assert_eq!(round_to(24.1, 2), 24.1);
    }
}
