pub mod arima;
pub mod error;
pub mod forecaster;
pub mod generator;
pub mod history;
pub mod manager;
pub mod model;
pub mod observer;
pub mod persistence;

pub use arima::Arima110;
pub use error::{FitError, HistoryError, ModelError, StoreError};
pub use forecaster::Forecaster;
pub use generator::SeriesGenerator;
pub use history::HistoryProvider;
#[cfg(test)]
pub use history::MockHistoryProvider;
pub use manager::ModelManager;
pub use model::{FitSummary, TickerModel};
pub use observer::{ModelObserver, TracingObserver};
pub use persistence::{create_backup, remove_old_backups, FileModelStore, ModelStore};
