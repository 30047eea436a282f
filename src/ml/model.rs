use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Arima110, Forecaster, ModelError};

/// Fitted state plus the metadata needed to restore it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelEnvelope<S> {
    instrument: String,
    model_type: String,
    fitted_at: DateTime<Utc>,
    observations: usize,
    state: S,
}

/// Summary of a fitted model, for listings and reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub instrument: String,
    pub model_type: &'static str,
    pub observations: usize,
    pub fitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Fitted<S> {
    state: S,
    observations: usize,
    fitted_at: DateTime<Utc>,
}

/// One forecasting model bound to one instrument
#[derive(Debug, Clone)]
pub struct TickerModel<F: Forecaster = Arima110> {
    instrument: String,
    forecaster: F,
    fitted: Option<Fitted<F::State>>,
}

impl<F: Forecaster> TickerModel<F> {
    pub fn new(instrument: impl Into<String>, forecaster: F) -> Self {
        Self {
            instrument: instrument.into(),
            forecaster,
            fitted: None,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit on a chronological series. On error the previous state is kept.
    pub fn fit(&mut self, series: &[f64]) -> Result<FitSummary, ModelError> {
        let state = self.forecaster.fit(series).map_err(|source| ModelError::Fit {
            instrument: self.instrument.clone(),
            source,
        })?;

        self.fitted = Some(Fitted {
            state,
            observations: series.len(),
            fitted_at: Utc::now(),
        });
        debug!("{} fitted on {} observations", self.instrument, series.len());

        self.summary()
    }

    /// Raw point forecasts for steps `1..=horizon`
    pub fn predict(&self, horizon: usize) -> Result<Vec<f64>, ModelError> {
        if horizon == 0 {
            return Err(ModelError::InvalidHorizon(0));
        }
        let fitted = self.fitted_state()?;
        Ok(self.forecaster.forecast(&fitted.state, horizon))
    }

    pub fn summary(&self) -> Result<FitSummary, ModelError> {
        let fitted = self.fitted_state()?;
        Ok(FitSummary {
            instrument: self.instrument.clone(),
            model_type: F::NAME,
            observations: fitted.observations,
            fitted_at: fitted.fitted_at,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ModelError> {
        let fitted = self.fitted_state()?;
        let envelope = ModelEnvelope {
            instrument: self.instrument.clone(),
            model_type: F::NAME.to_string(),
            fitted_at: fitted.fitted_at,
            observations: fitted.observations,
            state: &fitted.state,
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ModelError> {
        let envelope: ModelEnvelope<F::State> = serde_json::from_slice(bytes)?;
        if envelope.model_type != F::NAME {
            return Err(ModelError::ModelTypeMismatch {
                expected: F::NAME.to_string(),
                found: envelope.model_type,
            });
        }

        Ok(Self {
            instrument: envelope.instrument,
            forecaster: F::default(),
            fitted: Some(Fitted {
                state: envelope.state,
                observations: envelope.observations,
                fitted_at: envelope.fitted_at,
            }),
        })
    }

    fn fitted_state(&self) -> Result<&Fitted<F::State>, ModelError> {
        self.fitted.as_ref().ok_or_else(|| ModelError::NotFitted {
            instrument: self.instrument.clone(),
        })
    }
}
