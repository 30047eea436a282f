use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One polled observation: a price per instrument at a single timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetalsQuote {
    pub timestamp: DateTime<Utc>,
    pub prices: BTreeMap<String, Decimal>,
}

impl MetalsQuote {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            prices: BTreeMap::new(),
        }
    }

    pub fn with_price(mut self, instrument: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(instrument.into(), price);
        self
    }

    pub fn price(&self, instrument: &str) -> Option<Decimal> {
        self.prices.get(instrument).copied()
    }
}
