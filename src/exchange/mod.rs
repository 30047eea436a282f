pub mod metals_api;

pub use metals_api::*;

use async_trait::async_trait;

use crate::types::MetalsQuote;

/// Provider of the latest polled quote
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_quote(&self) -> anyhow::Result<MetalsQuote>;
}
