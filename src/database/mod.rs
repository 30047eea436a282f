use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::ml::{HistoryError, HistoryProvider};
use crate::types::MetalsQuote;

pub struct Database {
    pool: SqlitePool,
    /// Only quotes newer than this feed training; `None` means all of them
    history_window: Option<Duration>,
}

impl Database {
    /// Initialize database with schema
    pub async fn new(db_url: &str) -> Result<Self> {
        info!("Initializing SQLite database at: {}", db_url);

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool, history_window: None };
        db.create_schema().await?;

        info!("Database initialized successfully");
        Ok(db)
    }

    /// Restrict training history to the last `hours` hours (0 keeps everything)
    pub fn with_history_window_hours(mut self, hours: u32) -> Self {
        self.history_window = if hours == 0 {
            None
        } else {
            Some(Duration::hours(i64::from(hours)))
        };
        self
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quotes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                instrument TEXT NOT NULL,
                price TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_quotes_instrument_timestamp ON quotes(instrument, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert one row per instrument of the quote
    pub async fn insert_quote(&self, quote: &MetalsQuote) -> Result<()> {
        let timestamp = format_timestamp(quote.timestamp);
        let mut tx = self.pool.begin().await?;

        for (instrument, price) in &quote.prices {
            sqlx::query(
                r#"
                INSERT INTO quotes (timestamp, instrument, price)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&timestamp)
            .bind(instrument)
            .bind(price.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Stored quote at {} for {} instruments", timestamp, quote.prices.len());
        Ok(())
    }

    pub async fn quote_count(&self, instrument: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM quotes WHERE instrument = ?")
            .bind(instrument)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    /// Prices for an instrument since `since`, oldest first
    pub async fn get_prices_since(
        &self,
        instrument: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Decimal>> {
        let rows = match since {
            Some(since) => {
                sqlx::query(
                    r#"
                    SELECT price FROM quotes
                    WHERE instrument = ? AND timestamp >= ?
                    ORDER BY timestamp ASC, id ASC
                    "#,
                )
                .bind(instrument)
                .bind(format_timestamp(since))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT price FROM quotes
                    WHERE instrument = ?
                    ORDER BY timestamp ASC, id ASC
                    "#,
                )
                .bind(instrument)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut prices = Vec::with_capacity(rows.len());
        for row in rows {
            prices.push(Decimal::from_str(row.get("price"))?);
        }
        Ok(prices)
    }
}

#[async_trait]
impl HistoryProvider for Database {
    async fn get_history(&self, instrument: &str) -> Result<Vec<f64>, HistoryError> {
        let since = self.history_window.map(|window| Utc::now() - window);
        let prices = self
            .get_prices_since(instrument, since)
            .await
            .map_err(|e| HistoryError::Backend(e.to_string()))?;

        if prices.is_empty() {
            return Err(HistoryError::Unavailable {
                instrument: instrument.to_string(),
            });
        }

        prices
            .iter()
            .map(|p| {
                p.to_f64()
                    .ok_or_else(|| HistoryError::Backend(format!("price {} out of range", p)))
            })
            .collect()
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
