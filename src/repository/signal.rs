use crate::error::{HunterError, Result};
use crate::models::{ExecutionReport, MarketSignal, SignalStatus};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

const SIGNAL_COLUMNS: &str = "id, source, target_name, brand_category, condition_score, \
     listed_price, estimated_value, profit_margin, url, status, timestamp, \
     transaction_id, executed_at";

/// Repository for admitted market signals
#[derive(Clone)]
pub struct SignalRepository {
    pool: PgPool,
}

impl SignalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert signals in one statement; existing rows are refreshed only while PENDING
    pub async fn insert_many(&self, signals: &[MarketSignal]) -> Result<u64> {
        let signals = super::latest_by_key(signals, |s| s.id.clone());
        if signals.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO market_signals (id, source, target_name, brand_category, condition_score, \
             listed_price, estimated_value, profit_margin, url, status, timestamp) ",
        );

        builder.push_values(signals, |mut b, signal| {
            b.push_bind(&signal.id)
                .push_bind(&signal.source)
                .push_bind(&signal.target_name)
                .push_bind(&signal.brand_category)
                .push_bind(signal.condition_score)
                .push_bind(signal.listed_price)
                .push_bind(signal.estimated_value)
                .push_bind(signal.profit_margin)
                .push_bind(&signal.url)
                .push_bind(signal.status.as_str())
                .push_bind(signal.timestamp);
        });

        builder.push(
            r#"
            ON CONFLICT (id) DO UPDATE SET
                target_name = EXCLUDED.target_name,
                brand_category = EXCLUDED.brand_category,
                condition_score = EXCLUDED.condition_score,
                listed_price = EXCLUDED.listed_price,
                estimated_value = EXCLUDED.estimated_value,
                profit_margin = EXCLUDED.profit_margin,
                url = EXCLUDED.url,
                timestamp = EXCLUDED.timestamp
            WHERE market_signals.status = 'PENDING'
            "#,
        );

        let result = builder.build().execute(&self.pool).await?;

        debug!(rows = result.rows_affected(), "Stored market signals");
        Ok(result.rows_affected())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<MarketSignal>> {
        let signal = sqlx::query_as::<_, MarketSignal>(&format!(
            "SELECT {} FROM market_signals WHERE id = $1",
            SIGNAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(signal)
    }

    /// Newest signals first
    pub async fn list(&self, status: Option<SignalStatus>, limit: i64) -> Result<Vec<MarketSignal>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM market_signals WHERE 1=1",
            SIGNAL_COLUMNS
        ));

        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        builder
            .push(" ORDER BY timestamp DESC, id ASC LIMIT ")
            .push_bind(limit);

        let signals: Vec<MarketSignal> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(signals)
    }

    /// Close a PENDING signal with the collaborator's outcome
    pub async fn record_execution(
        &self,
        id: &str,
        report: &ExecutionReport,
    ) -> Result<MarketSignal> {
        let status = super::execution_status(report);

        let updated = sqlx::query_as::<_, MarketSignal>(&format!(
            r#"
            UPDATE market_signals
            SET status = $2,
                transaction_id = $3,
                executed_price = $4,
                executed_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {}
            "#,
            SIGNAL_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(&report.transaction_id)
        .bind(report.price)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(signal) => {
                info!(id = %signal.id, status = %signal.status, "Recorded signal execution");
                Ok(signal)
            }
            None => match self.get_by_id(id).await? {
                Some(existing) => Err(HunterError::Conflict(format!(
                    "Signal {} is already {}",
                    id, existing.status
                ))),
                None => Err(HunterError::NotFound(format!("Signal {} not found", id))),
            },
        }
    }
}
