use crate::error::Result;
use crate::models::{LogLevel, LogRecord, NewLogRecord};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Repository for the append-only system log
#[derive(Clone)]
pub struct LogRepository {
    pool: PgPool,
}

impl LogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a log record
    pub async fn create(&self, record: &NewLogRecord) -> Result<LogRecord> {
        let log = sqlx::query_as::<_, LogRecord>(
            r#"
            INSERT INTO system_logs (level, message)
            VALUES ($1, $2)
            RETURNING id, level, message, timestamp
            "#,
        )
        .bind(record.level.as_str())
        .bind(&record.message)
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    /// Newest records first
    pub async fn list(&self, level: Option<LogLevel>, limit: i64) -> Result<Vec<LogRecord>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, level, message, timestamp FROM system_logs WHERE 1=1",
        );

        if let Some(level) = level {
            builder.push(" AND level = ").push_bind(level.as_str());
        }

        builder
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(limit);

        let logs: Vec<LogRecord> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(logs)
    }

    /// Delete records older than `days` days
    pub async fn delete_older_than(&self, days: i32) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM system_logs WHERE timestamp < NOW() - make_interval(days => $1)",
        )
        .bind(days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
