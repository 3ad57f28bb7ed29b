use crate::error::Result;
use sqlx::{Executor, PgPool};
use tracing::info;

/// NOTIFY channel written by the change triggers
pub const CHANGE_CHANNEL: &str = "hunter_changes";

/// Run all database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    create_migrations_table(pool).await?;

    for (version, name, sql) in get_migrations() {
        if !is_migration_applied(pool, version).await? {
            info!(version = version, name = name, "Applying migration");

            // Multi-statement scripts need the simple query protocol.
            pool.execute(sql).await?;

            record_migration(pool, version, name).await?;

            info!(version = version, name = name, "Migration applied successfully");
        }
    }

    Ok(())
}

/// Create the migrations tracking table
async fn create_migrations_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Check if a migration has been applied
async fn is_migration_applied(pool: &PgPool, version: i32) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM schema_migrations WHERE version = $1",
    )
    .bind(version)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Record a migration as applied
async fn record_migration(pool: &PgPool, version: i32, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
        .bind(version)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Get all migrations in order
fn get_migrations() -> Vec<(i32, &'static str, &'static str)> {
    vec![
        (1, "proxy_nodes", MIGRATION_001_PROXY_NODES),
        (2, "market_signals", MIGRATION_002_MARKET_SIGNALS),
        (3, "system_logs", MIGRATION_003_SYSTEM_LOGS),
        (4, "change_notifications", MIGRATION_004_CHANGE_NOTIFICATIONS),
    ]
}

// Migration 1: proxy fleet
const MIGRATION_001_PROXY_NODES: &str = r#"
CREATE TABLE IF NOT EXISTS proxy_nodes (
    id VARCHAR(64) PRIMARY KEY,
    ip VARCHAR(45) NOT NULL,
    port INTEGER NOT NULL CHECK (port BETWEEN 1 AND 65535),
    protocol VARCHAR(10) NOT NULL DEFAULT 'http',
    status VARCHAR(16) NOT NULL DEFAULT 'UNTESTED'
        CHECK (status IN ('UNTESTED', 'ACTIVE', 'DEAD')),
    latency_ms INTEGER,
    fail_count INTEGER NOT NULL DEFAULT 0 CHECK (fail_count >= 0),
    last_tested TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT proxy_nodes_latency_matches_status
        CHECK ((status = 'ACTIVE') = (latency_ms IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_proxy_nodes_status_latency ON proxy_nodes(status, latency_ms);

CREATE OR REPLACE FUNCTION update_updated_at_column()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = NOW();
    RETURN NEW;
END;
$$ language 'plpgsql';

DROP TRIGGER IF EXISTS update_proxy_nodes_updated_at ON proxy_nodes;
CREATE TRIGGER update_proxy_nodes_updated_at
    BEFORE UPDATE ON proxy_nodes
    FOR EACH ROW
    EXECUTE FUNCTION update_updated_at_column();
"#;

// Migration 2: signals
const MIGRATION_002_MARKET_SIGNALS: &str = r#"
CREATE TABLE IF NOT EXISTS market_signals (
    id VARCHAR(255) PRIMARY KEY,
    source VARCHAR(64) NOT NULL,
    target_name TEXT NOT NULL,
    brand_category VARCHAR(128) NOT NULL,
    condition_score SMALLINT NOT NULL CHECK (condition_score BETWEEN 1 AND 5),
    listed_price NUMERIC(14, 2) NOT NULL,
    estimated_value NUMERIC(14, 2) NOT NULL,
    profit_margin NUMERIC(14, 2) NOT NULL,
    url TEXT NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'PENDING'
        CHECK (status IN ('PENDING', 'EXECUTED', 'REJECTED')),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    transaction_id VARCHAR(255),
    executed_price NUMERIC(14, 2),
    executed_at TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_market_signals_status ON market_signals(status);
CREATE INDEX IF NOT EXISTS idx_market_signals_timestamp ON market_signals(timestamp DESC);
"#;

// Migration 3: append-only system log
const MIGRATION_003_SYSTEM_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS system_logs (
    id BIGSERIAL PRIMARY KEY,
    level VARCHAR(16) NOT NULL CHECK (level IN ('INFO', 'WARN', 'ERROR', 'CRITICAL')),
    message TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_system_logs_timestamp ON system_logs(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_system_logs_level ON system_logs(level);
"#;

// Migration 4: publish inserts/updates for dashboard subscribers
const MIGRATION_004_CHANGE_NOTIFICATIONS: &str = r#"
CREATE OR REPLACE FUNCTION notify_hunter_change()
RETURNS TRIGGER AS $$
BEGIN
    PERFORM pg_notify(
        'hunter_changes',
        json_build_object('table', TG_TABLE_NAME, 'op', TG_OP, 'id', NEW.id)::text
    );
    RETURN NEW;
END;
$$ language 'plpgsql';

DROP TRIGGER IF EXISTS market_signals_notify ON market_signals;
CREATE TRIGGER market_signals_notify
    AFTER INSERT OR UPDATE ON market_signals
    FOR EACH ROW
    EXECUTE FUNCTION notify_hunter_change();

DROP TRIGGER IF EXISTS proxy_nodes_notify ON proxy_nodes;
CREATE TRIGGER proxy_nodes_notify
    AFTER INSERT OR UPDATE ON proxy_nodes
    FOR EACH ROW
    EXECUTE FUNCTION notify_hunter_change();
"#;
