use crate::error::Result;
use crate::models::{NodeStatus, ProxyNode};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

const NODE_COLUMNS: &str =
    "id, ip, port, protocol, status, latency_ms, fail_count, last_tested";

/// Repository for the proxy fleet table
#[derive(Clone)]
pub struct ProxyRepository {
    pool: PgPool,
}

impl ProxyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert nodes by id in a single statement.
    ///
    /// ACTIVE rows reset `fail_count`; DEAD rows add one to the stored count.
    pub async fn upsert(&self, nodes: &[ProxyNode]) -> Result<u64> {
        let nodes = super::latest_by_key(nodes, |n| n.id.clone());
        if nodes.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO proxy_nodes (id, ip, port, protocol, status, latency_ms, fail_count, last_tested) ",
        );

        builder.push_values(nodes, |mut b, node| {
            b.push_bind(&node.id)
                .push_bind(&node.ip)
                .push_bind(node.port)
                .push_bind(&node.protocol)
                .push_bind(node.status.as_str())
                .push_bind(node.latency_ms)
                .push_bind(node.fail_count)
                .push_bind(node.last_tested);
        });

        builder.push(
            r#"
            ON CONFLICT (id) DO UPDATE SET
                ip = EXCLUDED.ip,
                port = EXCLUDED.port,
                protocol = EXCLUDED.protocol,
                status = EXCLUDED.status,
                latency_ms = EXCLUDED.latency_ms,
                fail_count = CASE
                    WHEN EXCLUDED.status = 'ACTIVE' THEN 0
                    WHEN EXCLUDED.status = 'DEAD' THEN proxy_nodes.fail_count + 1
                    ELSE proxy_nodes.fail_count
                END,
                last_tested = EXCLUDED.last_tested
            "#,
        );

        let result = builder.build().execute(&self.pool).await?;

        debug!(rows = result.rows_affected(), "Upserted proxy nodes");
        Ok(result.rows_affected())
    }

    /// ACTIVE node with the lowest latency
    pub async fn fastest_active(&self) -> Result<Option<ProxyNode>> {
        let node = sqlx::query_as::<_, ProxyNode>(&format!(
            r#"
            SELECT {}
            FROM proxy_nodes
            WHERE status = 'ACTIVE' AND latency_ms IS NOT NULL
            ORDER BY latency_ms ASC, id ASC
            LIMIT 1
            "#,
            NODE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(node)
    }

    /// List nodes, ACTIVE ones first by latency
    pub async fn list(&self, status: Option<NodeStatus>, limit: i64) -> Result<Vec<ProxyNode>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM proxy_nodes WHERE 1=1",
            NODE_COLUMNS
        ));

        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        builder
            .push(" ORDER BY (status = 'ACTIVE') DESC, latency_ms ASC NULLS LAST, id ASC")
            .push(" LIMIT ")
            .push_bind(limit);

        let nodes: Vec<ProxyNode> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(nodes)
    }
}
