use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::error::{HunterError, Result};

/// Proxy node status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    #[default]
    Untested,
    Active,
    Dead,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Untested => "UNTESTED",
            NodeStatus::Active => "ACTIVE",
            NodeStatus::Dead => "DEAD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "UNTESTED" => Some(NodeStatus::Untested),
            "ACTIVE" => Some(NodeStatus::Active),
            "DEAD" => Some(NodeStatus::Dead),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate relay in the proxy fleet.
///
/// Build nodes through [`ProxyNode::untested`], [`ProxyNode::active`] or
/// [`ProxyNode::dead`]; they keep `latency_ms` present exactly when the node
/// is ACTIVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyNode {
    /// `ip:port`
    pub id: String,
    pub ip: String,
    pub port: i32,
    pub protocol: String,
    pub status: NodeStatus,
    pub latency_ms: Option<i32>,
    pub fail_count: i32,
    pub last_tested: DateTime<Utc>,
}

impl ProxyNode {
    /// A freshly harvested, never probed node
    pub fn untested(endpoint: &str) -> Result<Self> {
        let (ip, port) = split_endpoint(endpoint)?;
        Ok(Self {
            id: format!("{}:{}", ip, port),
            ip,
            port,
            protocol: "http".to_string(),
            status: NodeStatus::Untested,
            latency_ms: None,
            fail_count: 0,
            last_tested: Utc::now(),
        })
    }

    /// A node that answered the probe within the timeout
    pub fn active(endpoint: &str, latency_ms: i32) -> Result<Self> {
        let mut node = Self::untested(endpoint)?;
        node.status = NodeStatus::Active;
        node.latency_ms = Some(latency_ms.max(0));
        Ok(node)
    }

    /// A node whose probe failed for any reason
    pub fn dead(endpoint: &str) -> Result<Self> {
        let mut node = Self::untested(endpoint)?;
        node.status = NodeStatus::Dead;
        node.fail_count = 1;
        Ok(node)
    }

    /// `http://ip:port`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.ip, self.port)
    }

    /// ACTIVE ⇔ latency present.
    pub fn is_consistent(&self) -> bool {
        (self.status == NodeStatus::Active) == self.latency_ms.is_some()
    }
}

impl<'r> FromRow<'r, PgRow> for ProxyNode {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = NodeStatus::from_str(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: format!("unknown node status '{}'", status).into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            ip: row.try_get("ip")?,
            port: row.try_get("port")?,
            protocol: row.try_get("protocol")?,
            status,
            latency_ms: row.try_get("latency_ms")?,
            fail_count: row.try_get("fail_count")?,
            last_tested: row.try_get("last_tested")?,
        })
    }
}

fn split_endpoint(endpoint: &str) -> Result<(String, i32)> {
    let (ip, port) = endpoint
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| HunterError::InvalidEndpoint(endpoint.to_string()))?;

    let port: u16 = port
        .parse()
        .map_err(|_| HunterError::InvalidEndpoint(endpoint.to_string()))?;
    if ip.is_empty() || port == 0 {
        return Err(HunterError::InvalidEndpoint(endpoint.to_string()));
    }

    Ok((ip.to_string(), i32::from(port)))
}

/// Proxy list query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProxyListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}
