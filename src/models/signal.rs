use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// Signal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    #[default]
    Pending,
    Executed,
    Rejected,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "PENDING",
            SignalStatus::Executed => "EXECUTED",
            SignalStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(SignalStatus::Pending),
            "EXECUTED" => Some(SignalStatus::Executed),
            "REJECTED" => Some(SignalStatus::Rejected),
            _ => None,
        }
    }

    /// Only pending signals may still change
    pub fn is_open(&self) -> bool {
        matches!(self, SignalStatus::Pending)
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An admitted arbitrage opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    /// `<SOURCE>-<external item id>`
    pub id: String,
    pub source: String,
    pub target_name: String,
    pub brand_category: String,
    pub condition_score: i16,
    pub listed_price: Decimal,
    pub estimated_value: Decimal,
    pub profit_margin: Decimal,
    pub url: String,
    pub status: SignalStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl MarketSignal {
    pub fn signal_id(source: &str, external_id: &str) -> String {
        format!("{}-{}", source, external_id)
    }
}

impl<'r> FromRow<'r, PgRow> for MarketSignal {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = SignalStatus::from_str(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: format!("unknown signal status '{}'", status).into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            target_name: row.try_get("target_name")?,
            brand_category: row.try_get("brand_category")?,
            condition_score: row.try_get("condition_score")?,
            listed_price: row.try_get("listed_price")?,
            estimated_value: row.try_get("estimated_value")?,
            profit_margin: row.try_get("profit_margin")?,
            url: row.try_get("url")?,
            status,
            timestamp: row.try_get("timestamp")?,
            transaction_id: row.try_get("transaction_id")?,
            executed_at: row.try_get("executed_at")?,
        })
    }
}

/// Outcome reported by the execution collaborator
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub price: Decimal,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}

/// Signal list query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SignalListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_status_parsing_and_openness() {
        assert_eq!(SignalStatus::from_str("pending"), Some(SignalStatus::Pending));
        assert_eq!(SignalStatus::from_str("EXECUTED"), Some(SignalStatus::Executed));
        assert_eq!(SignalStatus::from_str("rejected"), Some(SignalStatus::Rejected));
        assert_eq!(SignalStatus::from_str("done"), None);

        assert!(SignalStatus::Pending.is_open());
        assert!(!SignalStatus::Executed.is_open());
        assert!(!SignalStatus::Rejected.is_open());
    }

    #[test]
    fn test_signal_id_is_source_prefixed() {
        assert_eq!(MarketSignal::signal_id("EBAY", "v1|1234|0"), "EBAY-v1|1234|0");
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&SignalStatus::Executed).unwrap();
        assert_eq!(json, "\"EXECUTED\"");
    }
}
