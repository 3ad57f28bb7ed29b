use serde::{Deserialize, Serialize};

/// Tables that publish change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    MarketSignals,
    ProxyNodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
}

/// One insert/update event pushed to dashboard subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub id: String,
}

impl ChangeEvent {
    pub fn new(table: ChangeTable, op: ChangeOp, id: impl Into<String>) -> Self {
        Self {
            table,
            op,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_trigger_payload() {
        let payload = r#"{"table":"proxy_nodes","op":"UPDATE","id":"1.2.3.4:80"}"#;
        let event: ChangeEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(
            event,
            ChangeEvent::new(ChangeTable::ProxyNodes, ChangeOp::Update, "1.2.3.4:80")
        );
    }
}
