use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// A marketplace search endpoint swept on every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSource {
    /// Upper-case prefix used in signal ids, e.g. `EBAY`
    pub name: String,
    pub url: String,
}

impl MarketSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Search response body: `{"itemSummaries": [...]}`
#[derive(Debug, Clone, Default)]
pub struct SearchPayload {
    pub item_summaries: Vec<Listing>,
    /// Entries that could not be read as a listing
    pub skipped: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchPayload {
    #[serde(default)]
    item_summaries: Option<Vec<serde_json::Value>>,
}

impl SearchPayload {
    /// Parse a search body, keeping every readable entry.
    ///
    /// Only a body that is not a search object at all is an error; a single
    /// malformed entry (e.g. an auction without a fixed price) is skipped.
    pub fn parse(body: &str) -> Result<Self> {
        let raw: RawSearchPayload = serde_json::from_str(body)?;
        let mut payload = SearchPayload::default();

        for entry in raw.item_summaries.unwrap_or_default() {
            match serde_json::from_value::<Listing>(entry) {
                Ok(listing) => payload.item_summaries.push(listing),
                Err(e) => {
                    debug!("Skipping unreadable listing: {}", e);
                    payload.skipped += 1;
                }
            }
        }

        Ok(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub item_id: String,
    pub title: String,
    pub price: Price,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub item_web_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Price {
    pub value: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_search_payload() {
        let body = r#"{
            "total": 2,
            "itemSummaries": [
                {
                    "itemId": "v1|111|0",
                    "title": "Omega Speedmaster",
                    "price": {"value": "950.00", "currency": "USD"},
                    "condition": "Used",
                    "itemWebUrl": "https://market.example/itm/111"
                },
                {
                    "itemId": "v1|222|0",
                    "title": "Seiko 5",
                    "price": {"value": 45.5}
                }
            ]
        }"#;

        let payload = SearchPayload::parse(body).unwrap();
        assert_eq!(payload.item_summaries.len(), 2);
        assert_eq!(payload.item_summaries[0].price.value, dec!(950.00));
        assert_eq!(payload.item_summaries[0].condition.as_deref(), Some("Used"));
        assert_eq!(payload.item_summaries[1].price.value, dec!(45.5));
        assert!(payload.item_summaries[1].item_web_url.is_none());
    }

    #[test]
    fn test_empty_result_has_no_items() {
        let payload = SearchPayload::parse(r#"{"total": 0}"#).unwrap();
        assert!(payload.item_summaries.is_empty());
    }

    #[test]
    fn test_unreadable_entries_are_skipped() {
        let body = r#"{"itemSummaries": [
            {"itemId": "a", "title": "Acme camera", "price": {"value": "50"}},
            {"itemId": "b", "title": "Acme auction lot"},
            {"itemId": "c", "title": "Acme lens", "price": {"value": "oops"}}
        ]}"#;

        let payload = SearchPayload::parse(body).unwrap();
        assert_eq!(payload.item_summaries.len(), 1);
        assert_eq!(payload.item_summaries[0].item_id, "a");
        assert_eq!(payload.skipped, 2);

        let payload = SearchPayload::parse(r#"{"itemSummaries": null}"#).unwrap();
        assert!(payload.item_summaries.is_empty());
    }

    #[test]
    fn test_non_json_is_rejected() {
        assert!(SearchPayload::parse("<html>Access denied</html>").is_err());
    }
}
