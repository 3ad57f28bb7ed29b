use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::bypass::BypassDriver;
use super::client::MarketTransport;
use super::retry::{next_action, FetchAction, FetchFailure};
use super::route::ProxyRoute;
use crate::config::HunterConfig;
use crate::error::Result;
use crate::fleet::FleetManager;
use crate::models::{
    Listing, MarketSignal, MarketSource, NewLogRecord, SearchPayload, SignalStatus,
    ValuationModel,
};
use crate::repository::{record_log, SharedStore, SignalStore};

/// Result of one sweep as returned by the HTTP trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub sweep_id: Uuid,
    pub sources: usize,
    pub items_seen: usize,
    pub signals: usize,
    pub proxy: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SweepReport {
    pub summary: SweepSummary,
    pub signals: Vec<MarketSignal>,
}

/// Market sweep engine
pub struct Hunter {
    store: SharedStore,
    fleet: Arc<FleetManager>,
    transport: Arc<dyn MarketTransport>,
    bypass: Arc<dyn BypassDriver>,
    valuation: Arc<ValuationModel>,
    config: HunterConfig,
}

impl Hunter {
    pub fn new(
        store: SharedStore,
        fleet: Arc<FleetManager>,
        transport: Arc<dyn MarketTransport>,
        bypass: Arc<dyn BypassDriver>,
        valuation: Arc<ValuationModel>,
        config: HunterConfig,
    ) -> Self {
        Self {
            store,
            fleet,
            transport,
            bypass,
            valuation,
            config,
        }
    }

    /// Configured upstream first, then the fastest fleet node, then direct
    pub async fn select_proxy(&self) -> ProxyRoute {
        if let Some(ref upstream) = self.config.upstream_proxy {
            return upstream.clone();
        }

        let route = self
            .fleet
            .select_optimal()
            .await
            .and_then(|node| ProxyRoute::from_node(&node).ok());

        match route {
            Some(route) => route,
            None => {
                warn!("No active proxy available, sweeping without a proxy");
                record_log(
                    &*self.store,
                    NewLogRecord::warn("No active proxy available; using a direct connection"),
                )
                .await;
                ProxyRoute::NoProxy
            }
        }
    }

    /// GET the target with retry and backoff.
    ///
    /// A blocking status hands over to the browser bypass at once. Exhausted
    /// retries yield `None`, never an error.
    pub async fn fetch(&self, target: &str, route: &ProxyRoute) -> Option<SearchPayload> {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            let failure = match self.transport.get(target, route).await {
                Ok(body) => match SearchPayload::parse(&body) {
                    Ok(payload) => return Some(payload),
                    Err(e) => FetchFailure::Decode(e.to_string()),
                },
                Err(failure) => failure,
            };

            match next_action(attempt, max_attempts, &failure) {
                FetchAction::Escalate => {
                    warn!(url = %target, attempt, "Blocked ({}), escalating to browser", failure);
                    record_log(
                        &*self.store,
                        NewLogRecord::warn(format!(
                            "Blocked by {} ({}); escalating to browser bypass",
                            target, failure
                        )),
                    )
                    .await;
                    return self.bypass(target, route).await;
                }
                FetchAction::Retry(delay) => {
                    debug!(url = %target, attempt, ?delay, "Fetch failed ({}), backing off", failure);
                    tokio::time::sleep(delay).await;
                }
                FetchAction::GiveUp => {
                    warn!(url = %target, attempt, "Giving up ({})", failure);
                    record_log(
                        &*self.store,
                        NewLogRecord::warn(format!(
                            "Giving up on {} after attempt {}: {}",
                            target, attempt, failure
                        )),
                    )
                    .await;
                    return None;
                }
            }
        }

        warn!(url = %target, max_attempts, "Retries exhausted");
        record_log(
            &*self.store,
            NewLogRecord::warn(format!(
                "Retries exhausted for {} after {} attempts",
                target, max_attempts
            )),
        )
        .await;
        None
    }

    /// Render the target in a headless browser and parse the document text
    pub async fn bypass(&self, target: &str, route: &ProxyRoute) -> Option<SearchPayload> {
        let text = match self.bypass.capture(target, route).await {
            Ok(text) => text,
            Err(e) => {
                error!(url = %target, "Browser bypass failed: {}", e);
                record_log(
                    &*self.store,
                    NewLogRecord::error(format!("Browser bypass failed for {}: {}", target, e)),
                )
                .await;
                return None;
            }
        };

        match SearchPayload::parse(text.trim()) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(url = %target, "Bypass document is not a search payload: {}", e);
                record_log(
                    &*self.store,
                    NewLogRecord::warn(format!(
                        "Bypass capture of {} held no listings: {}",
                        target, e
                    )),
                )
                .await;
                None
            }
        }
    }

    /// Turn a listing into a PENDING signal when it clears the admission rule
    pub fn evaluate_listing(&self, source: &MarketSource, item: &Listing) -> Option<MarketSignal> {
        let appraisal = self
            .valuation
            .appraise(&item.title, item.condition.as_deref())?;

        if !ValuationModel::admits(appraisal.estimated_value, item.price.value) {
            return None;
        }
        let profit_margin = appraisal.estimated_value.checked_sub(item.price.value)?;

        Some(MarketSignal {
            id: MarketSignal::signal_id(&source.name, &item.item_id),
            source: source.name.clone(),
            target_name: item.title.clone(),
            brand_category: appraisal.brand,
            condition_score: appraisal.condition_score,
            listed_price: item.price.value,
            estimated_value: appraisal.estimated_value,
            profit_margin,
            url: item
                .item_web_url
                .clone()
                .unwrap_or_else(|| source.url.clone()),
            status: SignalStatus::Pending,
            timestamp: Utc::now(),
            transaction_id: None,
            executed_at: None,
        })
    }

    /// One sweep over every configured source; failures yield an empty list
    pub async fn run_sweep(&self) -> Vec<MarketSignal> {
        self.run_sweep_report()
            .await
            .map(|report| report.signals)
            .unwrap_or_default()
    }

    /// Like [`Hunter::run_sweep`], with the counts for the HTTP trigger.
    ///
    /// A failed sweep is logged CRITICAL and the error handed back.
    pub async fn run_sweep_report(&self) -> Result<SweepReport> {
        let sweep_id = Uuid::new_v4();
        let started = Instant::now();
        let span = info_span!("sweep", %sweep_id);

        async {
            let result = self.sweep(sweep_id, started).await;
            if let Err(ref e) = result {
                error!("Sweep failed: {}", e);
                record_log(
                    &*self.store,
                    NewLogRecord::critical(format!("Sweep {} failed: {}", sweep_id, e)),
                )
                .await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn sweep(&self, sweep_id: Uuid, started: Instant) -> Result<SweepReport> {
        let route = self.select_proxy().await;
        info!(route = %route, sources = self.config.sources.len(), "Sweep started");

        let route_ref = &route;
        let fetches = self
            .config
            .sources
            .iter()
            .map(|source| async move { (source, self.fetch(&source.url, route_ref).await) });

        let mut items_seen = 0;
        let mut signals = Vec::new();
        for (source, payload) in join_all(fetches).await {
            let Some(payload) = payload else {
                continue;
            };

            items_seen += payload.item_summaries.len();
            signals.extend(
                payload
                    .item_summaries
                    .iter()
                    .filter_map(|item| self.evaluate_listing(source, item)),
            );
        }

        if !signals.is_empty() {
            self.store.insert_signals(&signals).await?;
        }

        let summary = SweepSummary {
            sweep_id,
            sources: self.config.sources.len(),
            items_seen,
            signals: signals.len(),
            proxy: route.to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            items_seen = summary.items_seen,
            signals = summary.signals,
            elapsed_ms = summary.elapsed_ms,
            "Sweep complete"
        );
        record_log(
            &*self.store,
            NewLogRecord::info(format!(
                "Sweep {}: {} items, {} signals via {}",
                sweep_id, summary.items_seen, summary.signals, summary.proxy
            )),
        )
        .await;

        Ok(SweepReport { summary, signals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;
    use crate::error::HunterError;
    use crate::models::{Brand, BrandTier, LogLevel, ProxyNode};
    use crate::repository::faulty::FaultyStore;
    use crate::repository::{LogStore, MemoryStore, ProxyStore, SignalStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::Instant as TokioInstant;

    /// Replays scripted outcomes and records when each call happened
    struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<String, FetchFailure>>>,
        calls: Mutex<Vec<TokioInstant>>,
        routes: Mutex<Vec<ProxyRoute>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<std::result::Result<String, FetchFailure>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                routes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MarketTransport for ScriptedTransport {
        async fn get(
            &self,
            _url: &str,
            route: &ProxyRoute,
        ) -> std::result::Result<String, FetchFailure> {
            self.calls.lock().push(TokioInstant::now());
            self.routes.lock().push(route.clone());
            self.script
                .lock()
                .pop_front()
                .unwrap_or(Err(FetchFailure::Timeout))
        }
    }

    struct StubBypass {
        body: Option<String>,
        calls: Mutex<Vec<TokioInstant>>,
    }

    impl StubBypass {
        fn new(body: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                body: body.map(str::to_string),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl BypassDriver for StubBypass {
        async fn capture(&self, _url: &str, _route: &ProxyRoute) -> Result<String> {
            self.calls.lock().push(TokioInstant::now());
            self.body
                .clone()
                .ok_or_else(|| HunterError::Browser("launch failed".into()))
        }
    }

    fn hunter_config() -> HunterConfig {
        HunterConfig {
            sources: vec![MarketSource::new("EBAY", "https://market.invalid/search")],
            ..HunterConfig::default()
        }
    }

    fn build(
        store: SharedStore,
        transport: Arc<ScriptedTransport>,
        bypass: Arc<StubBypass>,
        valuation: ValuationModel,
    ) -> Hunter {
        let fleet = FleetManager::new(store.clone(), FleetConfig::default()).unwrap();
        Hunter::new(
            store,
            Arc::new(fleet),
            transport,
            bypass,
            Arc::new(valuation),
            hunter_config(),
        )
    }

    /// One standard-tier brand worth exactly 130 at the default grade
    fn flat_model(value: rust_decimal::Decimal) -> ValuationModel {
        let mut model = ValuationModel::standard();
        model.brands = vec![Brand {
            name: "Acme".to_string(),
            tier: BrandTier::Standard,
        }];
        model.standard_base = value;
        for grade in model.grades.iter_mut() {
            grade.multiplier = dec!(1);
        }
        model
    }

    fn listing(id: &str, title: &str, price: rust_decimal::Decimal) -> Listing {
        Listing {
            item_id: id.to_string(),
            title: title.to_string(),
            price: crate::models::Price {
                value: price,
                currency: Some("USD".to_string()),
            },
            condition: Some("Used".to_string()),
            item_web_url: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_timeouts_back_off_then_return_nothing() {
        let store = Arc::new(MemoryStore::new());
        let transport = ScriptedTransport::new(vec![
            Err(FetchFailure::Timeout),
            Err(FetchFailure::Timeout),
            Err(FetchFailure::Timeout),
        ]);
        let bypass = StubBypass::new(None);
        let hunter = build(store.clone(), transport.clone(), bypass.clone(), flat_model(dec!(130)));

        let started = TokioInstant::now();
        let payload = hunter
            .fetch("https://market.invalid/search", &ProxyRoute::NoProxy)
            .await;

        assert!(payload.is_none());
        let offsets: Vec<Duration> = transport
            .calls
            .lock()
            .iter()
            .map(|t| t.duration_since(started))
            .collect();
        assert_eq!(
            offsets,
            vec![
                Duration::from_millis(0),
                Duration::from_millis(1000),
                Duration::from_millis(3000)
            ]
        );
        assert_eq!(started.elapsed(), Duration::from_millis(7000));
        assert!(bypass.calls.lock().is_empty());

        let warnings = store.list_logs(Some(LogLevel::Warn), 10).await.unwrap();
        assert!(warnings[0].message.contains("Retries exhausted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_escalates_before_any_backoff() {
        let store = Arc::new(MemoryStore::new());
        let transport = ScriptedTransport::new(vec![Err(FetchFailure::Status(403))]);
        let bypass = StubBypass::new(Some(
            r#"{"itemSummaries":[{"itemId":"1","title":"Acme lamp","price":{"value":"10"}}]}"#,
        ));
        let hunter = build(store, transport.clone(), bypass.clone(), flat_model(dec!(130)));

        let started = TokioInstant::now();
        let payload = hunter
            .fetch("https://market.invalid/search", &ProxyRoute::NoProxy)
            .await
            .unwrap();

        assert_eq!(payload.item_summaries.len(), 1);
        assert_eq!(transport.calls.lock().len(), 1);
        let bypass_calls = bypass.calls.lock();
        assert_eq!(bypass_calls.len(), 1);
        assert_eq!(bypass_calls[0].duration_since(started), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_failed_bypass_yields_nothing() {
        let store = Arc::new(MemoryStore::new());
        let transport = ScriptedTransport::new(vec![Err(FetchFailure::Status(503))]);
        let hunter = build(
            store.clone(),
            transport,
            StubBypass::new(None),
            flat_model(dec!(130)),
        );

        let payload = hunter
            .fetch("https://market.invalid/search", &ProxyRoute::NoProxy)
            .await;
        assert!(payload.is_none());

        let errors = store.list_logs(Some(LogLevel::Error), 10).await.unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_html_bypass_document_yields_nothing() {
        let store = Arc::new(MemoryStore::new());
        let transport = ScriptedTransport::new(vec![Err(FetchFailure::Status(403))]);
        let hunter = build(
            store,
            transport,
            StubBypass::new(Some("Access denied")),
            flat_model(dec!(130)),
        );

        let payload = hunter
            .fetch("https://market.invalid/search", &ProxyRoute::NoProxy)
            .await;
        assert!(payload.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_without_price_keeps_its_siblings() {
        let store = Arc::new(MemoryStore::new());
        let body = r#"{"itemSummaries":[
            {"itemId":"a","title":"Acme camera","price":{"value":"50"}},
            {"itemId":"b","title":"Acme auction lot"}
        ]}"#;
        let transport = ScriptedTransport::new(vec![Ok(body.to_string())]);
        let hunter = build(store, transport.clone(), StubBypass::new(None), flat_model(dec!(130)));

        let payload = hunter
            .fetch("https://market.invalid/search", &ProxyRoute::NoProxy)
            .await
            .unwrap();

        assert_eq!(payload.item_summaries.len(), 1);
        assert_eq!(payload.item_summaries[0].item_id, "a");
        assert_eq!(payload.skipped, 1);
        assert_eq!(transport.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_body_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let transport = ScriptedTransport::new(vec![Ok("<html>maintenance</html>".to_string())]);
        let hunter = build(
            store.clone(),
            transport.clone(),
            StubBypass::new(None),
            flat_model(dec!(130)),
        );

        let started = TokioInstant::now();
        let payload = hunter
            .fetch("https://market.invalid/search", &ProxyRoute::NoProxy)
            .await;

        assert!(payload.is_none());
        assert_eq!(transport.calls.lock().len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);

        let warnings = store.list_logs(Some(LogLevel::Warn), 10).await.unwrap();
        assert!(warnings[0].message.starts_with("Giving up"));
    }

    #[test]
    fn test_admission_is_strict() {
        let store = Arc::new(MemoryStore::new());
        let source = MarketSource::new("EBAY", "https://market.invalid/search");

        let admitted = build(
            store.clone(),
            ScriptedTransport::new(vec![]),
            StubBypass::new(None),
            flat_model(dec!(131)),
        );
        let signal = admitted
            .evaluate_listing(&source, &listing("1", "Acme camera", dec!(100)))
            .unwrap();
        assert_eq!(signal.id, "EBAY-1");
        assert_eq!(signal.estimated_value, dec!(131));
        assert_eq!(signal.profit_margin, dec!(31));
        assert_eq!(signal.status, SignalStatus::Pending);
        assert_eq!(signal.url, "https://market.invalid/search");

        let rejected = build(
            store,
            ScriptedTransport::new(vec![]),
            StubBypass::new(None),
            flat_model(dec!(130)),
        );
        assert!(rejected
            .evaluate_listing(&source, &listing("1", "Acme camera", dec!(100)))
            .is_none());
    }

    #[test]
    fn test_extreme_prices_never_panic() {
        let hunter = build(
            Arc::new(MemoryStore::new()),
            ScriptedTransport::new(vec![]),
            StubBypass::new(None),
            flat_model(dec!(131)),
        );
        let source = MarketSource::new("EBAY", "https://market.invalid/search");

        for price in [rust_decimal::Decimal::MAX, rust_decimal::Decimal::MIN] {
            assert!(hunter
                .evaluate_listing(&source, &listing("z", "Acme camera", price))
                .is_none());
        }
    }

    #[test]
    fn test_unknown_brand_is_discarded() {
        let hunter = build(
            Arc::new(MemoryStore::new()),
            ScriptedTransport::new(vec![]),
            StubBypass::new(None),
            ValuationModel::standard(),
        );
        let source = MarketSource::new("EBAY", "https://market.invalid/search");

        assert!(hunter
            .evaluate_listing(&source, &listing("9", "Generic watch", dec!(1)))
            .is_none());
    }

    #[tokio::test]
    async fn test_select_proxy_falls_back_to_direct() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_nodes(&[ProxyNode::dead("10.0.0.1:80").unwrap()])
            .await
            .unwrap();
        let hunter = build(
            store.clone(),
            ScriptedTransport::new(vec![]),
            StubBypass::new(None),
            ValuationModel::standard(),
        );

        assert_eq!(hunter.select_proxy().await, ProxyRoute::NoProxy);

        store
            .upsert_nodes(&[
                ProxyNode::active("10.0.0.2:8080", 50).unwrap(),
                ProxyNode::active("10.0.0.3:8080", 20).unwrap(),
                ProxyNode::active("10.0.0.4:8080", 80).unwrap(),
            ])
            .await
            .unwrap();
        assert_eq!(
            hunter.select_proxy().await,
            ProxyRoute::DirectProxy {
                host: "10.0.0.3".to_string(),
                port: 8080
            }
        );
    }

    #[tokio::test]
    async fn test_run_sweep_persists_admitted_signals() {
        let store = Arc::new(MemoryStore::new());
        let body = r#"{"itemSummaries":[
            {"itemId":"a","title":"Acme camera","price":{"value":"50"},"itemWebUrl":"https://market.invalid/a"},
            {"itemId":"b","title":"Acme camera","price":{"value":"500"}},
            {"itemId":"c","title":"Other camera","price":{"value":"1"}}
        ]}"#;
        let transport = ScriptedTransport::new(vec![Ok(body.to_string())]);
        let hunter = build(
            store.clone(),
            transport,
            StubBypass::new(None),
            flat_model(dec!(130)),
        );

        let report = hunter.run_sweep_report().await.unwrap();
        assert_eq!(report.summary.sources, 1);
        assert_eq!(report.summary.items_seen, 3);
        assert_eq!(report.summary.signals, 1);
        assert_eq!(report.summary.proxy, "direct");
        assert_eq!(report.signals[0].id, "EBAY-a");

        let stored = store.list_signals(None, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, "https://market.invalid/a");
    }

    #[tokio::test]
    async fn test_failed_sweep_is_critical_and_empty() {
        let store = Arc::new(FaultyStore::new().rejecting_signals());
        let body = r#"{"itemSummaries":[{"itemId":"a","title":"Acme camera","price":{"value":"50"}}]}"#;
        let hunter = build(
            store.clone(),
            ScriptedTransport::new(vec![Ok(body.to_string()), Ok(body.to_string())]),
            StubBypass::new(None),
            flat_model(dec!(130)),
        );

        assert!(hunter.run_sweep().await.is_empty());

        let critical = store
            .list_logs(Some(LogLevel::Critical), 10)
            .await
            .unwrap();
        assert_eq!(critical.len(), 1);
        assert!(critical[0].message.starts_with("Sweep"));

        assert!(hunter.run_sweep_report().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweep_with_no_data_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let hunter = build(
            store.clone(),
            ScriptedTransport::new(vec![]),
            StubBypass::new(None),
            flat_model(dec!(130)),
        );

        assert!(hunter.run_sweep().await.is_empty());
        assert!(store.list_signals(None, 10).await.unwrap().is_empty());
    }
}
