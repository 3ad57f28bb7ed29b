//! Proxy fleet manager
//!
//! Harvests candidate endpoints from public lists, probes them in bounded
//! batches and keeps the `proxy_nodes` table current.

pub mod harvest;

pub use harvest::{is_valid_endpoint, parse_proxy_list};

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::FleetConfig;
use crate::error::Result;
use crate::models::{NewLogRecord, NodeStatus, ProxyNode};
use crate::repository::{record_log, ProxyStore, SharedStore};

/// Counts reported after one harvest → probe → persist cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetSyncSummary {
    pub harvested: usize,
    pub tested: usize,
    pub active: usize,
    pub dead: usize,
    pub persisted: u64,
    /// Upsert batches the store rejected
    pub failed_batches: usize,
    pub elapsed_ms: u64,
}

impl FleetSyncSummary {
    /// Nodes were probed but the store took none of them
    pub fn store_failed(&self) -> bool {
        self.failed_batches > 0 && self.persisted == 0
    }
}

/// Maintains the proxy fleet
pub struct FleetManager {
    store: SharedStore,
    config: FleetConfig,
    client: reqwest::Client,
}

impl FleetManager {
    pub fn new(store: SharedStore, config: FleetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.harvest_timeout)
            .build()?;

        Ok(Self {
            store,
            config,
            client,
        })
    }

    /// Fetch every configured list concurrently and merge the valid endpoints.
    ///
    /// A failing source is logged and skipped.
    #[instrument(skip(self))]
    pub async fn harvest(&self) -> BTreeSet<String> {
        let fetches = self
            .config
            .sources
            .iter()
            .map(|source| async move { (source, self.fetch_list(source).await) });

        let mut endpoints = BTreeSet::new();
        for (source, result) in join_all(fetches).await {
            match result {
                Ok(found) => {
                    debug!(source = %source, count = found.len(), "Harvested proxy list");
                    endpoints.extend(found);
                }
                Err(e) => {
                    warn!(source = %source, "Proxy source unavailable: {}", e);
                    record_log(
                        &*self.store,
                        NewLogRecord::warn(format!("Proxy source {} unavailable: {}", source, e)),
                    )
                    .await;
                }
            }
        }

        info!(count = endpoints.len(), "Harvest complete");
        endpoints
    }

    async fn fetch_list(&self, source: &str) -> Result<BTreeSet<String>> {
        let body = self
            .client
            .get(source)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_proxy_list(&body))
    }

    /// One GET through the candidate to the reference endpoint.
    ///
    /// Any failure yields a DEAD node; only a malformed endpoint is an error.
    pub async fn probe(&self, endpoint: &str, timeout: Duration) -> Result<ProxyNode> {
        let candidate = ProxyNode::untested(endpoint)?;

        match self.probe_latency(&candidate, timeout).await {
            Ok(latency_ms) => ProxyNode::active(endpoint, latency_ms),
            Err(reason) => {
                debug!(endpoint = %endpoint, "Probe failed: {}", reason);
                ProxyNode::dead(endpoint)
            }
        }
    }

    async fn probe_latency(&self, node: &ProxyNode, timeout: Duration) -> Result<i32> {
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(node.url())?)
            .timeout(timeout)
            .build()?;

        let started = Instant::now();
        let response = client.get(&self.config.probe_url).send().await?;
        let latency = started.elapsed();

        response.error_for_status()?;
        Ok(i32::try_from(latency.as_millis()).unwrap_or(i32::MAX))
    }

    /// Probe endpoints in chunks of `width`; a chunk starts after the previous one finishes
    #[instrument(skip(self, endpoints), fields(total = endpoints.len()))]
    pub async fn validate_batch(&self, endpoints: &[String], width: usize) -> Vec<ProxyNode> {
        let timeout = self.config.probe_timeout;
        let mut nodes = Vec::with_capacity(endpoints.len());

        for (index, chunk) in endpoints.chunks(width.max(1)).enumerate() {
            let probed = join_all(chunk.iter().map(|e| self.probe(e, timeout))).await;

            for (endpoint, result) in chunk.iter().zip(probed) {
                match result {
                    Ok(node) => nodes.push(node),
                    Err(e) => warn!(endpoint = %endpoint, "Skipping endpoint: {}", e),
                }
            }

            debug!(chunk = index, probed = nodes.len(), "Probe chunk complete");
        }

        nodes
    }

    /// Upsert nodes in batches; a failed batch is logged and skipped
    pub async fn persist(&self, nodes: &[ProxyNode]) -> u64 {
        self.persist_batches(nodes).await.0
    }

    /// Rows written and batches rejected
    async fn persist_batches(&self, nodes: &[ProxyNode]) -> (u64, usize) {
        let mut written = 0;
        let mut failed = 0;

        for batch in nodes.chunks(self.config.persist_batch.max(1)) {
            match self.store.upsert_nodes(batch).await {
                Ok(rows) => written += rows,
                Err(e) => {
                    failed += 1;
                    error!(size = batch.len(), "Failed to persist proxy batch: {}", e);
                    record_log(
                        &*self.store,
                        NewLogRecord::error(format!(
                            "Failed to persist {} proxy nodes: {}",
                            batch.len(),
                            e
                        )),
                    )
                    .await;
                }
            }
        }

        (written, failed)
    }

    /// Fastest ACTIVE node, if any
    pub async fn select_optimal(&self) -> Option<ProxyNode> {
        match self.store.fastest_active().await {
            Ok(node) => node,
            Err(e) => {
                warn!("Proxy selection failed: {}", e);
                None
            }
        }
    }

    /// Harvest, probe and persist the whole fleet
    #[instrument(skip(self))]
    pub async fn sync(&self) -> FleetSyncSummary {
        let started = Instant::now();

        let endpoints: Vec<String> = self.harvest().await.into_iter().collect();
        let nodes = self
            .validate_batch(&endpoints, self.config.batch_width)
            .await;
        let (persisted, failed_batches) = self.persist_batches(&nodes).await;

        let active = nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Active)
            .count();

        let summary = FleetSyncSummary {
            harvested: endpoints.len(),
            tested: nodes.len(),
            active,
            dead: nodes.len() - active,
            persisted,
            failed_batches,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            harvested = summary.harvested,
            active = summary.active,
            dead = summary.dead,
            persisted = summary.persisted,
            "Fleet sync complete"
        );
        record_log(
            &*self.store,
            NewLogRecord::info(format!(
                "Fleet sync: {} harvested, {} active, {} dead, {} persisted in {} ms",
                summary.harvested,
                summary.active,
                summary.dead,
                summary.persisted,
                summary.elapsed_ms
            )),
        )
        .await;

        summary
    }
}
