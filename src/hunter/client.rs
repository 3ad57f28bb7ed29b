use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use tracing::debug;

use super::retry::FetchFailure;
use super::route::ProxyRoute;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
];

/// Pick a realistic desktop browser user agent
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// One marketplace request over a given route
#[async_trait]
pub trait MarketTransport: Send + Sync {
    /// Return the response body of a 2xx answer
    async fn get(&self, url: &str, route: &ProxyRoute) -> Result<String, FetchFailure>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    timeout: Duration,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(timeout: Duration, token: Option<String>) -> Self {
        Self { timeout, token }
    }

    fn client(&self, route: &ProxyRoute) -> Result<reqwest::Client, FetchFailure> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);

        match route.to_reqwest() {
            Ok(Some(proxy)) => builder = builder.proxy(proxy),
            Ok(None) => {}
            Err(e) => return Err(FetchFailure::Network(e.to_string())),
        }

        builder
            .build()
            .map_err(|e| FetchFailure::Network(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else if let Some(status) = err.status() {
        FetchFailure::Status(status.as_u16())
    } else {
        FetchFailure::Network(err.to_string())
    }
}

#[async_trait]
impl MarketTransport for HttpTransport {
    async fn get(&self, url: &str, route: &ProxyRoute) -> Result<String, FetchFailure> {
        let client = self.client(route)?;

        let mut request = client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(ACCEPT, "application/json");
        if let Some(ref token) = self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        debug!(url = %url, route = %route, status = status.as_u16(), "Marketplace response");

        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        response.text().await.map_err(classify)
    }
}
