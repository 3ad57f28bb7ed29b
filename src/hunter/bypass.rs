//! Headless browser fallback for blocked targets.
//!
//! Every capture runs in its own browser process. [`BrowserSession`] owns
//! that process and is torn down on every exit path.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use futures::StreamExt;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::client::random_user_agent;
use super::route::ProxyRoute;
use crate::error::{HunterError, Result};

const VIEWPORT: (u32, u32) = (1366, 768);
const POINTER_MOVES: usize = 4;

/// Renders a target in a real browser and returns the document text
#[async_trait]
pub trait BypassDriver: Send + Sync {
    async fn capture(&self, url: &str, route: &ProxyRoute) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct BrowserBypassConfig {
    pub navigation_timeout: Duration,
    pub settle: Duration,
    pub chrome_executable: Option<String>,
}

/// chromiumoxide-backed bypass
pub struct BrowserBypass {
    config: BrowserBypassConfig,
}

impl BrowserBypass {
    pub fn new(config: BrowserBypassConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self, route: &ProxyRoute, user_agent: &str) -> anyhow::Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT.0, VIEWPORT.1)
            .request_timeout(self.config.navigation_timeout)
            .arg(format!("--user-agent={}", user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run");

        if let Some(proxy) = route.proxy_url() {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        if let Some(ref path) = self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(|e| anyhow!(e))
    }

    async fn run_capture(&self, url: &str, route: &ProxyRoute) -> anyhow::Result<String> {
        let user_agent = random_user_agent();
        let config = self.browser_config(route, user_agent)?;
        let pointer = pointer_path(POINTER_MOVES);

        let session = BrowserSession::launch(config).await?;
        let captured = session
            .capture(url, route, pointer, self.config.navigation_timeout, self.config.settle)
            .await;
        session.close().await;

        captured
    }
}

#[async_trait]
impl BypassDriver for BrowserBypass {
    #[instrument(skip(self, route), fields(route = %route))]
    async fn capture(&self, url: &str, route: &ProxyRoute) -> Result<String> {
        self.run_capture(url, route)
            .await
            .map_err(|e| HunterError::Browser(format!("{:#}", e)))
    }
}

/// One browser process plus its CDP event loop
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig) -> anyhow::Result<Self> {
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    async fn capture(
        &self,
        url: &str,
        route: &ProxyRoute,
        pointer: Vec<(f64, f64)>,
        navigation_timeout: Duration,
        settle: Duration,
    ) -> anyhow::Result<String> {
        let page = self.browser.new_page("about:blank").await?;

        if let Some((username, password)) = route.credentials() {
            let token = STANDARD.encode(format!("{}:{}", username, password));
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::json!({ "Proxy-Authorization": format!("Basic {}", token) }),
            )))
            .await?;
        }

        tokio::time::timeout(navigation_timeout, navigate(&page, url))
            .await
            .map_err(|_| anyhow!("navigation timed out after {:?}", navigation_timeout))??;

        for (x, y) in pointer {
            page.move_mouse(Point::new(x, y)).await?;
        }

        tokio::time::sleep(settle).await;

        let text = page
            .evaluate("document.body ? document.body.innerText : ''")
            .await?
            .into_value::<String>()?;

        debug!(bytes = text.len(), "Captured document");
        Ok(text)
    }

    /// Close the browser and reap the process
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Browser did not exit cleanly: {}", e);
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Navigate and wait until the page's network goes idle
async fn navigate(page: &Page, url: &str) -> anyhow::Result<()> {
    page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
    let mut lifecycle = page.event_listener::<EventLifecycleEvent>().await?;

    page.goto(url).await?;

    let mut idle = IdleWatch::default();
    while let Some(event) = lifecycle.next().await {
        if idle.observe(&event.name) {
            return Ok(());
        }
    }

    Err(anyhow!("page closed before the network went idle"))
}

/// Tracks lifecycle events of the navigation started after `about:blank`.
///
/// Events left over from the blank page arrive before the new document's
/// `init` and are ignored.
#[derive(Debug, Default)]
struct IdleWatch {
    started: bool,
}

impl IdleWatch {
    fn observe(&mut self, name: &str) -> bool {
        match name {
            "init" => {
                self.started = true;
                false
            }
            "networkIdle" => self.started,
            _ => false,
        }
    }
}

/// Random pointer positions inside the viewport
fn pointer_path(moves: usize) -> Vec<(f64, f64)> {
    let mut rng = rand::thread_rng();
    (0..moves)
        .map(|_| {
            (
                rng.gen_range(40.0..f64::from(VIEWPORT.0) - 40.0),
                rng.gen_range(40.0..f64::from(VIEWPORT.1) - 40.0),
            )
        })
        .collect()
}
