use crate::error::{HunterError, Result};
use crate::hunter::ProxyRoute;
use crate::models::MarketSource;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Public plaintext proxy lists harvested when `FLEET_SOURCES` is unset.
pub const DEFAULT_FLEET_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
    "https://raw.githubusercontent.com/monosans/proxy-list/main/proxies/http.txt",
    "https://api.proxyscrape.com/v2/?request=displayproxies&protocol=http&timeout=10000&country=all",
];

/// Low-load endpoint every candidate proxy is probed against.
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/generate_204";

const DEFAULT_HUNTER_SOURCES: &str =
    "EBAY=https://api.ebay.com/buy/browse/v1/item_summary/search?q=vintage&limit=50";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Proxy fleet configuration
    pub fleet: FleetConfig,
    /// Market hunter configuration
    pub hunter: HunterConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 8001)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = localhost only)
    pub cors_origins: Vec<String>,
    /// Shared bearer secret for the trigger endpoints
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection URL; absent only in memory mode
    pub url: Option<String>,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections in pool
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Plaintext `ip:port` list sources
    pub sources: Vec<String>,
    /// Reference endpoint for liveness probes
    pub probe_url: String,
    /// Per-probe timeout
    pub probe_timeout: Duration,
    /// Per-source harvest timeout
    pub harvest_timeout: Duration,
    /// Number of probes in flight per group
    pub batch_width: usize,
    /// Rows per upsert statement
    pub persist_batch: usize,
    /// Scheduled sync interval (None = disabled)
    pub sync_interval: Option<Duration>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_FLEET_SOURCES.iter().map(|s| s.to_string()).collect(),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: Duration::from_millis(5_000),
            harvest_timeout: Duration::from_millis(10_000),
            batch_width: 50,
            persist_batch: 1_000,
            sync_interval: Some(Duration::from_secs(900)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HunterConfig {
    /// Marketplace sources swept each run
    pub sources: Vec<MarketSource>,
    /// Fetch attempts per source before giving up
    pub max_attempts: u32,
    /// Per-attempt API timeout
    pub fetch_timeout: Duration,
    /// Browser navigation timeout
    pub navigation_timeout: Duration,
    /// Settle period after synthetic interaction
    pub settle: Duration,
    /// Scheduled sweep interval (None = disabled)
    pub sweep_interval: Option<Duration>,
    /// Fixed upstream proxy overriding fleet selection
    pub upstream_proxy: Option<ProxyRoute>,
    /// Optional bearer token for marketplace APIs
    pub market_token: Option<String>,
    /// Optional chrome/chromium binary path
    pub chrome_executable: Option<String>,
}

impl Default for HunterConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            max_attempts: 3,
            fetch_timeout: Duration::from_millis(15_000),
            navigation_timeout: Duration::from_millis(15_000),
            settle: Duration::from_millis(2_000),
            sweep_interval: Some(Duration::from_secs(300)),
            upstream_proxy: None,
            market_token: None,
            chrome_executable: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
    /// Days of system log records to keep
    pub retention_days: i32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api: ApiServerConfig {
                port: parse_env_or("API_PORT", "8001")?,
                host: get_env_or("API_HOST", "0.0.0.0"),
                cors_origins: split_list(&get_env_or("CORS_ORIGINS", "")),
                api_secret: require_env("HUNTER_API_SECRET")?,
            },
            database: DatabaseConfig {
                url: optional_env("DATABASE_URL"),
                max_connections: parse_env_or("DB_MAX_CONNECTIONS", "20")?,
                min_connections: parse_env_or("DB_MIN_CONNECTIONS", "2")?,
            },
            fleet: parse_fleet()?,
            hunter: parse_hunter()?,
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "json"),
                retention_days: parse_env_or("LOG_RETENTION_DAYS", "14")?,
            },
        })
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Database URL, failing fast when the store credentials are absent
    pub fn database_url(&self) -> Result<&str> {
        self.database
            .url
            .as_deref()
            .ok_or_else(|| HunterError::MissingEnvVar("DATABASE_URL".into()))
    }
}

fn parse_fleet() -> Result<FleetConfig> {
    let defaults = FleetConfig::default();

    let sources = match optional_env("FLEET_SOURCES") {
        Some(raw) => split_list(&raw),
        None => defaults.sources,
    };
    for source in &sources {
        Url::parse(source).map_err(|e| {
            HunterError::InvalidConfig(format!("FLEET_SOURCES entry '{}': {}", source, e))
        })?;
    }

    let batch_width: usize = parse_env_or("FLEET_BATCH_WIDTH", "50")?;
    let persist_batch: usize = parse_env_or("FLEET_PERSIST_BATCH", "1000")?;
    if batch_width == 0 || persist_batch == 0 {
        return Err(HunterError::InvalidConfig(
            "FLEET_BATCH_WIDTH and FLEET_PERSIST_BATCH must be positive".into(),
        ));
    }

    Ok(FleetConfig {
        sources,
        probe_url: get_env_or("FLEET_PROBE_URL", DEFAULT_PROBE_URL),
        probe_timeout: Duration::from_millis(parse_env_or("FLEET_PROBE_TIMEOUT_MS", "5000")?),
        harvest_timeout: Duration::from_millis(parse_env_or(
            "FLEET_HARVEST_TIMEOUT_MS",
            "10000",
        )?),
        batch_width,
        persist_batch,
        sync_interval: interval_secs(parse_env_or("FLEET_SYNC_INTERVAL_SECS", "900")?),
    })
}

fn parse_hunter() -> Result<HunterConfig> {
    let max_attempts: u32 = parse_env_or("HUNTER_MAX_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(HunterError::InvalidConfig(
            "HUNTER_MAX_ATTEMPTS must be at least 1".into(),
        ));
    }

    Ok(HunterConfig {
        sources: parse_market_sources(&get_env_or("HUNTER_SOURCES", DEFAULT_HUNTER_SOURCES))?,
        max_attempts,
        fetch_timeout: Duration::from_millis(parse_env_or("HUNTER_FETCH_TIMEOUT_MS", "15000")?),
        navigation_timeout: Duration::from_millis(parse_env_or(
            "HUNTER_NAV_TIMEOUT_MS",
            "15000",
        )?),
        settle: Duration::from_millis(parse_env_or("HUNTER_SETTLE_MS", "2000")?),
        sweep_interval: interval_secs(parse_env_or("HUNTER_SWEEP_INTERVAL_SECS", "300")?),
        upstream_proxy: match optional_env("HUNTER_UPSTREAM_PROXY") {
            Some(raw) => Some(parse_upstream_proxy(&raw)?),
            None => None,
        },
        market_token: optional_env("HUNTER_MARKET_TOKEN"),
        chrome_executable: optional_env("CHROME_EXECUTABLE"),
    })
}

/// Parse `NAME=url` pairs separated by commas.
pub fn parse_market_sources(raw: &str) -> Result<Vec<MarketSource>> {
    split_list(raw)
        .into_iter()
        .map(|entry| {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                HunterError::InvalidConfig(format!(
                    "HUNTER_SOURCES entry '{}' must look like NAME=url",
                    entry
                ))
            })?;
            let name = name.trim().to_uppercase();
            if name.is_empty() {
                return Err(HunterError::InvalidConfig(
                    "HUNTER_SOURCES entry has an empty name".into(),
                ));
            }
            let url = Url::parse(url.trim()).map_err(|e| {
                HunterError::InvalidConfig(format!("HUNTER_SOURCES url for {}: {}", name, e))
            })?;
            Ok(MarketSource::new(name, url.to_string()))
        })
        .collect()
}

/// Parse a fixed upstream proxy URL into a typed route.
pub fn parse_upstream_proxy(raw: &str) -> Result<ProxyRoute> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        HunterError::InvalidConfig(format!("HUNTER_UPSTREAM_PROXY must be a valid URL: {}", e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(HunterError::InvalidConfig(format!(
            "HUNTER_UPSTREAM_PROXY has unsupported scheme: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| HunterError::InvalidConfig("HUNTER_UPSTREAM_PROXY must include a host".into()))?
        .to_string();
    let port = url.port_or_known_default().unwrap_or(80);

    if url.username().is_empty() {
        return Ok(ProxyRoute::DirectProxy { host, port });
    }

    Ok(ProxyRoute::AuthenticatedProxy {
        host,
        port,
        username: url.username().to_string(),
        password: url.password().unwrap_or_default().to_string(),
    })
}

fn interval_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| HunterError::MissingEnvVar(key.to_string()))
}

fn parse_env_or<T: FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| HunterError::InvalidConfig(format!("{} has an invalid value", key)))
}
