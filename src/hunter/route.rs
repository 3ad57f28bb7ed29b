use std::fmt;

use crate::error::{HunterError, Result};
use crate::models::ProxyNode;

/// How outbound marketplace traffic leaves the process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyRoute {
    /// Direct connection; the degraded mode when the fleet is empty
    #[default]
    NoProxy,
    DirectProxy {
        host: String,
        port: u16,
    },
    AuthenticatedProxy {
        host: String,
        port: u16,
        username: String,
        password: String,
    },
}

impl ProxyRoute {
    /// Route through a fleet node
    pub fn from_node(node: &ProxyNode) -> Result<Self> {
        let port = u16::try_from(node.port)
            .map_err(|_| HunterError::InvalidEndpoint(node.id.clone()))?;

        Ok(ProxyRoute::DirectProxy {
            host: node.ip.clone(),
            port,
        })
    }

    /// `http://host:port`, without credentials
    pub fn proxy_url(&self) -> Option<String> {
        match self {
            ProxyRoute::NoProxy => None,
            ProxyRoute::DirectProxy { host, port }
            | ProxyRoute::AuthenticatedProxy { host, port, .. } => {
                Some(format!("http://{}:{}", host, port))
            }
        }
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self {
            ProxyRoute::AuthenticatedProxy {
                username, password, ..
            } => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }

    /// reqwest proxy for this route, `None` for direct traffic
    pub fn to_reqwest(&self) -> Result<Option<reqwest::Proxy>> {
        let Some(url) = self.proxy_url() else {
            return Ok(None);
        };

        let mut proxy = reqwest::Proxy::all(url.as_str())?;
        if let Some((username, password)) = self.credentials() {
            proxy = proxy.basic_auth(username, password);
        }

        Ok(Some(proxy))
    }
}

/// Display never includes the password
impl fmt::Display for ProxyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyRoute::NoProxy => write!(f, "direct"),
            ProxyRoute::DirectProxy { host, port } => write!(f, "{}:{}", host, port),
            ProxyRoute::AuthenticatedProxy {
                host,
                port,
                username,
                ..
            } => write!(f, "{}@{}:{}", username, host, port),
        }
    }
}
