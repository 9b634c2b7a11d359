//! Configuration document schema and loader.
//!
//! The router is configured by a single JSON document:
//!
//! ```json
//! {
//!     "bind4": "0.0.0.0",
//!     "port": 8080,
//!     "threads": 10,
//!     "hosts": {
//!         "users": ["127.0.0.1:9001", "127.0.0.1:9002"]
//!     },
//!     "graphs": {
//!         "main": {
//!             "services": ["users", {"name": "feed", "path": "/v1/feed"}],
//!             "deps": [{"a": "feed", "b": "users"}]
//!         }
//!     },
//!     "routes": [{"r": "/", "g": "main"}]
//! }
//! ```
//!
//! [`Config::parse`] deserializes and validates in one step; host strings
//! are checked for a `:port` suffix and every group must be non-empty.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::protocol::error::{BraidError, Result};

fn default_threads() -> usize {
    10
}

fn default_downstream_timeout_ms() -> u64 {
    5000
}

/// One resolved `addr:port` endpoint of a host group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub addr: String,
    pub port: u16,
}

impl HostEntry {
    /// The `addr:port` form used for URLs and Host headers.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IPv4 bind address. When neither `bind4` nor `bind6` is given the
    /// server binds `0.0.0.0`.
    pub bind4: Option<String>,
    /// IPv6 bind address.
    pub bind6: Option<String>,
    /// Listen port, shared by the v4 and v6 listeners. Required; kept
    /// optional in the schema so its absence maps to a dedicated error.
    port: Option<u16>,
    /// Worker thread count for the runtime.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Whether multipart client bodies are decoded and their parts
    /// propagated into outgoing downstream bodies.
    #[serde(default)]
    pub allow_nested_requests: bool,
    /// Per-downstream-call timeout. Expiry synthesizes an error reply so a
    /// stalled backend can never wedge a request.
    #[serde(default = "default_downstream_timeout_ms")]
    pub downstream_timeout_ms: u64,
    /// Host groups: name to non-empty list of `addr:port` strings.
    pub hosts: BTreeMap<String, Vec<String>>,
    /// Named service graphs.
    pub graphs: BTreeMap<String, GraphConfig>,
    /// Ordered route table: first match wins.
    pub routes: Vec<RouteConfig>,
}

/// One named graph: its services and the dependencies between them.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub deps: Vec<DepConfig>,
}

/// A service entry: either a bare name or an object with overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceConfig {
    Name(String),
    Detailed {
        name: String,
        hosts_from: Option<String>,
        path: Option<String>,
    },
}

impl ServiceConfig {
    pub fn name(&self) -> &str {
        match self {
            ServiceConfig::Name(name) => name,
            ServiceConfig::Detailed { name, .. } => name,
        }
    }

    /// The host group to resolve endpoints from; defaults to the service
    /// name itself.
    pub fn hosts_from(&self) -> &str {
        match self {
            ServiceConfig::Name(name) => name,
            ServiceConfig::Detailed {
                name, hosts_from, ..
            } => hosts_from.as_deref().unwrap_or(name),
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            ServiceConfig::Name(_) => None,
            ServiceConfig::Detailed { path, .. } => path.as_deref(),
        }
    }
}

/// One dependency edge: `a` depends on `b`, so `b` must reply before `a`
/// is dispatched.
#[derive(Debug, Clone, Deserialize)]
pub struct DepConfig {
    pub a: String,
    pub b: String,
}

/// One route entry mapping a URL pattern to a graph.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub r: String,
    pub g: String,
}

impl Config {
    /// Parses and validates a configuration document.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// The listen port. Guaranteed present after [`Config::parse`].
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_default()
    }

    /// Parses every host group into [`HostEntry`] lists, validating that
    /// each group is non-empty and every host carries a port.
    pub fn parse_hosts(&self) -> Result<BTreeMap<String, Vec<HostEntry>>> {
        let mut groups = BTreeMap::new();
        for (group, hosts) in &self.hosts {
            if hosts.is_empty() {
                return Err(BraidError::EmptyHostGroup(group.clone()));
            }
            let mut entries = Vec::with_capacity(hosts.len());
            for host in hosts {
                entries.push(parse_host(group, host)?);
            }
            groups.insert(group.clone(), entries);
        }
        Ok(groups)
    }

    fn validate(&self) -> Result<()> {
        if self.port.is_none() {
            return Err(BraidError::MissingPort);
        }
        self.parse_hosts()?;
        Ok(())
    }
}

/// Splits `addr:port` at the last colon so IPv6 literals keep their colons.
fn parse_host(group: &str, host: &str) -> Result<HostEntry> {
    let malformed = || BraidError::MalformedHost {
        group: group.to_string(),
        host: host.to_string(),
    };
    let colon = host.rfind(':').ok_or_else(malformed)?;
    let port = host[colon + 1..].parse::<u16>().map_err(|_| malformed())?;
    Ok(HostEntry {
        addr: host[..colon].to_string(),
        port,
    })
}
