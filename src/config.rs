//! Node configuration: CLI flags over an optional JSON config file.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use primitive_types::U256;
use serde::Deserialize;

use crate::constants::DEFAULT_PORT;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub port: u16,
    pub mine: bool,
    pub display: bool,
    pub secret_key: U256,
    pub peers: Vec<SocketAddr>,
    pub base_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mine: false,
            display: false,
            secret_key: U256::zero(),
            peers: Vec::new(),
            base_dir: default_base_dir(),
        }
    }
}

impl NodeConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }
}

pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ubilog"))
        .unwrap_or_else(|| PathBuf::from(".ubilog"))
}

/// On-disk mirror of the CLI flags. Every field is optional; CLI values
/// win over file values.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub mine: Option<bool>,
    pub display: Option<bool>,
    pub secret_key: Option<String>,
    pub peers: Option<Vec<String>>,
    pub base_dir: Option<PathBuf>,
}

pub fn load_file(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))
}

/// Parse `host[:port]`, defaulting the port. Hostnames are resolved; the
/// first address wins.
pub fn parse_peer(spec: &str) -> Result<SocketAddr> {
    if let Ok(addr) = spec.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let with_port: String;
    let lookup = if spec.contains(':') && !spec.starts_with('[') {
        // Bare IPv6 or already host:port; try as given first.
        spec
    } else {
        with_port = format!("{spec}:{DEFAULT_PORT}");
        &with_port
    };
    lookup
        .to_socket_addrs()
        .with_context(|| format!("resolving peer {spec:?}"))?
        .next()
        .ok_or_else(|| anyhow!("peer {spec:?} resolved to no addresses"))
}

/// Parse a hex-encoded miner secret key, with or without a 0x prefix.
pub fn parse_secret_key(hex_str: &str) -> Result<U256> {
    let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if digits.is_empty() || digits.len() > 64 {
        bail!("secret key must be 1..=64 hex digits");
    }
    let padded = format!("{digits:0>64}");
    let bytes = hex::decode(&padded).context("secret key is not hex")?;
    Ok(U256::from_big_endian(&bytes))
}
