#![forbid(unsafe_code)]

//! Ubilog node CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ubilog::config::{self, NodeConfig};
use ubilog::node::Node;

#[derive(Parser)]
#[command(name = "ubilog")]
#[command(about = "Peer-to-peer proof-of-work blockchain node", long_about = None)]
struct Cli {
    /// JSON config file; CLI flags override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// UDP port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Run the miner.
    #[arg(long)]
    mine: bool,

    /// Print a status line every second.
    #[arg(long)]
    display: bool,

    /// Miner secret key, hex encoded.
    #[arg(long, value_name = "HEX")]
    secret_key: Option<String>,

    /// Peer to gossip with; may be repeated. Port defaults to the
    /// protocol port.
    #[arg(long = "peer", value_name = "HOST[:PORT]")]
    peers: Vec<String>,

    /// Base directory for chain data (default: ~/.ubilog).
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,
}

fn build_config(cli: Cli) -> Result<NodeConfig> {
    let file = match &cli.config {
        Some(path) => config::load_file(path)?,
        None => Default::default(),
    };

    let mut cfg = NodeConfig::default();
    if let Some(port) = cli.port.or(file.port) {
        cfg.port = port;
    }
    cfg.mine = cli.mine || file.mine.unwrap_or(false);
    cfg.display = cli.display || file.display.unwrap_or(false);
    if let Some(key) = cli.secret_key.as_deref().or(file.secret_key.as_deref()) {
        cfg.secret_key = config::parse_secret_key(key)?;
    }
    if let Some(dir) = cli.base_dir.or(file.base_dir) {
        cfg.base_dir = dir;
    }

    let peer_specs = if cli.peers.is_empty() {
        file.peers.unwrap_or_default()
    } else {
        cli.peers
    };
    for spec in &peer_specs {
        cfg.peers.push(config::parse_peer(spec)?);
    }
    Ok(cfg)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = build_config(Cli::parse())?;
    let mut node = Node::new(config).await?;
    node.run().await
}
