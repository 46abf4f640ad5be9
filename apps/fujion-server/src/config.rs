use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use fujion_wire::{DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_MAX_PREAMBLE_BYTES};

/// Size limits applied to inbound socket traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    pub max_preamble_bytes: usize,
    pub max_message_bytes: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_preamble_bytes: DEFAULT_MAX_PREAMBLE_BYTES,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub web_root: PathBuf,
    pub precompile: Vec<String>,
    pub limits: MessageLimits,
    pub shutdown_grace: Duration,
    /// Age after which a page no websocket has claimed is discarded.
    pub page_ttl: Duration,
    pub reap_interval: Duration,
}

impl ServerConfig {
    /// Configuration with default limits serving pages from `web_root`.
    pub fn new(web_root: impl Into<PathBuf>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            web_root: web_root.into(),
            precompile: Vec::new(),
            limits: MessageLimits::default(),
            shutdown_grace: Duration::from_secs(5),
            page_ttl: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "fujion-server",
    author,
    version,
    about = "Fujion page server (FSP pages over WebSocket)"
)]
pub struct Cli {
    /// Address to bind the HTTP and websocket listener to.
    #[arg(long, env = "FUJION_LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    pub listen_addr: String,

    /// Directory that FSP page keys resolve against.
    #[arg(long, env = "FUJION_WEB_ROOT", default_value = "web")]
    pub web_root: PathBuf,

    /// Pages compiled once the server is ready (comma separated).
    #[arg(long = "precompile", env = "FUJION_PRECOMPILE", value_delimiter = ',')]
    pub precompile: Vec<String>,

    /// Largest JSON preamble accepted on a binary frame.
    #[arg(long, env = "FUJION_MAX_PREAMBLE_BYTES", default_value_t = DEFAULT_MAX_PREAMBLE_BYTES)]
    pub max_preamble_bytes: usize,

    /// Largest reassembled inbound message.
    #[arg(long, env = "FUJION_MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Grace period applied during shutdown.
    #[arg(long, env = "FUJION_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Seconds a page may wait for its websocket before it is discarded.
    #[arg(long, env = "FUJION_PAGE_TTL_SECS", default_value_t = 300)]
    pub page_ttl_secs: u64,

    /// Seconds between sweeps for unclaimed pages.
    #[arg(long, env = "FUJION_PAGE_REAP_INTERVAL_SECS", default_value_t = 30)]
    pub reap_interval_secs: u64,
}

impl TryFrom<Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = cli
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", cli.listen_addr))?;
        if cli.max_preamble_bytes == 0 || cli.max_message_bytes == 0 {
            bail!("message limits must be greater than zero");
        }
        if cli.max_preamble_bytes > cli.max_message_bytes {
            bail!(
                "preamble limit ({}) exceeds message limit ({})",
                cli.max_preamble_bytes,
                cli.max_message_bytes
            );
        }
        if cli.reap_interval_secs == 0 {
            bail!("page reap interval must be greater than zero");
        }
        let precompile = cli
            .precompile
            .into_iter()
            .map(|page| page.trim().to_string())
            .filter(|page| !page.is_empty())
            .collect();
        Ok(ServerConfig {
            listen_addr,
            web_root: cli.web_root,
            precompile,
            limits: MessageLimits {
                max_preamble_bytes: cli.max_preamble_bytes,
                max_message_bytes: cli.max_message_bytes,
            },
            shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
            page_ttl: Duration::from_secs(cli.page_ttl_secs),
            reap_interval: Duration::from_secs(cli.reap_interval_secs),
        })
    }
}
