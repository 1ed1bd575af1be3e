use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use dhtseek::config::{BootstrapNode, CrawlerConfig};
use dhtseek::dht::Crawler;
use dhtseek::storage::{DirectoryStore, MemoryStore, TorrentStore};

#[derive(Parser, Debug)]
#[command(name = "dhtseek")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP address for the DHT endpoint
    #[arg(short, long, env = "DHTSEEK_BIND", default_value = "0.0.0.0:6881")]
    bind: SocketAddr,

    /// Bootstrap routers as host:port, comma separated
    #[arg(
        short = 'B',
        long = "bootstrap",
        env = "DHTSEEK_BOOTSTRAP",
        value_name = "HOST:PORT",
        value_delimiter = ','
    )]
    bootstrap: Vec<BootstrapNode>,

    /// Concurrent metadata downloads per info-hash
    #[arg(short = 'w', long, env = "DHTSEEK_MAX_WORKERS", default_value_t = 3)]
    max_workers: usize,

    /// Seconds before a metadata download from one peer is abandoned
    #[arg(short = 't', long, env = "DHTSEEK_FETCH_TIMEOUT", default_value_t = 100)]
    fetch_timeout: u64,

    /// Write fetched metadata as .torrent files into this directory
    #[arg(short, long, env = "DHTSEEK_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(short, long, env = "DHTSEEK_LOG", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> CrawlerConfig {
        let defaults = CrawlerConfig::default();
        CrawlerConfig {
            log_level: self.log_level,
            bind: self.bind,
            bootstrap_nodes: if self.bootstrap.is_empty() {
                defaults.bootstrap_nodes.clone()
            } else {
                self.bootstrap
            },
            max_workers_per_info_hash: self.max_workers,
            metadata_fetch_timeout: Duration::from_secs(self.fetch_timeout),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();
    let output_dir = args.output_dir.take();
    let config = args.into_config();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    config.validate().context("invalid configuration")?;

    match output_dir {
        Some(dir) => {
            let store = DirectoryStore::new(dir.clone())
                .with_context(|| format!("cannot use output directory {}", dir.display()))?;
            info!("writing torrents to {}", dir.display());
            crawl(config, Arc::new(store)).await
        }
        None => crawl(config, Arc::new(MemoryStore::new())).await,
    }
}

async fn crawl<S: TorrentStore>(config: CrawlerConfig, store: Arc<S>) -> Result<()> {
    let crawler = Crawler::bind(config, store)
        .await
        .context("failed to start the DHT crawler")?;
    let handle = crawler.handle();
    let mut task = tokio::spawn(crawler.run());

    // Graceful shutdown on Ctrl+C
    tokio::select! {
        result = &mut task => return Ok(result??),
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping at the next tick");
            handle.stop();
        }
    }

    task.await??;
    Ok(())
}
