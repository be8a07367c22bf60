//! overcoat entry point.
//!
//! Composition root for the session synchronizer and the HTTP cache:
//! loads configuration, opens the key-value store, and exposes a few
//! subcommands for smoke use. Logging goes to stderr so command output
//! on stdout stays machine-readable.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use overcoat_cache::{CachedFetch, HttpRequest, HttpTransport, ReqwestTransport};
use overcoat_core::AppConfig;
use overcoat_core::store::{Carrier, FileProfile, KvStore};
use overcoat_session::{SessionSync, TabRecord};

const USAGE: &str = "usage: overcoat <command>

commands:
  fetch <url>    run a request through the cache and report the outcome
  session        print the restored session state as JSON
  cache-stats    print entry count and stored bytes
  cache-purge    drop every cache entry";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = AppConfig::load().context("failed to load configuration")?;

    match args.first().map(String::as_str) {
        Some("fetch") => {
            let url = args.get(1).with_context(|| format!("fetch needs a url\n\n{USAGE}"))?;
            fetch(&config, url).await
        }
        Some("session") => session(&config).await,
        Some("cache-stats") => cache_stats(&config).await,
        Some("cache-purge") => cache_purge(&config).await,
        Some(other) => bail!("unknown command {other:?}\n\n{USAGE}"),
        None => bail!("{USAGE}"),
    }
}

async fn open_cache(config: &AppConfig) -> Result<CachedFetch> {
    let kv = KvStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(config).context("failed to build HTTP client")?);
    Ok(CachedFetch::open(transport, kv, config).await)
}

async fn fetch(config: &AppConfig, url: &str) -> Result<()> {
    let cache = open_cache(config).await?;
    tracing::info!(url, "fetching");

    let response = cache.fetch(HttpRequest::get(url)).await?;
    let source = if response.from_cache { "cache" } else { "network" };
    println!("{} {} bytes ({source})", response.status, response.body.len());

    Ok(())
}

async fn session(config: &AppConfig) -> Result<()> {
    let kv = KvStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;

    // The profile document lives next to the database.
    let profile_path = config.db_path.with_file_name("profile.json");
    let profile = Arc::new(FileProfile::new(profile_path));

    let sync = SessionSync::restore(
        Carrier::new(),
        kv,
        profile,
        TabRecord::new("about:blank", "New Tab"),
        config,
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&sync.read())?);
    Ok(())
}

async fn cache_stats(config: &AppConfig) -> Result<()> {
    let cache = open_cache(config).await?;
    let (entries, bytes) = cache.stats().await;
    println!("{entries} entries, {bytes} bytes stored");
    Ok(())
}

async fn cache_purge(config: &AppConfig) -> Result<()> {
    let cache = open_cache(config).await?;
    cache.purge().await;
    println!("cache purged");
    Ok(())
}
