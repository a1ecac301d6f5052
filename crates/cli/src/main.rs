//! offline-cache: inspect and maintain the offline stores from a shell.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use offline_client::{FetchClient, FetchConfig};
use offline_core::{AppConfig, CacheDb, Classifier, RequestDescriptor, RouteCategory, StoreLifecycle};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "offline-cache")]
#[command(about = "Manage the offline cache stores")]
struct Cli {
    /// Database path (overrides the configured one)
    #[arg(long, env = "OFFLINE_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Precache the manifest into the current store, then prune stale stores
    Install,

    /// List stores, marking the current one
    Stores,

    /// List the URLs held by a store
    Keys {
        /// Store name (default: the current store)
        store: Option<String>,
    },

    /// Delete every store except the current one
    Prune,

    /// Show which route category a request falls into
    Classify {
        /// Absolute URL or origin-relative path
        url: String,

        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Treat the request as a top-level navigation
        #[arg(short, long)]
        navigate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    if let Command::Classify { url, method, navigate } = &cli.command {
        let category = classify(&config, url, method, *navigate)?;
        println!("{category} ({})", describe(category));
        return Ok(());
    }

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let lifecycle = StoreLifecycle::new(db.clone(), config.cache_version(), config.store_prefix.clone());
    run(cli.command, &config, &db, &lifecycle).await
}

async fn run(command: Command, config: &AppConfig, db: &CacheDb, lifecycle: &StoreLifecycle) -> Result<()> {
    match command {
        Command::Install => {
            let client = Arc::new(FetchClient::new(FetchConfig::from(config))?);
            let report = lifecycle
                .initialize(&config.precache_manifest()?, client.as_ref())
                .await?;
            println!("cached {} into {}", report.cached.len(), lifecycle.current_store_name());
            for url in &report.failed {
                println!("failed {url}");
            }
            for name in lifecycle.activate_current().await? {
                println!("deleted {name}");
            }
        }
        Command::Stores => {
            let current = lifecycle.current_store_name();
            for name in db.store_names().await? {
                let marker = if name == current { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        Command::Keys { store } => {
            let name = store.unwrap_or_else(|| lifecycle.current_store_name());
            if !db.has_store(&name).await? {
                anyhow::bail!("no store named {name}");
            }
            for key in db.store(&name).keys().await? {
                println!("{key}");
            }
        }
        Command::Prune => {
            for name in lifecycle.activate_current().await? {
                println!("deleted {name}");
            }
        }
        Command::Classify { .. } => {}
    }
    Ok(())
}

fn classify(config: &AppConfig, target: &str, method: &str, navigate: bool) -> Result<RouteCategory> {
    let origin = config.origin_url()?;
    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(_) => origin.join(target).with_context(|| format!("invalid target {target}"))?,
    };
    let request = RequestDescriptor::new(method, url).with_navigation(navigate);
    Ok(Classifier::new(config.route_config()?).classify(&request))
}

fn describe(category: RouteCategory) -> String {
    match category.strategy() {
        Some(strategy) => format!("{strategy:?}"),
        None => "pass-through".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig { origin: "https://app.test".into(), ..Default::default() }
    }

    #[test]
    fn test_classify_relative_path() {
        assert_eq!(classify(&config(), "/scan?x=1", "GET", false).unwrap(), RouteCategory::OfflineFirstApp);
        assert_eq!(classify(&config(), "/ping", "GET", false).unwrap(), RouteCategory::NoCachePing);
    }

    #[test]
    fn test_classify_absolute_cdn_url() {
        let category = classify(&config(), "https://cdn.jsdelivr.net/npm/jsqr/dist/jsQR.js", "GET", false).unwrap();
        assert_eq!(category, RouteCategory::StaticAsset);
    }

    #[test]
    fn test_classify_post_is_excluded() {
        assert_eq!(classify(&config(), "/scan", "post", false).unwrap(), RouteCategory::Excluded);
    }

    #[test]
    fn test_classify_navigation() {
        assert_eq!(classify(&config(), "/reports", "GET", true).unwrap(), RouteCategory::Navigation);
        assert_eq!(classify(&config(), "/reports", "GET", false).unwrap(), RouteCategory::Unmatched);
    }

    #[test]
    fn test_describe_pass_through() {
        assert_eq!(describe(RouteCategory::Unmatched), "pass-through");
        assert_eq!(describe(RouteCategory::StaticAsset), "CacheFirst");
    }

    #[test]
    fn test_cli_parses_keys_without_store() {
        let cli = Cli::try_parse_from(["offline-cache", "keys"]).unwrap();
        assert!(matches!(cli.command, Command::Keys { store: None }));
    }
}
