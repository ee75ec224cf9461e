//! ggrab - fetch and cache media-gallery asset catalogs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gallerygrab::browser::BrowserProvider;
use gallerygrab::cache::{term_slug, CacheStore};
use gallerygrab::config::{Environment, ScrapeConfig};
use gallerygrab::scrape;

#[derive(Parser)]
#[command(name = "ggrab", version, about = "Scrape and cache media-gallery catalogs")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true, env = "GGRAB_CONFIG")]
    config: Option<PathBuf>,

    /// Override the cache storage root.
    #[arg(long, global = true, env = "GGRAB_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the asset catalog for a search term and gallery index.
    Fetch {
        /// Search term.
        term: String,

        /// 1-based gallery index within the search results.
        #[arg(default_value_t = 1)]
        index: u32,

        /// Run the browser with a visible window.
        #[arg(long)]
        headful: bool,

        /// Drop any cached record for this key and re-scrape.
        #[arg(long)]
        refresh: bool,
    },

    /// Inspect or prune the on-disk cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// List cached records.
    Show,
    /// Remove cached records, for one term or the whole store.
    Clear { term: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "gallerygrab=debug"
    } else {
        "gallerygrab=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ScrapeConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch {
            term,
            index,
            headful,
            refresh,
        } => {
            if headful {
                config.browser.headless = false;
            }
            let env = Environment::new(config, cli.storage_root);
            let cache = CacheStore::new(&env.storage_root, env.config.cache.ttl_days);
            if refresh {
                cache.remove(&term, index)?;
            }

            let provider =
                BrowserProvider::new(env.config.browser.clone(), env.config.scroll.clone());
            let outcome =
                scrape::fetch_catalog(&provider, &env.config, &cache, &term, index).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Cache { command } => {
            let env = Environment::new(config, cli.storage_root);
            let cache = CacheStore::new(&env.storage_root, env.config.cache.ttl_days);
            match command {
                CacheCommand::Show => {
                    let records = cache.list()?;
                    if records.is_empty() {
                        println!("cache is empty ({})", env.storage_root.display());
                    }
                    for record in records {
                        println!(
                            "{}/{}  {} entr(ies)  fetched {}",
                            term_slug(&record.term),
                            record.index,
                            record.entries.len(),
                            record.fetched_at.format("%Y-%m-%d %H:%M UTC")
                        );
                    }
                }
                CacheCommand::Clear { term } => {
                    cache.clear(term.as_deref())?;
                    println!("cleared");
                }
            }
        }
    }

    Ok(())
}
