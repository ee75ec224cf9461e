//! Scrape orchestration: cache consultation, the bounded retry loop, and
//! catalog assembly.

pub mod collector;
pub mod dedupe;
pub mod resolver;

use tracing::{info, warn};

use crate::browser::{PageSource, SessionProvider};
use crate::cache::CacheStore;
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::models::{AssetRecord, CatalogEntry, CatalogSource, ScrapeOutcome};

/// Result of one attempt's resolve → collect → dedupe pipeline.
struct Attempt {
    gallery_url: String,
    records: Vec<AssetRecord>,
}

/// Serve `(term, index)` from the cache, or scrape and persist.
///
/// A fresh non-empty record short-circuits everything. A fresh empty record
/// is the recorded "previously attempted, nothing found" outcome and is
/// returned as [`ScrapeError::NoAssets`] without re-scraping. A miss or
/// stale record runs the full pipeline and writes back.
pub async fn fetch_catalog<P: SessionProvider>(
    provider: &P,
    config: &ScrapeConfig,
    cache: &CacheStore,
    term: &str,
    index: u32,
) -> Result<ScrapeOutcome, ScrapeError> {
    if index < 1 {
        return Err(ScrapeError::InvalidIndex {
            index,
            available: 0,
        });
    }

    if let Some(record) = cache.get(term, index)? {
        if record.entries.is_empty() {
            info!(
                "Cache records no results for \"{}\" gallery {}",
                term, index
            );
            return Err(ScrapeError::NoAssets {
                term: term.to_string(),
                index,
                search_url: resolver::search_url(&config.search.url_template, term),
                gallery_url: None,
                attempts: 0,
            });
        }
        info!(
            "Serving \"{}\" gallery {} from cache ({} entries)",
            term,
            index,
            record.entries.len()
        );
        return Ok(ScrapeOutcome::new(
            term,
            index,
            record.entries,
            CatalogSource::Cache,
        ));
    }

    match run_scrape(provider, config, term, index).await {
        Ok(entries) => {
            cache.put(term, index, &entries)?;
            Ok(ScrapeOutcome::new(term, index, entries, CatalogSource::Live))
        }
        Err(e @ ScrapeError::NoAssets { .. }) => {
            // Record the empty outcome so the key is not re-scraped while
            // the record stays fresh.
            cache.put(term, index, &[])?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// The bounded retry loop. Each attempt owns exactly one browser session,
/// opened at the start and closed on every exit path.
pub async fn run_scrape<P: SessionProvider>(
    provider: &P,
    config: &ScrapeConfig,
    term: &str,
    index: u32,
) -> Result<Vec<CatalogEntry>, ScrapeError> {
    let max_attempts = config.max_attempts.max(1);
    let mut last_gallery_url: Option<String> = None;

    for attempt in 1..=max_attempts {
        info!(
            "Scrape attempt {}/{} for \"{}\" gallery {}",
            attempt, max_attempts, term, index
        );

        // A launch failure is request-scoped: surfaced immediately, nothing
        // to release.
        let mut source = provider.open().await?;
        let result = run_attempt(&mut source, config, term, index).await;
        source.close().await;

        match result {
            Ok(attempt_result) if !attempt_result.records.is_empty() => {
                return Ok(dedupe::number_entries(&attempt_result.records));
            }
            Ok(attempt_result) => {
                last_gallery_url = Some(attempt_result.gallery_url);
                warn!("Attempt {} yielded no assets", attempt);
            }
            Err(e) if e.is_attempt_scoped() => {
                warn!("Attempt {} failed: {}", attempt, e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(ScrapeError::NoAssets {
        term: term.to_string(),
        index,
        search_url: resolver::search_url(&config.search.url_template, term),
        gallery_url: last_gallery_url,
        attempts: max_attempts,
    })
}

/// One pass of resolve → collect → dedupe within a single session.
async fn run_attempt<S: PageSource + ?Sized>(
    source: &mut S,
    config: &ScrapeConfig,
    term: &str,
    index: u32,
) -> Result<Attempt, ScrapeError> {
    let gallery_url = resolver::resolve(source, &config.search, term, index).await?;
    info!("Resolved gallery {} for \"{}\": {}", index, term, gallery_url);

    let raw = collector::collect(source, &config.pagination, &config.extract, &gallery_url).await;
    let records = dedupe::dedupe(raw);
    info!(
        "Collected {} unique asset(s) from {}",
        records.len(),
        gallery_url
    );

    Ok(Attempt {
        gallery_url,
        records,
    })
}
