//! Core data records for scraped gallery catalogs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One media asset discovered on a gallery page.
///
/// `url` points at the full image resource; `thumb` is the preview the page
/// showed for it (possibly the same URL). Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub url: String,
    pub thumb: String,
}

impl AssetRecord {
    pub fn new(url: impl Into<String>, thumb: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            thumb: thumb.into(),
        }
    }
}

/// The persisted, numbered representation of one asset.
///
/// `id` values are dense and 1-based in discovery order; `name` is
/// synthesized as `image_<id>.<ext>` from the asset URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
    pub url: String,
    pub thumb: String,
}

/// Durable record for one `(term, index)` key.
///
/// An empty `entries` list is a valid recorded outcome: it means a previous
/// scrape was attempted and found nothing. Records are always replaced
/// wholesale, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub term: String,
    pub index: u32,
    pub fetched_at: DateTime<Utc>,
    pub entries: Vec<CatalogEntry>,
}

/// Where a served catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Cache,
    Live,
}

/// What the orchestrator hands back to its caller on success.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutcome {
    pub term: String,
    pub index: u32,
    pub entries: Vec<CatalogEntry>,
    pub total: usize,
    pub source: CatalogSource,
}

impl ScrapeOutcome {
    pub fn new(
        term: impl Into<String>,
        index: u32,
        entries: Vec<CatalogEntry>,
        source: CatalogSource,
    ) -> Self {
        Self {
            term: term.into(),
            index,
            total: entries.len(),
            entries,
            source,
        }
    }
}
