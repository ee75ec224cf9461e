//! Error taxonomy for the scrape pipeline.
//!
//! The retry loop distinguishes attempt-scoped failures (retried within the
//! attempt budget) from request-scoped ones (surfaced immediately); see
//! [`ScrapeError::is_attempt_scoped`].

use thiserror::Error;

/// Errors produced by the scrape pipeline and cache store.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Remote unreachable or navigation timed out.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Remote answered with a not-found status. Terminates pagination.
    #[error("{url} returned status {status}")]
    PageNotFound { url: String, status: u16 },

    /// The search page produced zero gallery links.
    #[error("no galleries found for \"{term}\"")]
    NoResults { term: String, search_url: String },

    /// Requested ordinal is outside the discovered gallery list. Never
    /// retried and never cached.
    #[error("gallery index {index} out of range ({available} galleries found)")]
    InvalidIndex { index: u32, available: usize },

    /// Every attempt ran dry. Recorded in the cache as an empty result so
    /// the same key is not re-scraped while the record stays fresh.
    #[error("no assets for \"{term}\" gallery {index} after {attempts} attempt(s)")]
    NoAssets {
        term: String,
        index: u32,
        search_url: String,
        gallery_url: Option<String>,
        attempts: u32,
    },

    /// Browser launch or CDP plumbing failure.
    #[error(transparent)]
    Browser(#[from] anyhow::Error),

    /// Cache store I/O failure.
    #[error("cache store error: {0}")]
    Cache(#[from] std::io::Error),

    /// Cache record serialization failure.
    #[error("cache record error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ScrapeError {
    /// True for failures that consume one attempt rather than the whole
    /// request: navigation trouble, not-found pages, and empty search
    /// results. Everything else escapes the retry loop at once.
    pub fn is_attempt_scoped(&self) -> bool {
        matches!(
            self,
            ScrapeError::Navigation { .. }
                | ScrapeError::PageNotFound { .. }
                | ScrapeError::NoResults { .. }
        )
    }
}
