//! Engine configuration and runtime environment.
//!
//! Every selector, threshold, and timeout the pipeline uses lives here as
//! injectable data rather than constants in the engine, so the rule set can
//! be revised for a markup change without touching orchestration logic.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default refresh TTL for cached records, in days.
pub const DEFAULT_TTL_DAYS: u64 = 14;

/// Top-level engine configuration, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Maximum scrape attempts per request.
    pub max_attempts: u32,
    pub search: SearchConfig,
    pub browser: NavigatorConfig,
    pub scroll: ScrollConfig,
    pub pagination: PaginationConfig,
    pub extract: AssetRules,
    pub cache: CacheConfig,
}

impl ScrapeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            search: SearchConfig::default(),
            browser: NavigatorConfig::default(),
            scroll: ScrollConfig::default(),
            pagination: PaginationConfig::default(),
            extract: AssetRules::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Search endpoint and gallery-link extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search URL template; `{query}` is replaced with the percent-encoded
    /// term.
    pub url_template: String,
    pub links: LinkRules,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url_template: "https://example.com/?s={query}".to_string(),
            links: LinkRules::default(),
        }
    }
}

/// One prioritized selector rule for gallery-link extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRule {
    /// CSS selector for candidate anchors.
    pub selector: String,
    /// Require a nested `<img>` inside the anchor.
    #[serde(default)]
    pub require_child_image: bool,
}

impl LinkRule {
    pub fn new(selector: impl Into<String>, require_child_image: bool) -> Self {
        Self {
            selector: selector.into(),
            require_child_image,
        }
    }
}

/// Gallery-link extraction rules, evaluated in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRules {
    pub rules: Vec<LinkRule>,
    /// When non-empty, a link must contain at least one of these substrings.
    pub href_substrings: Vec<String>,
    /// A link containing any of these substrings is dropped (pagination,
    /// search, tag pages, fragment anchors).
    pub exclude_substrings: Vec<String>,
    /// Hard cap on extracted links.
    pub max_links: usize,
}

impl Default for LinkRules {
    fn default() -> Self {
        Self {
            rules: vec![
                LinkRule::new("article a", true),
                LinkRule::new("h2.entry-title a", false),
                LinkRule::new("a", true),
            ],
            href_substrings: Vec::new(),
            exclude_substrings: vec![
                "/page/".to_string(),
                "?s=".to_string(),
                "/tag/".to_string(),
                "/search".to_string(),
                "#".to_string(),
            ],
            max_links: 10,
        }
    }
}

/// Browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable; discovered when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Per-navigation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Best-effort readiness wait in seconds; a timeout here is non-fatal.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            chrome_args: Vec::new(),
            timeout_secs: default_timeout(),
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_ready_timeout() -> u64 {
    10
}

/// Incremental auto-scroll bounds, to force lazy-loaded content without
/// running unboundedly on infinite-scroll pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub step_px: u32,
    pub interval_ms: u64,
    pub max_steps: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step_px: 600,
            interval_ms: 200,
            max_steps: 30,
        }
    }
}

/// Gallery sub-page pagination bounds and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Upper bound on sub-pages fetched per gallery.
    pub max_pages: u32,
    /// Query parameter appended for pages past the first.
    pub page_param: String,
    /// Delay between sub-page fetches, to avoid hammering the remote.
    pub delay_ms: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            page_param: "page".to_string(),
            delay_ms: 500,
        }
    }
}

/// Asset extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRules {
    /// Minimum rendered width/height when size attributes are present.
    /// Filters icons and UI chrome.
    pub min_width: u32,
    pub min_height: u32,
    /// When non-empty, asset hosts must contain one of these substrings.
    pub allowed_hosts: Vec<String>,
    /// Lazy-load attributes tried when `src` is missing or empty.
    pub lazy_attrs: Vec<String>,
    /// Pattern an asset URL (query/fragment stripped) must match.
    pub image_ext_pattern: String,
}

impl Default for AssetRules {
    fn default() -> Self {
        Self {
            min_width: 200,
            min_height: 200,
            allowed_hosts: Vec::new(),
            lazy_attrs: vec![
                "data-src".to_string(),
                "data-lazy-src".to_string(),
                "data-original".to_string(),
            ],
            image_ext_pattern: r"(?i)\.(jpe?g|png|gif|webp)$".to_string(),
        }
    }
}

/// Cache store location and freshness convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Storage root; defaults to the platform data directory when unset.
    pub root: Option<PathBuf>,
    /// Records older than this read as misses. 0 disables expiry.
    pub ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }
}

/// Runtime environment, constructed once at startup and passed by reference
/// into the cache store and session provider.
#[derive(Debug, Clone)]
pub struct Environment {
    pub storage_root: PathBuf,
    pub config: ScrapeConfig,
}

impl Environment {
    /// Resolve the storage root from, in order: an explicit override, the
    /// config file, the platform data directory.
    pub fn new(config: ScrapeConfig, storage_root: Option<PathBuf>) -> Self {
        let storage_root = storage_root
            .or_else(|| config.cache.root.clone())
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("gallerygrab")
            });
        Self {
            storage_root,
            config,
        }
    }
}
