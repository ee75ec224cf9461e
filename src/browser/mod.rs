//! Headless-browser page navigation via chromiumoxide (CDP).
//!
//! The [`PageSource`] trait is the seam between the engine and the browser:
//! the engine only ever asks for "a loaded, settled page as HTML", so tests
//! swap in static fixtures without touching pipeline logic.

use async_trait::async_trait;

use crate::config::{NavigatorConfig, ScrollConfig};
use crate::error::ScrapeError;

/// A page fetched and settled by a navigator.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub html: String,
}

/// A source of loaded pages.
///
/// The browser implementation navigates, waits for readiness, auto-scrolls
/// to flush lazy-loaded content, and snapshots the DOM. Fixtures serve
/// static HTML.
#[async_trait]
pub trait PageSource: Send {
    async fn fetch(&mut self, url: &str) -> Result<FetchedPage, ScrapeError>;

    /// Release the underlying session. Called exactly once, on every exit
    /// path of the attempt that owns this source.
    async fn close(&mut self);
}

/// Opens one page source per scrape attempt.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Source: PageSource;

    async fn open(&self) -> Result<Self::Source, ScrapeError>;
}

/// Session provider backed by a locally launched browser.
#[derive(Debug, Clone)]
pub struct BrowserProvider {
    navigator: NavigatorConfig,
    scroll: ScrollConfig,
}

impl BrowserProvider {
    pub fn new(navigator: NavigatorConfig, scroll: ScrollConfig) -> Self {
        Self { navigator, scroll }
    }
}

#[async_trait]
impl SessionProvider for BrowserProvider {
    type Source = BrowserSession;

    #[cfg(feature = "browser")]
    async fn open(&self) -> Result<BrowserSession, ScrapeError> {
        BrowserSession::launch(&self.navigator, &self.scroll).await
    }

    #[cfg(not(feature = "browser"))]
    async fn open(&self) -> Result<BrowserSession, ScrapeError> {
        Err(ScrapeError::Browser(anyhow::anyhow!(
            "browser support not compiled; rebuild with: cargo build --features browser"
        )))
    }
}

#[cfg(feature = "browser")]
mod session {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Context;
    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
    use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::{Stream, StreamExt};
    use tracing::{debug, info, warn};

    use super::{FetchedPage, PageSource};
    use crate::config::{NavigatorConfig, ScrollConfig};
    use crate::error::ScrapeError;

    /// How long to wait for the main-document response event after the
    /// navigate command returns.
    const STATUS_WAIT: Duration = Duration::from_secs(2);

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    const CHROME_COMMANDS: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    /// One launched browser, owned end-to-end by a single scrape attempt.
    pub struct BrowserSession {
        browser: Browser,
        config: NavigatorConfig,
        scroll: ScrollConfig,
    }

    fn find_chrome(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            anyhow::bail!("configured chrome_path {} does not exist", path.display());
        }

        for path in CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it (e.g. apt install chromium-browser) \
             or set browser.chrome_path in the config"
        ))
    }

    impl BrowserSession {
        /// Launch a fresh headless browser for one attempt.
        pub async fn launch(
            config: &NavigatorConfig,
            scroll: &ScrollConfig,
        ) -> Result<Self, ScrapeError> {
            let chrome_path = find_chrome(config.chrome_path.as_deref())?;

            info!("Launching browser (headless={})", config.headless);

            let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
            if !config.headless {
                builder = builder.with_head();
            }
            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-background-networking")
                .arg("--no-sandbox")
                .arg("--disable-gpu");
            for arg in &config.chrome_args {
                builder = builder.arg(arg);
            }

            let browser_config = builder
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build browser config: {}", e))?;

            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .context("failed to launch browser")?;

            // Drive the CDP connection for the life of the session.
            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(Self {
                browser,
                config: config.clone(),
                scroll: scroll.clone(),
            })
        }

        async fn fetch_on_page(&self, page: &Page, url: &str) -> Result<FetchedPage, ScrapeError> {
            // Subscribe before navigating so the main-document response is
            // not missed.
            let mut responses = page
                .event_listener::<EventResponseReceived>()
                .await
                .context("failed to subscribe to network events")?;

            let nav_params = NavigateParams::builder()
                .url(url)
                .build()
                .map_err(|e| anyhow::anyhow!("invalid URL {}: {}", url, e))?;

            let nav_timeout = Duration::from_secs(self.config.timeout_secs);
            debug!("Navigating to {}", url);
            let nav = match tokio::time::timeout(nav_timeout, page.execute(nav_params)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    return Err(ScrapeError::Navigation {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(ScrapeError::Navigation {
                        url: url.to_string(),
                        reason: format!("timed out after {}s", self.config.timeout_secs),
                    })
                }
            };
            if let Some(error_text) = nav.result.error_text.as_deref() {
                if !error_text.is_empty() {
                    return Err(ScrapeError::Navigation {
                        url: url.to_string(),
                        reason: error_text.to_string(),
                    });
                }
            }

            let status = main_document_status(&mut responses, STATUS_WAIT)
                .await
                .unwrap_or(200);
            if status == 404 || status == 410 {
                return Err(ScrapeError::PageNotFound {
                    url: url.to_string(),
                    status,
                });
            }

            self.wait_for_ready(page).await;
            self.auto_scroll(page).await;

            let final_url = page
                .url()
                .await
                .ok()
                .flatten()
                .map(|u| u.to_string())
                .unwrap_or_else(|| url.to_string());
            let html = page
                .content()
                .await
                .context("failed to capture page content")?;

            Ok(FetchedPage {
                url: url.to_string(),
                final_url,
                status,
                html,
            })
        }

        /// Best-effort readiness wait on `document.readyState`; a timeout is
        /// logged and the page is used as-is.
        async fn wait_for_ready(&self, page: &Page) {
            let script = r#"
                new Promise((resolve) => {
                    if (document.readyState === 'complete' || document.readyState === 'interactive') {
                        resolve(document.readyState);
                    } else {
                        document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                        setTimeout(() => resolve('timeout'), 10000);
                    }
                })
            "#;

            let timeout = Duration::from_secs(self.config.ready_timeout_secs);
            match tokio::time::timeout(timeout, page.evaluate(script.to_string())).await {
                Ok(Ok(result)) => {
                    let state: String = result
                        .into_value()
                        .unwrap_or_else(|_| "unknown".to_string());
                    debug!("Page ready state: {}", state);
                }
                Ok(Err(e)) => {
                    debug!("Could not check ready state: {}", e);
                }
                Err(_) => {
                    warn!("Timeout waiting for page ready state");
                }
            }
        }

        /// Incremental scroll to trigger lazy-loaded content, bounded by
        /// `max_steps` so infinite-scroll pages cannot run away.
        async fn auto_scroll(&self, page: &Page) {
            if self.scroll.max_steps == 0 {
                return;
            }
            let script = format!(
                r#"(async () => {{
                    let steps = 0;
                    while (steps < {max_steps}) {{
                        const before = window.scrollY;
                        window.scrollBy(0, {step});
                        await new Promise((resolve) => setTimeout(resolve, {interval}));
                        steps += 1;
                        if (window.innerHeight + window.scrollY >= document.body.scrollHeight) {{
                            break;
                        }}
                        if (window.scrollY === before) {{
                            break;
                        }}
                    }}
                    return steps;
                }})()"#,
                max_steps = self.scroll.max_steps,
                step = self.scroll.step_px,
                interval = self.scroll.interval_ms,
            );

            let budget = Duration::from_millis(
                u64::from(self.scroll.max_steps) * self.scroll.interval_ms + 2_000,
            );
            match tokio::time::timeout(budget, page.evaluate(script)).await {
                Ok(Ok(result)) => {
                    let steps: i64 = result.into_value().unwrap_or(0);
                    debug!("Auto-scrolled {} step(s)", steps);
                }
                Ok(Err(e)) => debug!("Auto-scroll skipped: {}", e),
                Err(_) => warn!("Auto-scroll timed out"),
            }
        }
    }

    #[async_trait]
    impl PageSource for BrowserSession {
        async fn fetch(&mut self, url: &str) -> Result<FetchedPage, ScrapeError> {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .context("failed to open page")?;

            let result = self.fetch_on_page(&page, url).await;

            // Close the tab on every path to prevent accumulation.
            if let Err(e) = page.close().await {
                debug!("Page close failed: {}", e);
            }

            result
        }

        async fn close(&mut self) {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            let _ = self.browser.wait().await;
        }
    }

    /// Wait briefly for the main-document response and report its status.
    async fn main_document_status(
        responses: &mut (impl Stream<Item = Arc<EventResponseReceived>> + Unpin),
        wait: Duration,
    ) -> Option<u16> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
            match tokio::time::timeout(remaining, responses.next()).await {
                Ok(Some(event)) if event.r#type == ResourceType::Document => {
                    return Some(event.response.status as u16);
                }
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

#[cfg(feature = "browser")]
pub use session::BrowserSession;

// Stub for when browser support is disabled.
#[cfg(not(feature = "browser"))]
pub struct BrowserSession;

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSource for BrowserSession {
    async fn fetch(&mut self, _url: &str) -> Result<FetchedPage, ScrapeError> {
        Err(ScrapeError::Browser(anyhow::anyhow!(
            "browser support not compiled; rebuild with: cargo build --features browser"
        )))
    }

    async fn close(&mut self) {}
}
