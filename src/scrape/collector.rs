//! Paginated asset collection across gallery sub-pages.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::browser::PageSource;
use crate::config::{AssetRules, PaginationConfig};
use crate::error::ScrapeError;
use crate::extract;
use crate::models::AssetRecord;

/// Page 1 is the gallery link verbatim; later pages append the page-number
/// query parameter.
pub fn page_url(base: &str, param: &str, page: u32) -> String {
    if page <= 1 {
        return base.to_string();
    }
    if base.contains('?') {
        format!("{}&{}={}", base, param, page)
    } else {
        format!("{}?{}={}", base, param, page)
    }
}

/// Gather assets from up to `max_pages` sub-pages of one gallery,
/// preserving page order and within-page order.
///
/// A not-found response ends pagination (the site has no explicit last-page
/// signal); any other single-page failure is logged and skipped. A small
/// delay paces requests between pages.
pub async fn collect<S: PageSource + ?Sized>(
    source: &mut S,
    pagination: &PaginationConfig,
    rules: &AssetRules,
    gallery_link: &str,
) -> Vec<AssetRecord> {
    let mut records: Vec<AssetRecord> = Vec::new();

    for page_num in 1..=pagination.max_pages {
        let url = page_url(gallery_link, &pagination.page_param, page_num);

        match source.fetch(&url).await {
            Ok(page) => {
                let base = match Url::parse(&page.final_url).or_else(|_| Url::parse(&url)) {
                    Ok(b) => b,
                    Err(e) => {
                        debug!("Skipping page {}: unparseable URL {}: {}", page_num, url, e);
                        continue;
                    }
                };
                let assets = extract::extract_assets(&page.html, &base, rules);
                debug!("Page {}: {} asset(s)", page_num, assets.len());
                records.extend(assets);
            }
            Err(ScrapeError::PageNotFound { url, status }) => {
                info!(
                    "Pagination stopped at page {}: {} returned {}",
                    page_num, url, status
                );
                break;
            }
            Err(e) => {
                warn!("Page {} failed, continuing: {}", page_num, e);
            }
        }

        if page_num < pagination.max_pages && pagination.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(pagination.delay_ms)).await;
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_the_link_verbatim() {
        assert_eq!(
            page_url("https://galleries.test/g/5", "page", 1),
            "https://galleries.test/g/5"
        );
    }

    #[test]
    fn later_pages_append_the_page_parameter() {
        assert_eq!(
            page_url("https://galleries.test/g/5", "page", 3),
            "https://galleries.test/g/5?page=3"
        );
        assert_eq!(
            page_url("https://galleries.test/g/5?sort=new", "page", 2),
            "https://galleries.test/g/5?sort=new&page=2"
        );
    }
}
