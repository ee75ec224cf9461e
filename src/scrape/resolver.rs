//! Search-results navigation and ordinal gallery resolution.

use tracing::info;
use url::Url;

use crate::browser::PageSource;
use crate::config::SearchConfig;
use crate::error::ScrapeError;
use crate::extract;

/// Build the search URL for a term by percent-encoding it into the
/// configured template.
pub fn search_url(template: &str, term: &str) -> String {
    template.replace("{query}", &urlencoding::encode(term))
}

/// Resolve the 1-based `index` to one gallery link for `term`.
///
/// Index validation happens here, after the search page loads but before
/// any gallery navigation.
pub async fn resolve<S: PageSource + ?Sized>(
    source: &mut S,
    config: &SearchConfig,
    term: &str,
    index: u32,
) -> Result<String, ScrapeError> {
    let url = search_url(&config.url_template, term);
    let page = source.fetch(&url).await?;

    let base = Url::parse(&page.final_url)
        .or_else(|_| Url::parse(&url))
        .map_err(|e| ScrapeError::Navigation {
            url: url.clone(),
            reason: format!("unparseable search URL: {}", e),
        })?;

    let links = extract::extract_gallery_links(&page.html, &base, &config.links);
    info!("Found {} gallery link(s) for \"{}\"", links.len(), term);

    if links.is_empty() {
        return Err(ScrapeError::NoResults {
            term: term.to_string(),
            search_url: url,
        });
    }

    pick_link(&links, index).map(|link| link.to_string())
}

/// Pure ordinal selection: `links[index - 1]`, with bounds validation.
pub(crate) fn pick_link(links: &[String], index: u32) -> Result<&str, ScrapeError> {
    let position = index as usize;
    if position < 1 || position > links.len() {
        return Err(ScrapeError::InvalidIndex {
            index,
            available: links.len(),
        });
    }
    Ok(&links[position - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_percent_encodes_the_term() {
        assert_eq!(
            search_url("https://galleries.test/?s={query}", "cosplay photos & more"),
            "https://galleries.test/?s=cosplay%20photos%20%26%20more"
        );
    }

    #[test]
    fn pick_link_selects_one_based_ordinal() {
        let links = vec![
            "https://galleries.test/g/1".to_string(),
            "https://galleries.test/g/2".to_string(),
            "https://galleries.test/g/3".to_string(),
        ];
        assert_eq!(pick_link(&links, 2).unwrap(), "https://galleries.test/g/2");
    }

    #[test]
    fn pick_link_rejects_out_of_range() {
        let links = vec!["https://galleries.test/g/1".to_string()];
        match pick_link(&links, 99) {
            Err(ScrapeError::InvalidIndex { index, available }) => {
                assert_eq!(index, 99);
                assert_eq!(available, 1);
            }
            other => panic!("expected InvalidIndex, got {:?}", other),
        }
        assert!(matches!(
            pick_link(&links, 0),
            Err(ScrapeError::InvalidIndex { .. })
        ));
    }
}
