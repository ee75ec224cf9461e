//! Selector-driven link and asset extraction from gallery HTML.
//!
//! Everything here is a pure transform over an HTML string, so the transport
//! that produced the string (live browser session or static test fixture) is
//! interchangeable.

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::config::{AssetRules, LinkRules};
use crate::models::AssetRecord;

const DEFAULT_IMAGE_EXT_PATTERN: &str = r"(?i)\.(jpe?g|png|gif|webp)$";

/// Strip the query string and fragment from a URL.
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Extract candidate gallery links from a search-results page.
///
/// Rules are evaluated in priority order and merged first-seen; links
/// matching an exclude substring are dropped and the result is capped at
/// `max_links`.
pub fn extract_gallery_links(html: &str, page_url: &Url, rules: &LinkRules) -> Vec<String> {
    let doc = Html::parse_document(html);
    let img_sel = match Selector::parse("img") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut links: Vec<String> = Vec::new();

    for rule in &rules.rules {
        let selector = match Selector::parse(&rule.selector) {
            Ok(s) => s,
            Err(e) => {
                debug!("skipping invalid link selector {:?}: {}", rule.selector, e);
                continue;
            }
        };

        for element in doc.select(&selector) {
            let href = match element.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }
            if rule.require_child_image && element.select(&img_sel).next().is_none() {
                continue;
            }

            let full_url = match absolutize(page_url, href) {
                Some(u) => u,
                None => continue,
            };
            if !rules.href_substrings.is_empty()
                && !rules.href_substrings.iter().any(|s| full_url.contains(s))
            {
                continue;
            }
            if rules.exclude_substrings.iter().any(|s| full_url.contains(s)) {
                continue;
            }

            if seen.insert(full_url.clone()) {
                links.push(full_url);
                if links.len() >= rules.max_links {
                    return links;
                }
            }
        }
    }

    links
}

/// Extract asset records from a gallery page, in document order.
///
/// Scans anchors that point straight at image files (usually the full-size
/// asset) and `<img>` elements with lazy-load fallback, deduplicating within
/// the page by query-stripped URL.
pub fn extract_assets(html: &str, page_url: &Url, rules: &AssetRules) -> Vec<AssetRecord> {
    let doc = Html::parse_document(html);
    let (anchor_sel, img_sel) = match (Selector::parse("a"), Selector::parse("img")) {
        (Ok(a), Ok(i)) => (a, i),
        _ => return Vec::new(),
    };
    let ext_re = image_ext_regex(&rules.image_ext_pattern);

    let mut seen: HashSet<String> = HashSet::new();
    let mut records: Vec<AssetRecord> = Vec::new();

    for element in doc.select(&anchor_sel) {
        let href = match element.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        let url = match absolutize(page_url, href) {
            Some(u) => u,
            None => continue,
        };
        if !ext_re.is_match(strip_query(&url)) || !host_allowed(&url, &rules.allowed_hosts) {
            continue;
        }
        let thumb = element
            .select(&img_sel)
            .next()
            .and_then(|img| image_source(&img, &rules.lazy_attrs))
            .and_then(|src| absolutize(page_url, src))
            .unwrap_or_else(|| url.clone());
        push_unique(&mut seen, &mut records, AssetRecord::new(url, thumb));
    }

    for element in doc.select(&img_sel) {
        let src = match image_source(&element, &rules.lazy_attrs) {
            Some(s) => s,
            None => continue,
        };
        if src.starts_with("data:") {
            continue;
        }
        if dimension_below(&element, "width", rules.min_width)
            || dimension_below(&element, "height", rules.min_height)
        {
            continue;
        }
        let url = match absolutize(page_url, src) {
            Some(u) => u,
            None => continue,
        };
        if !ext_re.is_match(strip_query(&url)) || !host_allowed(&url, &rules.allowed_hosts) {
            continue;
        }
        push_unique(
            &mut seen,
            &mut records,
            AssetRecord::new(url.clone(), url),
        );
    }

    records
}

fn image_ext_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("invalid image_ext_pattern {:?}: {}", pattern, e);
            // the default pattern is a checked literal
            match Regex::new(DEFAULT_IMAGE_EXT_PATTERN) {
                Ok(re) => re,
                Err(_) => unreachable!("default image pattern parses"),
            }
        }
    }
}

/// `src` first, then the configured lazy-load attributes.
fn image_source<'a>(element: &ElementRef<'a>, lazy_attrs: &[String]) -> Option<&'a str> {
    let value = element.value();
    if let Some(src) = value.attr("src") {
        if !src.is_empty() {
            return Some(src);
        }
    }
    lazy_attrs
        .iter()
        .find_map(|attr| value.attr(attr).filter(|s| !s.is_empty()))
}

/// True when the size attribute is present, parseable, and under the
/// minimum. Missing metadata never filters.
fn dimension_below(element: &ElementRef, attr: &str, min: u32) -> bool {
    if min == 0 {
        return false;
    }
    element
        .value()
        .attr(attr)
        .and_then(|v| v.trim().trim_end_matches("px").parse::<u32>().ok())
        .is_some_and(|v| v < min)
}

fn host_allowed(url: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str()
                .map(|host| allowed.iter().any(|a| host.contains(a.as_str())))
        })
        .unwrap_or(false)
}

fn absolutize(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(|u| u.to_string())
}

fn push_unique(seen: &mut HashSet<String>, records: &mut Vec<AssetRecord>, record: AssetRecord) {
    let key = strip_query(&record.url).to_string();
    if seen.insert(key) {
        records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkRule;

    fn base() -> Url {
        Url::parse("https://galleries.test/?s=cosplay").unwrap()
    }

    #[test]
    fn strip_query_removes_query_and_fragment() {
        assert_eq!(
            strip_query("https://x.test/a.jpg?v=3#frag"),
            "https://x.test/a.jpg"
        );
        assert_eq!(strip_query("https://x.test/a.jpg"), "https://x.test/a.jpg");
    }

    #[test]
    fn link_extraction_requires_child_image_when_asked() {
        let html = r#"
            <article>
              <a href="/gallery/one"><img src="/t/1.jpg"></a>
              <a href="/gallery/two">text only</a>
            </article>
        "#;
        let rules = LinkRules {
            rules: vec![LinkRule::new("a", true)],
            ..LinkRules::default()
        };
        let links = extract_gallery_links(html, &base(), &rules);
        assert_eq!(links, vec!["https://galleries.test/gallery/one"]);
    }

    #[test]
    fn link_extraction_applies_excludes_and_substrings() {
        let html = r#"
            <a href="/gallery/keep"><img src="t.jpg"></a>
            <a href="/gallery/page/2"><img src="t.jpg"></a>
            <a href="/tag/cosplay"><img src="t.jpg"></a>
            <a href="/about"><img src="t.jpg"></a>
        "#;
        let rules = LinkRules {
            rules: vec![LinkRule::new("a", true)],
            href_substrings: vec!["/gallery/".into()],
            exclude_substrings: vec!["/page/".into(), "/tag/".into()],
            ..LinkRules::default()
        };
        let links = extract_gallery_links(html, &base(), &rules);
        assert_eq!(links, vec!["https://galleries.test/gallery/keep"]);
    }

    #[test]
    fn link_extraction_merges_rules_first_seen_and_caps() {
        let mut html = String::from(r#"<h2 class="entry-title"><a href="/g/first">t</a></h2>"#);
        for i in 0..15 {
            html.push_str(&format!(
                r#"<a href="/g/{i}"><img src="/t/{i}.jpg"></a>"#
            ));
        }
        let rules = LinkRules {
            rules: vec![
                LinkRule::new("h2.entry-title a", false),
                LinkRule::new("a", true),
            ],
            exclude_substrings: Vec::new(),
            ..LinkRules::default()
        };
        let links = extract_gallery_links(&html, &base(), &rules);
        // priority rule first, then document order, truncated at the cap
        assert_eq!(links.len(), 10);
        assert_eq!(links[0], "https://galleries.test/g/first");
        assert_eq!(links[1], "https://galleries.test/g/0");
    }

    #[test]
    fn asset_extraction_prefers_anchor_with_thumb() {
        let html = r#"
            <a href="https://cdn.test/full/1.jpg"><img src="/thumbs/1.jpg"></a>
        "#;
        let records = extract_assets(html, &base(), &AssetRules::default());
        assert_eq!(records.len(), 2); // anchor target and the thumb img itself
        assert_eq!(records[0].url, "https://cdn.test/full/1.jpg");
        assert_eq!(records[0].thumb, "https://galleries.test/thumbs/1.jpg");
    }

    #[test]
    fn asset_extraction_falls_back_to_lazy_attrs() {
        let html = r#"
            <img data-src="/images/lazy.jpg">
            <img src="" data-lazy-src="/images/lazier.png">
            <img src="data:image/gif;base64,xyz">
        "#;
        let records = extract_assets(html, &base(), &AssetRules::default());
        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://galleries.test/images/lazy.jpg",
                "https://galleries.test/images/lazier.png"
            ]
        );
    }

    #[test]
    fn asset_extraction_filters_small_images() {
        let html = r#"
            <img src="/icons/star.png" width="32" height="32">
            <img src="/images/big.jpg" width="1200" height="800">
            <img src="/images/unsized.jpg">
        "#;
        let records = extract_assets(html, &base(), &AssetRules::default());
        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://galleries.test/images/big.jpg",
                "https://galleries.test/images/unsized.jpg"
            ]
        );
    }

    #[test]
    fn asset_extraction_honors_host_allowlist() {
        let html = r#"
            <img src="https://cdn.galleries.test/a.jpg">
            <img src="https://ads.example.net/banner.jpg">
        "#;
        let rules = AssetRules {
            allowed_hosts: vec!["galleries.test".into()],
            min_width: 0,
            min_height: 0,
            ..AssetRules::default()
        };
        let records = extract_assets(html, &base(), &rules);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://cdn.galleries.test/a.jpg");
    }

    #[test]
    fn asset_extraction_dedupes_within_page_by_stripped_url() {
        let html = r#"
            <img src="/images/a.jpg?cache=1">
            <img src="/images/a.jpg?cache=2">
        "#;
        let records = extract_assets(html, &base(), &AssetRules::default());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn non_image_urls_are_ignored() {
        let html = r#"
            <a href="/gallery/next">next</a>
            <img src="/player.swf">
        "#;
        let records = extract_assets(html, &base(), &AssetRules::default());
        assert!(records.is_empty());
    }
}
