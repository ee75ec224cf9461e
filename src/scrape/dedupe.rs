//! Deduplication and catalog numbering.

use std::collections::HashSet;

use crate::extract::strip_query;
use crate::models::{AssetRecord, CatalogEntry};

/// Identity used solely for duplicate detection: both URLs with query
/// string and fragment stripped, joined. Never persisted.
fn normalized_key(record: &AssetRecord) -> String {
    format!("{}|{}", strip_query(&record.url), strip_query(&record.thumb))
}

/// Drop duplicate records, preserving first-occurrence order.
///
/// This is the single point where query-parameter cache-busting variants of
/// the same underlying asset collapse to one entry.
pub fn dedupe(records: Vec<AssetRecord>) -> Vec<AssetRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(normalized_key(record)))
        .collect()
}

/// Map deduplicated records 1:1, in order, to dense catalog entries with
/// ids `1..=k`.
pub fn number_entries(records: &[AssetRecord]) -> Vec<CatalogEntry> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let id = (i + 1) as u32;
            CatalogEntry {
                id,
                name: format!("image_{}.{}", id, file_extension(&record.url)),
                url: record.url.clone(),
                thumb: record.thumb.clone(),
            }
        })
        .collect()
}

/// File extension parsed from the URL tail, defaulting to `jpg`.
fn file_extension(url: &str) -> &str {
    strip_query(url)
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, thumb: &str) -> AssetRecord {
        AssetRecord::new(url, thumb)
    }

    #[test]
    fn dedupe_collapses_query_variants() {
        let records = vec![
            record("https://x.test/a.jpg?v=1", "https://x.test/t/a.jpg"),
            record("https://x.test/a.jpg?v=2", "https://x.test/t/a.jpg#frag"),
            record("https://x.test/b.jpg", "https://x.test/t/b.jpg"),
        ];
        let deduped = dedupe(records);
        assert_eq!(deduped.len(), 2);
        // first occurrence survives
        assert_eq!(deduped[0].url, "https://x.test/a.jpg?v=1");
        assert_eq!(deduped[1].url, "https://x.test/b.jpg");
    }

    #[test]
    fn dedupe_is_idempotent_and_never_reorders() {
        let records = vec![
            record("https://x.test/c.jpg", "https://x.test/c.jpg"),
            record("https://x.test/a.jpg", "https://x.test/a.jpg"),
            record("https://x.test/c.jpg", "https://x.test/c.jpg"),
            record("https://x.test/b.jpg", "https://x.test/b.jpg"),
        ];
        let once = dedupe(records);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
        let urls: Vec<&str> = once.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://x.test/c.jpg",
                "https://x.test/a.jpg",
                "https://x.test/b.jpg"
            ]
        );
    }

    #[test]
    fn numbering_is_dense_and_one_based() {
        let records = vec![
            record("https://x.test/z.png?v=9", "https://x.test/z.png"),
            record("https://x.test/y", "https://x.test/y"),
            record("https://x.test/w.webp", "https://x.test/w.webp"),
        ];
        let entries = number_entries(&records);
        let ids: Vec<u32> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(entries[0].name, "image_1.png");
        assert_eq!(entries[1].name, "image_2.jpg"); // no extension -> jpg
        assert_eq!(entries[2].name, "image_3.webp");
    }

    #[test]
    fn extension_parsing_rejects_garbage() {
        assert_eq!(file_extension("https://x.test/a.jpeg"), "jpeg");
        assert_eq!(file_extension("https://x.test/a.jpg?width=1200"), "jpg");
        assert_eq!(file_extension("https://x.test/archive.tar.gz"), "gz");
        assert_eq!(file_extension("https://x.test/noext"), "jpg");
        assert_eq!(file_extension("https://x.test/trailingdot."), "jpg");
        assert_eq!(file_extension("https://x.test/a.verylongext"), "jpg");
    }
}
