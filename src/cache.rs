//! Durable on-disk catalog cache.
//!
//! Layout: one directory per term slug, one JSON record per gallery index:
//! `{root}/{term_slug}/{index}.json`. Records are replaced wholesale and
//! carry a `fetched_at` timestamp; records older than the configured TTL
//! read as misses.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::models::{CacheRecord, CatalogEntry};

/// Key-value persistence for catalog records, keyed by `(term, index)`.
pub struct CacheStore {
    root: PathBuf,
    ttl_days: u64,
}

/// Directory-safe slug for a search term.
pub fn term_slug(term: &str) -> String {
    let slug: String = term
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if slug.is_empty() {
        "_".to_string()
    } else {
        slug
    }
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, ttl_days: u64) -> Self {
        Self {
            root: root.into(),
            ttl_days,
        }
    }

    fn record_path(&self, term: &str, index: u32) -> PathBuf {
        self.root
            .join(term_slug(term))
            .join(format!("{}.json", index))
    }

    /// Look up the record for `(term, index)`. Stale and unreadable records
    /// degrade to a miss.
    pub fn get(&self, term: &str, index: u32) -> Result<Option<CacheRecord>, ScrapeError> {
        let path = self.record_path(term, index);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)?;
        let record: CacheRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Discarding corrupt cache record {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        if self.is_stale(&record) {
            debug!(
                "Cache record {} is older than {} day(s), treating as miss",
                path.display(),
                self.ttl_days
            );
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Write the record for `(term, index)`, replacing any previous one.
    /// An empty `entries` slice records "attempted, nothing found".
    pub fn put(&self, term: &str, index: u32, entries: &[CatalogEntry]) -> Result<(), ScrapeError> {
        let path = self.record_path(term, index);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = CacheRecord {
            term: term.to_string(),
            index,
            fetched_at: Utc::now(),
            entries: entries.to_vec(),
        };
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        debug!(
            "Cached {} entr(ies) for \"{}\" gallery {} at {}",
            record.entries.len(),
            term,
            index,
            path.display()
        );
        Ok(())
    }

    /// Drop the record for `(term, index)` if present.
    pub fn remove(&self, term: &str, index: u32) -> Result<(), ScrapeError> {
        let path = self.record_path(term, index);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Drop every record for `term`, or the whole store when `None`.
    pub fn clear(&self, term: Option<&str>) -> Result<(), ScrapeError> {
        let target = match term {
            Some(t) => self.root.join(term_slug(t)),
            None => self.root.clone(),
        };
        if target.exists() {
            fs::remove_dir_all(target)?;
        }
        Ok(())
    }

    /// Enumerate all stored records (including stale ones), sorted by term
    /// slug then index.
    pub fn list(&self) -> Result<Vec<CacheRecord>, ScrapeError> {
        let mut records = Vec::new();
        if !self.root.exists() {
            return Ok(records);
        }

        for term_entry in fs::read_dir(&self.root)? {
            let term_dir = term_entry?.path();
            if !term_dir.is_dir() {
                continue;
            }
            for record_entry in fs::read_dir(&term_dir)? {
                let path = record_entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match read_record(&path) {
                    Some(record) => records.push(record),
                    None => warn!("Skipping unreadable cache record {}", path.display()),
                }
            }
        }

        records.sort_by(|a, b| (term_slug(&a.term), a.index).cmp(&(term_slug(&b.term), b.index)));
        Ok(records)
    }

    fn is_stale(&self, record: &CacheRecord) -> bool {
        if self.ttl_days == 0 {
            return false;
        }
        let age = Utc::now().signed_duration_since(record.fetched_at);
        age > chrono::Duration::days(self.ttl_days as i64)
    }
}

fn read_record(path: &Path) -> Option<CacheRecord> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogEntry;
    use tempfile::tempdir;

    fn entry(id: u32) -> CatalogEntry {
        CatalogEntry {
            id,
            name: format!("image_{}.jpg", id),
            url: format!("https://cdn.test/{}.jpg", id),
            thumb: format!("https://cdn.test/t/{}.jpg", id),
        }
    }

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);

        store.put("cosplay", 2, &[entry(1), entry(2)]).unwrap();
        let record = store.get("cosplay", 2).unwrap().unwrap();
        assert_eq!(record.term, "cosplay");
        assert_eq!(record.index, 2);
        assert_eq!(record.entries, vec![entry(1), entry(2)]);
    }

    #[test]
    fn miss_on_unknown_key() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);
        assert!(store.get("cosplay", 1).unwrap().is_none());
        assert!(store.get("cosplay", 2).unwrap().is_none());
    }

    #[test]
    fn records_are_replaced_wholesale() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);

        store.put("cosplay", 1, &[entry(1), entry(2)]).unwrap();
        store.put("cosplay", 1, &[entry(3)]).unwrap();
        let record = store.get("cosplay", 1).unwrap().unwrap();
        assert_eq!(record.entries, vec![entry(3)]);
    }

    #[test]
    fn empty_record_is_a_valid_hit() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);

        store.put("obscure", 1, &[]).unwrap();
        let record = store.get("obscure", 1).unwrap().unwrap();
        assert!(record.entries.is_empty());
    }

    #[test]
    fn stale_records_read_as_misses() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);

        store.put("cosplay", 1, &[entry(1)]).unwrap();

        // Rewrite the record with an old timestamp.
        let path = dir.path().join("cosplay").join("1.json");
        let raw = fs::read_to_string(&path).unwrap();
        let mut record: CacheRecord = serde_json::from_str(&raw).unwrap();
        record.fetched_at = Utc::now() - chrono::Duration::days(30);
        fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

        assert!(store.get("cosplay", 1).unwrap().is_none());

        // TTL 0 disables expiry.
        let forever = CacheStore::new(dir.path(), 0);
        assert!(forever.get("cosplay", 1).unwrap().is_some());
    }

    #[test]
    fn corrupt_records_degrade_to_miss() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);

        let term_dir = dir.path().join("cosplay");
        fs::create_dir_all(&term_dir).unwrap();
        fs::write(term_dir.join("1.json"), "not json").unwrap();

        assert!(store.get("cosplay", 1).unwrap().is_none());
    }

    #[test]
    fn slugging_keeps_keys_directory_safe() {
        assert_eq!(term_slug("Cosplay Photos"), "cosplay_photos");
        assert_eq!(term_slug("  a/b\\c  "), "a_b_c");
        assert_eq!(term_slug(""), "_");

        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);
        store.put("Cosplay Photos", 1, &[entry(1)]).unwrap();
        // same key modulo slugging
        assert!(store.get("cosplay photos", 1).unwrap().is_some());
    }

    #[test]
    fn remove_and_clear() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);

        store.put("a", 1, &[entry(1)]).unwrap();
        store.put("a", 2, &[entry(2)]).unwrap();
        store.put("b", 1, &[entry(3)]).unwrap();

        store.remove("a", 1).unwrap();
        assert!(store.get("a", 1).unwrap().is_none());
        assert!(store.get("a", 2).unwrap().is_some());

        store.clear(Some("a")).unwrap();
        assert!(store.get("a", 2).unwrap().is_none());
        assert!(store.get("b", 1).unwrap().is_some());

        store.clear(None).unwrap();
        assert!(store.get("b", 1).unwrap().is_none());
    }

    #[test]
    fn list_enumerates_sorted() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 14);

        store.put("b", 1, &[entry(1)]).unwrap();
        store.put("a", 2, &[entry(2)]).unwrap();
        store.put("a", 1, &[]).unwrap();

        let records = store.list().unwrap();
        let keys: Vec<(String, u32)> = records
            .iter()
            .map(|r| (term_slug(&r.term), r.index))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), 1),
                ("a".to_string(), 2),
                ("b".to_string(), 1)
            ]
        );
    }
}
