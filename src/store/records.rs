//! Record metadata store backed by a single JSON document.
//!
//! Every mutation is a load-modify-save cycle under one writer lock, and
//! every save is an atomic replace, so a reader never observes a partial
//! write. Reads only return records whose asset file exists.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use shellcraft_search::{Candidate, Category};

use crate::error::{Result, ShellcraftError};
use crate::record::{Record, record_id};
use crate::store::assets::AssetStore;
use crate::store::document::{self, Document};

/// Paging for list reads. `limit: None` returns everything after `offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    fn apply(self, records: Vec<Record>) -> Vec<Record> {
        let iter = records.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Summary of the store contents (valid records only).
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total: usize,
    pub by_category: Vec<(Category, usize)>,
    pub by_platform: BTreeMap<String, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Durable record store.
pub struct RecordStore {
    path: PathBuf,
    assets: AssetStore,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Open the store at `path` with its asset store.
    ///
    /// The document is parsed once up front so corruption surfaces at
    /// startup rather than on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if an existing document cannot be
    /// read or parsed.
    pub fn open(path: impl Into<PathBuf>, assets: AssetStore) -> Result<Self> {
        let path = path.into();
        let count = document::load(&path)?.len();
        tracing::debug!(path = %path.display(), count, "opened record store");
        Ok(Self {
            path,
            assets,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Insert a record for `candidate`, or merge into the existing one.
    ///
    /// A merge reassigns the category and refreshes `last_updated_at`;
    /// `saved_at` and the stored asset are kept. Returns the record id.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded
    /// or saved.
    pub fn upsert(&self, candidate: &Candidate, category: &Category) -> Result<String> {
        let id = record_id(candidate);
        let now = Utc::now();
        self.mutate(|doc| {
            match doc.get_mut(&id) {
                Some(existing) => {
                    existing.category = category.clone();
                    existing.last_updated_at = now;
                }
                None => {
                    doc.insert(id.clone(), Record::from_candidate(candidate, category, now));
                }
            }
            Ok(())
        })?;
        Ok(id)
    }

    /// Point record `id` at a stored asset file.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the record does not exist or
    /// the document cannot be saved.
    pub fn set_local_asset(&self, id: &str, filename: &str) -> Result<()> {
        self.mutate(|doc| {
            let record = doc
                .get_mut(id)
                .ok_or_else(|| ShellcraftError::Store(format!("no record with id {id}")))?;
            record.local_asset = Some(filename.to_owned());
            record.last_updated_at = Utc::now();
            Ok(())
        })
    }

    /// The record `id`, if it exists and its asset is present.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Record>> {
        Ok(self
            .load()?
            .remove(id)
            .filter(|record| self.is_valid(record)))
    }

    /// The raw entry for `id`, valid or not.
    pub(crate) fn entry(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.load()?.remove(id))
    }

    /// Valid records in `category`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn get_by_category(&self, category: &Category, page: Page) -> Result<Vec<Record>> {
        let records = self
            .valid_records()?
            .into_iter()
            .filter(|r| &r.category == category)
            .collect();
        Ok(page.apply(newest_first(records)))
    }

    /// All valid records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn get_all(&self, page: Page) -> Result<Vec<Record>> {
        Ok(page.apply(newest_first(self.valid_records()?)))
    }

    /// Number of valid records in `category`.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn count_in_category(&self, category: &Category) -> Result<usize> {
        Ok(self
            .valid_records()?
            .iter()
            .filter(|r| &r.category == category)
            .count())
    }

    /// Delete record `id` and its asset file. Returns whether a record was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be saved.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.mutate(|doc| Ok(doc.remove(id)))?;
        let Some(record) = removed else {
            return Ok(false);
        };
        self.remove_asset(&record);
        tracing::info!(id, "deleted record");
        Ok(true)
    }

    /// Remove the entry for `id` without touching its asset. Used to roll
    /// back a failed ingestion.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be saved.
    pub fn remove_entry(&self, id: &str) -> Result<Option<Record>> {
        self.mutate(|doc| Ok(doc.remove(id)))
    }

    /// Put `record` back exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be saved.
    pub fn restore(&self, record: Record) -> Result<()> {
        self.mutate(|doc| {
            doc.insert(record.id.clone(), record);
            Ok(())
        })
    }

    /// Delete every record in `category` along with its asset. Returns how
    /// many records were removed.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be saved.
    pub fn clear_category(&self, category: &Category) -> Result<usize> {
        let removed = self.mutate(|doc| {
            let ids: Vec<String> = doc
                .values()
                .filter(|r| &r.category == category)
                .map(|r| r.id.clone())
                .collect();
            Ok(ids.iter().filter_map(|id| doc.remove(id)).collect::<Vec<_>>())
        })?;
        for record in &removed {
            self.remove_asset(record);
        }
        tracing::info!(%category, count = removed.len(), "cleared category");
        Ok(removed.len())
    }

    /// Valid-record counts for the four fixed categories, in fixed order.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn category_counts(&self) -> Result<Vec<(Category, usize)>> {
        let records = self.valid_records()?;
        Ok(Category::FIXED
            .iter()
            .map(|c| (c.clone(), records.iter().filter(|r| &r.category == c).count()))
            .collect())
    }

    /// Case-insensitive substring search over title, description and
    /// category. Title hits rank above description hits.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn search(&self, text: &str) -> Result<Vec<Record>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(u32, Record)> = newest_first(self.valid_records()?)
            .into_iter()
            .filter_map(|record| {
                let title = record.title.to_lowercase().contains(&needle);
                let description = record
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle));
                let category = record.category.as_str().to_lowercase().contains(&needle);
                if !(title || description || category) {
                    return None;
                }
                let score = u32::from(title) * 10 + u32::from(description) * 5;
                Some((score, record))
            })
            .collect();

        // Stable: equal scores keep newest-first order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }

    /// Totals over valid records.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn stats(&self) -> Result<StoreStats> {
        let records = self.valid_records()?;
        let mut by_platform = BTreeMap::new();
        for record in &records {
            *by_platform.entry(record.platform.to_string()).or_insert(0) += 1;
        }
        Ok(StoreStats {
            total: records.len(),
            by_category: Category::FIXED
                .iter()
                .map(|c| (c.clone(), records.iter().filter(|r| &r.category == c).count()))
                .collect(),
            by_platform,
            oldest: records.iter().map(|r| r.saved_at).min(),
            newest: records.iter().map(|r| r.saved_at).max(),
        })
    }

    /// Every asset file name referenced by an entry, valid or not.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Store`] if the document cannot be loaded.
    pub fn referenced_assets(&self) -> Result<HashSet<String>> {
        Ok(self
            .load()?
            .into_values()
            .filter_map(|r| r.local_asset)
            .collect())
    }

    /// Remove asset files no record references. Returns how many were
    /// removed.
    ///
    /// Holds the writer lock so no record changes mid-sweep. Run it while
    /// no ingestion is in progress: an asset downloaded but not yet linked
    /// to its record counts as an orphan.
    ///
    /// # Errors
    ///
    /// Returns an error if the document or the asset directory cannot be
    /// read, or a removal fails.
    pub fn sweep_orphans(&self) -> Result<usize> {
        let _guard = self.lock();
        let referenced = self.referenced_assets()?;
        let removed = self.assets.sweep_orphans(&referenced)?;
        tracing::info!(removed, referenced = referenced.len(), "orphan sweep complete");
        Ok(removed)
    }

    fn is_valid(&self, record: &Record) -> bool {
        record
            .local_asset
            .as_deref()
            .is_some_and(|f| self.assets.exists(f))
    }

    fn valid_records(&self) -> Result<Vec<Record>> {
        Ok(self
            .load()?
            .into_values()
            .filter(|r| self.is_valid(r))
            .collect())
    }

    fn remove_asset(&self, record: &Record) {
        let Some(filename) = record.local_asset.as_deref() else {
            return;
        };
        if let Err(e) = self.assets.delete(filename) {
            tracing::warn!(id = %record.id, file = filename, error = %e, "failed to delete asset");
        }
    }

    fn load(&self) -> Result<Document> {
        document::load(&self.path).inspect_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "failed to load metadata");
        })
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let _guard = self.lock();
        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        document::save(&self.path, &doc).inspect_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "failed to save metadata");
        })?;
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn newest_first(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.id.cmp(&b.id)));
    records
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::ImageConfig;
    use chrono::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: RecordStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets =
            AssetStore::open(dir.path().join("images"), &ImageConfig::default()).expect("assets");
        let store = RecordStore::open(dir.path().join("metadata.json"), assets).expect("store");
        Fixture { _dir: dir, store }
    }

    fn candidate(n: u32) -> Candidate {
        Candidate::new(
            format!("https://img.example.com/{n}.jpg"),
            format!("https://crafts.example.com/item/{n}"),
            "shell craft",
            "Bing",
        )
        .with_title(format!("Shell item {n}"))
    }

    /// Upsert and attach a real asset file, like a completed ingestion.
    fn stored(store: &RecordStore, c: &Candidate, category: &Category) -> String {
        let id = store.upsert(c, category).expect("upsert");
        let filename = format!("{id}.jpg");
        std::fs::write(store.assets().dir().join(&filename), b"jpeg").expect("write asset");
        store.set_local_asset(&id, &filename).expect("link");
        id
    }

    #[test]
    fn upsert_is_idempotent() {
        let f = fixture();
        let c = candidate(1);
        let first = f.store.upsert(&c, &Category::PictureFrames).expect("upsert");
        let saved_at = f.store.entry(&first).expect("entry").expect("some").saved_at;

        let second = f.store.upsert(&c, &Category::ShadowBoxes).expect("upsert");
        assert_eq!(first, second);

        let entry = f.store.entry(&first).expect("entry").expect("some");
        assert_eq!(entry.category, Category::ShadowBoxes);
        assert_eq!(entry.saved_at, saved_at);
        assert!(entry.last_updated_at >= saved_at);
        assert_eq!(document::load(f.store.path()).expect("load").len(), 1);
    }

    #[test]
    fn records_without_asset_are_hidden() {
        let f = fixture();
        let id = f.store.upsert(&candidate(1), &Category::PictureFrames).expect("upsert");
        assert!(f.store.get_by_id(&id).expect("get").is_none());
        assert!(f.store.get_all(Page::default()).expect("all").is_empty());

        // Linked to a file that is not on disk.
        f.store.set_local_asset(&id, "missing.jpg").expect("link");
        assert!(f.store.get_by_id(&id).expect("get").is_none());
        assert_eq!(f.store.category_counts().expect("counts")[0].1, 0);
    }

    #[test]
    fn set_local_asset_requires_record() {
        let f = fixture();
        assert!(matches!(
            f.store.set_local_asset("nope", "nope.jpg"),
            Err(ShellcraftError::Store(_))
        ));
    }

    #[test]
    fn category_listing_is_newest_first_and_paged() {
        let f = fixture();
        let ids: Vec<String> = (0..4)
            .map(|n| stored(&f.store, &candidate(n), &Category::JewelryBoxes))
            .collect();
        stored(&f.store, &candidate(9), &Category::DisplayCases);

        // Spread saved_at so ordering is unambiguous.
        for (i, id) in ids.iter().enumerate() {
            let mut record = f.store.entry(id).expect("entry").expect("some");
            record.saved_at = Utc::now() - Duration::minutes(10 - i as i64);
            f.store.restore(record).expect("restore");
        }

        let page = f
            .store
            .get_by_category(&Category::JewelryBoxes, Page::new(2, 1))
            .expect("page");
        let got: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec![ids[2].as_str(), ids[1].as_str()]);

        assert_eq!(f.store.get_all(Page::default()).expect("all").len(), 5);
        assert_eq!(f.store.get_all(Page::new(10, 4)).expect("all").len(), 1);
    }

    #[test]
    fn delete_cascades_to_asset() {
        let f = fixture();
        let id = stored(&f.store, &candidate(1), &Category::PictureFrames);
        let file = format!("{id}.jpg");
        assert!(f.store.assets().exists(&file));

        assert!(f.store.delete(&id).expect("delete"));
        assert!(!f.store.assets().exists(&file));
        assert!(f.store.entry(&id).expect("entry").is_none());
        assert!(!f.store.delete(&id).expect("second delete"));
    }

    #[test]
    fn remove_and_restore_do_not_touch_assets() {
        let f = fixture();
        let id = stored(&f.store, &candidate(1), &Category::PictureFrames);
        let record = f.store.remove_entry(&id).expect("remove").expect("some");
        assert!(f.store.assets().exists(&format!("{id}.jpg")));

        f.store.restore(record.clone()).expect("restore");
        assert_eq!(f.store.get_by_id(&id).expect("get"), Some(record));
    }

    #[test]
    fn clear_category_cascades() {
        let f = fixture();
        let a = stored(&f.store, &candidate(1), &Category::ShadowBoxes);
        let b = stored(&f.store, &candidate(2), &Category::ShadowBoxes);
        let keep = stored(&f.store, &candidate(3), &Category::PictureFrames);

        assert_eq!(f.store.clear_category(&Category::ShadowBoxes).expect("clear"), 2);
        assert!(!f.store.assets().exists(&format!("{a}.jpg")));
        assert!(!f.store.assets().exists(&format!("{b}.jpg")));
        assert!(f.store.get_by_id(&keep).expect("get").is_some());
    }

    #[test]
    fn category_counts_sum_to_valid_fixed_records() {
        let f = fixture();
        stored(&f.store, &candidate(1), &Category::PictureFrames);
        stored(&f.store, &candidate(2), &Category::PictureFrames);
        stored(&f.store, &candidate(3), &Category::DisplayCases);
        stored(&f.store, &candidate(4), &Category::SearchResults);
        f.store.upsert(&candidate(5), &Category::ShadowBoxes).expect("pending");

        let counts = f.store.category_counts().expect("counts");
        assert_eq!(
            counts,
            vec![
                (Category::PictureFrames, 2),
                (Category::ShadowBoxes, 0),
                (Category::JewelryBoxes, 0),
                (Category::DisplayCases, 1),
            ]
        );
        let fixed_total = f
            .store
            .get_all(Page::default())
            .expect("all")
            .iter()
            .filter(|r| r.category.is_fixed())
            .count();
        assert_eq!(counts.iter().map(|(_, n)| n).sum::<usize>(), fixed_total);
    }

    #[test]
    fn search_ranks_title_hits_first() {
        let f = fixture();
        let by_description = candidate(1)
            .with_title("Coastal decor")
            .with_description("A scallop mirror");
        let by_title = candidate(2).with_title("Scallop shell mirror");
        stored(&f.store, &by_description, &Category::PictureFrames);
        let title_id = stored(&f.store, &by_title, &Category::PictureFrames);
        stored(&f.store, &candidate(3), &Category::DisplayCases);

        let hits = f.store.search("SCALLOP").expect("search");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, title_id);

        assert_eq!(f.store.search("display_cases").expect("search").len(), 1);
        assert!(f.store.search("  ").expect("search").is_empty());
    }

    #[test]
    fn stats_summarise_valid_records() {
        let f = fixture();
        stored(&f.store, &candidate(1), &Category::PictureFrames);
        let mut etsy = candidate(2);
        etsy.source_url = "https://www.etsy.com/listing/2".into();
        etsy.platform = shellcraft_search::Platform::from_url(&etsy.source_url);
        stored(&f.store, &etsy, &Category::JewelryBoxes);

        let stats = f.store.stats().expect("stats");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_platform.get("Etsy"), Some(&1));
        assert_eq!(stats.by_platform.get("Web"), Some(&1));
        assert!(stats.oldest <= stats.newest);
    }

    #[test]
    fn corrupt_document_fails_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "[1, 2").expect("write");
        let assets =
            AssetStore::open(dir.path().join("images"), &ImageConfig::default()).expect("assets");
        assert!(matches!(
            RecordStore::open(&path, assets),
            Err(ShellcraftError::Store(_))
        ));
    }
}
