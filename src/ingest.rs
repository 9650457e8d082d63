//! Turns search candidates into durable records.
//!
//! Each candidate is stored atomically: its metadata is only left live
//! once the asset download succeeded. A failed download rolls the entry
//! back to what it was before. Concurrent ingests of the same record id
//! are serialized, so one caller's rollback never undoes another's write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use shellcraft_search::{Candidate, Category};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::categorizer::classify_candidate;
use crate::error::Result;
use crate::record::record_id;
use crate::store::RecordStore;

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Newly stored records: metadata written and asset downloaded.
    pub stored: usize,
    /// Records that already existed with their asset; metadata refreshed,
    /// nothing downloaded.
    pub refreshed: usize,
    /// Candidates skipped as invalid or over the category cap.
    pub skipped: usize,
    /// Candidates whose asset download failed and were rolled back.
    pub failed: usize,
    /// Ids of the stored and refreshed records, in input order.
    pub ids: Vec<String>,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.stored += other.stored;
        self.refreshed += other.refreshed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.ids.extend(other.ids);
    }
}

enum Outcome {
    Stored(String),
    Refreshed(String),
    Skipped,
    Failed,
}

/// Combines the record store and its asset store into per-item atomic
/// ingestion.
pub struct IngestionCoordinator {
    records: Arc<RecordStore>,
    max_per_category: usize,
    /// One lock per record id with an ingest in progress.
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IngestionCoordinator {
    pub fn new(records: Arc<RecordStore>, max_per_category: usize) -> Self {
        Self {
            records,
            max_per_category,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn records(&self) -> &Arc<RecordStore> {
        &self.records
    }

    /// Ingest `candidates` into `category`.
    ///
    /// Items are processed in order. Invalid items and items over the
    /// category cap are skipped; download failures are rolled back and
    /// counted, never propagated.
    ///
    /// # Errors
    ///
    /// A metadata read or write failure aborts the batch.
    pub async fn ingest(&self, candidates: &[Candidate], category: &Category) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for candidate in candidates {
            self.ingest_one(candidate, category, &mut report).await?;
        }
        tracing::info!(
            %category,
            stored = report.stored,
            refreshed = report.refreshed,
            skipped = report.skipped,
            failed = report.failed,
            "ingestion complete"
        );
        Ok(report)
    }

    /// Ingest each candidate into the category the categorizer assigns it.
    ///
    /// # Errors
    ///
    /// A metadata read or write failure aborts the batch.
    pub async fn ingest_classified(&self, candidates: &[Candidate]) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for candidate in candidates {
            let category = classify_candidate(candidate);
            let mut one = IngestReport::default();
            self.ingest_one(candidate, &category, &mut one).await?;
            report.merge(one);
        }
        tracing::info!(
            stored = report.stored,
            refreshed = report.refreshed,
            skipped = report.skipped,
            failed = report.failed,
            "classified ingestion complete"
        );
        Ok(report)
    }

    async fn ingest_one(
        &self,
        candidate: &Candidate,
        category: &Category,
        report: &mut IngestReport,
    ) -> Result<()> {
        match self.store_candidate(candidate, category).await? {
            Outcome::Stored(id) => {
                report.stored += 1;
                report.ids.push(id);
            }
            Outcome::Refreshed(id) => {
                report.refreshed += 1;
                report.ids.push(id);
            }
            Outcome::Skipped => report.skipped += 1,
            Outcome::Failed => report.failed += 1,
        }
        Ok(())
    }

    async fn store_candidate(&self, candidate: &Candidate, category: &Category) -> Result<Outcome> {
        if let Err(e) = candidate.validate() {
            tracing::warn!(error = %e, "skipping invalid candidate");
            return Ok(Outcome::Skipped);
        }

        let id = record_id(candidate);
        let claim = self.claim(&id).await;
        let outcome = self.store_claimed(candidate, category, id).await;
        self.release(claim);
        outcome
    }

    /// Everything between reading the previous entry and linking or
    /// rolling back runs while holding the claim on `id`.
    async fn store_claimed(
        &self,
        candidate: &Candidate,
        category: &Category,
        id: String,
    ) -> Result<Outcome> {
        let previous = self.records.entry(&id)?;

        let has_asset = previous
            .as_ref()
            .and_then(|r| r.local_asset.as_deref())
            .is_some_and(|f| self.records.assets().exists(f));
        if has_asset {
            self.records.upsert(candidate, category)?;
            tracing::debug!(id = %id, "record already stored, refreshed metadata");
            return Ok(Outcome::Refreshed(id));
        }

        if self.records.count_in_category(category)? >= self.max_per_category {
            tracing::debug!(id = %id, %category, max = self.max_per_category, "category full, skipping");
            return Ok(Outcome::Skipped);
        }

        self.records.upsert(candidate, category)?;
        match self.records.assets().put(&candidate.image_url, &id).await {
            Ok(filename) => {
                self.records.set_local_asset(&id, &filename)?;
                tracing::debug!(id = %id, file = %filename, "stored record");
                Ok(Outcome::Stored(id))
            }
            Err(e) => {
                tracing::warn!(id = %id, url = %candidate.image_url, error = %e, "asset download failed, rolling back");
                match previous {
                    Some(record) => self.records.restore(record)?,
                    None => {
                        self.records.remove_entry(&id)?;
                    }
                }
                Ok(Outcome::Failed)
            }
        }
    }

    async fn claim(&self, id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(id.to_owned()).or_default())
        };
        slot.lock_owned().await
    }

    fn release(&self, claim: OwnedMutexGuard<()>) {
        drop(claim);
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}
