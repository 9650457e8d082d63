//! First-wins candidate deduplication by normalised image URL.
//!
//! Candidates arrive in provider-priority order, so keeping the first
//! occurrence of each image keeps the metadata of the most trusted
//! provider. Invalid candidates are dropped before they can claim a key.

use std::collections::HashSet;

use crate::types::Candidate;

use super::url_normalize::normalize_url;

/// Incremental deduplicator, fed one provider batch at a time.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
    accepted: Vec<Candidate>,
    dropped_invalid: usize,
    dropped_duplicate: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one candidate. Returns `true` if it was accepted.
    pub fn push(&mut self, candidate: Candidate) -> bool {
        if let Err(err) = candidate.validate() {
            tracing::debug!(provider = %candidate.provider, error = %err, "dropping invalid candidate");
            self.dropped_invalid += 1;
            return false;
        }
        if self.seen.insert(normalize_url(&candidate.image_url)) {
            self.accepted.push(candidate);
            true
        } else {
            self.dropped_duplicate += 1;
            false
        }
    }

    /// Offer a batch in order, stopping once `limit` unique candidates are
    /// held. Returns how many from this batch were accepted.
    pub fn extend_until(&mut self, batch: Vec<Candidate>, limit: usize) -> usize {
        let mut added = 0;
        for candidate in batch {
            if self.accepted.len() >= limit {
                break;
            }
            if self.push(candidate) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// `(invalid, duplicate)` drop counts so far.
    pub fn dropped(&self) -> (usize, usize) {
        (self.dropped_invalid, self.dropped_duplicate)
    }

    /// Accepted candidates in acceptance order, truncated to `limit`.
    pub fn finish(mut self, limit: usize) -> Vec<Candidate> {
        self.accepted.truncate(limit);
        self.accepted
    }
}

/// Deduplicate a list in order, first occurrence wins.
pub fn deduplicate(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut dedup = Deduplicator::new();
    let limit = candidates.len();
    dedup.extend_until(candidates, limit);
    dedup.finish(limit)
}
