//! Shellcraft: image discovery, curation and ingestion for shell crafts.
//!
//! Search results from [`shellcraft_search`] are classified and turned into
//! durable local records:
//!
//! query → [`Orchestrator`] → candidates → [`categorizer`] →
//! [`IngestionCoordinator`] ([`AssetStore`] + [`RecordStore`]) → records
//!
//! # Architecture
//!
//! - **Categorizer**: keyword scoring into the four fixed categories
//! - **AssetStore**: download, normalise (RGB, max width, JPEG) and store
//!   images, with an orphan sweep
//! - **RecordStore**: one JSON document, atomic saves, idempotent upserts,
//!   cascade deletes; records without an asset are never returned
//! - **IngestionCoordinator**: per-item atomic ingestion with rollback

pub mod categorizer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod record;
pub mod startup;
pub mod store;

pub use config::ShellcraftConfig;
pub use error::{Result, ShellcraftError};
pub use ingest::{IngestReport, IngestionCoordinator};
pub use record::{Record, record_id};
pub use shellcraft_search::{Candidate, Category, Orchestrator, Platform};
pub use startup::Services;
pub use store::{AssetStore, Page, RecordStore, StoreStats};
