//! Durable local state: record metadata plus image assets.
//!
//! [`RecordStore`] owns record lifetime and drives asset deletion;
//! [`AssetStore`] owns the files themselves.

pub mod assets;
pub mod document;
pub mod records;

pub use assets::AssetStore;
pub use records::{Page, RecordStore, StoreStats};
