//! Image search provider implementations.
//!
//! Each module provides a struct implementing
//! [`crate::provider::SearchProvider`] for one upstream, with its payload
//! parsing isolated in a standalone `parse_*` function.

pub mod bing_images;
pub mod custom_search;
pub mod duckduckgo_images;
pub mod etsy;
pub mod page_extraction;

pub use bing_images::BingImagesProvider;
pub use custom_search::CustomSearchProvider;
pub use duckduckgo_images::DuckDuckGoImagesProvider;
pub use etsy::EtsyProvider;
pub use page_extraction::PageExtractionProvider;
