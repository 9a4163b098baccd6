//! Tube Metadata Collector
//!
//! Fetches video watch pages, pulls `itemprop`/`content` pairs out of their
//! `meta` tags and records them in a date-stamped JSON store, skipping videos
//! already recorded for the day.

pub mod collector;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod store;

// Re-export main types for easy access
pub use crate::collector::{MetadataCollector, RunSummary};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{CollectorError, Result};
pub use crate::extract::MetaExtractor;
pub use crate::fetch::{DocumentSource, PageFetcher};
pub use crate::store::{AttributeMap, MetadataStore, StoreFile, StoreStats};
