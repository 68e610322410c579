//! Incremental per-query minute-bucket cache
//!
//! This crate holds previously computed per-minute event counts for each
//! query fingerprint, and the logic that decides how much of a new request
//! must be fetched from the upstream log source.
//!
//! # Features
//!
//! - **Bucketed series**: minute-aligned counts with ordered extraction and pruning
//! - **Validity windows**: each entry records the `[start, end)` range it fully represents
//! - **Trailing-edge reuse**: overlapping requests only re-fetch from just before the cached end
//! - **Overwrite merge**: re-fetched minutes are corrected, never double counted
//! - **Thread-Safe**: per-fingerprint locks serialize mutation without blocking other queries
//! - **Statistics**: track misses, overlaps, merges and pruned buckets
//!
//! # Example
//!
//! ```ignore
//! use logtally_cache::{CacheConfig, CacheStore, RangeResolver, Merger};
//!
//! let store = CacheStore::new(CacheConfig::default());
//! let resolution = RangeResolver::new(&store).resolve(&fingerprint, range.start);
//!
//! // Fetch [resolution.fetch_start, range.end) from upstream
//! let fetched = TimeRange::new(resolution.fetch_start, range.end);
//! let events = fetch_all(source, query, fetched, max_pages).await?.events;
//!
//! let report = Merger::new(&store).merge(&fingerprint, &events, range, fetched);
//! let points = store.extract_window(&fingerprint, range);
//! ```

pub mod config;
pub mod entry;
pub mod merger;
pub mod resolver;
pub mod series;
pub mod stats;
pub mod store;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use merger::{apply_batch, minute_counts, MergeReport, Merger};
pub use resolver::{resolve_against, RangeResolver, Resolution, ResolveOutcome};
pub use series::BucketedSeries;
pub use stats::CacheStats;
pub use store::CacheStore;
