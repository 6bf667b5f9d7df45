//! # sync-core
//!
//! Pure conflict logic for the offline mutation queue (no I/O, instant tests).
//!
//! This crate implements conflict detection, conflict resolution and queue
//! deduplication planning without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Safe concurrent use from any number of threads
//!
//! Storage and the sync orchestration live in `sync-engine`, which calls
//! into these functions and persists what they produce.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod dedup;
pub mod detector;
pub mod resolver;

pub use canonical::values_equal;
pub use dedup::{plan_deduplication, sort_for_replay};
pub use detector::{
    calculate_conflict_severity, can_auto_resolve, detect_conflict, get_conflict_type,
    get_conflicting_fields, is_field_modified, AUTO_RESOLVE_SEVERITY_THRESHOLD, METADATA_FIELDS,
};
pub use resolver::{
    auto_resolve, batch_resolve, get_recommended_strategy, latest_wins, local_wins, merge,
    resolve_conflict, resolve_with_data, server_wins, ResolveError, ResolveResult,
};
