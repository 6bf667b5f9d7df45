//! # sync-engine
//!
//! Offline-first sync engine: local store, operation queue and conflict
//! orchestration.
//!
//! This crate implements the stateful half of the offline mutation queue:
//! - Persists entity snapshots, queued operations and conflicts locally
//! - Queues mutations made while offline and replays them in order
//! - Detects and resolves conflicts against the server's copy
//! - Exposes status and conflict resolution over HTTP
//!
//! ## Architecture
//!
//! ```text
//!   CRUD layer            UI layer
//!       │                    │ HTTP
//!       ▼                    ▼
//!  ┌──────────────────────────────────┐
//!  │            SyncEngine            │
//!  │  SyncQueue   sync-core (pure)    │
//!  │  ┌────────────────────────────┐  │
//!  │  │  LocalStore (SQLite/mem)   │  │
//!  │  └────────────────────────────┘  │
//!  └───────────────┬──────────────────┘
//!                  │ RemoteServer
//!                  ▼
//!            CRUD server
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod queue;
pub mod remote;
pub mod storage;

pub use config::Config;
pub use engine::{
    EngineMetrics, EngineSettings, MutationOutcome, ResolveOutcome, SyncEngine, SyncReport,
};
pub use error::{EngineError, RemoteError, StorageError};
pub use queue::SyncQueue;
pub use remote::{Disconnected, MockRemote, RemoteServer, ServerSnapshot};
pub use storage::{LocalStore, MemoryStore, SqliteStore, StoreTotals};
