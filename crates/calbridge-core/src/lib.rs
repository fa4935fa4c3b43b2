//! # Calbridge Core Library
//!
//! Core business logic for Calbridge, a cron-style batch reconciler that
//! mirrors a public ICS calendar feed into a Notion database. Each
//! invocation fetches a full snapshot of the feed, diffs it against a
//! durable local ledger of previously-synced state, applies the resulting
//! creates/updates/deletes to Notion, and commits the ledger once.
//!
//! ## Architecture
//!
//! - **Model**: normalized event records and the single canonical
//!   timestamp parser every version comparison goes through
//! - **Ledger**: crash-safe JSON persistence of last-synced state per
//!   source id (atomic write-temp-then-rename commits)
//! - **Feed**: HTTP fetching with a bounded retry budget, plus minimal
//!   ICS parsing
//! - **Reconcile**: the diff/classify/apply engine and the per-run
//!   orchestration
//! - **Target**: the store boundary trait and its Notion implementation
//!
//! ## Key Components
//!
//! - [`Reconciler`]: the diff/classify/apply state machine
//! - [`run_sync`]: one full fetch-reconcile-commit run
//! - [`LedgerStore`]: durable ledger persistence
//! - [`Fetcher`]: snapshot retrieval with retry
//! - [`TargetStore`]: mutation boundary consumed by the reconciler

pub mod config;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod model;
pub mod reconcile;
pub mod target;

pub use config::Config;
pub use error::{ConfigError, FeedError, LedgerError, Result, SyncError, TargetError};
pub use feed::{FetchResult, Fetcher};
pub use ledger::{Ledger, LedgerStore};
pub use model::{LedgerRecord, Snapshot, SourceEvent};
pub use reconcile::{plan, run_sync, Mutation, Plan, Reconciler, RunSummary};
pub use target::{NotionClient, TargetStore};
