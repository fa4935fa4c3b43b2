//! Target store boundary.
//!
//! The reconciler only ever talks to this trait; the Notion client is one
//! implementation, and tests supply an in-process fake.

pub mod notion;

pub use notion::NotionClient;

use async_trait::async_trait;

use crate::error::TargetError;
use crate::model::SourceEvent;

/// Mutations the reconciler issues against the remote mirror.
///
/// No operation here retries on its own; retry policy for target calls,
/// if any, belongs to the implementation. The reconciler treats every
/// error as a per-event failure and moves on.
#[async_trait]
pub trait TargetStore {
    /// Create an entity for a new event, returning the opaque reference
    /// the store assigned to it. Not required to be idempotent.
    async fn create(&self, event: &SourceEvent) -> Result<String, TargetError>;

    /// Overwrite the entity behind `target_ref` with the event's current
    /// state.
    async fn update(&self, target_ref: &str, event: &SourceEvent) -> Result<(), TargetError>;

    /// Remove the entity behind `target_ref`.
    async fn delete(&self, target_ref: &str) -> Result<(), TargetError>;

    /// Look up an entity reference by source id. The reconciler never
    /// needs this (the ledger caches refs), but operators do when
    /// repairing a desynced mirror by hand.
    async fn find_by_source_id(&self, source_id: &str) -> Result<Option<String>, TargetError>;
}
