//! The reconciliation engine: diff the fetched snapshot against the
//! ledger, classify every event, apply mutations to the target store, and
//! record outcomes.
//!
//! Ordering invariants:
//! - the add/update pass runs before the delete pass;
//! - a ledger entry changes only after the corresponding remote mutation
//!   succeeded, never before;
//! - the durable commit happens once, after both passes, in [`run_sync`].
//!
//! The failure window is therefore always "remote was mutated but the
//! ledger was not updated yet", which the next run re-derives as pending
//! work. The reverse (ledger ahead of remote) can never happen.

use url::Url;

use crate::error::{Result, TargetError};
use crate::feed::Fetcher;
use crate::ledger::{Ledger, LedgerStore};
use crate::model::{LedgerRecord, Snapshot};
use crate::target::TargetStore;

/// One remote mutation actually performed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Created { source_id: String, target_ref: String },
    Updated { source_id: String, target_ref: String },
    Deleted { source_id: String, target_ref: String },
}

/// Pure classification of a snapshot against a ledger, before any side
/// effect. Drives `sync --dry-run` and the property tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Snapshot ids with no ledger record.
    pub to_create: Vec<String>,
    /// Snapshot ids whose `modified_at` is strictly newer than the ledger's.
    pub to_update: Vec<String>,
    /// Ledger ids absent from the snapshot.
    pub to_delete: Vec<String>,
    /// Snapshot ids already at the ledger's version (or older).
    pub unchanged: Vec<String>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Classify every event without touching the target store or the ledger.
pub fn plan(snapshot: &Snapshot, ledger: &Ledger) -> Plan {
    let mut plan = Plan::default();

    for event in snapshot.iter() {
        match ledger.get(&event.id) {
            None => plan.to_create.push(event.id.clone()),
            Some(record) if event.modified_at > record.modified_at => {
                plan.to_update.push(event.id.clone())
            }
            Some(_) => plan.unchanged.push(event.id.clone()),
        }
    }

    plan.to_delete = ledger
        .source_ids()
        .filter(|id| !snapshot.contains(id))
        .map(|id| id.to_string())
        .collect();

    plan
}

/// What one run did, per classification. Per-event failures are counted
/// here; only feed and ledger failures abort a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Malformed feed events skipped before reconciliation.
    pub skipped: usize,
    /// Target mutations that failed; retried on the next run.
    pub failed: usize,
    /// Remote mutations actually performed, in execution order.
    pub mutations: Vec<Mutation>,
    /// Human-readable descriptions of the per-event failures.
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record_failure(&mut self, operation: &str, source_id: &str, error: TargetError) {
        tracing::warn!(%source_id, operation, error = %error, "target mutation failed");
        self.failed += 1;
        self.errors.push(format!("{operation} {source_id}: {error}"));
    }
}

/// The diff/classify/apply state machine.
pub struct Reconciler<T: TargetStore> {
    target: T,
}

impl<T: TargetStore> Reconciler<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    /// Run both passes over the snapshot, mutating the in-memory ledger
    /// as remote calls succeed. The caller commits the ledger afterwards.
    pub async fn run(&self, snapshot: &Snapshot, ledger: &mut Ledger) -> RunSummary {
        let mut summary = RunSummary::default();

        // Add/update pass. Events are visited in id order, so runs are
        // deterministic and reproducible in tests.
        for event in snapshot.iter() {
            match ledger.get(&event.id) {
                None => match self.target.create(event).await {
                    Ok(target_ref) => {
                        tracing::info!(source_id = %event.id, %target_ref, "created");
                        ledger.upsert(LedgerRecord {
                            source_id: event.id.clone(),
                            target_ref: target_ref.clone(),
                            modified_at: event.modified_at,
                        });
                        summary.created += 1;
                        summary.mutations.push(Mutation::Created {
                            source_id: event.id.clone(),
                            target_ref,
                        });
                    }
                    // No ledger record is written: the event stays "new"
                    // and the create is retried next run.
                    Err(e) => summary.record_failure("create", &event.id, e),
                },
                Some(record) => {
                    if event.modified_at > record.modified_at {
                        let target_ref = record.target_ref.clone();
                        match self.target.update(&target_ref, event).await {
                            Ok(()) => {
                                tracing::info!(source_id = %event.id, %target_ref, "updated");
                                ledger.upsert(LedgerRecord {
                                    source_id: event.id.clone(),
                                    target_ref: target_ref.clone(),
                                    modified_at: event.modified_at,
                                });
                                summary.updated += 1;
                                summary.mutations.push(Mutation::Updated {
                                    source_id: event.id.clone(),
                                    target_ref,
                                });
                            }
                            Err(e) => summary.record_failure("update", &event.id, e),
                        }
                    } else {
                        // Already applied, or a feed clock anomaly. Never
                        // regress the target to an older source version.
                        summary.unchanged += 1;
                    }
                }
            }
        }

        // Delete pass, strictly over the stale set computed up front.
        let stale: Vec<(String, String)> = ledger
            .iter()
            .filter(|r| !snapshot.contains(&r.source_id))
            .map(|r| (r.source_id.clone(), r.target_ref.clone()))
            .collect();

        for (source_id, target_ref) in stale {
            match self.target.delete(&target_ref).await {
                Ok(()) => {
                    tracing::info!(%source_id, %target_ref, "deleted");
                    ledger.remove(&source_id);
                    summary.deleted += 1;
                    summary.mutations.push(Mutation::Deleted {
                        source_id,
                        target_ref,
                    });
                }
                // Record stays: the entity might still exist remotely,
                // so the delete is retried next run.
                Err(e) => summary.record_failure("delete", &source_id, e),
            }
        }

        summary
    }
}

/// One full run: load the ledger, fetch the snapshot, reconcile, commit.
///
/// Fatal failures ([`SyncError`](crate::error::SyncError)) abort before
/// or after the apply phase; per-event failures only show up in the
/// returned summary. The commit is batched: exactly one durable write
/// per run.
pub async fn run_sync<T: TargetStore>(
    fetcher: &Fetcher,
    feed_url: &Url,
    store: &LedgerStore,
    target: T,
) -> Result<RunSummary> {
    let mut ledger = store.load()?;
    tracing::info!(records = ledger.len(), "ledger loaded");

    let fetched = fetcher.fetch(feed_url).await?;
    tracing::info!(
        events = fetched.snapshot.len(),
        malformed = fetched.malformed.len(),
        "snapshot fetched"
    );

    let reconciler = Reconciler::new(target);
    let mut summary = reconciler.run(&fetched.snapshot, &mut ledger).await;
    summary.skipped = fetched.malformed.len();

    store.commit(&ledger)?;
    Ok(summary)
}
