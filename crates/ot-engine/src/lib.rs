//! OT reconciliation: client-side rebase/catchup and the server's commit pipeline,
//! built entirely on `patch-algebra`'s `transform`/`apply`.

pub mod client;
pub mod server;

pub use client::{apply_committed_changes, rebase_changes, transform_incoming_ops, ApplyCommittedResult};
pub use server::{commit_changes, get_snapshot_at_revision, get_state_at_revision, CommitRequest, CommitResponse, SnapshotAtRevision};
