//! `mergeBranch` / `closeBranch`.

use change_model::{Branch, BranchStatus, Change, SyncConfig, SyncError, TimedOp};
use ot_engine::server::CommitResponse;
use server_store::{BranchStore, LwwServerLog, OtServerLog};

fn load_open_branch(branch_store: &impl BranchStore, branch_id: &str) -> Result<Branch, SyncError> {
 let branch = branch_store
.get(branch_id)
.ok_or_else(|| SyncError::Validation(format!("no such branch {branch_id}")))?;
 if !branch.status.accepts_commits() {
 return Err(SyncError::Validation(format!("branch {branch_id} is {:?} and cannot be merged", branch.status)));
 }
 Ok(branch)
}

/// Collapse every change made in the branch since it forked into one batch, and commit it to the
/// source doc at `branch.branched_at_rev` -- the source's own commit pipeline transforms it
/// against whatever the source has committed since then (spec: "transforms against any source
/// progress").
pub fn merge_branch_ot(
 source_log: &mut impl OtServerLog,
 branch_log: &impl OtServerLog,
 branch_store: &mut impl BranchStore,
 config: &SyncConfig,
 branch_id: &str,
 now: i64,
) -> Result<CommitResponse, SyncError> {
 let mut branch = load_open_branch(branch_store, branch_id)?;
 let branch_changes = branch_log.changes_since(branch_id, 0);
 let merged_ops = branch_changes.iter().flat_map(|c| c.ops.iter().cloned()).collect();

 let collapsed = Change {
 id: format!("branch-merge-{branch_id}-{now}").into(),
 rev: 0,
 base_rev: branch.branched_at_rev,
 ops: merged_ops,
 created_at: now,
 committed_at: 0,
 metadata: None,
 batch_id: None,
 };

 let response = server_store::commit_ot(source_log, &branch.doc_id, vec![collapsed], config, now, false)?;

 branch.status = BranchStatus::Merged;
 branch_store.save(branch);
 Ok(response)
}

/// Field-op replay: the branch's recorded ops are just replayed into the source log,
/// where per-path timestamp resolution decides the winner same as any other incoming batch.
pub fn merge_branch_lww(
 source_log: &mut impl LwwServerLog,
 branch_log: &impl LwwServerLog,
 branch_store: &mut impl BranchStore,
 branch_id: &str,
) -> Result<Vec<TimedOp>, SyncError> {
 let mut branch = load_open_branch(branch_store, branch_id)?;
 let branch_ops = branch_log.ops(branch_id);
 let result = server_store::commit_lww(source_log, &branch.doc_id, &branch_ops);

 branch.status = BranchStatus::Merged;
 branch_store.save(branch);
 Ok(result.persisted)
}

/// `closeBranch`: update `status` to one of `closed|archived|abandoned`. A branch
/// already `merged` stays merged in spirit but this doesn't forbid relabeling it -- the caller
/// decides which terminal status applies.
pub fn close_branch(branch_store: &mut impl BranchStore, branch_id: &str, status: BranchStatus) -> Result<(), SyncError> {
 let mut branch = branch_store
.get(branch_id)
.ok_or_else(|| SyncError::Validation(format!("no such branch {branch_id}")))?;
 branch.status = status;
 branch_store.save(branch);
 Ok(())
}

#[cfg(test)]
mod test {
 use super::*;
 use patch_algebra::Op;
 use serde_json::json;
 use server_store::{InMemoryBranchStore, InMemoryLwwServerLog, InMemoryOtServerLog};

 fn change(id: &str, base_rev: u64, ops: Vec<Op>) -> Change {
 Change { id: id.into(), rev: 0, base_rev, ops, created_at: 0, committed_at: 0, metadata: None, batch_id: None }
 }

 #[test]
 fn merge_branch_ot_commits_branch_changes_to_source() {
 let mut source = InMemoryOtServerLog::new();
 source.create_doc("source", json!({"a": 1}));
 let mut branch_log = InMemoryOtServerLog::new();
 branch_log.create_doc("b1", json!({"a": 1}));

 let config = SyncConfig::default();
 let mut branches = InMemoryBranchStore::new();
 branches.save(Branch { id: "b1".into(), doc_id: "source".into(), branched_at_rev: 0, status: BranchStatus::Open, name: None, metadata: None });

 server_store::commit_ot(&mut branch_log, "b1", vec![change("c1", 0, vec![Op::replace("/a", json!(2))])], &config, 0, false).unwrap();

 let response = merge_branch_ot(&mut source, &branch_log, &mut branches, &config, "b1", 1).unwrap();
 assert_eq!(response.committed_changes.len(), 1);
 assert_eq!(branches.get("b1").unwrap().status, BranchStatus::Merged);
 }

 #[test]
 fn merge_branch_lww_replays_field_ops_into_source() {
 let mut source = InMemoryLwwServerLog::new();
 source.create_doc("source", json!({"title": "orig"}));
 let mut branch_log = InMemoryLwwServerLog::new();
 branch_log.create_doc("b1", json!({"title": "orig"}));

 let mut branches = InMemoryBranchStore::new();
 branches.save(Branch { id: "b1".into(), doc_id: "source".into(), branched_at_rev: 0, status: BranchStatus::Open, name: None, metadata: None });

 server_store::commit_lww(&mut branch_log, "b1", &[TimedOp { op: Op::replace("/title", json!("branched")), ts: 5, rev: None }]);

 merge_branch_lww(&mut source, &branch_log, &mut branches, "b1").unwrap();
 assert_eq!(source.reconstruct("source"), json!({"title": "branched"}));
 assert_eq!(branches.get("b1").unwrap().status, BranchStatus::Merged);
 }

 #[test]
 fn closed_branch_rejects_further_merge_attempts() {
 let mut source = InMemoryOtServerLog::new();
 source.create_doc("source", json!({}));
 let branch_log = InMemoryOtServerLog::new();
 let config = SyncConfig::default();
 let mut branches = InMemoryBranchStore::new();
 branches.save(Branch { id: "b1".into(), doc_id: "source".into(), branched_at_rev: 0, status: BranchStatus::Closed, name: None, metadata: None });

 let result = merge_branch_ot(&mut source, &branch_log, &mut branches, &config, "b1", 0);
 assert!(result.is_err());
 }

 #[test]
 fn close_branch_updates_status() {
 let mut branches = InMemoryBranchStore::new();
 branches.save(Branch { id: "b1".into(), doc_id: "source".into(), branched_at_rev: 0, status: BranchStatus::Open, name: None, metadata: None });
 close_branch(&mut branches, "b1", BranchStatus::Archived).unwrap();
 assert_eq!(branches.get("b1").unwrap().status, BranchStatus::Archived);
 }
}
