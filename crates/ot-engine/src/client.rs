//! Client half of the OT engine: rebasing pending changes against newly committed
//! server changes, and folding server changes into the committed snapshot.

use std::collections::HashSet;

use change_model::{Change, SyncError};
use patch_algebra::{transform, Op};
use serde_json::Value;

/// Transform `ops` as if `against` (already applied) had landed first. Flattens per-op results in
/// order; an op that transforms away entirely is simply absent from the result.
pub fn transform_incoming_ops(ops: &[Op], against: &[Op], priority: bool) -> Vec<Op> {
 ops.iter().flat_map(|op| transform(op, against, priority)).collect()
}

/// `rebaseChanges`: drop any local pending change the server already has (by id), then transform
/// the rest against the concatenated server ops so they can be replayed on top of the new
/// committed state.
pub fn rebase_changes(server_changes: &[Change], local_pending: &[Change], last_server_rev: u64) -> Vec<Change> {
 let server_ids: HashSet<&str> = server_changes.iter().map(|c| c.id.as_str()).collect();
 let server_ops: Vec<Op> = server_changes.iter().flat_map(|c| c.ops.iter().cloned()).collect();

 let mut out = Vec::new();
 let mut next_rev = last_server_rev;
 for change in local_pending {
 if server_ids.contains(change.id.as_str()) {
 continue;
 }
 let transformed = transform_incoming_ops(&change.ops, &server_ops, true);
 if transformed.is_empty() {
 continue;
 }
 next_rev += 1;
 out.push(Change {
 id: change.id.clone(),
 rev: next_rev,
 base_rev: last_server_rev,
 ops: transformed,
 created_at: change.created_at,
 committed_at: 0,
 metadata: change.metadata.clone(),
 batch_id: change.batch_id.clone(),
 });
 }
 out
}

pub struct ApplyCommittedResult {
 pub committed_state: Value,
 pub committed_rev: u64,
 pub rebased_pending: Vec<Change>,
}

/// `applyCommittedChanges`: fold newly committed server changes into the committed snapshot and
/// rebase pending on top of the result.
pub fn apply_committed_changes(
 committed_state: &Value,
 committed_rev: u64,
 pending: &[Change],
 server_changes: &[Change],
) -> Result<Option<ApplyCommittedResult>, SyncError> {
 let mut new_changes: Vec<&Change> = server_changes.iter().filter(|c| c.rev > committed_rev).collect();
 new_changes.sort_by_key(|c| c.rev);
 if new_changes.is_empty() {
 return Ok(None);
 }

 let first = new_changes[0];
 let is_catchup = committed_rev == 0
 && first.ops.len() == 1
 && matches!(&first.ops[0], Op::Replace { path,.. } if path.is_empty());
 if !is_catchup && first.rev != committed_rev + 1 {
 return Err(SyncError::SessionMissing { expected_rev: committed_rev + 1, got_rev: first.rev });
 }

 let mut state = committed_state.clone();
 for change in &new_changes {
 state = patch_algebra::apply(&state, &change.ops, true)
.map_err(|e| SyncError::TransformApply(e.to_string()))?;
 }
 let new_rev = new_changes.last().unwrap().rev;

 let rebased_pending = rebase_changes(
 &new_changes.iter().map(|c| (*c).clone()).collect::<Vec<_>>(),
 pending,
 new_rev,
 );

 Ok(Some(ApplyCommittedResult { committed_state: state, committed_rev: new_rev, rebased_pending }))
}
