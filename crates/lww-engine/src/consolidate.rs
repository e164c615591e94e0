//! `consolidateOps`: fold a batch of freshly-authored ops into an existing per-path
//! pending set, applying field-level LWW, combinable-op merging, and parent-overrides-child
//! eviction.

use std::collections::HashMap;

use change_model::TimedOp;
use patch_algebra::{compose, path};
use smartstring::alias::String as SmartString;

pub struct ConsolidateResult {
 /// Ops the caller should persist, keyed implicitly by their own `path()` -- a combinable op
 /// replaces the prior persisted op at the same path rather than appending.
 pub ops_to_save: Vec<TimedOp>,
 /// Paths (and everything nested under them) the caller should drop from storage: either a
 /// plain override at that exact path, or a parent write evicting tracked descendants.
 pub paths_to_delete: Vec<SmartString>,
}

/// Shared core of `consolidateOps` (client) and the server's incoming-ops apply: fold `incoming`
/// into `existing`, returning the ops to keep/save and the paths to evict. `existing` is supplied
/// pre-indexed by path so callers that already maintain such an index (the server store) don't
/// pay to rebuild it.
pub(crate) fn resolve_incoming(
 mut by_path: HashMap<SmartString, TimedOp>,
 incoming: &[TimedOp],
) -> (HashMap<SmartString, TimedOp>, Vec<TimedOp>, Vec<SmartString>) {
 let mut ops_to_save = Vec::new();
 let mut paths_to_delete = Vec::new();

 for new_op in incoming {
 let p: SmartString = new_op.path().into();

 if let Some(existing) = by_path.get(&p) {
 if existing.ts > new_op.ts {
 // field-level LWW: the new op is older than what's already there, drop it.
 continue;
 }
 if existing.op.is_combinable() && new_op.op.kind() == existing.op.kind() {
 if let Some(combined) = compose(&existing.op, &new_op.op) {
 let merged = TimedOp { op: combined, ts: existing.ts.max(new_op.ts), rev: None };
 by_path.insert(p.clone(), merged.clone());
 ops_to_save.push(merged);
 continue;
 }
 }
 }

 // plain override: this op's path now supersedes itself and everything nested under it.
 paths_to_delete.push(p.clone());
 by_path.retain(|tracked, _| tracked == &p || !path::is_at_or_under(tracked, &p));
 by_path.insert(p.clone(), new_op.clone());
 ops_to_save.push(new_op.clone());
 }

 (by_path, ops_to_save, paths_to_delete)
}

/// Index a flat op list by path, for callers (like `consolidate_ops`) starting from a plain list.
fn index_by_path(ops: &[TimedOp]) -> HashMap<SmartString, TimedOp> {
 ops.iter().map(|o| (o.path().into(), o.clone())).collect()
}

/// `consolidateOps(existingOps, newOps) -> {opsToSave, pathsToDelete}`.
pub fn consolidate_ops(existing_ops: &[TimedOp], new_ops: &[TimedOp]) -> ConsolidateResult {
 let (_, ops_to_save, paths_to_delete) = resolve_incoming(index_by_path(existing_ops), new_ops);
 ConsolidateResult { ops_to_save, paths_to_delete }
}

#[cfg(test)]
mod test {
 use super::*;
 use patch_algebra::Op;
 use serde_json::json;

 fn timed(op: Op, ts: i64) -> TimedOp {
 TimedOp { op, ts, rev: None }
 }

 #[test]
 fn later_ts_overrides_earlier_at_same_path() {
 let existing = vec![timed(Op::replace("/title", json!("old")), 100)];
 let incoming = vec![timed(Op::replace("/title", json!("new")), 200)];
 let result = consolidate_ops(&existing, &incoming);
 assert_eq!(result.ops_to_save, vec![timed(Op::replace("/title", json!("new")), 200)]);
 assert_eq!(result.paths_to_delete, vec![SmartString::from("/title")]);
 }

 #[test]
 fn earlier_ts_is_dropped() {
 let existing = vec![timed(Op::replace("/title", json!("current")), 200)];
 let incoming = vec![timed(Op::replace("/title", json!("stale")), 100)];
 let result = consolidate_ops(&existing, &incoming);
 assert!(result.ops_to_save.is_empty());
 assert!(result.paths_to_delete.is_empty());
 }

 #[test]
 fn combinable_ops_merge_instead_of_evicting() {
 let existing = vec![timed(Op::Inc { path: "/count".into(), n: 1.0 }, 100)];
 let incoming = vec![timed(Op::Inc { path: "/count".into(), n: 2.0 }, 200)];
 let result = consolidate_ops(&existing, &incoming);
 assert_eq!(result.ops_to_save, vec![timed(Op::Inc { path: "/count".into(), n: 3.0 }, 200)]);
 assert!(result.paths_to_delete.is_empty());
 }

 #[test]
 fn parent_write_evicts_child_op() {
 let existing = vec![timed(Op::replace("/obj/field", json!(1)), 100)];
 let incoming = vec![timed(Op::replace("/obj", json!({"field": 2})), 150)];
 let result = consolidate_ops(&existing, &incoming);
 assert_eq!(result.paths_to_delete, vec![SmartString::from("/obj")]);
 assert_eq!(result.ops_to_save, vec![timed(Op::replace("/obj", json!({"field": 2})), 150)]);
 }

 #[test]
 fn new_path_with_no_prior_op_is_just_saved() {
 let result = consolidate_ops(&[], &[timed(Op::replace("/x", json!(1)), 50)]);
 assert_eq!(result.ops_to_save, vec![timed(Op::replace("/x", json!(1)), 50)]);
 assert_eq!(result.paths_to_delete, vec![SmartString::from("/x")]);
 }
}
