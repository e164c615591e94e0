//! `mergeServerWithLocal` and the shared per-path winner resolution it (and
//! `doc-state`'s LWW live-state reconstruction) both need.

use std::collections::HashMap;

use change_model::TimedOp;
use patch_algebra::path;
use smartstring::alias::String as SmartString;

/// Resolve an unordered pool of timed ops -- possibly spanning several paths at different
/// depths -- into the set that actually wins: at each path the highest-`ts` op survives, and any
/// op whose path sits under another surviving op's path is dropped (spec §3: "an op at a path
/// supersedes all child-path ops", independent of relative timestamp). `local_wins_ties` breaks
/// same-path, same-ts ties in favor of ops flagged `is_local`.
pub fn resolve_lww_set(ops: impl IntoIterator<Item = (TimedOp, bool)>) -> Vec<TimedOp> {
 let mut by_path: HashMap<SmartString, (TimedOp, bool)> = HashMap::new();
 for (op, is_local) in ops {
 let p: SmartString = op.path().into();
 match by_path.get(&p) {
 Some((existing, existing_local)) => {
 let new_wins = op.ts > existing.ts || (op.ts == existing.ts && is_local && !existing_local);
 if new_wins {
 by_path.insert(p, (op, is_local));
 }
 }
 None => {
 by_path.insert(p, (op, is_local));
 }
 }
 }

 // Shallowest paths first, so an ancestor is already placed by the time we check its
 // descendants for eviction.
 let mut paths: Vec<SmartString> = by_path.keys().cloned().collect();
 paths.sort_by_key(|p| p.matches('/').count());

 let mut kept: Vec<SmartString> = Vec::new();
 for p in paths {
 let overridden = kept.iter().any(|ancestor| ancestor != &p && path::is_at_or_under(&p, ancestor));
 if !overridden {
 kept.push(p);
 }
 }

 kept.into_iter().map(|p| by_path.remove(&p).unwrap().0).collect()
}

/// `mergeServerWithLocal(serverChanges, localPendingOps)`: per path, the op with the
/// greatest `ts` wins; a local op that ties or exceeds the server op wins over it.
pub fn merge_server_with_local(server_ops: &[TimedOp], local_pending_ops: &[TimedOp]) -> Vec<TimedOp> {
 let pool = server_ops
.iter()
.cloned()
.map(|op| (op, false))
.chain(local_pending_ops.iter().cloned().map(|op| (op, true)));
 resolve_lww_set(pool)
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
 fn scenario_d_tie_goes_to_local() {
 let server = vec![timed(Op::replace("/title", json!("A")), 100)];
 let local = vec![timed(Op::replace("/title", json!("B")), 100)];
 let merged = merge_server_with_local(&server, &local);
 assert_eq!(merged, vec![timed(Op::replace("/title", json!("B")), 100)]);
 }

 #[test]
 fn higher_ts_wins_regardless_of_origin() {
 let server = vec![timed(Op::replace("/title", json!("server")), 200)];
 let local = vec![timed(Op::replace("/title", json!("local")), 100)];
 let merged = merge_server_with_local(&server, &local);
 assert_eq!(merged, vec![timed(Op::replace("/title", json!("server")), 200)]);
 }

 #[test]
 fn disjoint_paths_both_survive() {
 let server = vec![timed(Op::replace("/a", json!(1)), 10)];
 let local = vec![timed(Op::replace("/b", json!(2)), 20)];
 let mut merged = merge_server_with_local(&server, &local);
 merged.sort_by_key(|o| o.path().to_string());
 assert_eq!(merged.len(), 2);
 }

 #[test]
 fn child_dropped_under_overridden_parent_regardless_of_ts() {
 // server wrote the whole `/obj` at ts=50; local's older-looking child write at ts=999
 // still can't survive once its parent has been wholesale replaced.
 let server = vec![timed(Op::replace("/obj", json!({"field": 1})), 50)];
 let local = vec![timed(Op::replace("/obj/field", json!(2)), 999)];
 let merged = merge_server_with_local(&server, &local);
 assert_eq!(merged, vec![timed(Op::replace("/obj", json!({"field": 1})), 50)]);
 }
}
