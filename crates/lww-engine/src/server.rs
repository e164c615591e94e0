//! Server-side LWW commit (spec §4.4 "Server commit (LWW)"): persist incoming field ops with a
//! server-assigned monotonic `rev`, applying the same field-level-LWW/combine/evict rules as
//! `consolidateOps`, then hand the caller back exactly what to broadcast.

use std::collections::HashMap;

use change_model::TimedOp;
use smartstring::alias::String as SmartString;

use crate::consolidate::resolve_incoming;

pub struct ServerApplyResult {
 /// Ops now persisted, each stamped with its freshly-assigned `rev` -- this is also the
 /// broadcast payload (spec: "the broadcast message contains the newly persisted ops with
 /// their assigned rev").
 pub persisted: Vec<TimedOp>,
 /// Paths the store should evict (the override/eviction half of the same rule).
 pub paths_evicted: Vec<SmartString>,
}

/// Apply a batch of incoming ops (not yet given a `rev`) against `existing` (the doc's current
/// persisted field ops, indexed by path), assigning each surviving/merged op the next rev via
/// `next_rev`.
pub fn apply_incoming_ops(
 existing: &[TimedOp],
 incoming: &[TimedOp],
 mut next_rev: impl FnMut() -> u64,
) -> ServerApplyResult {
 let by_path: HashMap<SmartString, TimedOp> = existing.iter().map(|o| (o.path().into(), o.clone())).collect();
 let (_, mut ops_to_save, paths_to_delete) = resolve_incoming(by_path, incoming);

 for op in ops_to_save.iter_mut() {
 op.rev = Some(next_rev());
 }

 ServerApplyResult { persisted: ops_to_save, paths_evicted: paths_to_delete }
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
 fn assigns_sequential_revs_to_persisted_ops() {
 let incoming = vec![
 timed(Op::replace("/a", json!(1)), 10),
 timed(Op::replace("/b", json!(2)), 11),
 ];
 let mut counter = 0u64;
 let result = apply_incoming_ops(&[], &incoming, || { counter += 1; counter });
 assert_eq!(result.persisted.len(), 2);
 assert_eq!(result.persisted[0].rev, Some(1));
 assert_eq!(result.persisted[1].rev, Some(2));
 }

 #[test]
 fn combinable_merge_gets_a_fresh_rev_too() {
 let existing = vec![TimedOp { op: Op::Inc { path: "/n".into(), n: 1.0 }, ts: 5, rev: Some(1) }];
 let incoming = vec![timed(Op::Inc { path: "/n".into(), n: 4.0 }, 10)];
 let mut counter = 10u64;
 let result = apply_incoming_ops(&existing, &incoming, || { counter += 1; counter });
 assert_eq!(result.persisted.len(), 1);
 assert_eq!(result.persisted[0].op, Op::Inc { path: "/n".into(), n: 5.0 });
 assert_eq!(result.persisted[0].rev, Some(11));
 }

 #[test]
 fn dropped_op_consumes_no_rev() {
 let existing = vec![TimedOp { op: Op::replace("/a", json!(1)), ts: 100, rev: Some(1) }];
 let incoming = vec![timed(Op::replace("/a", json!(2)), 10)];
 let mut counter = 0u64;
 let result = apply_incoming_ops(&existing, &incoming, || { counter += 1; counter });
 assert!(result.persisted.is_empty());
 assert_eq!(counter, 0);
 }

 #[test]
 fn parent_write_reports_eviction_of_child_path() {
 let existing = vec![TimedOp { op: Op::replace("/obj/x", json!(1)), ts: 1, rev: Some(1) }];
 let incoming = vec![timed(Op::replace("/obj", json!({"x": 2})), 2)];
 let mut counter = 0u64;
 let result = apply_incoming_ops(&existing, &incoming, || { counter += 1; counter });
 assert_eq!(result.paths_evicted, vec![SmartString::from("/obj")]);
 }
}
