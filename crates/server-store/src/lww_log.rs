//! Server-side LWW storage: field ops indexed by `(docId, path)`. Wraps
//! `lww_engine::server::apply_incoming_ops`.

use std::collections::HashMap;

use change_model::TimedOp;
use lww_engine::server::apply_incoming_ops;
use lww_engine::ServerApplyResult;
use patch_algebra::apply::apply_one;
use serde_json::Value;
use smartstring::alias::String as SmartString;

pub trait LwwServerLog {
 fn ops(&self, doc_id: &str) -> Vec<TimedOp>;
 fn next_rev(&mut self, doc_id: &str) -> u64;
 /// Persist `persisted`, and drop any existing op at a path in `paths_evicted`.
 fn save(&mut self, doc_id: &str, persisted: &[TimedOp], paths_evicted: &[SmartString]);
 fn base_state(&self, doc_id: &str) -> Value;
 /// Seed a brand new document (or branch target) at `base_state`, with no ops yet.
 fn create_doc(&mut self, doc_id: &str, base_state: Value);
}

/// Run `apply_incoming_ops` against `log` for `doc_id`, persist the outcome, and return what the
/// caller should broadcast.
pub fn commit(log: &mut impl LwwServerLog, doc_id: &str, incoming: &[TimedOp]) -> ServerApplyResult {
 let existing = log.ops(doc_id);
 let mut next_rev = || log.next_rev(doc_id);
 let result = apply_incoming_ops(&existing, incoming, &mut next_rev);
 log.save(doc_id, &result.persisted, &result.paths_evicted);
 result
}

struct LwwDocLog {
 base_state: Value,
 ops: HashMap<SmartString, TimedOp>,
 rev_counter: u64,
}

/// Reference `LwwServerLog`: an in-process map keyed by `docId`.
#[derive(Default)]
pub struct InMemoryLwwServerLog {
 docs: HashMap<SmartString, LwwDocLog>,
}

impl InMemoryLwwServerLog {
 pub fn new() -> Self {
 Self::default()
 }

 /// Fold `base_state` with every persisted op (spec §4.4 server-side reconstruction).
 pub fn reconstruct(&self, doc_id: &str) -> Value {
 let Some(doc) = self.docs.get(doc_id) else { return Value::Null };
 let mut state = doc.base_state.clone();
 for op in doc.ops.values() {
 let _ = apply_one(&mut state, &op.op, false);
 }
 state
 }
}

impl LwwServerLog for InMemoryLwwServerLog {
 fn create_doc(&mut self, doc_id: &str, base_state: Value) {
 self.docs.insert(doc_id.into(), LwwDocLog { base_state, ops: HashMap::new(), rev_counter: 0 });
 }

 fn ops(&self, doc_id: &str) -> Vec<TimedOp> {
 self.docs.get(doc_id).map(|d| d.ops.values().cloned().collect()).unwrap_or_default()
 }

 fn next_rev(&mut self, doc_id: &str) -> u64 {
 let doc = self.docs.entry(doc_id.into()).or_insert_with(|| LwwDocLog { base_state: Value::Null, ops: HashMap::new(), rev_counter: 0 });
 doc.rev_counter += 1;
 doc.rev_counter
 }

 fn save(&mut self, doc_id: &str, persisted: &[TimedOp], paths_evicted: &[SmartString]) {
 let doc = self.docs.entry(doc_id.into()).or_insert_with(|| LwwDocLog { base_state: Value::Null, ops: HashMap::new(), rev_counter: 0 });
 for path in paths_evicted {
 doc.ops.remove(path);
 }
 for op in persisted {
 doc.ops.insert(op.path().into(), op.clone());
 }
 }

 fn base_state(&self, doc_id: &str) -> Value {
 self.docs.get(doc_id).map(|d| d.base_state.clone()).unwrap_or(Value::Null)
 }
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
 fn commit_persists_ops_with_assigned_revs() {
 let mut log = InMemoryLwwServerLog::new();
 log.create_doc("d1", json!({"title": "orig"}));

 let result = commit(&mut log, "d1", &[timed(Op::replace("/title", json!("new")), 10)]);
 assert_eq!(result.persisted[0].rev, Some(1));
 assert_eq!(log.reconstruct("d1"), json!({"title": "new"}));
 }

 #[test]
 fn later_commit_respects_earlier_winner_by_timestamp() {
 let mut log = InMemoryLwwServerLog::new();
 log.create_doc("d1", json!({"title": "orig"}));

 commit(&mut log, "d1", &[timed(Op::replace("/title", json!("late")), 100)]);
 commit(&mut log, "d1", &[timed(Op::replace("/title", json!("early")), 10)]);

 assert_eq!(log.reconstruct("d1"), json!({"title": "late"}));
 }

 #[test]
 fn parent_write_evicts_persisted_child_op() {
 let mut log = InMemoryLwwServerLog::new();
 log.create_doc("d1", json!({"obj": {"x": 1}}));

 commit(&mut log, "d1", &[timed(Op::replace("/obj/x", json!(2)), 1)]);
 commit(&mut log, "d1", &[timed(Op::replace("/obj", json!({"x": 9})), 2)]);

 assert_eq!(log.reconstruct("d1"), json!({"obj": {"x": 9}}));
 assert_eq!(log.ops("d1").len(), 1);
 }
}
