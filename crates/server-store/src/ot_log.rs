//! Server-side OT storage: committed change log with `(docId, rev)` range scans, plus
//! main/offline version snapshots. Wraps `ot_engine::server::commit_changes` with actual state so
//! callers get one `commit` call instead of having to assemble a `CommitRequest` by hand.

use std::collections::{HashMap, HashSet};

use change_model::{Change, SyncConfig, SyncError, VersionMetadata};
use ot_engine::server::{commit_changes, get_state_at_revision, CommitRequest, CommitResponse};
use serde_json::Value;
use smartstring::alias::String as SmartString;

pub trait OtServerLog {
 fn current_rev(&self, doc_id: &str) -> u64;
 fn doc_exists(&self, doc_id: &str) -> bool;
 fn last_committed_at(&self, doc_id: &str) -> i64;
 fn changes_since(&self, doc_id: &str, rev: u64) -> Vec<Change>;
 fn main_versions(&self, doc_id: &str) -> Vec<(VersionMetadata, Value)>;
 fn existing_ids(&self, doc_id: &str, candidate_ids: &[SmartString]) -> HashSet<SmartString>;

 /// Seed a brand new document (or branch target) at `initial_state`, rev 0.
 fn create_doc(&mut self, doc_id: &str, initial_state: Value);

 /// Persist the outcome of a `commit` call: append `committed`, save `offline_versions`, and
 /// (if `needs_main_snapshot`) snapshot `pre_commit_state` as a new main version.
 fn persist_commit(
 &mut self,
 doc_id: &str,
 committed: &[Change],
 offline_versions: &[(VersionMetadata, Value)],
 needs_main_snapshot: bool,
 pre_commit_state: &Value,
 now: i64,
 );
}

/// Run the full `commitChanges` pipeline against `log` for `doc_id` and persist the
/// result. Returns the catchup-plus-newly-committed changes the client gets back.
pub fn commit(
 log: &mut impl OtServerLog,
 doc_id: &str,
 incoming: Vec<Change>,
 config: &SyncConfig,
 now: i64,
 force_commit: bool,
) -> Result<CommitResponse, SyncError> {
 let current_rev = log.current_rev(doc_id);
 let committed_since_base = log.changes_since(doc_id, incoming.first().map(|c| c.base_rev).unwrap_or(0));
 let state_at_base_rev = get_state_at_revision(
 &log.main_versions(doc_id),
 &log.changes_since(doc_id, 0),
 incoming.first().map(|c| c.base_rev),
 )?
.unwrap_or(Value::Null);

 let ids: Vec<SmartString> = incoming.iter().map(|c| c.id.clone()).collect();
 let existing_ids = log.existing_ids(doc_id, &ids);

 let response = commit_changes(CommitRequest {
 current_rev,
 incoming,
 state_at_base_rev: &state_at_base_rev,
 committed_since_base: &committed_since_base,
 existing_ids: &existing_ids,
 last_committed_at: log.last_committed_at(doc_id),
 now,
 config,
 force_commit,
 doc_predates_session: log.doc_exists(doc_id),
 })?;

 log.persist_commit(
 doc_id,
 &response.committed_changes,
 &response.offline_versions,
 response.needs_main_snapshot,
 &state_at_base_rev,
 now,
 );

 Ok(response)
}

struct DocLog {
 changes: Vec<Change>,
 main_versions: Vec<(VersionMetadata, Value)>,
 last_committed_at: i64,
}

impl DocLog {
 fn new(initial_state: Value) -> Self {
 DocLog {
 changes: Vec::new(),
 main_versions: vec![(
 VersionMetadata {
 id: "genesis".into(),
 parent_id: None,
 group_id: None,
 origin: change_model::VersionOrigin::Main,
 started_at: 0,
 ended_at: 0,
 start_rev: 0,
 end_rev: 0,
 base_rev: 0,
 name: None,
 branch_name: None,
 },
 initial_state,
 )],
 last_committed_at: 0,
 }
 }
}

/// Reference `OtServerLog`: an in-process map keyed by `docId`.
#[derive(Default)]
pub struct InMemoryOtServerLog {
 docs: HashMap<SmartString, DocLog>,
}

impl InMemoryOtServerLog {
 pub fn new() -> Self {
 Self::default()
 }
}

impl OtServerLog for InMemoryOtServerLog {
 fn create_doc(&mut self, doc_id: &str, initial_state: Value) {
 self.docs.insert(doc_id.into(), DocLog::new(initial_state));
 }

 fn current_rev(&self, doc_id: &str) -> u64 {
 self.docs.get(doc_id).and_then(|d| d.changes.last()).map(|c| c.rev).unwrap_or(0)
 }

 fn doc_exists(&self, doc_id: &str) -> bool {
 self.docs.contains_key(doc_id)
 }

 fn last_committed_at(&self, doc_id: &str) -> i64 {
 self.docs.get(doc_id).map(|d| d.last_committed_at).unwrap_or(0)
 }

 fn changes_since(&self, doc_id: &str, rev: u64) -> Vec<Change> {
 self.docs
.get(doc_id)
.map(|d| d.changes.iter().filter(|c| c.rev > rev).cloned().collect())
.unwrap_or_default()
 }

 fn main_versions(&self, doc_id: &str) -> Vec<(VersionMetadata, Value)> {
 self.docs.get(doc_id).map(|d| d.main_versions.clone()).unwrap_or_default()
 }

 fn existing_ids(&self, doc_id: &str, candidate_ids: &[SmartString]) -> HashSet<SmartString> {
 let Some(doc) = self.docs.get(doc_id) else { return HashSet::new() };
 candidate_ids
.iter()
.filter(|id| doc.changes.iter().any(|c| &c.id == *id))
.cloned()
.collect()
 }

 fn persist_commit(
 &mut self,
 doc_id: &str,
 committed: &[Change],
 offline_versions: &[(VersionMetadata, Value)],
 needs_main_snapshot: bool,
 pre_commit_state: &Value,
 now: i64,
 ) {
 let doc = self.docs.entry(doc_id.into()).or_insert_with(|| DocLog::new(Value::Null));
 if needs_main_snapshot {
 let current_rev = doc.changes.last().map(|c| c.rev).unwrap_or(0);
 doc.main_versions.push((
 VersionMetadata {
 id: format!("main-{current_rev}-{now}").into(),
 parent_id: doc.main_versions.last().map(|(v, _)| v.id.clone()),
 group_id: None,
 origin: change_model::VersionOrigin::Main,
 started_at: now,
 ended_at: now,
 start_rev: current_rev,
 end_rev: current_rev,
 base_rev: current_rev,
 name: None,
 branch_name: None,
 },
 pre_commit_state.clone(),
 ));
 }
 doc.main_versions.extend(offline_versions.iter().cloned());
 doc.changes.extend_from_slice(committed);
 if let Some(last) = committed.last() {
 doc.last_committed_at = last.committed_at;
 }
 }
}

#[cfg(test)]
mod test {
 use super::*;
 use patch_algebra::Op;
 use serde_json::json;

 fn change(id: &str, base_rev: u64, ops: Vec<Op>) -> Change {
 Change { id: id.into(), rev: 0, base_rev, ops, created_at: 0, committed_at: 0, metadata: None, batch_id: None }
 }

 #[test]
 fn commit_persists_and_bumps_current_rev() {
 let mut log = InMemoryOtServerLog::new();
 log.create_doc("d1", json!({"items": []}));
 let config = SyncConfig::default();

 let response = commit(&mut log, "d1", vec![change("c1", 0, vec![Op::add("/items/0", json!("x"))])], &config, 0, false).unwrap();
 assert_eq!(response.committed_changes.len(), 1);
 assert_eq!(log.current_rev("d1"), 1);
 }

 #[test]
 fn second_client_commit_transforms_against_first() {
 let mut log = InMemoryOtServerLog::new();
 log.create_doc("d1", json!({"items": []}));
 let config = SyncConfig::default();

 commit(&mut log, "d1", vec![change("a", 0, vec![Op::add("/items/0", json!("x"))])], &config, 0, false).unwrap();
 let second = commit(&mut log, "d1", vec![change("b", 0, vec![Op::add("/items/0", json!("y"))])], &config, 0, false).unwrap();

 assert_eq!(second.committed_changes[0].ops, vec![Op::add("/items/1", json!("y"))]);
 assert_eq!(log.current_rev("d1"), 2);
 }

 #[test]
 fn idempotent_retry_is_not_recommitted() {
 let mut log = InMemoryOtServerLog::new();
 log.create_doc("d1", json!({"a": 0}));
 let config = SyncConfig::default();

 commit(&mut log, "d1", vec![change("dup", 0, vec![Op::replace("/a", json!(1))])], &config, 0, false).unwrap();
 let retry = commit(&mut log, "d1", vec![change("dup", 0, vec![Op::replace("/a", json!(1))])], &config, 0, false).unwrap();
 assert!(retry.committed_changes.is_empty());
 assert_eq!(log.current_rev("d1"), 1);
 }
}
