//! The OT half of the sync coordinator: connects an `OtClientStore` to one
//! `OtDoc` per tracked document, ref-counted and generation-guarded.

use std::collections::HashMap;

use change_model::{Change, SyncConfig, SyncError};
use change_shaping::{break_change, ChangeBuilder};
use client_store::OtClientStore;
use doc_state::{OtDoc, SyncingState};
use ot_engine::apply_committed_changes;
use patch_algebra::apply;
use smartstring::alias::String as SmartString;

use crate::handle::{DocHandle, Entry};

pub struct OtCoordinator<S: OtClientStore> {
 store: S,
 config: SyncConfig,
 entries: HashMap<SmartString, Entry<OtDoc>>,
 next_generation: u64,
}

impl<S: OtClientStore> OtCoordinator<S> {
 pub fn new(store: S, config: SyncConfig) -> Self {
 OtCoordinator { store, config, entries: HashMap::new(), next_generation: 0 }
 }

 /// Open a doc: if already open, bump its refcount; otherwise load it from the
 /// store (or start it fresh at an empty state) and replay its pending queue on top.
 pub fn open(&mut self, id: &str) -> Result<DocHandle, SyncError> {
 if let Some(entry) = self.entries.get_mut(id) {
 entry.refcount += 1;
 return Ok(DocHandle { id: id.into(), generation: entry.generation });
 }

 self.store.track_docs(std::slice::from_ref(&SmartString::from(id)))?;
 let stored = self.store.get_doc(id)?;
 let (state, rev, pending) = match stored {
 Some(doc) if !doc.state.is_null() => (doc.state, doc.rev, doc.pending),
 Some(doc) => (serde_json::Value::Object(Default::default()), doc.rev, doc.pending),
 None => (serde_json::Value::Object(Default::default()), 0, Vec::new()),
 };

 let mut doc = OtDoc::new(id, state, rev);
 if !pending.is_empty() {
 doc.apply_changes(&pending)?;
 }

 let generation = self.next_generation;
 self.next_generation += 1;
 self.entries.insert(id.into(), Entry { doc, refcount: 1, generation });
 Ok(DocHandle { id: id.into(), generation })
 }

 /// Drop a reference; the doc's in-memory entry is torn down once the last handle closes
 ///. A stale handle (already invalidated by a prior close) is a no-op, not an error --
 /// "cancellation: operations complete but their side effects are dropped".
 pub fn close(&mut self, handle: &DocHandle) {
 let Some(entry) = self.entries.get_mut(handle.id.as_str()) else { return };
 if entry.generation != handle.generation {
 return;
 }
 entry.refcount = entry.refcount.saturating_sub(1);
 if entry.refcount == 0 {
 self.entries.remove(handle.id.as_str());
 }
 }

 fn live_entry(&mut self, handle: &DocHandle) -> Result<&mut Entry<OtDoc>, SyncError> {
 let entry = self
.entries
.get_mut(handle.id.as_str())
.ok_or_else(|| SyncError::Validation(format!("doc {} is not open", handle.id)))?;
 if entry.generation != handle.generation {
 return Err(SyncError::Validation(format!("stale handle for doc {}", handle.id)));
 }
 Ok(entry)
 }

 pub fn state(&self, handle: &DocHandle) -> Option<&serde_json::Value> {
 self.entries.get(handle.id.as_str()).filter(|e| e.generation == handle.generation).map(|e| e.doc.state())
 }

 /// `change(mutator)`: capture ops, turn them into one or more pending `Change`s
 /// (splitting if oversized), apply them locally, and persist them -- the synchronous
 /// equivalent of "the coordinator re-enters via `applyChanges` once the algorithm has produced
 /// Change records."
 pub fn change(
 &mut self,
 handle: &DocHandle,
 id_factory: impl FnOnce(u64) -> SmartString,
 now: i64,
 mutator: impl FnOnce(&mut ChangeBuilder),
 ) -> Result<Vec<Change>, SyncError> {
 let entry = self.live_entry(handle)?;
 let ops = entry.doc.change(mutator);
 if ops.is_empty() {
 return Ok(Vec::new());
 }

 apply(entry.doc.state(), &ops, true)?;

 let last_pending_rev = entry.doc.pending().last().map(|c| c.rev);
 let rev = last_pending_rev.map(|r| r + 1).unwrap_or(entry.doc.committed_rev() + 1);
 let base = Change {
 id: id_factory(rev),
 rev,
 base_rev: entry.doc.committed_rev(),
 ops,
 created_at: now,
 committed_at: 0,
 metadata: None,
 batch_id: None,
 };
 let pieces = break_change(&base, self.config.max_payload_bytes);

 let entry = self.live_entry(handle)?;
 entry.doc.apply_changes(&pieces)?;
 self.store.save_pending_changes(handle.id.as_str(), &pieces)?;
 Ok(pieces)
 }

 /// Fold a server push into the open doc: `applyCommittedChanges` (spec §4.3) folds
 /// `server_changes` into committed state -- including the root-replace catchup exception to
 /// the rev-contiguity check -- and rebases pending on top in one step; persist the outcome
 /// atomically via the store. Leaves `syncing` as `Error(..)` with pending intact on failure,
 /// never swallowing it silently.
 pub fn receive_server_changes(&mut self, handle: &DocHandle, server_changes: &[Change]) -> Result<(), SyncError> {
 let entry = self.live_entry(handle)?;
 entry.doc.set_syncing(SyncingState::Syncing);

 let result = (|| {
 let local_pending = entry.doc.pending().to_vec();
 let Some(folded) = apply_committed_changes(
 entry.doc.committed_state(),
 entry.doc.committed_rev(),
 &local_pending,
 server_changes,
 )?
 else {
 return Ok(());
 };

 entry.doc.fold_committed(folded.committed_state, folded.committed_rev, folded.rebased_pending.clone())?;
 self.store.apply_server_changes(handle.id.as_str(), server_changes, &folded.rebased_pending)?;
 Ok(())
 })();

 let entry = self.live_entry(handle)?;
 match &result {
 Ok(()) => entry.doc.set_syncing(SyncingState::Idle),
 Err(e) => entry.doc.set_syncing(SyncingState::Error(e.clone())),
 }
 result
 }

 /// `import(snapshot)`: catchup/recovery reset from a server-provided full state.
 pub fn import(&mut self, handle: &DocHandle, state: serde_json::Value, rev: u64) -> Result<(), SyncError> {
 let entry = self.live_entry(handle)?;
 entry.doc.import(state, rev)
 }
}

#[cfg(test)]
mod test {
 use super::*;
 use client_store::InMemoryOtStore;
 use serde_json::json;

 fn coordinator() -> OtCoordinator<InMemoryOtStore> {
 OtCoordinator::new(InMemoryOtStore::new(200), SyncConfig::default())
 }

 #[test]
 fn open_then_change_persists_pending_through_the_store() {
 let mut coord = coordinator();
 let handle = coord.open("d1").unwrap();
 let changes = coord.change(&handle, |rev| format!("c{rev}").into(), 0, |b| { b.add("/x", json!(1)); }).unwrap();
 assert_eq!(changes.len(), 1);
 assert_eq!(coord.state(&handle), Some(&json!({"x": 1})));

 let pending = coord.store.get_pending_changes("d1").unwrap();
 assert_eq!(pending.len(), 1);
 }

 #[test]
 fn second_open_shares_the_same_entry_via_refcount() {
 let mut coord = coordinator();
 let h1 = coord.open("d1").unwrap();
 let h2 = coord.open("d1").unwrap();
 assert_eq!(h1.generation, h2.generation);
 assert_eq!(coord.entries.get("d1").unwrap().refcount, 2);
 }

 #[test]
 fn close_all_references_tears_down_the_entry() {
 let mut coord = coordinator();
 let h1 = coord.open("d1").unwrap();
 let h2 = coord.open("d1").unwrap();
 coord.close(&h1);
 assert!(coord.entries.contains_key("d1"));
 coord.close(&h2);
 assert!(!coord.entries.contains_key("d1"));
 }

 #[test]
 fn stale_handle_after_close_is_rejected() {
 let mut coord = coordinator();
 let handle = coord.open("d1").unwrap();
 coord.close(&handle);
 let result = coord.change(&handle, |rev| format!("c{rev}").into(), 0, |b| { b.add("/x", json!(1)); });
 assert!(result.is_err());
 }

 #[test]
 fn receive_server_changes_rebases_pending_and_persists_atomically() {
 let mut coord = coordinator();
 let handle = coord.open("d1").unwrap();
 coord.change(&handle, |_| "local".into(), 0, |b| { b.add("/b", json!(1)); }).unwrap();

 let server = Change { id: "server".into(), rev: 1, base_rev: 0, ops: vec![patch_algebra::Op::add("/a", json!(9))], created_at: 0, committed_at: 5, metadata: None, batch_id: None };
 coord.receive_server_changes(&handle, std::slice::from_ref(&server)).unwrap();

 assert_eq!(coord.state(&handle), Some(&json!({"a": 9, "b": 1})));
 let stored = coord.store.get_doc("d1").unwrap().unwrap();
 assert_eq!(stored.rev, 1);
 assert_eq!(stored.pending.len(), 1);
 }

 #[test]
 fn receive_server_changes_accepts_a_catchup_snapshot_despite_the_rev_gap() {
 let mut coord = coordinator();
 let handle = coord.open("d1").unwrap();

 let full = json!({"a": 1, "b": 2});
 let catchup = Change {
 id: "catchup".into(),
 rev: 500,
 base_rev: 0,
 ops: vec![patch_algebra::Op::replace("", full.clone())],
 created_at: 0,
 committed_at: 5,
 metadata: None,
 batch_id: None,
 };
 coord.receive_server_changes(&handle, std::slice::from_ref(&catchup)).unwrap();

 assert_eq!(coord.state(&handle), Some(&full));
 let stored = coord.store.get_doc("d1").unwrap().unwrap();
 assert_eq!(stored.rev, 500);
 }
}
