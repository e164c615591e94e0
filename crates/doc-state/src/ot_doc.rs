//! `OtDoc`: the OT variant of `Doc`. Committed state plus an ordered pending queue;
//! live state is the committed state with pending replayed on top.

use change_model::{Change, SyncError};
use change_shaping::ChangeBuilder;
use patch_algebra::{apply, Op};
use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::signal::{Signal, SignalHandle};
use crate::syncing::SyncingState;

pub struct OtDoc {
 id: SmartString,
 committed_state: Value,
 committed_rev: u64,
 pending: Vec<Change>,
 live_state: Value,
 syncing: SyncingState,
 pub on_change: Signal<Vec<Op>>,
 pub on_update: Signal<()>,
 pub on_syncing: Signal<SyncingState>,
}

impl OtDoc {
 pub fn new(id: impl Into<SmartString>, committed_state: Value, committed_rev: u64) -> Self {
 let live_state = committed_state.clone();
 OtDoc {
 id: id.into(),
 committed_state,
 committed_rev,
 pending: Vec::new(),
 live_state,
 syncing: SyncingState::Idle,
 on_change: Signal::new(),
 on_update: Signal::new(),
 on_syncing: Signal::new(),
 }
 }

 pub fn id(&self) -> &str {
 &self.id
 }

 pub fn state(&self) -> &Value {
 &self.live_state
 }

 pub fn committed_rev(&self) -> u64 {
 self.committed_rev
 }

 pub fn committed_state(&self) -> &Value {
 &self.committed_state
 }

 pub fn pending(&self) -> &[Change] {
 &self.pending
 }

 pub fn has_pending(&self) -> bool {
 !self.pending.is_empty()
 }

 pub fn syncing(&self) -> &SyncingState {
 &self.syncing
 }

 pub fn set_syncing(&mut self, state: SyncingState) {
 self.syncing = state.clone();
 self.on_syncing.emit(&state);
 }

 pub fn subscribe_change(&mut self, listener: impl FnMut(&Vec<Op>) + 'static) -> SignalHandle {
 self.on_change.subscribe(listener)
 }

 pub fn subscribe_update(&mut self, listener: impl FnMut(&()) + 'static) -> SignalHandle {
 self.on_update.subscribe(listener)
 }

 /// Run `mutator` against a builder over live state and emit the recorded ops via `onChange`.
 /// Deliberately does NOT apply them locally -- the coordinator re-enters via `apply_changes`
 /// once `make_change` has turned these ops into a real `Change`.
 pub fn change(&mut self, mutator: impl FnOnce(&mut ChangeBuilder)) -> Vec<Op> {
 let mut builder = ChangeBuilder::new();
 mutator(&mut builder);
 let ops = builder.into_ops();
 if !ops.is_empty() {
 self.on_change.emit(&ops);
 }
 ops
 }

 /// `applyChanges`: dispatch by whether the batch opens with committed changes
 /// (a server push, optionally followed by the already-rebased pending tail) or a single local
 /// change (`committed_at == 0`, simply appended to pending).
 pub fn apply_changes(&mut self, changes: &[Change]) -> Result<(), SyncError> {
 let Some(first) = changes.first() else { return Ok(()) };

 if first.is_committed() {
 let split = changes.iter().position(|c| !c.is_committed()).unwrap_or(changes.len());
 let (committed, rebased_pending) = changes.split_at(split);
 let first_committed = &committed[0];
 if self.committed_rev + 1 != first_committed.rev {
 return Err(SyncError::SessionMissing {
 expected_rev: self.committed_rev + 1,
 got_rev: first_committed.rev,
 });
 }
 let mut state = self.committed_state.clone();
 for change in committed {
 state = apply(&state, &change.ops, true)?;
 }
 self.committed_state = state;
 self.committed_rev = committed.last().unwrap().rev;
 self.pending = rebased_pending.to_vec();
 } else {
 self.pending.extend_from_slice(changes);
 }

 self.recompute_live()?;
 self.on_update.emit(&());
 Ok(())
 }

 /// Fold an already-validated `applyCommittedChanges` result (spec §4.3) directly into the doc:
 /// the rev-contiguity check (including the root-replace catchup exception) and the pending
 /// rebase both already happened in `ot_engine::apply_committed_changes`, so this just commits
 /// the outcome and recomputes live state.
 pub fn fold_committed(
 &mut self,
 new_committed_state: Value,
 new_committed_rev: u64,
 rebased_pending: Vec<Change>,
 ) -> Result<(), SyncError> {
 self.committed_state = new_committed_state;
 self.committed_rev = new_committed_rev;
 self.pending = rebased_pending;
 self.recompute_live()?;
 self.on_update.emit(&());
 Ok(())
 }

 /// `import(snapshot)`: reset state and pending from a server-provided full
 /// snapshot (catchup / recovery).
 pub fn import(&mut self, state: Value, rev: u64) -> Result<(), SyncError> {
 self.committed_state = state;
 self.committed_rev = rev;
 self.pending.clear();
 self.recompute_live()?;
 self.on_update.emit(&());
 Ok(())
 }

 fn recompute_live(&mut self) -> Result<(), SyncError> {
 let mut state = self.committed_state.clone();
 for change in &self.pending {
 state = apply(&state, &change.ops, true)?;
 }
 self.live_state = state;
 Ok(())
 }
}
