//! `LwwDoc` (spec §4.5, §3 "Document replica (LWW)"): a baked-in snapshot plus the timed ops not
//! yet folded into it. Live state is recomputed by resolving the whole op pool (spec §4.4's
//! per-path winner rule) and replaying the winners onto the snapshot.

use change_model::TimedOp;
use change_shaping::ChangeBuilder;
use lww_engine::resolve_lww_set;
use patch_algebra::apply::apply_one;
use patch_algebra::Op;
use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::signal::{Signal, SignalHandle};
use crate::syncing::SyncingState;

pub struct LwwDoc {
 id: SmartString,
 snapshot_state: Value,
 snapshot_rev: u64,
 /// Server-confirmed ops not yet folded into the snapshot, each carrying its assigned `rev`.
 committed_ops: Vec<TimedOp>,
 /// Locally authored ops not yet confirmed by the server (`rev: None`).
 pending_ops: Vec<TimedOp>,
 live_state: Value,
 syncing: SyncingState,
 pub on_change: Signal<Vec<Op>>,
 pub on_update: Signal<()>,
 pub on_syncing: Signal<SyncingState>,
}

impl LwwDoc {
 pub fn new(id: impl Into<SmartString>, snapshot_state: Value, snapshot_rev: u64) -> Self {
 let live_state = snapshot_state.clone();
 LwwDoc {
 id: id.into(),
 snapshot_state,
 snapshot_rev,
 committed_ops: Vec::new(),
 pending_ops: Vec::new(),
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

 /// The highest rev folded in or seen from the server; distinct from a "revision of the whole
 /// document" (LWW has none), but fills the same capability-set slot.
 pub fn committed_rev(&self) -> u64 {
 self.committed_ops.iter().filter_map(|o| o.rev).max().unwrap_or(self.snapshot_rev)
 }

 pub fn has_pending(&self) -> bool {
 !self.pending_ops.is_empty()
 }

 pub fn pending_ops(&self) -> &[TimedOp] {
 &self.pending_ops
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

 pub fn change(&mut self, mutator: impl FnOnce(&mut ChangeBuilder)) -> Vec<Op> {
 let mut builder = ChangeBuilder::new();
 mutator(&mut builder);
 let ops = builder.into_ops();
 if !ops.is_empty() {
 self.on_change.emit(&ops);
 }
 ops
 }

 /// Fold the result of a local `consolidateOps` call into pending: evict the
 /// reported paths, then add the ops to save.
 pub fn apply_local_ops(&mut self, ops_to_save: Vec<TimedOp>, paths_to_delete: &[SmartString]) {
 self.pending_ops.retain(|op| {
 !paths_to_delete.iter().any(|p| patch_algebra::path::is_at_or_under(op.path(), p))
 });
 self.pending_ops.extend(ops_to_save);
 self.recompute_live();
 self.on_update.emit(&());
 }

 /// `applyServerChanges` (LWW, spec §4.4/§4.6): fold newly committed field ops into the
 /// server-confirmed set, drop any pending op now confirmed (same path + ts), recompute.
 pub fn apply_server_changes(&mut self, server_ops: &[TimedOp]) {
 let merged = resolve_lww_set(
 self.committed_ops.iter().cloned().map(|o| (o, false))
.chain(server_ops.iter().cloned().map(|o| (o, false))),
 );
 self.committed_ops = merged;
 self.pending_ops.retain(|p| !server_ops.iter().any(|s| s.path() == p.path() && s.ts == p.ts));
 self.recompute_live();
 self.on_update.emit(&());
 }

 pub fn import(&mut self, state: Value, rev: u64) {
 self.snapshot_state = state.clone();
 self.snapshot_rev = rev;
 self.committed_ops.clear();
 self.pending_ops.clear();
 self.live_state = state;
 self.on_update.emit(&());
 }

 fn recompute_live(&mut self) {
 let winners = resolve_lww_set(
 self.committed_ops.iter().cloned().map(|o| (o, false))
.chain(self.pending_ops.iter().cloned().map(|o| (o, true))),
 );
 let mut state = self.snapshot_state.clone();
 for op in &winners {
 // non-strict: a malformed/incompatible op shouldn't take the whole doc down, it's
 // simply dropped from the reconstructed view (spec §4.1 non-strict mode).
 let _ = apply_one(&mut state, &op.op, false);
 }
 self.live_state = state;
 }
}
