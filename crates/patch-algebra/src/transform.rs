//! `transform(op_a, op_b, priority)`: given two ops that were both generated against
//! the same state, produce the version of `op_a` that applies cleanly after `op_b` has already
//! been applied. This is the core of the OT engine's rebase step.
//!
//! `priority` breaks ties when both ops write the exact same path: `true` means `op_a` was
//! generated first (or by the side with tie-break priority) and wins; `false` means `op_b` wins
//! and `op_a` is dropped. Callers pick this consistently (e.g. server-assigned revision order)
//! so both sides of a transform converge to the same result.

use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::op::{Op, OpKind};
use crate::path::{self, Segment, Segments};

enum IndexRebase {
 Unaffected,
 Shifted(SmartString),
 Deleted,
}

fn common_array_prefix(a: &Segments, b: &Segments) -> Option<usize> {
 let len = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
 if len < a.len() && len < b.len() { Some(len) } else { None }
}

/// An empty-object value is the "soft merge" case (spec §4.1): it merges into whatever is
/// already there instead of overwriting it, so it doesn't shadow a descendant write the way
/// any other value does.
fn is_soft_merge_value(value: &Value) -> bool {
 matches!(value, Value::Object(m) if m.is_empty())
}

/// If `b` is a plain insert/remove of one array element at `at_idx` under `arr_len`-deep
/// `arr_segs`, rebase `path`'s index at that same depth.
fn rebase_index(path: &str, arr_segs: &Segments, at_idx: usize, delta: i64) -> IndexRebase {
 let segs = path::parse(path);
 if segs.len() <= arr_segs.len() || segs[..arr_segs.len()] != arr_segs[..] {
 return IndexRebase::Unaffected;
 }
 match &segs[arr_segs.len()] {
 Segment::Index(i) => {
 let i = *i;
 if delta < 0 && i == at_idx {
 IndexRebase::Deleted
 } else if (delta < 0 && i > at_idx) || (delta > 0 && i >= at_idx) {
 let new_idx = (i as i64 + delta) as usize;
 let mut new_segs = segs.clone();
 new_segs[arr_segs.len()] = Segment::Index(new_idx);
 IndexRebase::Shifted(path::render(&new_segs))
 } else {
 IndexRebase::Unaffected
 }
 }
 // `/-` always names "the current end", which shifting doesn't change.
 Segment::End => IndexRebase::Unaffected,
 _ => IndexRebase::Unaffected,
 }
}

/// Rebase every path an op touches (its primary path, and `from` for copy/move) against a single
/// array insert (`delta = 1`) or remove (`delta = -1`) at `at_idx` under `arr_segs`.
fn rebase_op_indices(op: &Op, arr_segs: &Segments, at_idx: usize, delta: i64) -> Vec<Op> {
 let mut out = op.clone();
 match rebase_index(out.path(), arr_segs, at_idx, delta) {
 IndexRebase::Unaffected => {}
 IndexRebase::Shifted(p) => out = out.with_path(p),
 IndexRebase::Deleted => return vec![],
 }
 if let Some(from) = out.from_path() {
 match rebase_index(from, arr_segs, at_idx, delta) {
 IndexRebase::Unaffected => {}
 IndexRebase::Shifted(p) => out = out.with_from(p),
 // the element op_a was about to move/copy from no longer exists.
 IndexRebase::Deleted => return vec![],
 }
 }
 vec![out]
}

/// Transform `op_a` against a single already-applied `op_b`.
pub fn transform_one(op_a: &Op, op_b: &Op, priority: bool) -> Vec<Op> {
 let a_segs = path::parse(op_a.path());
 let b_segs = path::parse(op_b.path());

 // Two concurrent `add`s at the exact same array index both land -- the later-transformed
 // one shifts to index+1 instead of being dropped. This isn't priority-gated: both sides of
 // the transform produce a shift, so they still converge. `common_array_prefix`'s `take_while`
 // consumes the shared index segment for an exact-path match, so this case has to be caught
 // before that prefix scan runs.
 if op_a.kind() == OpKind::Add && op_b.kind() == OpKind::Add && op_a.path() == op_b.path() {
 if let Some((Segment::Index(b_idx), arr_segs)) = b_segs.split_last()
 .map(|(last, rest)| (last.clone(), rest.iter().cloned().collect::<Segments>()))
 {
 return rebase_op_indices(op_a, &arr_segs, b_idx, 1);
 }
 }

 // Array structural ops (add/remove of a whole element) shift sibling indices.
 if let Some(common_len) = common_array_prefix(&a_segs, &b_segs) {
 if b_segs.len() == common_len + 1 {
 if let Segment::Index(b_idx) = &b_segs[common_len] {
 let b_idx = *b_idx;
 let arr_segs: Segments = b_segs[..common_len].iter().cloned().collect();
 match op_b.kind() {
 OpKind::Add if !op_a.is_combinable() => {
 return rebase_op_indices(op_a, &arr_segs, b_idx, 1);
 }
 OpKind::Remove if !op_a.is_combinable() => {
 return rebase_op_indices(op_a, &arr_segs, b_idx, -1);
 }
 _ => {}
 }
 }
 }
 }

 // A non-array-path `remove`, or a non-array-path `add`/`replace` with a non-empty value,
 // overwrites its whole subtree -- drop any op_a strictly under that path. An empty-object
 // value is the soft-merge case and doesn't shadow descendants. Array-element targets are
 // excluded: those are governed by the index-shift rules above, not a blanket subtree wipe.
 let b_is_array_element = matches!(b_segs.last(), Some(Segment::Index(_)));
 if !b_is_array_element && op_a.path() != op_b.path() && path::is_at_or_under(op_a.path(), op_b.path()) {
 let drops = match op_b {
 Op::Remove { .. } => true,
 Op::Add { value, .. } | Op::Replace { value, .. } => !is_soft_merge_value(value),
 _ => false,
 };
 if drops {
 return vec![];
 }
 }

 // Same exact path: resolve by op kind, falling back to priority tie-break.
 if op_a.path() == op_b.path() && op_a.from_path() == op_b.from_path() {
 return transform_same_path(op_a, op_b, priority);
 }

 vec![op_a.clone()]
}

fn transform_same_path(op_a: &Op, op_b: &Op, priority: bool) -> Vec<Op> {
 use OpKind::*;
 match (op_a.kind(), op_b.kind()) {
 // Commutative ops combine rather than conflict: compose already merges same-kind pairs,
 // and transform against any full overwrite just lets the overwrite happen independently
 // -- the combinable op still applies (to whatever value results), it just no longer sees
 // the pre-op_b value. This mirrors `@inc`/`@bit`/`@min`/`@max` being state-additive.
 (Inc, _) | (Bit, _) | (Min, _) | (Max, _) => vec![op_a.clone()],

 (Txt, Txt) => {
 if let (Op::Txt { delta: da,.. }, Op::Txt { delta: db,.. }) = (op_a, op_b) {
 vec![Op::Txt { path: op_a.path().into(), delta: da.transform(db, priority) }]
 } else {
 unreachable!()
 }
 }
 // a whole-field write by b always shadows a finer-grained text op on the same field.
 (Txt, Replace) | (Txt, Remove) => if priority { vec![op_a.clone()] } else { vec![] },

 // Soft add never overrides a concurrent write to the same path, regardless of priority.
 (Add, _) if matches!(op_a, Op::Add { soft: true,.. }) && !matches!(op_b, Op::Remove {.. }) => vec![],

 (Add, Remove) | (Replace, Remove) => {
 if priority { vec![op_a.clone()] } else { vec![] }
 }

 _ => if priority { vec![op_a.clone()] } else { vec![] },
 }
}

/// Transform `op_a` across a whole already-applied sequence, in order.
pub fn transform(op_a: &Op, ops_b: &[Op], priority: bool) -> Vec<Op> {
 let mut pending = vec![op_a.clone()];
 for op_b in ops_b {
 let mut next = Vec::with_capacity(pending.len());
 for op in &pending {
 next.extend(transform_one(op, op_b, priority));
 }
 pending = next;
 if pending.is_empty() {
 break;
 }
 }
 pending
}
