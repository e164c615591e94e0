//! `invert(state, op) -> Op`: given the state an op is about to be applied to,
//! produce the op that undoes it. Used by the change log to build tombstones/undo stacks without
//! keeping full snapshots around.

use serde_json::Value;

use crate::error::AlgebraError;
use crate::nav;
use crate::op::Op;

/// Invert whatever landed at `path` via an insert (add or copy target): an array slot was
/// shifted in, so undoing it means removing that slot; an object key may have overwritten an
/// existing value, so undoing it means restoring that value (or removing the key if it didn't
/// exist before).
fn invert_insert_at(state: &Value, path: &str) -> Result<Op, AlgebraError> {
 let concrete = nav::resolve_concrete_path(state, path)?;
 if nav::targets_array_slot(state, &concrete) {
 return Ok(Op::remove(concrete));
 }
 match nav::get(state, &concrete) {
 Some(old) => Ok(Op::replace(concrete, old.clone())),
 None => Ok(Op::remove(concrete)),
 }
}

pub fn invert(state: &Value, op: &Op) -> Result<Op, AlgebraError> {
 match op {
 Op::Add { path,.. } => invert_insert_at(state, path),
 Op::Remove { path } => {
 let old = nav::get(state, path).cloned().ok_or_else(|| AlgebraError::PathNotFound(path.to_string()))?;
 Ok(Op::add(path.to_string(), old))
 }
 Op::Replace { path,.. } => {
 let old = nav::get(state, path).cloned().ok_or_else(|| AlgebraError::PathNotFound(path.to_string()))?;
 Ok(Op::replace(path.to_string(), old))
 }
 // copy only ever adds/overwrites `path`; undo it the same way a plain add would.
 Op::Copy { path,.. } => invert_insert_at(state, path),
 // Reversing the move restores both endpoints for the common array-reorder case. If
 // `path` named an existing object key, that key's prior value was already clobbered at
 // apply time and can't be recovered from post-state alone.
 Op::Move { from, path } => {
 let concrete_path = nav::resolve_concrete_path(state, path)?;
 Ok(Op::Move { from: concrete_path.into(), path: from.clone() })
 }
 Op::Inc { path,.. } | Op::Bit { path,.. } | Op::Min { path,.. } | Op::Max { path,.. } => {
 // commutative ops combine rather than overwrite, so the only general inverse is
 // restoring the exact prior value.
 match nav::get(state, path) {
 Some(old) => Ok(Op::replace(path.to_string(), old.clone())),
 None => Ok(Op::remove(path.to_string())),
 }
 }
 Op::Txt { path, delta } => {
 let original = nav::get(state, path).and_then(Value::as_str).unwrap_or("");
 Ok(Op::Txt { path: path.clone(), delta: delta.invert(original) })
 }
 }
}

#[cfg(test)]
mod test {
 use super::*;
 use crate::apply::apply_one;
 use serde_json::json;

 fn round_trips(state: &Value, op: &Op) {
 let mut s = state.clone();
 let inv = invert(&s, op).unwrap();
 apply_one(&mut s, op, true).unwrap();
 apply_one(&mut s, &inv, true).unwrap();
 assert_eq!(&s, state);
 }

 #[test]
 fn add_inverts_to_remove() {
 round_trips(&json!({"a": 1}), &Op::add("/b", json!(2)));
 }

 #[test]
 fn add_at_array_end_inverts() {
 round_trips(&json!({"items": ["x"]}), &Op::add("/items/-", json!("y")));
 }

 #[test]
 fn remove_inverts_to_add() {
 round_trips(&json!({"a": 1, "b": 2}), &Op::remove("/b"));
 }

 #[test]
 fn replace_inverts_to_replace_old() {
 round_trips(&json!({"a": 1}), &Op::replace("/a", json!(9)));
 }

 #[test]
 fn inc_inverts_via_restore() {
 round_trips(&json!({"count": 5.0}), &Op::Inc { path: "/count".into(), n: 3.0 });
 }

 #[test]
 fn move_inverts() {
 round_trips(&json!({"a": 1, "items": []}), &Op::Move { from: "/a".into(), path: "/items/-".into() });
 }

 #[test]
 fn txt_inverts() {
 use crate::text_delta::TextDelta;
 let delta = TextDelta::new().retain(5, None).insert(",", None);
 round_trips(&json!({"body": "hello world"}), &Op::Txt { path: "/body".into(), delta });
 }
}
