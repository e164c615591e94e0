use smartstring::alias::String as SmartString;
use serde_json::Value;

use crate::text_delta::TextDelta;

use serde::{Deserialize, Serialize};

/// A single JSON-Patch operation, extended with the commutative numeric/bitmask/text ops this
/// algebra needs (spec §3 "JSON-Patch operation").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
 Add { path: SmartString, value: Value, soft: bool },
 Remove { path: SmartString },
 Replace { path: SmartString, value: Value },
 Copy { from: SmartString, path: SmartString },
 Move { from: SmartString, path: SmartString },
 /// Commutative numeric increment.
 Inc { path: SmartString, n: f64 },
 /// Commutative bitmask OR-combine (spec: "@bit(path, mask)").
 Bit { path: SmartString, mask: u64 },
 Min { path: SmartString, n: f64 },
 Max { path: SmartString, n: f64 },
 Txt { path: SmartString, delta: TextDelta },
}

impl Op {
 pub fn add(path: impl Into<SmartString>, value: Value) -> Self {
 Op::Add { path: path.into(), value, soft: false }
 }

 pub fn soft_add(path: impl Into<SmartString>, value: Value) -> Self {
 Op::Add { path: path.into(), value, soft: true }
 }

 pub fn replace(path: impl Into<SmartString>, value: Value) -> Self {
 Op::Replace { path: path.into(), value }
 }

 pub fn remove(path: impl Into<SmartString>) -> Self {
 Op::Remove { path: path.into() }
 }

 /// The primary path this op targets (the write side for copy/move).
 pub fn path(&self) -> &str {
 match self {
 Op::Add { path,.. } | Op::Remove { path } | Op::Replace { path,.. }
 | Op::Copy { path,.. } | Op::Move { path,.. }
 | Op::Inc { path,.. } | Op::Bit { path,.. } | Op::Min { path,.. }
 | Op::Max { path,.. } | Op::Txt { path,.. } => path,
 }
 }

 pub fn from_path(&self) -> Option<&str> {
 match self {
 Op::Copy { from,.. } | Op::Move { from,.. } => Some(from),
 _ => None,
 }
 }

 /// Rebuild this op targeting `new_path` instead of its current path (used by `transform`
 /// when an array shift moves the slot an op targets). Leaves `from` (copy/move source)
 /// untouched -- callers rebase that side separately.
 pub fn with_path(&self, new_path: impl Into<SmartString>) -> Op {
 let new_path = new_path.into();
 match self {
 Op::Add { value, soft,.. } => Op::Add { path: new_path, value: value.clone(), soft: *soft },
 Op::Remove {.. } => Op::Remove { path: new_path },
 Op::Replace { value,.. } => Op::Replace { path: new_path, value: value.clone() },
 Op::Copy { from,.. } => Op::Copy { from: from.clone(), path: new_path },
 Op::Move { from,.. } => Op::Move { from: from.clone(), path: new_path },
 Op::Inc { n,.. } => Op::Inc { path: new_path, n: *n },
 Op::Bit { mask,.. } => Op::Bit { path: new_path, mask: *mask },
 Op::Min { n,.. } => Op::Min { path: new_path, n: *n },
 Op::Max { n,.. } => Op::Max { path: new_path, n: *n },
 Op::Txt { delta,.. } => Op::Txt { path: new_path, delta: delta.clone() },
 }
 }

 /// Rebuild this op with a different `from` (copy/move source path). No-op for other kinds.
 pub fn with_from(&self, new_from: impl Into<SmartString>) -> Op {
 match self {
 Op::Copy { path,.. } => Op::Copy { from: new_from.into(), path: path.clone() },
 Op::Move { path,.. } => Op::Move { from: new_from.into(), path: path.clone() },
 other => other.clone(),
 }
 }

 /// True for `@inc`/`@bit`/`@min`/`@max`: associative, commutative, combine with a same-kind
 /// op at the same path instead of overwriting it.
 pub fn is_combinable(&self) -> bool {
 matches!(self, Op::Inc {.. } | Op::Bit {.. } | Op::Min {.. } | Op::Max {.. })
 }

 /// True for the single-op primitive replaces that `collapsePendingChanges` may elide.
 pub fn is_primitive_replace(&self) -> bool {
 matches!(self, Op::Replace { value,.. } if is_primitive(value))
 }

 /// Discriminant used for "same kind" checks in compose/consolidate, independent of path/value.
 pub fn kind(&self) -> OpKind {
 match self {
 Op::Add {.. } => OpKind::Add,
 Op::Remove {.. } => OpKind::Remove,
 Op::Replace {.. } => OpKind::Replace,
 Op::Copy {.. } => OpKind::Copy,
 Op::Move {.. } => OpKind::Move,
 Op::Inc {.. } => OpKind::Inc,
 Op::Bit {.. } => OpKind::Bit,
 Op::Min {.. } => OpKind::Min,
 Op::Max {.. } => OpKind::Max,
 Op::Txt {.. } => OpKind::Txt,
 }
 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind { Add, Remove, Replace, Copy, Move, Inc, Bit, Min, Max, Txt }

pub fn is_primitive(v: &Value) -> bool {
 matches!(v, Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Null)
}
