//! `apply(state, op) -> state'`.
//!
//! `Value` has no persistent/structural-sharing representation the way a real copy-on-write tree
//! would, so "unchanged subtrees share structure" is approximated here by mutating an owned
//! `Value` in place rather than rebuilding the whole tree: callers that need the pre-image (for
//! `invert`) clone before calling, everyone else pays no copy at all. See DESIGN.md.

use serde_json::{Number, Value};

use crate::error::AlgebraError;
use crate::nav;
use crate::op::{is_primitive, Op};

fn as_number(v: &Value) -> Option<f64> {
 v.as_f64()
}

/// Apply a single op to `state` in place. In strict mode, any failure (missing path, wrong
/// type,...) is returned as an error. In non-strict mode, failures are swallowed and the op is
/// treated as a no-op strict mode surfaces it, non-strict skips the op.
pub fn apply_one(state: &mut Value, op: &Op, strict: bool) -> Result<(), AlgebraError> {
 match try_apply_one(state, op) {
 Ok(()) => Ok(()),
 Err(e) if !strict => { log::warn!("non-strict apply skipped a no-op: {e}"); Ok(()) }
 Err(e) => Err(e),
 }
}

/// Apply a whole op sequence in order, stopping at the first strict failure.
pub fn apply(state: &Value, ops: &[Op], strict: bool) -> Result<Value, AlgebraError> {
 let mut out = state.clone();
 for op in ops {
 apply_one(&mut out, op, strict)?;
 }
 Ok(out)
}

fn try_apply_one(state: &mut Value, op: &Op) -> Result<(), AlgebraError> {
 match op {
 Op::Add { path, value, soft } => {
 if *soft {
 if let Some(existing) = nav::get(state, path) {
 if !nav::is_empty_value(existing) {
 return Ok(());
 }
 }
 }
 nav::insert(state, path, value.clone())?;
 Ok(())
 }
 Op::Remove { path } => { nav::remove(state, path)?; Ok(()) }
 Op::Replace { path, value } => { nav::replace(state, path, value.clone())?; Ok(()) }
 Op::Copy { from, path } => {
 let value = nav::get(state, from)
.ok_or_else(|| AlgebraError::PathNotFound(from.to_string()))?
.clone();
 nav::insert(state, path, value)?;
 Ok(())
 }
 Op::Move { from, path } => {
 let value = nav::remove(state, from)?;
 nav::insert(state, path, value)?;
 Ok(())
 }
 Op::Inc { path, n } => apply_numeric(state, path, |cur| cur + n),
 Op::Bit { path, mask } => {
 let cur = nav::get(state, path).and_then(Value::as_u64).unwrap_or(0);
 nav::upsert_number(state, path, Number::from(cur | mask))
 }
 Op::Min { path, n } => apply_numeric(state, path, |cur| cur.min(*n)),
 Op::Max { path, n } => apply_numeric(state, path, |cur| cur.max(*n)),
 Op::Txt { path, delta } => {
 let cur = nav::get(state, path).and_then(Value::as_str).unwrap_or("").to_string();
 let new_text = delta.apply(&cur).map_err(|_| AlgebraError::DeltaOutOfRange)?;
 nav::upsert_string(state, path, new_text)
 }
 }
}

fn apply_numeric(state: &mut Value, path: &str, f: impl Fn(f64) -> f64) -> Result<(), AlgebraError> {
 let cur = match nav::get(state, path) {
 Some(v) => as_number(v).ok_or_else(|| AlgebraError::NotANumber(path.to_string()))?,
 None => 0.0,
 };
 let next = f(cur);
 let num = Number::from_f64(next).ok_or_else(|| AlgebraError::NotANumber(path.to_string()))?;
 nav::upsert_number(state, path, num)
}
