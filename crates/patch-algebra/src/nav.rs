//! Shared `serde_json::Value` tree navigation used by apply/invert/compose.

use serde_json::Value;

use crate::error::AlgebraError;
use crate::path::{self, Segment};

/// Read the value at `path`, or `None` if any segment along the way doesn't resolve.
pub fn get<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
 let segs = path::parse(path);
 let mut cur = state;
 for seg in segs.iter() {
 cur = match (cur, seg) {
 (Value::Object(map), Segment::Key(k)) => map.get(k.as_str())?,
 (Value::Array(arr), Segment::Index(i)) => arr.get(*i)?,
 (Value::Array(arr), Segment::End) => arr.last()?,
 _ => return None,
 };
 }
 Some(cur)
}

/// Navigate to the parent container of `path`'s final segment, returning it along with the
/// segment so the caller can get/set/remove the child.
fn parent_mut<'a>(state: &'a mut Value, path: &str) -> Result<(&'a mut Value, Segment), AlgebraError> {
 let (parent_path, last) = path::split_last(path)
.ok_or_else(|| AlgebraError::InvalidParent(path.to_string()))?;
 let parent = get_mut_raw(state, &parent_path)
.ok_or_else(|| AlgebraError::PathNotFound(parent_path.to_string()))?;
 Ok((parent, last))
}

fn get_mut_raw<'a>(state: &'a mut Value, path: &str) -> Option<&'a mut Value> {
 let segs = path::parse(path);
 let mut cur = state;
 for seg in segs.iter() {
 cur = match (cur, seg) {
 (Value::Object(map), Segment::Key(k)) => map.get_mut(k.as_str())?,
 (Value::Array(arr), Segment::Index(i)) => arr.get_mut(*i)?,
 (Value::Array(arr), Segment::End) => arr.last_mut()?,
 _ => return None,
 };
 }
 Some(cur)
}

pub fn get_mut<'a>(state: &'a mut Value, path: &str) -> Option<&'a mut Value> {
 get_mut_raw(state, path)
}

/// Insert/splice `value` at `path` (object property set, or array splice-in). Returns the
/// concrete path the value ended up at (resolves `/-` to the final numeric index).
pub fn insert(state: &mut Value, path: &str, value: Value) -> Result<String, AlgebraError> {
 if path.is_empty() {
 *state = value;
 return Ok(String::new());
 }
 let (parent, last) = parent_mut(state, path)?;
 match (parent, &last) {
 (Value::Object(map), Segment::Key(k)) => {
 map.insert(k.to_string(), value);
 Ok(path.to_string())
 }
 (Value::Array(arr), Segment::Index(i)) => {
 if *i > arr.len() { return Err(AlgebraError::PathNotFound(path.to_string())); }
 arr.insert(*i, value);
 Ok(path.to_string())
 }
 (Value::Array(arr), Segment::End) => {
 arr.push(value);
 let idx = arr.len() - 1;
 let mut segs = path::parse(path);
 *segs.last_mut().unwrap() = Segment::Index(idx);
 Ok(path::render(&segs).to_string())
 }
 _ => Err(AlgebraError::InvalidParent(path.to_string())),
 }
}

/// Remove and return the value at `path`.
pub fn remove(state: &mut Value, path: &str) -> Result<Value, AlgebraError> {
 if path.is_empty() {
 return Ok(std::mem::replace(state, Value::Null));
 }
 let (parent, last) = parent_mut(state, path)?;
 match (parent, &last) {
 (Value::Object(map), Segment::Key(k)) => {
 map.remove(k.as_str()).ok_or_else(|| AlgebraError::PathNotFound(path.to_string()))
 }
 (Value::Array(arr), Segment::Index(i)) => {
 if *i >= arr.len() { return Err(AlgebraError::PathNotFound(path.to_string())); }
 Ok(arr.remove(*i))
 }
 (Value::Array(arr), Segment::End) => {
 arr.pop().ok_or_else(|| AlgebraError::PathNotFound(path.to_string()))
 }
 _ => Err(AlgebraError::InvalidParent(path.to_string())),
 }
}

/// Overwrite the value at `path`, returning the old value.
pub fn replace(state: &mut Value, path: &str, value: Value) -> Result<Value, AlgebraError> {
 if path.is_empty() {
 return Ok(std::mem::replace(state, value));
 }
 let slot = get_mut_raw(state, path).ok_or_else(|| AlgebraError::PathNotFound(path.to_string()))?;
 Ok(std::mem::replace(slot, value))
}

/// Set `path` to a number, creating the slot (via [`insert`]) if it doesn't exist yet. Used by
/// the combinable ops (`@inc`/`@bit`/`@min`/`@max`), which upsert rather than require the
/// counter to pre-exist.
pub fn upsert_number(state: &mut Value, path: &str, n: serde_json::Number) -> Result<(), AlgebraError> {
 match get_mut_raw(state, path) {
 Some(slot) => { *slot = Value::Number(n); Ok(()) }
 None => { insert(state, path, Value::Number(n))?; Ok(()) }
 }
}

/// Set `path` to a string, creating the slot if it doesn't exist yet (`@txt` against an absent
/// field starts from the empty string).
pub fn upsert_string(state: &mut Value, path: &str, s: String) -> Result<(), AlgebraError> {
 match get_mut_raw(state, path) {
 Some(slot) => { *slot = Value::String(s); Ok(()) }
 None => { insert(state, path, Value::String(s))?; Ok(()) }
 }
}

/// True for values that count as "nothing there yet" for soft-add purposes: absent, null, or an
/// empty string/object/array placeholder.
pub fn is_empty_value(v: &Value) -> bool {
 match v {
 Value::Null => true,
 Value::Object(m) => m.is_empty(),
 Value::Array(a) => a.is_empty(),
 Value::String(s) => s.is_empty(),
 _ => false,
 }
}

/// True if `path`'s parent container is an array, i.e. inserting at `path` shifts elements
/// rather than overwriting an object property.
pub fn targets_array_slot(state: &Value, path: &str) -> bool {
 match path::split_last(path) {
 Some((parent, _)) => matches!(get(state, &parent), Some(Value::Array(_))),
 None => false,
 }
}

/// Resolve a path ending in `/-` to the concrete index it would land at if pushed onto `state`
/// right now (i.e. the array's current length). Non-`End` paths pass through unchanged. Used by
/// `invert` to name a concrete path for an add that targeted the array end.
pub fn resolve_concrete_path(state: &Value, path: &str) -> Result<String, AlgebraError> {
 let segs = path::parse(path);
 if !matches!(segs.last(), Some(Segment::End)) {
 return Ok(path.to_string());
 }
 let array_path = path::array_parent(path).ok_or_else(|| AlgebraError::InvalidParent(path.to_string()))?;
 let idx = match get(state, &array_path) {
 Some(Value::Array(arr)) => arr.len(),
 Some(_) => return Err(AlgebraError::InvalidParent(path.to_string())),
 None => 0,
 };
 let mut segs = segs;
 *segs.last_mut().unwrap() = Segment::Index(idx);
 Ok(path::render(&segs).to_string())
}
