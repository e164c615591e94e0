//! Wire-level compatibility: the compact array form `["<symbol><path>", value?, soft?]` that spec
//! §6 requires implementations accept alongside the verbose [`Op`] representation.

use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::error::AlgebraError;
use crate::op::Op;
use crate::text_delta::TextDelta;

fn symbol_for(op: &Op) -> char {
 match op {
 Op::Add {.. } => '+',
 Op::Replace {.. } => '=',
 Op::Remove {.. } => '-',
 Op::Move {.. } => '>',
 Op::Copy {.. } => '&',
 Op::Txt {.. } => 'T',
 Op::Inc {.. } => '^',
 Op::Bit {.. } => '~',
 // @min and @max share a symbol ; disambiguated on decode by an explicit tag
 // carried in the value slot, since the compact form has no other room for it.
 Op::Min {.. } | Op::Max {.. } => '|',
 }
}

/// Encode an [`Op`] into the compact `["<symbol><path>", value?, soft?]` wire form.
pub fn to_compact(op: &Op) -> Vec<Value> {
 let sym = symbol_for(op);
 match op {
 Op::Add { path, value, soft } => {
 let head = Value::String(format!("{sym}{path}"));
 if *soft { vec![head, value.clone(), Value::Bool(true)] } else { vec![head, value.clone()] }
 }
 Op::Replace { path, value } => vec![Value::String(format!("{sym}{path}")), value.clone()],
 Op::Remove { path } => vec![Value::String(format!("{sym}{path}"))],
 Op::Move { from, path } | Op::Copy { from, path } => {
 vec![Value::String(format!("{sym}{path}")), Value::String(from.to_string())]
 }
 Op::Inc { path, n } => vec![Value::String(format!("{sym}{path}")), Value::from(*n)],
 Op::Bit { path, mask } => vec![Value::String(format!("{sym}{path}")), Value::from(*mask)],
 Op::Min { path, n } => vec![Value::String(format!("{sym}{path}")), Value::from(*n), Value::String("min".into())],
 Op::Max { path, n } => vec![Value::String(format!("{sym}{path}")), Value::from(*n), Value::String("max".into())],
 Op::Txt { path, delta } => {
 let encoded = serde_json::to_value(delta).unwrap_or(Value::Null);
 vec![Value::String(format!("{sym}{path}")), encoded]
 }
 }
}

/// Decode an op from either the compact array form or the verbose [`Op`] serde representation.
pub fn from_compact(parts: &[Value]) -> Result<Op, AlgebraError> {
 let head = parts.first()
.and_then(Value::as_str)
.ok_or_else(|| AlgebraError::MalformedPath("empty compact op".into()))?;
 let mut chars = head.chars();
 let sym = chars.next().ok_or_else(|| AlgebraError::MalformedPath(head.into()))?;
 let path: SmartString = chars.as_str().into();

 match sym {
 '+' => {
 let value = parts.get(1).cloned().ok_or(AlgebraError::MissingValue)?;
 let soft = parts.get(2).and_then(Value::as_bool).unwrap_or(false);
 Ok(Op::Add { path, value, soft })
 }
 '=' => Ok(Op::Replace { path, value: parts.get(1).cloned().ok_or(AlgebraError::MissingValue)? }),
 '-' => Ok(Op::Remove { path }),
 '>' | '&' => {
 let from = parts.get(1).and_then(Value::as_str)
.ok_or_else(|| AlgebraError::MalformedPath(head.into()))?
.into();
 if sym == '>' { Ok(Op::Move { from, path }) } else { Ok(Op::Copy { from, path }) }
 }
 '^' => Ok(Op::Inc { path, n: parts.get(1).and_then(Value::as_f64).ok_or(AlgebraError::MissingValue)? }),
 '~' => Ok(Op::Bit { path, mask: parts.get(1).and_then(Value::as_u64).ok_or(AlgebraError::MissingValue)? }),
 '|' => {
 let n = parts.get(1).and_then(Value::as_f64).ok_or(AlgebraError::MissingValue)?;
 match parts.get(2).and_then(Value::as_str) {
 Some("max") => Ok(Op::Max { path, n }),
 _ => Ok(Op::Min { path, n }),
 }
 }
 'T' => {
 let raw = parts.get(1).cloned().ok_or(AlgebraError::MissingValue)?;
 let delta: TextDelta = serde_json::from_value(raw)
.map_err(|_| AlgebraError::MalformedPath(head.into()))?;
 Ok(Op::Txt { path, delta })
 }
 _ => Err(AlgebraError::MalformedPath(head.into())),
 }
}
