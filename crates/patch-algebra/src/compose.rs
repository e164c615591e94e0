//! `compose(op1, op2) -> Option<Op>`: collapse two sequential same-path ops into one
//! equivalent op, when that's possible without consulting surrounding state. Returns `None` when
//! the pair can't be collapsed (different paths, or touches more than one location) -- the caller
//! keeps both ops in that case.

use crate::op::{Op, OpKind};

pub fn compose(op1: &Op, op2: &Op) -> Option<Op> {
 // Copy/Move touch two locations (`from` and `path`); collapsing them into whatever op2 does
 // at `path` would silently drop the `from`-side effect, so they never collapse.
 if matches!(op1, Op::Copy {.. } | Op::Move {.. }) {
 return None;
 }
 if op1.path() != op2.path() {
 return None;
 }
 let path = op2.path();

 use OpKind::*;
 match (op1.kind(), op2.kind()) {
 (Add, Remove) => None, // added then removed on the same path: cancels out entirely
 (Replace, Remove) | (Txt, Remove) => Some(Op::remove(path.to_string())),
 (Remove, Add) => {
 if let Op::Add { value,.. } = op2 { Some(Op::replace(path.to_string(), value.clone())) } else { unreachable!() }
 }
 (Add, Replace) | (Add, Txt) => {
 let soft = matches!(op1, Op::Add { soft: true,.. });
 let value = final_value(op2)?;
 Some(Op::Add { path: path.into(), value, soft })
 }
 (Replace, Replace) | (Txt, Replace) => Some(Op::replace(path.to_string(), final_value(op2)?)),
 (Txt, Txt) => {
 if let (Op::Txt { delta: d1,.. }, Op::Txt { delta: d2,.. }) = (op1, op2) {
 Some(Op::Txt { path: path.into(), delta: d1.compose(d2) })
 } else { unreachable!() }
 }
 (Inc, Inc) => combine_same(op1, op2, |a, b| a + b, |path, n| Op::Inc { path, n }),
 (Bit, Bit) => combine_bits(op1, op2),
 (Min, Min) => combine_same(op1, op2, f64::min, |path, n| Op::Min { path, n }),
 (Max, Max) => combine_same(op1, op2, f64::max, |path, n| Op::Max { path, n }),
 _ => None,
 }
}

fn final_value(op: &Op) -> Option<serde_json::Value> {
 match op {
 Op::Add { value,.. } | Op::Replace { value,.. } => Some(value.clone()),
 _ => None,
 }
}

fn combine_same(
 op1: &Op,
 op2: &Op,
 f: impl Fn(f64, f64) -> f64,
 ctor: impl Fn(smartstring::alias::String, f64) -> Op,
) -> Option<Op> {
 let (n1, n2) = match (op1, op2) {
 (Op::Inc { n: a,.. }, Op::Inc { n: b,.. }) => (*a, *b),
 (Op::Min { n: a,.. }, Op::Min { n: b,.. }) => (*a, *b),
 (Op::Max { n: a,.. }, Op::Max { n: b,.. }) => (*a, *b),
 _ => return None,
 };
 Some(ctor(op2.path().into(), f(n1, n2)))
}

fn combine_bits(op1: &Op, op2: &Op) -> Option<Op> {
 if let (Op::Bit { mask: m1,.. }, Op::Bit { mask: m2,.. }) = (op1, op2) {
 Some(Op::Bit { path: op2.path().into(), mask: m1 | m2 })
 } else {
 None
 }
}

#[cfg(test)]
mod test {
 use super::*;
 use serde_json::json;

 #[test]
 fn replace_replace_collapses_to_last() {
 let c = compose(&Op::replace("/a", json!(1)), &Op::replace("/a", json!(2))).unwrap();
 assert_eq!(c, Op::replace("/a", json!(2)));
 }

 #[test]
 fn add_then_remove_cancels() {
 assert_eq!(compose(&Op::add("/a", json!(1)), &Op::remove("/a")), None);
 }

 #[test]
 fn inc_inc_sums() {
 let c = compose(
 &Op::Inc { path: "/n".into(), n: 2.0 },
 &Op::Inc { path: "/n".into(), n: 5.0 },
 ).unwrap();
 assert_eq!(c, Op::Inc { path: "/n".into(), n: 7.0 });
 }

 #[test]
 fn different_paths_do_not_compose() {
 assert_eq!(compose(&Op::replace("/a", json!(1)), &Op::replace("/b", json!(2))), None);
 }

 #[test]
 fn move_never_composes() {
 let mv = Op::Move { from: "/a".into(), path: "/b".into() };
 assert_eq!(compose(&mv, &Op::replace("/b", json!(1))), None);
 }
}
