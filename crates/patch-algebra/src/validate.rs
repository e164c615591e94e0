//! Structural validation of an [`Op`] independent of any document state: malformed pointers,
//! and the JSON-Patch "move/copy can't nest a location inside itself" rule. `apply`/`invert` still
//! check state-dependent failures (missing path, wrong type) on their own; this catches the
//! op-shaped mistakes before they ever reach a document.

use crate::error::AlgebraError;
use crate::op::Op;
use crate::path;

fn well_formed(p: &str) -> bool {
 p.is_empty() || p.starts_with('/')
}

pub fn validate(op: &Op) -> Result<(), AlgebraError> {
 if !well_formed(op.path()) {
 return Err(AlgebraError::MalformedPath(op.path().to_string()));
 }
 if let Some(from) = op.from_path() {
 if !well_formed(from) {
 return Err(AlgebraError::MalformedPath(from.to_string()));
 }
 // Moving/copying a location into one of its own descendants would require the source to
 // still exist at the moment it's spliced into itself -- nonsensical, so it's rejected
 // outright rather than left to fail confusingly at apply time.
 if matches!(op, Op::Move {.. }) && path::is_at_or_under(op.path(), from) {
 return Err(AlgebraError::InvalidParent(op.path().to_string()));
 }
 }
 if let Op::Bit {.. } = op {
 // masks are always valid u64s by construction; nothing further to check.
 }
 Ok(())
}
