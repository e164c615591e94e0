//! The orchestration-level error taxonomy. Broader than [`patch_algebra::AlgebraError`],
//! which this converts from, so the algebra crate stays free of any dependency on change/OT/LWW
//! concepts.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use patch_algebra::AlgebraError;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
 /// Malformed op, undefined value, invalid path, or inconsistent `baseRev` within a batch.
 Validation(String),
 /// Client `baseRev > serverRev`, or `baseRev = 0` against an existing doc.
 StaleBase { base_rev: u64, server_rev: u64 },
 /// A transformed op failed to apply; the caller drops the offending change.
 TransformApply(String),
 /// Storage backend failure; atomic transactions roll back on this.
 Storage(String),
 /// Catchup gap detected server-side and it wasn't a legitimate root-replace catchup.
 SessionMissing { expected_rev: u64, got_rev: u64 },
 /// I/O failure from a reference store implementation.
 Io(String),
}

impl Display for SyncError {
 fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
 match self {
 SyncError::Validation(msg) => write!(f, "validation error: {msg}"),
 SyncError::StaleBase { base_rev, server_rev } => {
 write!(f, "stale base: client baseRev {base_rev} vs server rev {server_rev}")
 }
 SyncError::TransformApply(msg) => write!(f, "transformed op failed to apply: {msg}"),
 SyncError::Storage(msg) => write!(f, "storage error: {msg}"),
 SyncError::SessionMissing { expected_rev, got_rev } => {
 write!(f, "session missing: expected rev {expected_rev}, got {got_rev}")
 }
 SyncError::Io(msg) => write!(f, "io error: {msg}"),
 }
 }
}

impl Error for SyncError {}

impl From<AlgebraError> for SyncError {
 fn from(e: AlgebraError) -> Self {
 match e {
 AlgebraError::PathNotFound(_) | AlgebraError::InvalidParent(_)
 | AlgebraError::MalformedPath(_) | AlgebraError::MissingValue => {
 SyncError::Validation(e.to_string())
 }
 AlgebraError::NotANumber(_) | AlgebraError::DeltaOutOfRange => {
 SyncError::TransformApply(e.to_string())
 }
 }
 }
}
