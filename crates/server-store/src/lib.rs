//! Server-side storage-backend contracts: committed change log with `(docId, rev)`
//! range scans, version snapshots, LWW field ops indexed by `(docId, path)`, tombstones, and
//! branches -- plus in-memory reference implementations of each.

pub mod branches;
pub mod lww_log;
pub mod ot_log;
pub mod tombstones;

pub use branches::{BranchStore, InMemoryBranchStore};
pub use lww_log::{commit as commit_lww, InMemoryLwwServerLog, LwwServerLog};
pub use ot_log::{commit as commit_ot, InMemoryOtServerLog, OtServerLog};
pub use tombstones::{InMemoryTombstoneStore, TombstoneStore};
