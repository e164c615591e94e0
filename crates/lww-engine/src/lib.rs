//! Last-write-wins reconciliation: client-side op consolidation and server-local
//! merge, plus the server's field-op save/list pipeline. Built on `patch-algebra::compose` for
//! combinable-op merging and `patch-algebra::path` for the parent-overrides-child structural rule
//! an op at a path supersedes all child-path ops.

pub mod consolidate;
pub mod merge;
pub mod server;

pub use consolidate::{consolidate_ops, ConsolidateResult};
pub use merge::{merge_server_with_local, resolve_lww_set};
pub use server::{apply_incoming_ops, ServerApplyResult};
