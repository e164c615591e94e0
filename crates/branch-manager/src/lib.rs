//! Fork-from-rev / merge-back / close lifecycle for document branches.

pub mod create;
pub mod merge;

pub use create::{create_branch_lww, create_branch_ot};
pub use merge::{close_branch, merge_branch_lww, merge_branch_ot};
