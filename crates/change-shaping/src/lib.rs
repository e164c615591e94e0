//! Client-side pending-change lifecycle: collapsing redundant writes, size-bounded
//! splitting and batching, and the mutator-to-`Change` factory.

pub mod batch;
pub mod collapse;
pub mod make_change;
pub mod shape;

pub use batch::break_into_batches;
pub use collapse::collapse_pending_changes;
pub use make_change::{make_change, ChangeBuilder, MakeChangeInput};
pub use shape::break_change;
