//! The JSON-Patch operation algebra: `Op`, and the four pure functions everything else in this
//! workspace is built from -- `apply`, `invert`, `compose`, `transform` -- plus the JSON-Pointer
//! path parsing, wire codec and rich-text delta sub-algebra they share.

pub mod apply;
pub mod compose;
pub mod error;
pub mod invert;
pub mod nav;
pub mod op;
pub mod path;
pub mod text_delta;
pub mod transform;
pub mod validate;
pub mod wire;

pub use apply::apply;
pub use compose::compose;
pub use error::AlgebraError;
pub use invert::invert;
pub use op::{Op, OpKind};
pub use text_delta::TextDelta;
pub use transform::transform;
pub use validate::validate;
