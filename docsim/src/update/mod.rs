//! Update operators (`$set`, `$inc`, `$push`, ...) applied to documents.
//!
//! An update document is parsed into an [UpdateSpec] once per operation and
//! then applied to every matched document. Applying never mutates its input.

mod operators;
mod update_spec;

pub use update_spec::*;
