//! Aggregation pipelines.
//!
//! A pipeline is an array of single-key stage documents (`$match`, `$group`,
//! `$sort`, ...) parsed into a [Pipeline] and executed over a snapshot of a
//! collection. Field values are computed by [Expression]s such as
//! `"$amount"` or `{"$add": ["$a", "$b"]}`.

mod accumulator;
mod expression;
mod pipeline;

pub use expression::*;
pub use pipeline::*;
