//! Query filters for selecting documents from collections.
//!
//! A filter document such as `{"status": "active", "age": {"$gte": 30}}` is
//! compiled once into a [Filter] tree and then evaluated against each
//! candidate document.
//!
//! # Creating Filters
//!
//! - [Filter::parse] compiles a filter document
//! - `field("age").gt(30)` builds the same providers with the fluent API
//! - [all()] matches every document
//! - [and()], [or()], [nor()] and [not()] combine filters
//!
//! # Examples
//!
//! ```rust,ignore
//! use docsim::filter::{field, Filter};
//!
//! let filter = Filter::parse(&doc! { "$or": [{ age: { "$lt": 18 } }, { vip: true }] })?;
//! let fluent = field("age").gt(30).and(field("status").eq("active"));
//! ```
//!
//! # Supported Operators
//!
//! - **Equality**: `$eq`, `$ne`
//! - **Comparison**: `$gt`, `$gte`, `$lt`, `$lte`
//! - **Membership**: `$in`, `$nin`
//! - **Element**: `$exists`, `$type`
//! - **Evaluation**: `$regex`/`$options`, `$mod`
//! - **Array**: `$size`, `$all`, `$elemMatch`
//! - **Logical**: `$and`, `$or`, `$nor`, `$not`

mod filter;
mod fluent;
mod parser;

mod array_filters;
mod basic_filters;
mod logical_filters;
mod pattern_filters;
mod range_filters;

pub(crate) use array_filters::*;
pub(crate) use basic_filters::*;
pub use filter::*;
pub use fluent::*;
pub(crate) use logical_filters::*;
pub(crate) use parser::*;
pub(crate) use pattern_filters::*;
pub(crate) use range_filters::*;
