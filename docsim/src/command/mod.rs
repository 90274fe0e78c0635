//! The request boundary.
//!
//! A transport or SDK binding hands the store a [Request] naming an
//! [Operation], a database, a collection and operation-specific arguments,
//! and gets back a [Value](crate::common::Value) reply. Failures are tagged
//! with [error_reply] the way a document database server reports them.
//!
//! ```rust,ignore
//! use docsim::command::{Operation, Request};
//!
//! let request = Request::new(Operation::InsertOne, "app")
//!     .collection("users")
//!     .args(doc! { document: { name: "Alice" } });
//! let reply = store.execute(&request)?;
//! ```

mod dispatcher;
mod reply;
mod request;

pub(crate) use dispatcher::*;
pub use reply::*;
pub use request::*;
