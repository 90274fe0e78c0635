//! Collections and documents.
//!
//! A [Collection] is a named set of schemaless [Document]s inside a database.
//! Documents are ordered maps from field names to [Value](crate::common::Value)s
//! and may nest documents and arrays to any depth up to the configured limit.
//!
//! ```rust,ignore
//! use docsim::doc;
//!
//! let users = store.database("app").collection("users");
//! let result = users.insert_one(doc! { name: "Alice", address: { city: "Paris" } })?;
//!
//! let found = users.find_one(&doc! { "address.city": "Paris" })?;
//! ```
//!
//! # Document IDs
//!
//! Every stored document has an `_id` field, kept as its first field. When a
//! document is inserted without one, an [ObjectId] is generated. `_id` is
//! unique within a collection and cannot be changed by updates or replaces.
//!
//! # Indexes
//!
//! Index definitions are recorded, listed and dropped, but queries always
//! scan the collection.

mod docsim_collection;
mod document;
mod find_options;
mod index_catalog;
mod object_id;
mod object_id_generator;
mod update_options;
mod write_result;

pub use docsim_collection::*;
pub use document::*;
pub use find_options::*;
pub use index_catalog::*;
pub use object_id::*;
pub use object_id_generator::*;
pub use update_options::*;
pub use write_result::*;
