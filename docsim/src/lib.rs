//! # docsim - in-memory document database engine
//!
//! docsim stores schemaless documents in named collections inside named
//! databases and answers MongoDB-style queries over them. It is meant to
//! stand in for a remote document database in local development and tests,
//! so it reproduces the comparison, type-coercion and pipeline semantics of
//! one exactly while keeping everything in memory.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docsim::doc;
//! use docsim::docsim::Docsim;
//! use docsim::collection::UpdateOptions;
//!
//! let store = Docsim::builder().open()?;
//! let users = store.database("app")?.collection("users")?;
//!
//! users.insert_many(vec![
//!     doc! { name: "Alice", age: 25, status: "active" },
//!     doc! { name: "Bob", age: 30, status: "inactive" },
//! ])?;
//!
//! let mut cursor = users.find(&doc! { age: { "$gte": 18 } })?;
//! cursor.sort(&doc! { age: (-1) })?.limit(10)?;
//! for user in cursor {
//!     println!("{}", user);
//! }
//!
//! users.update_one(
//!     &doc! { name: "Bob" },
//!     &doc! { "$set": { status: "active" } },
//!     &UpdateOptions::default(),
//! )?;
//! ```
//!
//! ## Module Organization
//!
//! - [`docsim`] - The store root and the request entry points
//! - [`database`] - Database handles and database commands
//! - [`collection`] - Documents, identifiers, collections and their options
//! - [`filter`] - Query filters
//! - [`update`] - Update operators
//! - [`aggregate`] - Aggregation pipelines
//! - [`common`] - Values, sorting and cursors
//! - [`codec`] - The canonical interchange form
//! - [`command`] - Requests and replies at the operation boundary
//! - [`errors`] - Error types and result definitions

use crate::collection::ObjectIdGenerator;
use std::sync::LazyLock;

pub mod aggregate;
pub mod codec;
pub mod collection;
pub mod command;
pub mod common;
pub mod database;
pub mod docsim;
pub mod docsim_builder;
pub mod docsim_config;
pub mod errors;
pub mod filter;
pub mod update;

pub(crate) static ID_GENERATOR: LazyLock<ObjectIdGenerator> = LazyLock::new(ObjectIdGenerator::new);
