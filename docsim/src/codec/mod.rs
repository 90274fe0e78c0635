//! Canonical interchange form.
//!
//! Values cross the operation boundary as generic JSON where typed values use
//! single-key wrapper objects (`{"$oid": ...}`, `{"$date": ...}`, ...).
//! Decoding is total: wrapper-shaped objects with an unexpected inner shape
//! decode as plain documents.

mod extended_json;
mod serde_support;

pub use extended_json::*;
