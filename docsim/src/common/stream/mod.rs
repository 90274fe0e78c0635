mod document_cursor;
mod projection;
pub(crate) mod sorted_stream;

pub use document_cursor::*;
pub use projection::*;
