mod date_utils;

pub use date_utils::*;
