mod constants;
mod sort_order;
mod value;

pub mod stream;
pub mod util;

pub use constants::*;
pub use sort_order::*;
pub use util::*;
pub use value::*;
