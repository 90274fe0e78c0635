// doc constants
pub const DOC_ID: &str = "_id";
pub const FIELD_SEPARATOR: char = '.';
pub const OPERATOR_PREFIX: char = '$';
pub const FIELD_REF_PREFIX: char = '$';
pub const ROOT_REF: &str = "$$ROOT";

// index constants
pub const ID_INDEX_NAME: &str = "_id_";
pub const ALL_INDEXES: &str = "*";
pub const INDEX_VERSION: i64 = 2;

// store constants
pub const COLLECTION_TYPE: &str = "collection";

// engine constants
pub const DEFAULT_BATCH_SIZE: usize = 101;
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;
pub const MAX_ARRAY_PAD_INDEX: usize = 1_500_000;
pub const DOCSIM_VERSION: &str = env!("CARGO_PKG_VERSION");
