use crate::collection::Document;
use crate::common::{Value, ALL_INDEXES, DOC_ID, ID_INDEX_NAME, INDEX_VERSION};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use indexmap::IndexMap;

/// Describes an index recorded on a collection.
///
/// Indexes are bookkeeping only: they are listed and dropped like real
/// indexes but never consulted by queries, and `unique` is not enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    name: String,
    keys: Document,
    unique: bool,
}

impl IndexDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &Document {
        &self.keys
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// `{v: 2, key: {...}, name: "...", unique?: true}`
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("v", INDEX_VERSION);
        document.insert("key", self.keys.clone());
        document.insert("name", self.name.clone());
        if self.unique {
            document.insert("unique", true);
        }
        document
    }
}

/// Options for creating an index.
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::collection::IndexOptions;
///
/// let options = IndexOptions::new().name("by_email").unique(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    name: Option<String>,
    unique: bool,
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Reads `{name?: <string>, unique?: <bool>}`; other keys are ignored.
    pub fn from_document(options: &Document) -> DocsimResult<Self> {
        let name = match options.get("name") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
            Some(other) => {
                log::error!("Invalid index name {}", other);
                return Err(DocsimError::new(
                    "index name must be a non-empty string",
                    ErrorKind::ValidationError,
                ));
            }
        };
        let unique = options.get("unique").map(|v| v.is_truthy()).unwrap_or(false);
        Ok(IndexOptions { name, unique })
    }
}

pub(crate) struct IndexCatalog {
    indexes: IndexMap<String, IndexDescriptor>,
}

impl IndexCatalog {
    pub(crate) fn new() -> Self {
        let mut indexes = IndexMap::new();
        let mut keys = Document::new();
        keys.insert(DOC_ID, 1);
        indexes.insert(
            ID_INDEX_NAME.to_string(),
            IndexDescriptor {
                name: ID_INDEX_NAME.to_string(),
                keys,
                unique: false,
            },
        );
        IndexCatalog { indexes }
    }

    /// Records an index and returns its name.
    ///
    /// Creating an index whose keys match an existing one returns the
    /// existing name.
    pub(crate) fn create(&mut self, keys: &Document, options: &IndexOptions) -> DocsimResult<String> {
        let generated = generate_name(keys)?;
        if let Some(existing) = self.indexes.values().find(|index| &index.keys == keys) {
            return Ok(existing.name.clone());
        }

        let name = options.name.clone().unwrap_or(generated);
        if self.indexes.contains_key(&name) {
            log::error!("Index {} already exists with different keys", name);
            return Err(DocsimError::new(
                &format!("An index with name '{}' already exists with a different key pattern", name),
                ErrorKind::ValidationError,
            ));
        }

        log::debug!("Recording index {} with keys {}", name, keys);
        self.indexes.insert(
            name.clone(),
            IndexDescriptor {
                name: name.clone(),
                keys: keys.clone(),
                unique: options.unique,
            },
        );
        Ok(name)
    }

    pub(crate) fn list(&self) -> Vec<IndexDescriptor> {
        self.indexes.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Drops an index by name; `"*"` drops every index except `_id_`.
    pub(crate) fn drop_index(&mut self, name: &str) -> DocsimResult<()> {
        if name == ALL_INDEXES {
            self.indexes.retain(|index_name, _| index_name == ID_INDEX_NAME);
            return Ok(());
        }
        if name == ID_INDEX_NAME {
            log::error!("Attempt to drop the _id index");
            return Err(DocsimError::new(
                "cannot drop _id index",
                ErrorKind::InvalidOperation,
            ));
        }
        if self.indexes.shift_remove(name).is_none() {
            log::warn!("Index {} not found", name);
            return Err(DocsimError::new(
                &format!("index not found with name [{}]", name),
                ErrorKind::IndexNotFound,
            ));
        }
        Ok(())
    }

    /// Drops the index with the given key pattern.
    pub(crate) fn drop_by_keys(&mut self, keys: &Document) -> DocsimResult<()> {
        let name = self
            .indexes
            .values()
            .find(|index| &index.keys == keys)
            .map(|index| index.name.clone());
        match name {
            Some(name) => self.drop_index(&name),
            None => {
                log::warn!("No index with keys {}", keys);
                Err(DocsimError::new(
                    &format!("can't find index with key: {}", keys),
                    ErrorKind::IndexNotFound,
                ))
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.indexes.retain(|name, _| name == ID_INDEX_NAME);
    }
}

fn generate_name(keys: &Document) -> DocsimResult<String> {
    if keys.is_empty() {
        log::error!("Index key specification is empty");
        return Err(DocsimError::new(
            "index keys cannot be empty",
            ErrorKind::ValidationError,
        ));
    }

    let mut parts = Vec::with_capacity(keys.size() * 2);
    for (field, direction) in keys.iter() {
        let direction = match direction {
            Value::String(kind) if !kind.is_empty() => kind.clone(),
            other => match other.as_i64() {
                Some(value) if value == 1 || value == -1 => value.to_string(),
                _ => {
                    log::error!("Invalid index direction {} for field {}", other, field);
                    return Err(DocsimError::new(
                        &format!("Values in the index key pattern can only be 1, -1 or a string, found {}", other),
                        ErrorKind::ValidationError,
                    ));
                }
            },
        };
        parts.push(field.clone());
        parts.push(direction);
    }
    Ok(parts.join("_"))
}
