use crate::collection::Document;
use crate::common::Value;

/// The result of inserting a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    inserted_id: Value,
}

impl InsertOneResult {
    pub(crate) fn new(inserted_id: Value) -> Self {
        Self { inserted_id }
    }

    /// The `_id` of the inserted document, generated if it was absent.
    pub fn inserted_id(&self) -> &Value {
        &self.inserted_id
    }

    /// `{acknowledged: true, insertedId: <id>}`
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("acknowledged", true);
        document.insert("insertedId", self.inserted_id.clone());
        document
    }
}

/// The result of a batch insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    inserted_ids: Vec<Value>,
}

impl InsertManyResult {
    pub(crate) fn new(inserted_ids: Vec<Value>) -> Self {
        Self { inserted_ids }
    }

    /// The ids in batch order.
    pub fn inserted_ids(&self) -> &[Value] {
        &self.inserted_ids
    }

    /// `{acknowledged: true, insertedIds: {"0": <id>, "1": <id>, ...}}`
    pub fn to_document(&self) -> Document {
        let ids = self
            .inserted_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (index.to_string(), id.clone()))
            .collect::<Document>();
        let mut document = Document::new();
        document.insert("acknowledged", true);
        document.insert("insertedIds", ids);
        document
    }
}

/// The result of an update or replace operation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    matched_count: u64,
    modified_count: u64,
    upserted_id: Option<Value>,
}

impl UpdateResult {
    pub(crate) fn new(matched_count: u64, modified_count: u64, upserted_id: Option<Value>) -> Self {
        Self {
            matched_count,
            modified_count,
            upserted_id,
        }
    }

    pub fn matched_count(&self) -> u64 {
        self.matched_count
    }

    /// Documents whose content actually changed.
    pub fn modified_count(&self) -> u64 {
        self.modified_count
    }

    pub fn upserted_id(&self) -> Option<&Value> {
        self.upserted_id.as_ref()
    }

    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("acknowledged", true);
        document.insert("matchedCount", self.matched_count);
        document.insert("modifiedCount", self.modified_count);
        if let Some(id) = &self.upserted_id {
            document.insert("upsertedId", id.clone());
        }
        document
    }
}

/// The result of a delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    deleted_count: u64,
}

impl DeleteResult {
    pub(crate) fn new(deleted_count: u64) -> Self {
        Self { deleted_count }
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted_count
    }

    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("acknowledged", true);
        document.insert("deletedCount", self.deleted_count);
        document
    }
}
