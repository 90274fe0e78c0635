use crate::aggregate::Pipeline;
use crate::collection::{
    DeleteResult, Document, FindOneAndModifyOptions, FindOptions, IndexCatalog, IndexDescriptor,
    IndexOptions, InsertManyResult, InsertOneResult, ObjectId, ReturnDocument, UpdateOptions,
    UpdateResult,
};
use crate::common::stream::sorted_stream::SortedStream;
use crate::common::stream::{DocumentCursor, Projection};
use crate::common::{SortSpec, Value, DOC_ID, OPERATOR_PREFIX};
use crate::docsim_config::DocsimConfig;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use crate::filter::{equality_clauses, is_all_filter, Filter};
use crate::update::{upsert_document, UpdateSpec};
use dashmap::DashMap;
use indexmap::IndexMap;
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type Arena = IndexMap<Value, Arc<Document>>;

/// A named set of documents inside a database.
///
/// Documents live in an arena keyed by `_id` in insertion order. Every write
/// runs under the collection's exclusive lock and replaces arena entries
/// instead of mutating stored documents, so readers always work on a
/// consistent point-in-time snapshot.
///
/// `Collection` is a cheap handle: clones share the same documents.
///
/// # Examples
///
/// ```rust,ignore
/// let users = store.database("app").collection("users");
/// users.insert_one(doc! { name: "Alice", age: 25 })?;
///
/// let mut cursor = users.find(&doc! { age: { "$gte": 18 } })?;
/// cursor.sort(&doc! { name: 1 })?;
/// for user in cursor {
///     println!("{}", user);
/// }
///
/// users.update_one(
///     &doc! { name: "Alice" },
///     &doc! { "$inc": { age: 1 } },
///     &UpdateOptions::default(),
/// )?;
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

struct CollectionInner {
    name: String,
    db_name: String,
    arena: RwLock<Arena>,
    indexes: RwLock<IndexCatalog>,
    config: DocsimConfig,
    siblings: Weak<DashMap<String, Collection>>,
    dropped: AtomicBool,
}

impl Debug for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("namespace", &self.namespace())
            .field("dropped", &self.is_dropped())
            .finish()
    }
}

impl Collection {
    pub(crate) fn new(
        name: &str,
        db_name: &str,
        config: DocsimConfig,
        siblings: Weak<DashMap<String, Collection>>,
    ) -> Self {
        log::debug!("Creating collection {}.{}", db_name, name);
        Collection {
            inner: Arc::new(CollectionInner {
                name: name.to_string(),
                db_name: db_name.to_string(),
                arena: RwLock::new(IndexMap::new()),
                indexes: RwLock::new(IndexCatalog::new()),
                config,
                siblings,
                dropped: AtomicBool::from(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// `<database>.<collection>`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.inner.db_name, self.inner.name)
    }

    /// Whether this handle still refers to a live collection.
    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    // ==================== Inserts ====================

    /// Inserts a document, generating an [ObjectId] `_id` if it has none.
    ///
    /// # Errors
    ///
    /// [ErrorKind::DuplicateKey] if a document with the same `_id` exists,
    /// [ErrorKind::ValidationError] for an array `_id` or a document nested
    /// deeper than the configured limit.
    pub fn insert_one(&self, document: Document) -> DocsimResult<InsertOneResult> {
        self.ensure_opened()?;
        let document = self.prepare_insert(document)?;
        let mut arena = self.inner.arena.write();
        let id = self.insert_prepared(&mut arena, document)?;
        Ok(InsertOneResult::new(id))
    }

    /// Inserts a batch of documents in order.
    ///
    /// By default the batch stops at the first failing document and the
    /// documents before it remain inserted. With
    /// [DocsimConfig::atomic_batch_insert] the whole batch is validated
    /// first and nothing is inserted when any document fails.
    pub fn insert_many(&self, documents: Vec<Document>) -> DocsimResult<InsertManyResult> {
        self.ensure_opened()?;
        if documents.is_empty() {
            log::error!("Empty batch passed to insert_many on {}", self.namespace());
            return Err(DocsimError::new(
                "documents must be a non-empty list",
                ErrorKind::InvalidArgument,
            ));
        }

        let mut arena = self.inner.arena.write();
        if self.inner.config.atomic_batch_insert() {
            let mut prepared = Vec::with_capacity(documents.len());
            let mut seen = HashSet::new();
            for (index, document) in documents.into_iter().enumerate() {
                let document = self.prepare_insert(document)?;
                let id = document.id().cloned().unwrap_or_default();
                if arena.contains_key(&id) || !seen.insert(id.clone()) {
                    return Err(self.duplicate_key(&id, Some(index)));
                }
                prepared.push(document);
            }

            let mut ids = Vec::with_capacity(prepared.len());
            for document in prepared {
                ids.push(self.insert_prepared(&mut arena, document)?);
            }
            return Ok(InsertManyResult::new(ids));
        }

        let mut ids = Vec::with_capacity(documents.len());
        for (index, document) in documents.into_iter().enumerate() {
            let document = self.prepare_insert(document)?;
            match self.insert_prepared(&mut arena, document) {
                Ok(id) => ids.push(id),
                Err(error) if error.kind() == &ErrorKind::DuplicateKey => {
                    log::error!(
                        "insert_many on {} stopped at index {} after {} inserts",
                        self.namespace(),
                        index,
                        ids.len()
                    );
                    return Err(DocsimError::new_with_cause(
                        &format!(
                            "Write error at index {}: {}; {} documents inserted",
                            index,
                            error.message(),
                            ids.len()
                        ),
                        ErrorKind::DuplicateKey,
                        error,
                    ));
                }
                Err(error) => return Err(error),
            }
        }
        Ok(InsertManyResult::new(ids))
    }

    // ==================== Reads ====================

    /// Returns a cursor over the documents matching `filter`, in storage order.
    pub fn find(&self, filter: &Document) -> DocsimResult<DocumentCursor> {
        let filter = Filter::parse(filter)?;
        self.find_matching(&filter)
    }

    /// Like [Collection::find] with a pre-built [Filter].
    pub fn find_matching(&self, filter: &Filter) -> DocsimResult<DocumentCursor> {
        let snapshot = self.snapshot(filter)?;
        Ok(DocumentCursor::new(
            snapshot,
            self.inner.config.default_batch_size(),
        ))
    }

    /// Runs a find with sort, skip, limit and projection preset on the cursor.
    pub fn find_with_options(&self, filter: &Document, options: &FindOptions) -> DocsimResult<DocumentCursor> {
        let mut cursor = self.find(filter)?;
        if let Some(sort) = &options.sort {
            cursor.sort_by(sort.clone())?;
        }
        cursor
            .offset(to_signed(options.skip))?
            .limit(to_signed(options.limit))?
            .set_projection(options.projection.clone())?;
        Ok(cursor)
    }

    /// The first matching document in storage order.
    pub fn find_one(&self, filter: &Document) -> DocsimResult<Option<Document>> {
        let filter = Filter::parse(filter)?;
        self.ensure_opened()?;
        let arena = self.inner.arena.read();
        for document in arena.values() {
            if filter.matches(document)? {
                return Ok(Some(Document::clone(document)));
            }
        }
        Ok(None)
    }

    /// Counts matching documents after skipping `skip` and capping at `limit`
    /// (`0` for no cap).
    pub fn count_documents(&self, filter: &Document, skip: u64, limit: u64) -> DocsimResult<u64> {
        let filter = Filter::parse(filter)?;
        let total = self.snapshot(&filter)?.len() as u64;
        let remaining = total.saturating_sub(skip);
        Ok(if limit == 0 { remaining } else { remaining.min(limit) })
    }

    /// Number of documents in the collection, without evaluating a filter.
    pub fn estimated_document_count(&self) -> DocsimResult<u64> {
        self.ensure_opened()?;
        Ok(self.inner.arena.read().len() as u64)
    }

    /// Distinct values of `field` among the matching documents.
    ///
    /// Array values contribute their elements; documents without the field
    /// contribute nothing. Values appear in first-seen order.
    pub fn distinct(&self, field: &str, filter: &Document) -> DocsimResult<Vec<Value>> {
        let filter = Filter::parse(filter)?;
        let snapshot = self.snapshot(&filter)?;
        let values = snapshot
            .iter()
            .filter_map(|document| document.resolve_fanned(field))
            .flat_map(|(value, fanned)| match value {
                Value::Array(items) if fanned => items,
                other => vec![other],
            })
            .flat_map(|value| match value {
                Value::Array(items) => items,
                other => vec![other],
            })
            .unique()
            .collect();
        Ok(values)
    }

    /// Runs an aggregation pipeline over a snapshot of the collection.
    ///
    /// `$lookup` stages read other collections of the same database; a
    /// collection that does not exist joins as empty.
    pub fn aggregate(&self, pipeline: &[Value]) -> DocsimResult<DocumentCursor> {
        let pipeline = Pipeline::parse(pipeline)?;
        self.ensure_opened()?;
        let input: Vec<Document> = {
            let arena = self.inner.arena.read();
            arena.values().map(|document| Document::clone(document)).collect()
        };

        let siblings = self.inner.siblings.clone();
        let foreign = move |name: &str| -> Vec<Document> {
            let collection = siblings
                .upgrade()
                .and_then(|collections| collections.get(name).map(|entry| entry.value().clone()));
            match collection {
                Some(collection) => collection.all_documents(),
                None => Vec::new(),
            }
        };

        let results = pipeline.execute(input, &foreign)?;
        Ok(DocumentCursor::new(
            results.into_iter().map(Arc::new).collect(),
            self.inner.config.default_batch_size(),
        ))
    }

    // ==================== Updates ====================

    /// Applies `update` to the first matching document.
    ///
    /// With `upsert` and no match, a document seeded from the filter's
    /// equality clauses is built, updated and inserted.
    pub fn update_one(
        &self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> DocsimResult<UpdateResult> {
        self.update(filter, update, options, false)
    }

    /// Applies `update` to every matching document.
    ///
    /// Either every matching document is updated or, on error, none is.
    pub fn update_many(
        &self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> DocsimResult<UpdateResult> {
        self.update(filter, update, options, true)
    }

    /// Replaces the body of the first matching document, keeping its `_id`.
    pub fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
        options: &UpdateOptions,
    ) -> DocsimResult<UpdateResult> {
        validate_replacement(&replacement)?;
        let filter_doc = filter;
        let filter = Filter::parse(filter_doc)?;
        self.ensure_opened()?;

        let mut arena = self.inner.arena.write();
        let target = find_first(&arena, &filter, None)?;
        match target {
            Some((id, current)) => {
                let replaced = self.build_replacement(&current, replacement)?;
                let modified = !replaced.is_identical(&current);
                if modified {
                    arena.insert(id, Arc::new(replaced));
                }
                Ok(UpdateResult::new(1, u64::from(modified), None))
            }
            None if options.is_upsert() => {
                let document = upsert_replacement(filter_doc, replacement);
                let document = self.prepare_insert(document)?;
                let id = self.insert_prepared(&mut arena, document)?;
                Ok(UpdateResult::new(0, 0, Some(id)))
            }
            None => Ok(UpdateResult::new(0, 0, None)),
        }
    }

    /// Updates the first matching document (by `sort` if given) and returns
    /// it as it was before or after the update.
    pub fn find_one_and_update(
        &self,
        filter: &Document,
        update: &Document,
        options: &FindOneAndModifyOptions,
    ) -> DocsimResult<Option<Document>> {
        let spec = UpdateSpec::parse(update)?;
        let filter_doc = filter;
        let filter = Filter::parse(filter_doc)?;
        self.ensure_opened()?;

        let mut arena = self.inner.arena.write();
        let target = find_first(&arena, &filter, options.sort.as_ref())?;
        let returned = match target {
            Some((id, current)) => {
                let updated = spec.apply(&current)?;
                self.validate_depth(&updated)?;
                let updated = Arc::new(updated);
                if !updated.is_identical(&current) {
                    arena.insert(id, updated.clone());
                }
                match options.return_document {
                    ReturnDocument::Before => Some(current),
                    ReturnDocument::After => Some(updated),
                }
            }
            None if options.upsert => {
                let document = upsert_document(equality_clauses(filter_doc), &spec)?;
                let document = self.prepare_insert(document)?;
                let inserted = Arc::new(document.clone());
                self.insert_prepared(&mut arena, document)?;
                match options.return_document {
                    ReturnDocument::Before => None,
                    ReturnDocument::After => Some(inserted),
                }
            }
            None => None,
        };
        drop(arena);
        project_returned(returned, options.projection.as_ref())
    }

    /// Replaces the first matching document (by `sort` if given) and returns
    /// it as it was before or after the replacement.
    pub fn find_one_and_replace(
        &self,
        filter: &Document,
        replacement: Document,
        options: &FindOneAndModifyOptions,
    ) -> DocsimResult<Option<Document>> {
        validate_replacement(&replacement)?;
        let filter_doc = filter;
        let filter = Filter::parse(filter_doc)?;
        self.ensure_opened()?;

        let mut arena = self.inner.arena.write();
        let target = find_first(&arena, &filter, options.sort.as_ref())?;
        let returned = match target {
            Some((id, current)) => {
                let replaced = Arc::new(self.build_replacement(&current, replacement)?);
                if !replaced.is_identical(&current) {
                    arena.insert(id, replaced.clone());
                }
                match options.return_document {
                    ReturnDocument::Before => Some(current),
                    ReturnDocument::After => Some(replaced),
                }
            }
            None if options.upsert => {
                let document = upsert_replacement(filter_doc, replacement);
                let document = self.prepare_insert(document)?;
                let inserted = Arc::new(document.clone());
                self.insert_prepared(&mut arena, document)?;
                match options.return_document {
                    ReturnDocument::Before => None,
                    ReturnDocument::After => Some(inserted),
                }
            }
            None => None,
        };
        drop(arena);
        project_returned(returned, options.projection.as_ref())
    }

    // ==================== Deletes ====================

    pub fn delete_one(&self, filter: &Document) -> DocsimResult<DeleteResult> {
        self.delete(filter, false)
    }

    pub fn delete_many(&self, filter: &Document) -> DocsimResult<DeleteResult> {
        self.delete(filter, true)
    }

    /// Deletes the first matching document (by `sort` if given) and returns it.
    pub fn find_one_and_delete(
        &self,
        filter: &Document,
        options: &FindOneAndModifyOptions,
    ) -> DocsimResult<Option<Document>> {
        let filter = Filter::parse(filter)?;
        self.ensure_opened()?;

        let mut arena = self.inner.arena.write();
        let removed = match find_first(&arena, &filter, options.sort.as_ref())? {
            Some((id, current)) => {
                arena.shift_remove(&id);
                Some(current)
            }
            None => None,
        };
        drop(arena);
        project_returned(removed, options.projection.as_ref())
    }

    // ==================== Indexes ====================

    /// Records an index on `keys` and returns its name.
    pub fn create_index(&self, keys: &Document, options: &IndexOptions) -> DocsimResult<String> {
        self.ensure_opened()?;
        self.inner.indexes.write().create(keys, options)
    }

    pub fn list_indexes(&self) -> DocsimResult<Vec<IndexDescriptor>> {
        self.ensure_opened()?;
        Ok(self.inner.indexes.read().list())
    }

    /// Drops an index by name; `"*"` drops every index except `_id_`.
    pub fn drop_index(&self, name: &str) -> DocsimResult<()> {
        self.ensure_opened()?;
        self.inner.indexes.write().drop_index(name)
    }

    /// Drops the index with the given key pattern.
    pub fn drop_index_by_keys(&self, keys: &Document) -> DocsimResult<()> {
        self.ensure_opened()?;
        self.inner.indexes.write().drop_by_keys(keys)
    }

    pub(crate) fn index_count(&self) -> usize {
        self.inner.indexes.read().len()
    }

    // ==================== Internals ====================

    /// Clears the collection and invalidates this handle and its clones.
    pub(crate) fn drop_collection(&self) {
        self.inner.dropped.store(true, Ordering::Relaxed);
        self.inner.arena.write().clear();
        self.inner.indexes.write().clear();
        log::debug!("Dropped collection {}", self.namespace());
    }

    pub(crate) fn all_documents(&self) -> Vec<Document> {
        self.inner
            .arena
            .read()
            .values()
            .map(|document| Document::clone(document))
            .collect()
    }

    fn ensure_opened(&self) -> DocsimResult<()> {
        if self.is_dropped() {
            log::error!("Collection {} is dropped and cannot be accessed", self.namespace());
            return Err(DocsimError::new(
                &format!("Collection '{}' is dropped and cannot be accessed", self.namespace()),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn snapshot(&self, filter: &Filter) -> DocsimResult<Vec<Arc<Document>>> {
        self.ensure_opened()?;
        let arena = self.inner.arena.read();
        if is_all_filter(filter) {
            return Ok(arena.values().cloned().collect());
        }

        let mut matched = Vec::new();
        for document in arena.values() {
            if filter.matches(document)? {
                matched.push(document.clone());
            }
        }
        Ok(matched)
    }

    fn update(
        &self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
        many: bool,
    ) -> DocsimResult<UpdateResult> {
        let spec = UpdateSpec::parse(update)?;
        let filter_doc = filter;
        let filter = Filter::parse(filter_doc)?;
        self.ensure_opened()?;

        let mut arena = self.inner.arena.write();
        let mut matched = 0u64;
        let mut changed = Vec::new();
        for (id, document) in arena.iter() {
            if !filter.matches(document)? {
                continue;
            }
            matched += 1;
            let updated = spec.apply(document)?;
            self.validate_depth(&updated)?;
            if !updated.is_identical(document) {
                changed.push((id.clone(), updated));
            }
            if !many {
                break;
            }
        }

        if matched == 0 && options.is_upsert() {
            let document = upsert_document(equality_clauses(filter_doc), &spec)?;
            let document = self.prepare_insert(document)?;
            let id = self.insert_prepared(&mut arena, document)?;
            return Ok(UpdateResult::new(0, 0, Some(id)));
        }

        let modified = changed.len() as u64;
        for (id, updated) in changed {
            arena.insert(id, Arc::new(updated));
        }
        Ok(UpdateResult::new(matched, modified, None))
    }

    fn delete(&self, filter: &Document, many: bool) -> DocsimResult<DeleteResult> {
        let filter = Filter::parse(filter)?;
        self.ensure_opened()?;

        let mut arena = self.inner.arena.write();
        let mut doomed = Vec::new();
        for (id, document) in arena.iter() {
            if filter.matches(document)? {
                doomed.push(id.clone());
                if !many {
                    break;
                }
            }
        }
        for id in &doomed {
            arena.shift_remove(id);
        }
        Ok(DeleteResult::new(doomed.len() as u64))
    }

    /// Assigns a missing `_id`, moves `_id` first and validates the document.
    fn prepare_insert(&self, document: Document) -> DocsimResult<Document> {
        let id = match document.id() {
            Some(Value::Array(_)) => {
                log::error!("Array _id rejected on {}", self.namespace());
                return Err(DocsimError::new(
                    "The '_id' value cannot be of type array",
                    ErrorKind::ValidationError,
                ));
            }
            Some(id) => id.clone(),
            None => Value::ObjectId(ObjectId::new()),
        };
        let document = document.with_id_first(id);
        self.validate_depth(&document)?;
        Ok(document)
    }

    fn insert_prepared(&self, arena: &mut Arena, document: Document) -> DocsimResult<Value> {
        let id = document.id().cloned().unwrap_or_default();
        if arena.contains_key(&id) {
            return Err(self.duplicate_key(&id, None));
        }
        arena.insert(id.clone(), Arc::new(document));
        Ok(id)
    }

    fn duplicate_key(&self, id: &Value, index: Option<usize>) -> DocsimError {
        log::error!("Duplicate _id {} in {}", id, self.namespace());
        let location = index.map(|i| format!(" at batch index {}", i)).unwrap_or_default();
        DocsimError::new(
            &format!(
                "E11000 duplicate key error collection: {} index: _id_ dup key: {{ _id: {} }}{}",
                self.namespace(),
                id,
                location
            ),
            ErrorKind::DuplicateKey,
        )
    }

    fn validate_depth(&self, document: &Document) -> DocsimResult<()> {
        let max_depth = self.inner.config.max_nesting_depth();
        if document.depth() > max_depth {
            log::error!("Document exceeds max nesting depth {}", max_depth);
            return Err(DocsimError::new(
                &format!("Document exceeds maximum nesting depth of {}", max_depth),
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }

    fn build_replacement(&self, current: &Document, replacement: Document) -> DocsimResult<Document> {
        let current_id = current.id().cloned().unwrap_or_default();
        if let Some(id) = replacement.id() {
            if !id.is_identical(&current_id) {
                log::error!("Replacement attempted to change _id {} to {}", current_id, id);
                return Err(DocsimError::new(
                    &format!(
                        "After applying the update, the (immutable) field '_id' was found to have been altered to _id: {}",
                        id
                    ),
                    ErrorKind::ImmutableField,
                ));
            }
        }
        let replaced = replacement.with_id_first(current_id);
        self.validate_depth(&replaced)?;
        Ok(replaced)
    }
}

/// The first document matching `filter`, in `sort` order if given.
fn find_first(
    arena: &Arena,
    filter: &Filter,
    sort: Option<&SortSpec>,
) -> DocsimResult<Option<(Value, Arc<Document>)>> {
    let mut matched = Vec::new();
    for (id, document) in arena.iter() {
        if filter.matches(document)? {
            if sort.is_none() {
                return Ok(Some((id.clone(), document.clone())));
            }
            matched.push(document.clone());
        }
    }

    let first = match sort {
        Some(sort) => SortedStream::new(matched, sort).next(),
        None => None,
    };
    Ok(first.map(|document| (document.id().cloned().unwrap_or_default(), document)))
}

fn validate_replacement(replacement: &Document) -> DocsimResult<()> {
    if let Some(key) = replacement.keys().find(|key| key.starts_with(OPERATOR_PREFIX)) {
        log::error!("Replacement document contains operator {}", key);
        return Err(DocsimError::new(
            &format!("the replacement document must not contain update operators, found {}", key),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

/// The document a replace upsert inserts: the replacement, taking `_id`
/// from the filter's equality clauses when it has none.
fn upsert_replacement(filter: &Document, replacement: Document) -> Document {
    if replacement.has_id() {
        return replacement;
    }
    match equality_clauses(filter).into_iter().find(|(path, _)| path == DOC_ID) {
        Some((_, id)) => replacement.with_id_first(id),
        None => replacement,
    }
}

fn project_returned(
    document: Option<Arc<Document>>,
    projection: Option<&Projection>,
) -> DocsimResult<Option<Document>> {
    match (document, projection) {
        (Some(document), Some(projection)) => projection.apply(&document).map(Some),
        (Some(document), None) => Ok(Some(Document::clone(&document))),
        (None, _) => Ok(None),
    }
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn create_collection() -> Collection {
        Collection::new("people", "test", DocsimConfig::new(), Weak::new())
    }

    fn seeded() -> Collection {
        let collection = create_collection();
        collection
            .insert_many(vec![
                doc! { name: "Alice", age: 25, status: "active" },
                doc! { name: "Bob", age: 30, status: "inactive" },
                doc! { name: "Charlie", age: 35, status: "active" },
            ])
            .unwrap();
        collection
    }

    fn names(documents: &[Document]) -> Vec<String> {
        documents
            .iter()
            .map(|d| d.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn test_insert_one_generates_id_first() {
        let collection = create_collection();
        let result = collection.insert_one(doc! { name: "Alice" }).unwrap();
        assert!(matches!(result.inserted_id(), Value::ObjectId(_)));

        let stored = collection.find_one(&doc! {}).unwrap().unwrap();
        assert_eq!(stored.keys().next().map(|k| k.as_str()), Some("_id"));
        assert_eq!(stored.id(), Some(result.inserted_id()));
    }

    #[test]
    fn test_insert_duplicate_id() {
        let collection = create_collection();
        collection.insert_one(doc! { _id: 1, v: "a" }).unwrap();
        let err = collection.insert_one(doc! { _id: 1, v: "b" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert_eq!(collection.estimated_document_count().unwrap(), 1);
        let stored = collection.find_one(&doc! { _id: 1 }).unwrap().unwrap();
        assert_eq!(stored.get("v"), Some(&val!("a")));
    }

    #[test]
    fn test_insert_rejects_array_id_and_deep_documents() {
        let collection = create_collection();
        let err = collection.insert_one(doc! { _id: [1, 2] }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let config = DocsimConfig::new();
        config.set_max_nesting_depth(2).unwrap();
        let shallow = Collection::new("c", "test", config, Weak::new());
        assert!(shallow.insert_one(doc! { a: { b: 1 } }).is_ok());
        let err = shallow.insert_one(doc! { a: { b: { c: 1 } } }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_insert_many_is_partial_by_default() {
        let collection = create_collection();
        let err = collection
            .insert_many(vec![doc! { _id: 1 }, doc! { _id: 2 }, doc! { _id: 1 }, doc! { _id: 3 }])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert_eq!(collection.estimated_document_count().unwrap(), 2);
    }

    #[test]
    fn test_insert_many_atomic() {
        let config = DocsimConfig::new();
        config.set_atomic_batch_insert(true).unwrap();
        let collection = Collection::new("c", "test", config, Weak::new());
        let err = collection
            .insert_many(vec![doc! { _id: 1 }, doc! { _id: 2 }, doc! { _id: 1 }])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert_eq!(collection.estimated_document_count().unwrap(), 0);

        let result = collection.insert_many(vec![doc! { _id: 1 }, doc! {}]).unwrap();
        assert_eq!(result.inserted_ids().len(), 2);
    }

    #[test]
    fn test_insert_many_generates_distinct_ids() {
        let collection = create_collection();
        let documents = (0..100).map(|i| doc! { n: i }).collect();
        let result = collection.insert_many(documents).unwrap();
        let ids: HashSet<Value> = result.inserted_ids().iter().cloned().collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_find_in_insertion_order() {
        let collection = seeded();
        let active = collection.find(&doc! { status: "active" }).unwrap().to_list().unwrap();
        assert_eq!(names(&active), vec!["Alice", "Charlie"]);

        let older = collection.find(&doc! { age: { "$gte": 30 } }).unwrap().to_list().unwrap();
        assert_eq!(names(&older), vec!["Bob", "Charlie"]);
    }

    #[test]
    fn test_find_is_a_snapshot() {
        let collection = seeded();
        let mut cursor = collection.find(&doc! {}).unwrap();
        collection.insert_one(doc! { name: "Dave" }).unwrap();
        collection.delete_one(&doc! { name: "Alice" }).unwrap();
        assert_eq!(names(&cursor.to_list().unwrap()), vec!["Alice", "Bob", "Charlie"]);
    }

    #[test]
    fn test_find_with_options() {
        let collection = seeded();
        let options = FindOptions::new()
            .sort(&doc! { age: (-1) })
            .unwrap()
            .skip(1)
            .limit(1)
            .projection(&doc! { name: 1, _id: 0 })
            .unwrap();
        let found = collection
            .find_with_options(&doc! {}, &options)
            .unwrap()
            .to_list()
            .unwrap();
        assert_eq!(found, vec![doc! { name: "Bob" }]);
    }

    #[test]
    fn test_find_with_skip_and_limit_options() {
        let collection = seeded();
        let options = FindOptions::new().skip(1).limit(2);
        let mut cursor = collection.find_with_options(&doc! {}, &options).unwrap();
        assert_eq!(cursor.size().unwrap(), 2);
        assert_eq!(names(&cursor.to_list().unwrap()), vec!["Bob", "Charlie"]);

        let mut cursor = collection.find(&doc! {}).unwrap();
        cursor.offset(2).unwrap();
        assert_eq!(cursor.size().unwrap(), 1);
        let remaining: Vec<Document> = cursor.collect();
        assert_eq!(names(&remaining), vec!["Charlie"]);
    }

    #[test]
    fn test_update_one_inc() {
        let collection = create_collection();
        collection.insert_one(doc! { name: "Test", count: 5 }).unwrap();
        let result = collection
            .update_one(
                &doc! { name: "Test" },
                &doc! { "$inc": { count: 3 } },
                &UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!(result.matched_count(), 1);
        assert_eq!(result.modified_count(), 1);
        let stored = collection.find_one(&doc! { name: "Test" }).unwrap().unwrap();
        assert_eq!(stored.get("count"), Some(&val!(8)));
    }

    #[test]
    fn test_update_counts_only_real_changes() {
        let collection = seeded();
        let result = collection
            .update_many(
                &doc! {},
                &doc! { "$set": { status: "active" } },
                &UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!(result.matched_count(), 3);
        assert_eq!(result.modified_count(), 1);
    }

    #[test]
    fn test_update_many_is_all_or_nothing() {
        let collection = create_collection();
        collection
            .insert_many(vec![doc! { _id: 1, n: 1 }, doc! { _id: 2, n: "x" }, doc! { _id: 3, n: 3 }])
            .unwrap();
        let err = collection
            .update_many(&doc! {}, &doc! { "$inc": { n: 1 } }, &UpdateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
        let first = collection.find_one(&doc! { _id: 1 }).unwrap().unwrap();
        assert_eq!(first.get("n"), Some(&val!(1)));
    }

    #[test]
    fn test_update_rejects_id_change() {
        let collection = seeded();
        let err = collection
            .update_one(
                &doc! { name: "Alice" },
                &doc! { "$set": { _id: 5 } },
                &UpdateOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ImmutableField);
    }

    #[test]
    fn test_upsert() {
        let collection = create_collection();
        let result = collection
            .update_one(
                &doc! { name: "Zed", age: { "$gt": 10 } },
                &doc! { "$set": { status: "new" }, "$setOnInsert": { created: true } },
                &UpdateOptions::new().upsert(true),
            )
            .unwrap();
        assert_eq!(result.matched_count(), 0);
        let id = result.upserted_id().cloned().unwrap();

        let stored = collection.find_one(&doc! { name: "Zed" }).unwrap().unwrap();
        assert_eq!(stored.id(), Some(&id));
        assert_eq!(stored.get("status"), Some(&val!("new")));
        assert_eq!(stored.get("created"), Some(&val!(true)));
        assert!(stored.get("age").is_none());

        let result = collection
            .update_one(
                &doc! { name: "Zed" },
                &doc! { "$set": { status: "old" }, "$setOnInsert": { created: false } },
                &UpdateOptions::new().upsert(true),
            )
            .unwrap();
        assert_eq!(result.matched_count(), 1);
        assert!(result.upserted_id().is_none());
        let stored = collection.find_one(&doc! { name: "Zed" }).unwrap().unwrap();
        assert_eq!(stored.get("created"), Some(&val!(true)));
    }

    #[test]
    fn test_replace_one() {
        let collection = create_collection();
        collection.insert_one(doc! { _id: 7, name: "Old", extra: 1 }).unwrap();
        let result = collection
            .replace_one(&doc! { _id: 7 }, doc! { name: "New" }, &UpdateOptions::default())
            .unwrap();
        assert_eq!(result.modified_count(), 1);
        let stored = collection.find_one(&doc! { _id: 7 }).unwrap().unwrap();
        assert_eq!(stored, doc! { _id: 7, name: "New" });

        let err = collection
            .replace_one(&doc! { _id: 7 }, doc! { _id: 8, name: "X" }, &UpdateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ImmutableField);

        let err = collection
            .replace_one(&doc! { _id: 7 }, doc! { "$set": { a: 1 } }, &UpdateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let result = collection
            .replace_one(&doc! { _id: 9 }, doc! { name: "Upserted" }, &UpdateOptions::new().upsert(true))
            .unwrap();
        assert_eq!(result.upserted_id(), Some(&val!(9)));
    }

    #[test]
    fn test_delete() {
        let collection = seeded();
        assert_eq!(collection.delete_one(&doc! { status: "active" }).unwrap().deleted_count(), 1);
        assert_eq!(names(&collection.all_documents()), vec!["Bob", "Charlie"]);
        assert_eq!(collection.delete_many(&doc! {}).unwrap().deleted_count(), 2);
        assert_eq!(collection.estimated_document_count().unwrap(), 0);
    }

    #[test]
    fn test_count_documents() {
        let collection = seeded();
        assert_eq!(collection.count_documents(&doc! {}, 0, 0).unwrap(), 3);
        assert_eq!(collection.count_documents(&doc! { status: "active" }, 0, 0).unwrap(), 2);
        assert_eq!(collection.count_documents(&doc! {}, 1, 0).unwrap(), 2);
        assert_eq!(collection.count_documents(&doc! {}, 1, 1).unwrap(), 1);
        assert_eq!(collection.count_documents(&doc! {}, 5, 0).unwrap(), 0);
    }

    #[test]
    fn test_distinct() {
        let collection = create_collection();
        collection
            .insert_many(vec![
                doc! { tags: ["a", "b"], n: 1 },
                doc! { tags: "b", n: 1.0 },
                doc! { tags: ["c"], n: 2 },
                doc! { other: true },
            ])
            .unwrap();
        assert_eq!(
            collection.distinct("tags", &doc! {}).unwrap(),
            vec![val!("a"), val!("b"), val!("c")]
        );
        assert_eq!(collection.distinct("n", &doc! {}).unwrap(), vec![val!(1), val!(2)]);
        assert_eq!(
            collection.distinct("tags", &doc! { n: 2 }).unwrap(),
            vec![val!("c")]
        );
    }

    #[test]
    fn test_fanned_out_path_matches_whole_array_values() {
        let collection = create_collection();
        collection
            .insert_many(vec![
                doc! { _id: 1, items: [{ sku: ["a", "b"] }, { sku: "c" }] },
                doc! { _id: 2, items: [{ sku: "a" }, { sku: "d" }] },
                doc! { _id: 3, tags: [["a", "b"]] },
            ])
            .unwrap();

        let ids = |filter: Document| -> Vec<Value> {
            collection
                .find(&filter)
                .unwrap()
                .filter_map(|document| document.id().cloned())
                .collect()
        };
        assert_eq!(ids(doc! { "items.sku": ["a", "b"] }), vec![val!(1)]);
        assert_eq!(ids(doc! { "items.sku": "a" }), vec![val!(1), val!(2)]);
        assert_eq!(ids(doc! { "items.sku": "c" }), vec![val!(1)]);
        assert_eq!(ids(doc! { "items.sku": { "$ne": "c" } }), vec![val!(2), val!(3)]);
        assert_eq!(ids(doc! { tags: ["a", "b"] }), vec![val!(3)]);
        assert!(ids(doc! { tags: "a" }).is_empty());
        assert_eq!(
            collection.distinct("items.sku", &doc! {}).unwrap(),
            vec![val!("a"), val!("b"), val!("c"), val!("d")]
        );
    }

    #[test]
    fn test_find_one_and_update() {
        let collection = seeded();
        let options = FindOneAndModifyOptions::new().sort(&doc! { age: (-1) }).unwrap();
        let before = collection
            .find_one_and_update(&doc! { status: "active" }, &doc! { "$inc": { age: 1 } }, &options)
            .unwrap()
            .unwrap();
        assert_eq!(before.get("name"), Some(&val!("Charlie")));
        assert_eq!(before.get("age"), Some(&val!(35)));

        let options = options.return_document(ReturnDocument::After);
        let after = collection
            .find_one_and_update(&doc! { status: "active" }, &doc! { "$inc": { age: 1 } }, &options)
            .unwrap()
            .unwrap();
        assert_eq!(after.get("age"), Some(&val!(37)));

        let missing = collection
            .find_one_and_update(&doc! { name: "Nobody" }, &doc! { "$set": { a: 1 } }, &options)
            .unwrap();
        assert!(missing.is_none());

        let upserted = collection
            .find_one_and_update(
                &doc! { name: "Nobody" },
                &doc! { "$set": { a: 1 } },
                &options.clone().upsert(true),
            )
            .unwrap()
            .unwrap();
        assert_eq!(upserted.get("a"), Some(&val!(1)));
        assert!(upserted.has_id());
    }

    #[test]
    fn test_find_one_and_replace_and_delete() {
        let collection = seeded();
        let options = FindOneAndModifyOptions::new()
            .return_document(ReturnDocument::After)
            .projection(&doc! { _id: 0 })
            .unwrap();
        let replaced = collection
            .find_one_and_replace(&doc! { name: "Bob" }, doc! { name: "Robert" }, &options)
            .unwrap();
        assert_eq!(replaced, Some(doc! { name: "Robert" }));

        let options = FindOneAndModifyOptions::new().sort(&doc! { age: 1 }).unwrap();
        let deleted = collection
            .find_one_and_delete(&doc! { status: "active" }, &options)
            .unwrap()
            .unwrap();
        assert_eq!(deleted.get("name"), Some(&val!("Alice")));
        assert_eq!(collection.estimated_document_count().unwrap(), 2);
    }

    #[test]
    fn test_aggregate_group() {
        let collection = create_collection();
        collection
            .insert_many(vec![
                doc! { category: "A", amount: 10 },
                doc! { category: "A", amount: 20 },
                doc! { category: "B", amount: 30 },
            ])
            .unwrap();
        let pipeline = vec![Value::Document(doc! {
            "$group": { _id: "$category", total: { "$sum": "$amount" } }
        })];
        let results = collection.aggregate(&pipeline).unwrap().to_list().unwrap();
        assert_eq!(
            results,
            vec![doc! { _id: "A", total: 30 }, doc! { _id: "B", total: 30 }]
        );
    }

    #[test]
    fn test_indexes() {
        let collection = create_collection();
        let name = collection.create_index(&doc! { age: 1 }, &IndexOptions::new()).unwrap();
        assert_eq!(name, "age_1");
        assert_eq!(collection.list_indexes().unwrap().len(), 2);
        assert_eq!(collection.index_count(), 2);
        collection.drop_index("age_1").unwrap();
        assert_eq!(
            collection.drop_index("age_1").unwrap_err().kind(),
            &ErrorKind::IndexNotFound
        );
    }

    #[test]
    fn test_dropped_handle_rejects_operations() {
        let collection = seeded();
        let handle = collection.clone();
        collection.drop_collection();
        assert!(handle.is_dropped());
        let err = handle.estimated_document_count().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        let err = handle.insert_one(doc! { a: 1 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }
}
