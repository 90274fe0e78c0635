use crate::collection::Document;
use crate::common::stream::Projection;
use crate::common::{SortOrder, SortSpec};
use crate::errors::DocsimResult;

/// Options for controlling find operations on documents.
///
/// `FindOptions` allows you to specify sorting, pagination and projection
/// for query results. It supports method chaining for convenient configuration.
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::collection::FindOptions;
/// use docsim::common::SortOrder;
///
/// let options = FindOptions::new()
///     .sort_by("age", SortOrder::Descending)
///     .skip(10)
///     .limit(20);
///
/// let options = order_by("name", SortOrder::Ascending);
/// let options = limit_to(100);
/// ```
#[derive(Clone, Default)]
pub struct FindOptions {
    pub(crate) sort: Option<SortSpec>,
    pub(crate) projection: Option<Projection>,
    pub(crate) skip: u64,
    pub(crate) limit: u64,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sort key; keys apply in the order they are added.
    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> Self {
        let spec = self.sort.take().unwrap_or_default();
        self.sort = Some(spec.by(field_name, sort_order));
        self
    }

    /// Replaces the sort keys with a `{field: 1 | -1}` document.
    pub fn sort(mut self, spec: &Document) -> DocsimResult<Self> {
        self.sort = Some(SortSpec::parse(spec)?);
        Ok(self)
    }

    /// Sets a projection document; an empty document means no projection.
    pub fn projection(mut self, projection: &Document) -> DocsimResult<Self> {
        self.projection = if projection.is_empty() {
            None
        } else {
            Some(Projection::parse(projection)?)
        };
        Ok(self)
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Caps the number of results; `0` means no limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }
}

/// Creates `FindOptions` with sorting by a field.
///
/// # Arguments
///
/// * `field_name` - The field to sort by
/// * `sort_order` - The sort order (Ascending or Descending)
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

/// Creates `FindOptions` that skips a number of results.
pub fn skip_by(skip: u64) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` that limits the number of results.
pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions::new().limit(limit)
}

/// Which version of the document a find-and-modify operation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    /// The document as it was before the modification.
    #[default]
    Before,
    /// The document as it is after the modification.
    After,
}

/// Options for `find_one_and_update`, `find_one_and_replace` and
/// `find_one_and_delete`.
///
/// `sort` picks which of several matching documents is modified,
/// `projection` shapes the returned document and `upsert` inserts a new
/// document when nothing matches (ignored by delete).
#[derive(Clone, Default)]
pub struct FindOneAndModifyOptions {
    pub(crate) sort: Option<SortSpec>,
    pub(crate) projection: Option<Projection>,
    pub(crate) return_document: ReturnDocument,
    pub(crate) upsert: bool,
}

impl FindOneAndModifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, spec: &Document) -> DocsimResult<Self> {
        self.sort = Some(SortSpec::parse(spec)?);
        Ok(self)
    }

    pub fn projection(mut self, projection: &Document) -> DocsimResult<Self> {
        self.projection = if projection.is_empty() {
            None
        } else {
            Some(Projection::parse(projection)?)
        };
        Ok(self)
    }

    pub fn return_document(mut self, return_document: ReturnDocument) -> Self {
        self.return_document = return_document;
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::ErrorKind;

    #[test]
    fn test_builders() {
        let options = FindOptions::new()
            .sort_by("age", SortOrder::Descending)
            .sort_by("name", SortOrder::Ascending)
            .skip(5)
            .limit(10);
        let keys = options.sort.as_ref().map(|s| s.keys().len());
        assert_eq!(keys, Some(2));
        assert_eq!(options.skip, 5);
        assert_eq!(options.limit, 10);

        assert_eq!(skip_by(3).skip, 3);
        assert_eq!(limit_to(7).limit, 7);
        assert!(order_by("age", SortOrder::Ascending).sort.is_some());
    }

    #[test]
    fn test_empty_projection_means_none() {
        let options = FindOptions::new().projection(&doc! {}).unwrap();
        assert!(options.projection.is_none());
        let options = FindOptions::new().projection(&doc! { name: 1 }).unwrap();
        assert!(options.projection.is_some());
    }

    #[test]
    fn test_invalid_sort_and_projection() {
        let err = FindOptions::new().sort(&doc! { age: 2 }).err().map(|e| e.kind().clone());
        assert_eq!(err, Some(ErrorKind::InvalidArgument));
        let err = FindOneAndModifyOptions::new()
            .projection(&doc! { a: 1, b: 0 })
            .err()
            .map(|e| e.kind().clone());
        assert_eq!(err, Some(ErrorKind::ProjectionConflict));
    }

    #[test]
    fn test_return_document_defaults_to_before() {
        let options = FindOneAndModifyOptions::new();
        assert_eq!(options.return_document, ReturnDocument::Before);
        assert!(!options.upsert);
        let options = options.return_document(ReturnDocument::After).upsert(true);
        assert_eq!(options.return_document, ReturnDocument::After);
        assert!(options.upsert);
    }
}
