use crate::collection::Document;
use crate::common::stream::projection::Projection;
use crate::common::stream::sorted_stream::SortedStream;
use crate::common::{SortSpec, DEFAULT_BATCH_SIZE};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Lifecycle of a [DocumentCursor].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Open,
    Exhausted,
    Closed,
}

/// A cursor over a point-in-time snapshot of query results.
///
/// The snapshot is taken when the query runs, so later writes to the
/// collection are never observed. `sort`, `offset`, `limit`, `project` and
/// `batch_size` may be called any number of times until the first document
/// is read; afterwards they fail with [ErrorKind::CursorInUse].
///
/// ```ignore
/// let mut cursor = collection.find(&doc! { status: "active" })?;
/// cursor.sort(&doc! { age: (-1) })?.offset(1)?.limit(10)?;
/// for document in cursor {
///     println!("{}", document);
/// }
/// ```
///
/// Errors raised while producing documents (for example a computed
/// projection field that cannot be evaluated) are reported by
/// [DocumentCursor::try_next] and the other fallible readers; the
/// [Iterator] implementation simply ends.
pub struct DocumentCursor {
    source: Arc<Vec<Arc<Document>>>,
    sort: SortSpec,
    skip: usize,
    limit: usize,
    projection: Option<Projection>,
    batch_size: usize,
    results: Option<Arc<Vec<Document>>>,
    position: usize,
    state: CursorState,
    error: Option<DocsimError>,
}

impl Debug for DocumentCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCursor")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl DocumentCursor {
    pub(crate) fn new(source: Vec<Arc<Document>>, batch_size: usize) -> Self {
        DocumentCursor {
            source: Arc::new(source),
            sort: SortSpec::new(),
            skip: 0,
            limit: 0,
            projection: None,
            batch_size: if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size },
            results: None,
            position: 0,
            state: CursorState::Open,
            error: None,
        }
    }

    /// Sorts by a `{field: 1 | -1}` document.
    pub fn sort(&mut self, spec: &Document) -> DocsimResult<&mut Self> {
        let spec = SortSpec::parse(spec)?;
        self.sort_by(spec)
    }

    pub fn sort_by(&mut self, spec: SortSpec) -> DocsimResult<&mut Self> {
        self.ensure_modifiable("sort")?;
        self.sort = spec;
        Ok(self)
    }

    /// Skips the first `skip` documents of the result set.
    pub fn offset(&mut self, skip: i64) -> DocsimResult<&mut Self> {
        let skip = non_negative("skip", skip)?;
        self.ensure_modifiable("offset")?;
        self.skip = skip;
        Ok(self)
    }

    /// Caps the number of documents returned; `0` removes the cap.
    pub fn limit(&mut self, limit: i64) -> DocsimResult<&mut Self> {
        let limit = non_negative("limit", limit)?;
        self.ensure_modifiable("limit")?;
        self.limit = limit;
        Ok(self)
    }

    pub fn project(&mut self, projection: &Document) -> DocsimResult<&mut Self> {
        let projection = Projection::parse(projection)?;
        self.ensure_modifiable("project")?;
        self.projection = Some(projection);
        Ok(self)
    }

    pub(crate) fn set_projection(&mut self, projection: Option<Projection>) -> DocsimResult<&mut Self> {
        self.ensure_modifiable("project")?;
        self.projection = projection;
        Ok(self)
    }

    pub fn batch_size(&mut self, batch_size: usize) -> DocsimResult<&mut Self> {
        if batch_size == 0 {
            log::error!("Cursor batch size must be positive");
            return Err(DocsimError::new(
                "batch size must be greater than 0",
                ErrorKind::InvalidArgument,
            ));
        }
        self.ensure_modifiable("batch_size")?;
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Whether more documents may still be read.
    pub fn is_alive(&self) -> bool {
        match self.state {
            CursorState::Closed | CursorState::Exhausted => false,
            CursorState::Open => match &self.results {
                Some(results) => self.position < results.len(),
                None => true,
            },
        }
    }

    pub fn has_next(&mut self) -> bool {
        if self.state == CursorState::Closed || self.materialize().is_err() {
            return false;
        }
        self.position < self.result_len()
    }

    /// Reads the next document, `Ok(None)` once the cursor is exhausted or
    /// closed.
    pub fn try_next(&mut self) -> DocsimResult<Option<Document>> {
        if self.state == CursorState::Closed {
            return Ok(None);
        }
        self.materialize()?;

        let next = self
            .results
            .as_ref()
            .and_then(|results| results.get(self.position))
            .cloned();
        match next {
            Some(document) => {
                self.position += 1;
                Ok(Some(document))
            }
            None => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Reads up to `batch_size` documents.
    pub fn next_batch(&mut self) -> DocsimResult<Vec<Document>> {
        let size = self.batch_size;
        self.to_list_with_length(size)
    }

    /// Reads all remaining documents.
    pub fn to_list(&mut self) -> DocsimResult<Vec<Document>> {
        self.to_list_with_length(usize::MAX)
    }

    /// Reads at most `length` of the remaining documents.
    pub fn to_list_with_length(&mut self, length: usize) -> DocsimResult<Vec<Document>> {
        let mut documents = Vec::new();
        while documents.len() < length {
            match self.try_next()? {
                Some(document) => documents.push(document),
                None => break,
            }
        }
        Ok(documents)
    }

    /// Returns the first document of the result set without moving the
    /// cursor.
    pub fn first(&mut self) -> DocsimResult<Option<Document>> {
        if self.state == CursorState::Closed {
            return Ok(None);
        }
        self.materialize()?;
        Ok(self.results.as_ref().and_then(|results| results.first()).cloned())
    }

    /// Number of documents in the result set after skip and limit.
    pub fn size(&mut self) -> DocsimResult<usize> {
        if self.state == CursorState::Closed {
            return Ok(0);
        }
        self.materialize()?;
        Ok(self.result_len())
    }

    /// Moves back to the start of the already materialized result set.
    pub fn rewind(&mut self) -> DocsimResult<&mut Self> {
        if self.state == CursorState::Closed {
            log::error!("Cannot rewind a closed cursor");
            return Err(DocsimError::new(
                "cannot rewind a closed cursor",
                ErrorKind::InvalidOperation,
            ));
        }
        self.position = 0;
        self.state = CursorState::Open;
        Ok(self)
    }

    pub fn close(&mut self) {
        self.state = CursorState::Closed;
        self.results = None;
        self.position = 0;
    }

    fn ensure_modifiable(&self, modifier: &str) -> DocsimResult<()> {
        if self.state == CursorState::Closed {
            log::error!("Cursor modifier {} called on a closed cursor", modifier);
            return Err(DocsimError::new(
                &format!("cannot call {} on a closed cursor", modifier),
                ErrorKind::CursorInUse,
            ));
        }
        if self.results.is_some() || self.error.is_some() {
            log::error!("Cursor modifier {} called after iteration started", modifier);
            return Err(DocsimError::new(
                &format!("cannot call {} after the cursor has been iterated", modifier),
                ErrorKind::CursorInUse,
            ));
        }
        Ok(())
    }

    fn result_len(&self) -> usize {
        self.results.as_ref().map(|results| results.len()).unwrap_or(0)
    }

    fn materialize(&mut self) -> DocsimResult<()> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.results.is_some() {
            return Ok(());
        }

        let sorted = SortedStream::new(self.source.iter().cloned(), &self.sort);
        let windowed = sorted.skip(self.skip);
        let window: Vec<Arc<Document>> = if self.limit == 0 {
            windowed.collect()
        } else {
            windowed.take(self.limit).collect()
        };

        let mut results = Vec::with_capacity(window.len());
        for document in window {
            let document = match &self.projection {
                Some(projection) => match projection.apply(&document) {
                    Ok(projected) => projected,
                    Err(error) => {
                        self.error = Some(error.clone());
                        return Err(error);
                    }
                },
                None => Document::clone(&document),
            };
            results.push(document);
        }
        self.results = Some(Arc::new(results));
        Ok(())
    }
}

fn non_negative(name: &str, value: i64) -> DocsimResult<usize> {
    if value < 0 {
        log::error!("Negative cursor {}: {}", name, value);
        return Err(DocsimError::new(
            &format!("{} must be non-negative, got {}", name, value),
            ErrorKind::InvalidArgument,
        ));
    }
    Ok(value as usize)
}

impl Clone for DocumentCursor {
    /// A fresh, unconsumed cursor over the same snapshot and modifiers.
    fn clone(&self) -> Self {
        DocumentCursor {
            source: self.source.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            projection: self.projection.clone(),
            batch_size: self.batch_size,
            results: None,
            position: 0,
            state: CursorState::Open,
            error: None,
        }
    }
}

impl Iterator for DocumentCursor {
    type Item = Document;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().ok().flatten()
    }
}
