use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use std::any::Any;
use std::fmt::Display;
use std::ops::Deref;
use std::sync::Arc;

use super::parse_filter;
use super::AllFilter;
use super::AndFilter;
use super::NorFilter;
use super::NotFilter;
use super::OrFilter;

/// Trait for implementing filters.
///
/// A `FilterProvider` decides whether a document matches. Field-level
/// providers also evaluate a single resolved value through
/// [FilterProvider::apply_on_value], which is how `$elemMatch` and `$pull`
/// test array elements against operator conditions.
pub trait FilterProvider: Any + Send + Sync + Display {
    /// Applies the filter to a document and returns whether it matches.
    fn apply(&self, entry: &Document) -> DocsimResult<bool>;

    /// Applies the filter's condition to a value resolved from a field path.
    ///
    /// `None` stands for a missing field.
    fn apply_on_value(&self, _value: Option<&Value>) -> DocsimResult<bool> {
        log::error!("Filter {} does not support value matching", self);
        Err(DocsimError::new(
            &format!("Filter {} does not support value matching", self),
            ErrorKind::InvalidOperation,
        ))
    }

    /// Checks if this filter operates on a specific field.
    #[inline]
    fn has_field(&self) -> bool {
        false
    }

    /// Gets the field name this filter operates on.
    fn get_field_name(&self) -> DocsimResult<String> {
        log::error!("Filter {} does not have field name", self);
        Err(DocsimError::new(
            "Filter does not have field name",
            ErrorKind::InvalidOperation,
        ))
    }

    fn logical_filters(&self) -> DocsimResult<Vec<Filter>> {
        Err(DocsimError::new(
            "Filter is not a logical filter",
            ErrorKind::InvalidOperation,
        ))
    }

    fn as_any(&self) -> &dyn Any;
}

/// A compiled query filter.
///
/// `Filter` wraps a tree of [FilterProvider]s. It is usually compiled from a
/// filter document with [Filter::parse], or built with the fluent API in
/// [super::field].
///
/// ```rust,ignore
/// let filter = Filter::parse(&doc! { status: "active", age: { "$gte": 30 } })?;
/// assert!(filter.matches(&doc! { status: "active", age: 35 })?);
/// ```
#[derive(Clone)]
pub struct Filter {
    inner: Arc<dyn FilterProvider>,
}

impl Filter {
    /// Creates a new filter from a filter provider implementation.
    pub fn new<T: FilterProvider + 'static>(inner: T) -> Self {
        Filter { inner: Arc::new(inner) }
    }

    /// Compiles a filter document.
    ///
    /// Malformed operator arguments fail with [ErrorKind::ValidationError],
    /// unknown operators with [ErrorKind::UnknownOperator] and bad regular
    /// expressions with [ErrorKind::InvalidArgument].
    pub fn parse(filter: &Document) -> DocsimResult<Filter> {
        parse_filter(filter)
    }

    /// Returns whether `document` satisfies this filter.
    #[inline]
    pub fn matches(&self, document: &Document) -> DocsimResult<bool> {
        self.inner.apply(document)
    }

    /// Combines this filter with another using logical AND.
    pub fn and(&self, filter: Filter) -> Self {
        Filter::new(AndFilter::new(vec![self.clone(), filter]))
    }

    /// Combines this filter with another using logical OR.
    pub fn or(&self, filter: Filter) -> Self {
        Filter::new(OrFilter::new(vec![self.clone(), filter]))
    }

    /// Negates this filter using logical NOT.
    pub fn not(&self) -> Self {
        Filter::new(NotFilter::new(self.clone()))
    }
}

impl Display for Filter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Deref for Filter {
    type Target = Arc<dyn FilterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Compiles `filter` and tests it against `document`.
pub fn matches(document: &Document, filter: &Document) -> DocsimResult<bool> {
    Filter::parse(filter)?.matches(document)
}

/// Creates a filter that matches all documents.
pub fn all() -> Filter {
    Filter::new(AllFilter {})
}

/// Combines multiple filters using logical AND.
pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::new(AndFilter::new(filters))
}

/// Combines multiple filters using logical OR.
pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::new(OrFilter::new(filters))
}

/// Matches documents that satisfy none of the filters.
pub fn nor(filters: Vec<Filter>) -> Filter {
    Filter::new(NorFilter::new(filters))
}

/// Negates a filter using logical NOT.
pub fn not(filter: Filter) -> Filter {
    Filter::new(NotFilter::new(filter))
}

pub(crate) fn is_all_filter(filter: &Filter) -> bool {
    filter.as_any().is::<AllFilter>()
}

/// Tests `value` and, when it is an array, each of its elements.
#[inline]
pub(crate) fn any_candidate(value: &Value, predicate: impl Fn(&Value) -> bool) -> bool {
    if predicate(value) {
        return true;
    }
    match value {
        Value::Array(items) => items.iter().any(predicate),
        _ => false,
    }
}

/// Resolves the filter's field and evaluates its value condition.
#[inline]
pub(crate) fn apply_on_field<F: FilterProvider + ?Sized>(
    filter: &F,
    field_name: &str,
    entry: &Document,
) -> DocsimResult<bool> {
    if field_name.is_empty() {
        return filter.apply_on_value(Some(&Value::Document(entry.clone())));
    }
    let value = entry.query_candidates(field_name);
    filter.apply_on_value(value.as_ref())
}
