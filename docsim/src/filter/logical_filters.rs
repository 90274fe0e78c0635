use std::{any::Any, fmt::Display};

use crate::{collection::Document, common::Value, errors::DocsimResult};

use super::{Filter, FilterProvider};

fn join(filters: &[Filter], separator: &str) -> String {
    filters
        .iter()
        .map(|filter| filter.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Matches documents that satisfy every filter, evaluated in order with
/// short-circuit.
pub(crate) struct AndFilter {
    filters: Vec<Filter>,
}

impl AndFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        AndFilter { filters }
    }
}

impl Display for AndFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join(&self.filters, " && "))
    }
}

impl FilterProvider for AndFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        for filter in &self.filters {
            if !filter.apply(entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        for filter in &self.filters {
            if !filter.apply_on_value(value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn logical_filters(&self) -> DocsimResult<Vec<Filter>> {
        Ok(self.filters.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches documents that satisfy at least one filter.
pub(crate) struct OrFilter {
    filters: Vec<Filter>,
}

impl OrFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        OrFilter { filters }
    }
}

impl Display for OrFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join(&self.filters, " || "))
    }
}

impl FilterProvider for OrFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        for filter in &self.filters {
            if filter.apply(entry)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn logical_filters(&self) -> DocsimResult<Vec<Filter>> {
        Ok(self.filters.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `$nor`: matches documents that satisfy none of the filters.
pub(crate) struct NorFilter {
    filters: Vec<Filter>,
}

impl NorFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        NorFilter { filters }
    }
}

impl Display for NorFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!({})", join(&self.filters, " || "))
    }
}

impl FilterProvider for NorFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        for filter in &self.filters {
            if filter.apply(entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn logical_filters(&self) -> DocsimResult<Vec<Filter>> {
        Ok(self.filters.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Inverts another filter. Used for `$not` on a field, where a missing field
/// makes the inner condition false and therefore the negation true.
pub(crate) struct NotFilter {
    filter: Filter,
}

impl NotFilter {
    pub(crate) fn new(filter: Filter) -> Self {
        NotFilter { filter }
    }
}

impl Display for NotFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!({})", self.filter)
    }
}

impl FilterProvider for NotFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        Ok(!self.filter.apply(entry)?)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(!self.filter.apply_on_value(value)?)
    }

    fn has_field(&self) -> bool {
        self.filter.has_field()
    }

    fn get_field_name(&self) -> DocsimResult<String> {
        self.filter.get_field_name()
    }

    fn logical_filters(&self) -> DocsimResult<Vec<Filter>> {
        Ok(vec![self.filter.clone()])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::filter::field;

    #[test]
    fn test_and_short_circuits_in_order() {
        let filter = AndFilter::new(vec![field("a").eq(1), field("b").gt(1)]);
        assert!(filter.apply(&doc! { a: 1, b: 2 }).unwrap());
        assert!(!filter.apply(&doc! { a: 2, b: 2 }).unwrap());
        assert_eq!(filter.logical_filters().unwrap().len(), 2);
    }

    #[test]
    fn test_or_filter() {
        let filter = OrFilter::new(vec![field("a").eq(1), field("b").eq(1)]);
        assert!(filter.apply(&doc! { b: 1 }).unwrap());
        assert!(!filter.apply(&doc! { c: 1 }).unwrap());
    }

    #[test]
    fn test_nor_filter() {
        let filter = NorFilter::new(vec![field("a").eq(1), field("b").eq(1)]);
        assert!(!filter.apply(&doc! { b: 1 }).unwrap());
        assert!(filter.apply(&doc! { a: 2, b: 2 }).unwrap());
    }

    #[test]
    fn test_not_filter_matches_missing_field() {
        let filter = NotFilter::new(field("a").gt(5));
        assert!(filter.apply(&doc! { b: 1 }).unwrap());
        assert!(filter.apply(&doc! { a: 3 }).unwrap());
        assert!(!filter.apply(&doc! { a: 6 }).unwrap());
        assert_eq!(filter.get_field_name().unwrap(), "a");
    }

    #[test]
    fn test_display() {
        let filter = AndFilter::new(vec![field("a").eq(1), field("b").eq(2)]);
        assert_eq!(filter.to_string(), "((a == 1) && (b == 2))");
    }
}
