use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use std::cmp::Ordering;

/// Specifies the direction for sorting documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort in ascending order (`1`)
    Ascending,
    /// Sort in descending order (`-1`)
    Descending,
}

impl SortOrder {
    /// Reads a `1`/`-1` direction.
    pub fn from_value(value: &Value) -> DocsimResult<SortOrder> {
        match value.as_i64() {
            Some(1) => Ok(SortOrder::Ascending),
            Some(-1) => Ok(SortOrder::Descending),
            _ => {
                log::error!("Invalid sort direction {}", value);
                Err(DocsimError::new(
                    &format!("$sort key ordering must be 1 (for ascending) or -1 (for descending), found {}", value),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }

    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// An ordered list of field paths and their sort directions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortSpec {
    keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    pub fn new() -> Self {
        SortSpec { keys: Vec::new() }
    }

    /// Builds a sort spec from a `{field: 1 | -1, ...}` document.
    pub fn parse(spec: &Document) -> DocsimResult<SortSpec> {
        if spec.is_empty() {
            log::error!("Empty sort specification");
            return Err(DocsimError::new(
                "sort specification must have at least one field",
                ErrorKind::InvalidArgument,
            ));
        }

        let mut keys = Vec::with_capacity(spec.size());
        for (field, direction) in spec.iter() {
            keys.push((field.clone(), SortOrder::from_value(direction)?));
        }
        Ok(SortSpec { keys })
    }

    pub fn by(mut self, field: &str, order: SortOrder) -> Self {
        self.keys.push((field.to_string(), order));
        self
    }

    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compares two documents key by key, treating a missing field as null.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in &self.keys {
            let left = a.resolve(field).unwrap_or(Value::Null);
            let right = b.resolve(field).unwrap_or(Value::Null);
            let ordering = order.apply(left.sort_cmp(&right));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn parses_directions() {
        let spec = SortSpec::parse(&doc! { age: (-1), name: 1 }).unwrap();
        assert_eq!(
            spec.keys(),
            &[
                ("age".to_string(), SortOrder::Descending),
                ("name".to_string(), SortOrder::Ascending)
            ]
        );
    }

    #[test]
    fn rejects_bad_direction() {
        let err = SortSpec::parse(&doc! { age: 2 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        let err = SortSpec::parse(&doc! { age: "asc" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn rejects_empty_spec() {
        assert!(SortSpec::parse(&doc! {}).is_err());
    }

    #[test]
    fn compares_multiple_keys() {
        let spec = SortSpec::new()
            .by("status", SortOrder::Ascending)
            .by("age", SortOrder::Descending);
        let a = doc! { status: "a", age: 10 };
        let b = doc! { status: "a", age: 20 };
        let c = doc! { status: "b", age: 5 };
        assert_eq!(spec.compare(&a, &b), Ordering::Greater);
        assert_eq!(spec.compare(&b, &c), Ordering::Less);
    }

    #[test]
    fn missing_field_sorts_as_null() {
        let spec = SortSpec::new().by("age", SortOrder::Ascending);
        let missing = doc! { name: "x" };
        let present = doc! { age: 1 };
        assert_eq!(spec.compare(&missing, &present), Ordering::Less);
    }
}
