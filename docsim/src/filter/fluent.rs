use crate::common::Value;
use crate::errors::DocsimResult;

use super::{
    ComparisonFilter, ComparisonMode, EqualsFilter, ExistsFilter, Filter, InFilter,
    NotEqualsFilter, NotInFilter, RegexFilter, SizeFilter,
};

/// Creates a fluent filter builder for the specified field name.
///
/// The field name is a dot-path; the empty name addresses the value under
/// test itself, which is how value-mode `$elemMatch` conditions are built.
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

/// A fluent builder for constructing filters on a specific field.
///
/// Each method produces the same [Filter] the corresponding operator in a
/// filter document compiles to.
pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    /// `$eq`
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(EqualsFilter::new(self.field_name, value.into()))
    }

    /// `$ne`
    #[inline]
    pub fn ne<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(NotEqualsFilter::new(self.field_name, value.into()))
    }

    /// `$gt`
    #[inline]
    pub fn gt<T: Into<Value>>(self, value: T) -> Filter {
        self.compare(value.into(), ComparisonMode::Greater)
    }

    /// `$gte`
    #[inline]
    pub fn gte<T: Into<Value>>(self, value: T) -> Filter {
        self.compare(value.into(), ComparisonMode::GreaterEqual)
    }

    /// `$lt`
    #[inline]
    pub fn lt<T: Into<Value>>(self, value: T) -> Filter {
        self.compare(value.into(), ComparisonMode::Lesser)
    }

    /// `$lte`
    #[inline]
    pub fn lte<T: Into<Value>>(self, value: T) -> Filter {
        self.compare(value.into(), ComparisonMode::LesserEqual)
    }

    /// Inclusive range, equivalent to `{"$gte": lower, "$lte": upper}`.
    pub fn between<T: Into<Value>>(self, lower: T, upper: T) -> Filter {
        let upper_filter = field(&self.field_name).lte(upper);
        self.gte(lower).and(upper_filter)
    }

    /// `$in`. Fails only when a listed regular expression does not compile.
    pub fn in_array<T: Into<Value>>(self, values: Vec<T>) -> DocsimResult<Filter> {
        let values = values.into_iter().map(Into::into).collect();
        Ok(Filter::new(InFilter::new(self.field_name, values)?))
    }

    /// `$nin`
    pub fn not_in<T: Into<Value>>(self, values: Vec<T>) -> DocsimResult<Filter> {
        let values = values.into_iter().map(Into::into).collect();
        Ok(Filter::new(NotInFilter::new(self.field_name, values)?))
    }

    /// `$exists`
    pub fn exists(self, exists: bool) -> Filter {
        Filter::new(ExistsFilter::new(self.field_name, exists))
    }

    /// `$size`
    pub fn size(self, size: usize) -> Filter {
        Filter::new(SizeFilter::new(self.field_name, size))
    }

    /// `$regex` without options.
    pub fn regex(self, pattern: &str) -> DocsimResult<Filter> {
        Ok(Filter::new(RegexFilter::new(self.field_name, pattern, "")?))
    }

    #[inline]
    fn compare(self, value: Value, mode: ComparisonMode) -> Filter {
        Filter::new(ComparisonFilter::new(self.field_name, value, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_fluent_equality() {
        let doc = doc! { name: "Alice", age: 25 };
        assert!(field("name").eq("Alice").matches(&doc).unwrap());
        assert!(field("name").ne("Bob").matches(&doc).unwrap());
    }

    #[test]
    fn test_fluent_ranges() {
        let doc = doc! { age: 25 };
        assert!(field("age").between(20, 30).matches(&doc).unwrap());
        assert!(!field("age").between(26, 30).matches(&doc).unwrap());
        assert!(field("age").lte(25).matches(&doc).unwrap());
        assert!(!field("age").lt(25).matches(&doc).unwrap());
    }

    #[test]
    fn test_fluent_membership() {
        let doc = doc! { tag: "b", tags: ["x", "y"] };
        assert!(field("tag").in_array(vec!["a", "b"]).unwrap().matches(&doc).unwrap());
        assert!(field("tag").not_in(vec!["a", "c"]).unwrap().matches(&doc).unwrap());
        assert!(field("tags").size(2).matches(&doc).unwrap());
        assert!(field("missing").exists(false).matches(&doc).unwrap());
        assert!(field("tag").regex("^b$").unwrap().matches(&doc).unwrap());
    }
}
