use std::any::Any;
use std::fmt::Display;

use crate::collection::Document;
use crate::common::Value;
use crate::errors::DocsimResult;

use super::{any_candidate, apply_on_field, FilterProvider};

/// A filter that matches all documents.
pub(crate) struct AllFilter;

impl FilterProvider for AllFilter {
    fn apply(&self, _entry: &Document) -> DocsimResult<bool> {
        Ok(true)
    }

    fn apply_on_value(&self, _value: Option<&Value>) -> DocsimResult<bool> {
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllFilter")
    }
}

/// Matches documents where a field, or one of its array elements, equals a
/// value. A missing field never matches.
pub(crate) struct EqualsFilter {
    field_name: String,
    field_value: Value,
}

impl EqualsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        EqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for EqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} == {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for EqualsFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(match value {
            Some(value) => any_candidate(value, |candidate| candidate == &self.field_value),
            None => false,
        })
    }

    fn has_field(&self) -> bool {
        true
    }

    fn get_field_name(&self) -> DocsimResult<String> {
        Ok(self.field_name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Negation of [EqualsFilter]; a missing field matches.
pub(crate) struct NotEqualsFilter {
    field_name: String,
    field_value: Value,
}

impl NotEqualsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        NotEqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for NotEqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} != {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for NotEqualsFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(match value {
            Some(value) => !any_candidate(value, |candidate| candidate == &self.field_value),
            None => true,
        })
    }

    fn has_field(&self) -> bool {
        true
    }

    fn get_field_name(&self) -> DocsimResult<String> {
        Ok(self.field_name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches on field presence, including fields holding an explicit null.
pub(crate) struct ExistsFilter {
    field_name: String,
    exists: bool,
}

impl ExistsFilter {
    pub(crate) fn new(field_name: String, exists: bool) -> Self {
        ExistsFilter { field_name, exists }
    }
}

impl Display for ExistsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} exists {})", self.field_name, self.exists)
    }
}

impl FilterProvider for ExistsFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(value.is_some() == self.exists)
    }

    fn has_field(&self) -> bool {
        true
    }

    fn get_field_name(&self) -> DocsimResult<String> {
        Ok(self.field_name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches fields whose value, or one of its array elements, has one of the
/// given type aliases.
pub(crate) struct TypeFilter {
    field_name: String,
    aliases: Vec<String>,
}

impl TypeFilter {
    pub(crate) fn new(field_name: String, aliases: Vec<String>) -> Self {
        TypeFilter { field_name, aliases }
    }

    fn accepts(&self, value: &Value) -> bool {
        self.aliases.iter().any(|alias| match alias.as_str() {
            "number" => matches!(value, Value::Int64(_) | Value::Float64(_) | Value::Decimal(_)),
            "int" | "long" => matches!(value, Value::Int64(_)),
            other => value.type_alias() == other,
        })
    }
}

impl Display for TypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} is {})", self.field_name, self.aliases.join("|"))
    }
}

impl FilterProvider for TypeFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(match value {
            Some(value) => any_candidate(value, |candidate| self.accepts(candidate)),
            None => false,
        })
    }

    fn has_field(&self) -> bool {
        true
    }

    fn get_field_name(&self) -> DocsimResult<String> {
        Ok(self.field_name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
