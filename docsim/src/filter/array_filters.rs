use std::{any::Any, fmt::Display};

use crate::{collection::Document, common::Value, errors::DocsimResult};

use super::{any_candidate, apply_on_field, Filter, FilterProvider};

/// `$size`: matches array fields with exactly `size` elements.
pub(crate) struct SizeFilter {
    field_name: String,
    size: usize,
}

impl SizeFilter {
    pub(crate) fn new(field_name: String, size: usize) -> Self {
        SizeFilter { field_name, size }
    }
}

impl Display for SizeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(size({}) == {})", self.field_name, self.size)
    }
}

impl FilterProvider for SizeFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(matches!(value, Some(Value::Array(items)) if items.len() == self.size))
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

/// `$all`: every listed value must be present in the field. A scalar field is
/// treated as a one-element array and an empty list matches nothing.
pub(crate) struct AllElementsFilter {
    field_name: String,
    values: Vec<Value>,
}

impl AllElementsFilter {
    pub(crate) fn new(field_name: String, values: Vec<Value>) -> Self {
        AllElementsFilter { field_name, values }
    }
}

impl Display for AllElementsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} contains all {:?})", self.field_name, self.values)
    }
}

impl FilterProvider for AllElementsFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        let value = match value {
            Some(value) if !self.values.is_empty() => value,
            _ => return Ok(false),
        };
        Ok(self
            .values
            .iter()
            .all(|wanted| any_candidate(value, |candidate| candidate == wanted)))
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

/// `$elemMatch`: at least one array element satisfies every condition.
///
/// In document mode the inner filter runs against embedded-document elements;
/// in value mode its operator conditions run against each element directly.
pub(crate) struct ElementMatchFilter {
    field_name: String,
    filter: Filter,
    value_mode: bool,
}

impl ElementMatchFilter {
    pub(crate) fn new(field_name: String, filter: Filter, value_mode: bool) -> Self {
        ElementMatchFilter {
            field_name,
            filter,
            value_mode,
        }
    }

    fn element_matches(&self, element: &Value) -> DocsimResult<bool> {
        if self.value_mode {
            return self.filter.apply_on_value(Some(element));
        }
        match element {
            Value::Document(doc) => self.filter.apply(doc),
            _ => Ok(false),
        }
    }
}

impl Display for ElementMatchFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} elemMatch {})", self.field_name, self.filter)
    }
}

impl FilterProvider for ElementMatchFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        let items = match value {
            Some(Value::Array(items)) => items,
            _ => return Ok(false),
        };
        for element in items {
            if self.element_matches(element)? {
                return Ok(true);
            }
        }
        Ok(false)
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
