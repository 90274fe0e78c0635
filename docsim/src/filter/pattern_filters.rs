use regex::{Regex, RegexBuilder};
use std::{any::Any, fmt::Display};

use crate::{
    collection::Document,
    common::Value,
    errors::{DocsimError, DocsimResult, ErrorKind},
};

use super::{any_candidate, apply_on_field, FilterProvider};

/// Compiles a pattern with its option flags.
///
/// Supported flags are `i` (case-insensitive), `m` (multi-line), `s` (dot
/// matches newline) and `x` (extended). Any other flag, or a pattern that does
/// not compile, fails with [ErrorKind::InvalidArgument].
pub(crate) fn compile_regex(pattern: &str, options: &str) -> DocsimResult<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                log::error!("Invalid regex flag {:?} in options {:?}", other, options);
                return Err(DocsimError::new(
                    &format!("invalid flag in regex options: {}", other),
                    ErrorKind::InvalidArgument,
                ));
            }
        };
    }

    builder.build().map_err(|e| {
        log::error!("Invalid regex pattern '{}': {}", pattern, e);
        DocsimError::new(
            &format!("Regular expression is invalid: {}", e),
            ErrorKind::InvalidArgument,
        )
    })
}

/// A filter that matches string fields, or string array elements, against a
/// compiled regular expression.
pub(crate) struct RegexFilter {
    field_name: String,
    source: String,
    options: String,
    pattern: Regex,
}

impl RegexFilter {
    pub(crate) fn new(field_name: String, source: &str, options: &str) -> DocsimResult<Self> {
        let pattern = compile_regex(source, options)?;
        Ok(RegexFilter {
            field_name,
            source: source.to_string(),
            options: options.to_string(),
            pattern,
        })
    }

    fn accepts(&self, candidate: &Value) -> bool {
        match candidate {
            Value::String(s) => self.pattern.is_match(s),
            Value::Regex { pattern, options } => pattern == &self.source && options == &self.options,
            _ => false,
        }
    }
}

impl Display for RegexFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} =~ /{}/{})", self.field_name, self.source, self.options)
    }
}

impl FilterProvider for RegexFilter {
    #[inline]
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
