use std::any::Any;
use std::cmp::Ordering;
use std::fmt::Display;

use regex::Regex;

use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};

use super::{any_candidate, apply_on_field, FilterProvider};

/// Relational operator used by [ComparisonFilter].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComparisonMode {
    Greater,
    GreaterEqual,
    Lesser,
    LesserEqual,
}

impl ComparisonMode {
    #[inline]
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonMode::Greater => ordering == Ordering::Greater,
            ComparisonMode::GreaterEqual => ordering != Ordering::Less,
            ComparisonMode::Lesser => ordering == Ordering::Less,
            ComparisonMode::LesserEqual => ordering != Ordering::Greater,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            ComparisonMode::Greater => ">",
            ComparisonMode::GreaterEqual => ">=",
            ComparisonMode::Lesser => "<",
            ComparisonMode::LesserEqual => "<=",
        }
    }
}

/// `$gt`, `$gte`, `$lt` and `$lte`.
///
/// Only values of a comparable type take part; a string never satisfies a
/// numeric bound and vice versa.
pub(crate) struct ComparisonFilter {
    field_name: String,
    field_value: Value,
    mode: ComparisonMode,
}

impl ComparisonFilter {
    pub(crate) fn new(field_name: String, field_value: Value, mode: ComparisonMode) -> Self {
        ComparisonFilter {
            field_name,
            field_value,
            mode,
        }
    }

    #[inline]
    fn accepts(&self, candidate: &Value) -> bool {
        match candidate.compare(&self.field_value) {
            Some(ordering) => self.mode.accepts(ordering),
            None => false,
        }
    }
}

impl Display for ComparisonFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({} {} {})",
            self.field_name,
            self.mode.symbol(),
            self.field_value
        )
    }
}

impl FilterProvider for ComparisonFilter {
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

/// Compiles the regular expressions found in an `$in`/`$nin` list.
fn split_patterns(field_values: Vec<Value>) -> DocsimResult<(Vec<Value>, Vec<Regex>)> {
    let mut values = Vec::with_capacity(field_values.len());
    let mut patterns = Vec::new();
    for value in field_values {
        match value {
            Value::Regex { pattern, options } => {
                patterns.push(super::compile_regex(&pattern, &options)?);
            }
            other => values.push(other),
        }
    }
    Ok((values, patterns))
}

fn in_list(values: &[Value], patterns: &[Regex], candidate: &Value) -> bool {
    if values.iter().any(|v| v == candidate) {
        return true;
    }
    match candidate {
        Value::String(s) => patterns.iter().any(|p| p.is_match(s)),
        _ => false,
    }
}

/// `$in`: matches when the field, or one of its elements, equals any listed
/// value or matches any listed regular expression.
pub(crate) struct InFilter {
    field_name: String,
    values: Vec<Value>,
    patterns: Vec<Regex>,
}

impl InFilter {
    pub(crate) fn new(field_name: String, field_values: Vec<Value>) -> DocsimResult<Self> {
        let (values, patterns) = split_patterns(field_values)?;
        Ok(InFilter {
            field_name,
            values,
            patterns,
        })
    }
}

impl Display for InFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} in {:?}", self.field_name, self.values)?;
        if !self.patterns.is_empty() {
            let patterns: Vec<&str> = self.patterns.iter().map(|p| p.as_str()).collect();
            write!(f, " or ~{:?}", patterns)?;
        }
        write!(f, ")")
    }
}

impl FilterProvider for InFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(match value {
            Some(value) => {
                any_candidate(value, |candidate| in_list(&self.values, &self.patterns, candidate))
            }
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

/// `$nin`: the negation of [InFilter]; a missing field matches.
pub(crate) struct NotInFilter {
    field_name: String,
    values: Vec<Value>,
    patterns: Vec<Regex>,
}

impl NotInFilter {
    pub(crate) fn new(field_name: String, field_values: Vec<Value>) -> DocsimResult<Self> {
        let (values, patterns) = split_patterns(field_values)?;
        Ok(NotInFilter {
            field_name,
            values,
            patterns,
        })
    }
}

impl Display for NotInFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} not in {:?})", self.field_name, self.values)
    }
}

impl FilterProvider for NotInFilter {
    fn apply(&self, entry: &Document) -> DocsimResult<bool> {
        apply_on_field(self, &self.field_name, entry)
    }

    fn apply_on_value(&self, value: Option<&Value>) -> DocsimResult<bool> {
        Ok(match value {
            Some(value) => {
                !any_candidate(value, |candidate| in_list(&self.values, &self.patterns, candidate))
            }
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

/// `$mod`: numeric field modulo `divisor` equals `remainder`. Floats are
/// truncated toward zero first.
pub(crate) struct ModFilter {
    field_name: String,
    divisor: i64,
    remainder: i64,
}

impl ModFilter {
    pub(crate) fn new(field_name: String, divisor: i64, remainder: i64) -> DocsimResult<Self> {
        if divisor == 0 {
            log::error!("$mod divisor for field {} is zero", field_name);
            return Err(DocsimError::new(
                "divisor cannot be 0",
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(ModFilter {
            field_name,
            divisor,
            remainder,
        })
    }

    fn accepts(&self, candidate: &Value) -> bool {
        let number = match candidate {
            Value::Int64(v) => *v,
            Value::Float64(v) if v.is_finite() => v.trunc() as i64,
            _ => return false,
        };
        number.wrapping_rem(self.divisor) == self.remainder
    }
}

impl Display for ModFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({} % {} == {})",
            self.field_name, self.divisor, self.remainder
        )
    }
}

impl FilterProvider for ModFilter {
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
