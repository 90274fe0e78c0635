use itertools::Itertools;

use crate::collection::Document;
use crate::common::{current_time_millis, SortSpec, Value, OPERATOR_PREFIX};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use crate::filter::{parse_filter, parse_operators, Filter};

use super::{FieldUpdate, UpdateOperator};

fn type_mismatch(message: &str) -> DocsimError {
    log::error!("{}", message);
    DocsimError::new(message, ErrorKind::TypeMismatch)
}

fn invalid(message: &str) -> DocsimError {
    log::error!("{}", message);
    DocsimError::new(message, ErrorKind::ValidationError)
}

pub(crate) fn apply_field_update(
    document: &mut Document,
    update: &FieldUpdate,
    is_insert: bool,
) -> DocsimResult<()> {
    let path = update.path.as_str();
    let argument = &update.argument;
    match update.operator {
        UpdateOperator::Set => document.put(path, argument.clone()),
        UpdateOperator::SetOnInsert if is_insert => document.put(path, argument.clone()),
        UpdateOperator::SetOnInsert => Ok(()),
        UpdateOperator::Unset => {
            document.remove_path(path);
            Ok(())
        }
        UpdateOperator::Inc => arithmetic(document, path, argument, Arithmetic::Add),
        UpdateOperator::Mul => arithmetic(document, path, argument, Arithmetic::Multiply),
        UpdateOperator::Min => min_max(document, path, argument, true),
        UpdateOperator::Max => min_max(document, path, argument, false),
        UpdateOperator::Rename => rename(document, path, argument),
        UpdateOperator::CurrentDate => current_date(document, path, argument),
        UpdateOperator::Push => push(document, path, argument),
        UpdateOperator::AddToSet => add_to_set(document, path, argument),
        UpdateOperator::Pop => pop(document, path, argument),
        UpdateOperator::Pull => pull(document, path, argument),
        UpdateOperator::PullAll => pull_all(document, path, argument),
    }
}

#[derive(Clone, Copy)]
enum Arithmetic {
    Add,
    Multiply,
}

impl Arithmetic {
    fn name(&self) -> &'static str {
        match self {
            Arithmetic::Add => "$inc",
            Arithmetic::Multiply => "$mul",
        }
    }

    fn apply(&self, current: &Value, operand: &Value) -> DocsimResult<Value> {
        let result = match (current, operand) {
            (Value::Int64(a), Value::Int64(b)) => {
                let checked = match self {
                    Arithmetic::Add => a.checked_add(*b),
                    Arithmetic::Multiply => a.checked_mul(*b),
                };
                match checked {
                    Some(v) => Value::Int64(v),
                    None => {
                        log::error!("{} overflow on {} and {}", self.name(), a, b);
                        return Err(DocsimError::new(
                            &format!("{} resulted in an integer overflow", self.name()),
                            ErrorKind::InvalidArgument,
                        ));
                    }
                }
            }
            _ => {
                let (a, b) = match (current.as_f64(), operand.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(type_mismatch("Cannot apply arithmetic to non-numeric values")),
                };
                match self {
                    Arithmetic::Add => Value::Float64(a + b),
                    Arithmetic::Multiply => Value::Float64(a * b),
                }
            }
        };
        Ok(result)
    }
}

fn arithmetic(
    document: &mut Document,
    path: &str,
    argument: &Value,
    op: Arithmetic,
) -> DocsimResult<()> {
    if !matches!(argument, Value::Int64(_) | Value::Float64(_)) {
        return Err(invalid(&format!(
            "Cannot {} with non-numeric argument: {{{}: {}}}",
            if matches!(op, Arithmetic::Add) { "increment" } else { "multiply" },
            path,
            argument
        )));
    }

    match document.get_path(path).cloned() {
        None => {
            let initial = match (op, argument) {
                (Arithmetic::Add, _) => argument.clone(),
                (Arithmetic::Multiply, Value::Int64(_)) => Value::Int64(0),
                (Arithmetic::Multiply, _) => Value::Float64(0.0),
            };
            document.put(path, initial)
        }
        Some(current @ (Value::Int64(_) | Value::Float64(_))) => {
            let result = op.apply(&current, argument)?;
            document.put(path, result)
        }
        Some(current) => Err(type_mismatch(&format!(
            "Cannot apply {} to a value of non-numeric type. Field '{}' has type {}",
            op.name(),
            path,
            current.type_alias()
        ))),
    }
}

fn min_max(document: &mut Document, path: &str, argument: &Value, is_min: bool) -> DocsimResult<()> {
    let replace = match document.get_path(path) {
        None => true,
        Some(current) => match argument.compare(current) {
            Some(ordering) if is_min => ordering.is_lt(),
            Some(ordering) => ordering.is_gt(),
            None => false,
        },
    };
    if replace {
        document.put(path, argument.clone())?;
    }
    Ok(())
}

fn rename(document: &mut Document, path: &str, argument: &Value) -> DocsimResult<()> {
    let destination = match argument {
        Value::String(destination) => destination,
        other => {
            return Err(invalid(&format!(
                "The 'to' field for $rename must be a string: {}: {}",
                path, other
            )))
        }
    };
    if destination == path {
        return Err(invalid(&format!(
            "The source and target field for $rename must differ: {}",
            path
        )));
    }

    if let Some(value) = document.remove_path(path) {
        document.put(destination, value)?;
    }
    Ok(())
}

fn current_date(document: &mut Document, path: &str, argument: &Value) -> DocsimResult<()> {
    let now = current_time_millis();
    let value = match argument {
        Value::Bool(true) => Value::DateTime(now),
        Value::Document(spec) => match spec.get("$type").and_then(|t| t.as_str()) {
            Some("date") => Value::DateTime(now),
            Some("timestamp") => Value::Timestamp {
                seconds: now / 1000,
                increment: 1,
            },
            _ => return Err(invalid("The '$type' string field is required to be 'date' or 'timestamp'")),
        },
        other => {
            return Err(invalid(&format!(
                "{} is not valid type for $currentDate. Please use a boolean ('true') or a $type expression",
                other.type_alias()
            )))
        }
    };
    document.put(path, value)
}

/// Returns the array at `path`, creating an empty one when the field is
/// absent.
fn array_at<'a>(document: &'a mut Document, path: &str, operator: &str) -> DocsimResult<&'a mut Vec<Value>> {
    if document.get_path(path).is_none() {
        document.put(path, Value::Array(Vec::new()))?;
    }
    match document.get_path_mut(path) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(type_mismatch(&format!(
            "The field '{}' must be an array but is of type {} in {}",
            path,
            other.type_alias(),
            operator
        ))),
        None => Err(DocsimError::new(
            &format!("Unable to address path '{}'", path),
            ErrorKind::InternalError,
        )),
    }
}

/// Returns the existing array at `path`, `None` when the field is absent.
fn existing_array<'a>(
    document: &'a mut Document,
    path: &str,
    operator: &str,
) -> DocsimResult<Option<&'a mut Vec<Value>>> {
    match document.get_path_mut(path) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(type_mismatch(&format!(
            "Cannot apply {} to a non-array value of type {} at '{}'",
            operator,
            other.type_alias(),
            path
        ))),
    }
}

fn is_each_modifier(argument: &Value) -> bool {
    matches!(argument, Value::Document(doc) if doc.contains_key("$each"))
}

fn push(document: &mut Document, path: &str, argument: &Value) -> DocsimResult<()> {
    if !is_each_modifier(argument) {
        array_at(document, path, "$push")?.push(argument.clone());
        return Ok(());
    }

    let modifiers = argument.as_document().cloned().unwrap_or_default();
    let mut each = Vec::new();
    let mut position = None;
    let mut slice = None;
    let mut sort = None;
    for (key, value) in modifiers.iter() {
        match key.as_str() {
            "$each" => match value {
                Value::Array(items) => each = items.clone(),
                _ => return Err(invalid("The argument to $each in $push must be an array")),
            },
            "$position" => match value.as_i64() {
                Some(p) if value.is_number() => position = Some(p),
                _ => return Err(invalid("The value for $position must be an integer value")),
            },
            "$slice" => match value.as_i64() {
                Some(s) if value.is_number() => slice = Some(s),
                _ => return Err(invalid("The value for $slice must be an integer value")),
            },
            "$sort" => sort = Some(PushSort::parse(value)?),
            other => {
                return Err(invalid(&format!(
                    "Unrecognized clause in $push: {}",
                    other
                )))
            }
        }
    }

    let items = array_at(document, path, "$push")?;
    let at = match position {
        None => items.len(),
        Some(p) if p < 0 => items.len().saturating_sub(p.unsigned_abs() as usize),
        Some(p) => (p as usize).min(items.len()),
    };
    let tail = items.split_off(at);
    items.extend(each);
    items.extend(tail);

    if let Some(sort) = sort {
        sort.apply(items);
    }

    if let Some(slice) = slice {
        let len = items.len();
        if slice >= 0 {
            items.truncate((slice as usize).min(len));
        } else {
            let keep = (slice.unsigned_abs() as usize).min(len);
            items.drain(..len - keep);
        }
    }
    Ok(())
}

enum PushSort {
    Whole(bool),
    ByFields(SortSpec),
}

impl PushSort {
    fn parse(value: &Value) -> DocsimResult<PushSort> {
        match value {
            Value::Int64(1) => Ok(PushSort::Whole(true)),
            Value::Int64(-1) => Ok(PushSort::Whole(false)),
            Value::Document(spec) if !spec.is_empty() => Ok(PushSort::ByFields(SortSpec::parse(spec)?)),
            _ => Err(invalid("The $sort is invalid: use 1/-1 to sort the whole element, or {field:1/-1} to sort embedded fields")),
        }
    }

    fn apply(&self, items: &mut [Value]) {
        match self {
            PushSort::Whole(ascending) => items.sort_by(|a, b| {
                let ordering = a.sort_cmp(b);
                if *ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            }),
            PushSort::ByFields(spec) => {
                let empty = Document::new();
                items.sort_by(|a, b| {
                    let a = a.as_document().unwrap_or(&empty);
                    let b = b.as_document().unwrap_or(&empty);
                    spec.compare(a, b)
                })
            }
        }
    }
}

fn add_to_set(document: &mut Document, path: &str, argument: &Value) -> DocsimResult<()> {
    let candidates: Vec<Value> = if is_each_modifier(argument) {
        match argument.as_document().and_then(|d| d.get("$each")) {
            Some(Value::Array(items)) => items.iter().cloned().unique().collect(),
            _ => return Err(invalid("The argument to $each in $addToSet must be an array")),
        }
    } else {
        vec![argument.clone()]
    };

    let items = array_at(document, path, "$addToSet")?;
    for candidate in candidates {
        if !items.contains(&candidate) {
            items.push(candidate);
        }
    }
    Ok(())
}

fn pop(document: &mut Document, path: &str, argument: &Value) -> DocsimResult<()> {
    let from_front = match argument.as_i64() {
        Some(1) if argument.is_number() => false,
        Some(-1) if argument.is_number() => true,
        _ => return Err(invalid(&format!("$pop expects 1 or -1, found: {}", argument))),
    };

    if let Some(items) = existing_array(document, path, "$pop")? {
        if items.is_empty() {
            return Ok(());
        }
        if from_front {
            items.remove(0);
        } else {
            items.pop();
        }
    }
    Ok(())
}

/// The condition a `$pull` removes elements by.
enum PullCondition {
    Equals(Value),
    Operators(Filter),
    Document(Filter),
}

impl PullCondition {
    fn parse(argument: &Value) -> DocsimResult<PullCondition> {
        match argument {
            Value::Document(doc) if doc.keys().next().is_some_and(|k| k.starts_with(OPERATOR_PREFIX)) => {
                Ok(PullCondition::Operators(parse_operators("", doc)?))
            }
            Value::Document(doc) => Ok(PullCondition::Document(parse_filter(doc)?)),
            Value::Regex { pattern, options } => {
                let mut ops = Document::new();
                ops.insert("$regex", Value::String(pattern.clone()));
                if !options.is_empty() {
                    ops.insert("$options", Value::String(options.clone()));
                }
                Ok(PullCondition::Operators(parse_operators("", &ops)?))
            }
            other => Ok(PullCondition::Equals(other.clone())),
        }
    }

    fn matches(&self, element: &Value) -> DocsimResult<bool> {
        match self {
            PullCondition::Equals(value) => Ok(element == value),
            PullCondition::Operators(filter) => filter.apply_on_value(Some(element)),
            PullCondition::Document(filter) => match element {
                Value::Document(doc) => filter.matches(doc),
                _ => Ok(false),
            },
        }
    }
}

fn pull(document: &mut Document, path: &str, argument: &Value) -> DocsimResult<()> {
    let condition = PullCondition::parse(argument)?;
    if let Some(items) = existing_array(document, path, "$pull")? {
        let mut kept = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            if !condition.matches(&item)? {
                kept.push(item);
            }
        }
        *items = kept;
    }
    Ok(())
}

fn pull_all(document: &mut Document, path: &str, argument: &Value) -> DocsimResult<()> {
    let values = match argument {
        Value::Array(values) => values,
        other => {
            return Err(invalid(&format!(
                "$pullAll requires an array argument but was given a {}",
                other.type_alias()
            )))
        }
    };
    if let Some(items) = existing_array(document, path, "$pullAll")? {
        items.retain(|item| !values.contains(item));
    }
    Ok(())
}
