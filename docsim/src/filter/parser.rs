use crate::collection::Document;
use crate::common::{Value, OPERATOR_PREFIX};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};

use super::{
    all, and, AllElementsFilter, ComparisonFilter, ComparisonMode, ElementMatchFilter,
    EqualsFilter, ExistsFilter, Filter, InFilter, ModFilter, NorFilter, NotEqualsFilter,
    NotFilter, NotInFilter, OrFilter, RegexFilter, SizeFilter, TypeFilter,
};

/// Numeric `$type` codes and their aliases.
const TYPE_CODES: &[(i64, &str)] = &[
    (1, "double"),
    (2, "string"),
    (3, "object"),
    (4, "array"),
    (5, "binData"),
    (7, "objectId"),
    (8, "bool"),
    (9, "date"),
    (10, "null"),
    (11, "regex"),
    (16, "int"),
    (17, "timestamp"),
    (18, "long"),
    (19, "decimal"),
    (-1, "minKey"),
    (127, "maxKey"),
];

fn validation_error(message: &str) -> DocsimError {
    log::error!("{}", message);
    DocsimError::new(message, ErrorKind::ValidationError)
}

fn unknown_operator(operator: &str) -> DocsimError {
    log::error!("Unknown filter operator {}", operator);
    DocsimError::new(
        &format!("unknown operator: {}", operator),
        ErrorKind::UnknownOperator,
    )
}

#[inline]
fn is_operator(key: &str) -> bool {
    key.starts_with(OPERATOR_PREFIX)
}

/// Compiles a filter document into a [Filter].
///
/// Top-level keys form a conjunction. `$and`, `$or` and `$nor` take non-empty
/// arrays of filter documents, `$comment` is ignored and every other `$` key is
/// rejected.
pub(crate) fn parse_filter(filter: &Document) -> DocsimResult<Filter> {
    let mut filters = Vec::with_capacity(filter.size());
    for (key, value) in filter.iter() {
        if is_operator(key) {
            match key.as_str() {
                "$and" => filters.push(and(parse_clauses(key, value)?)),
                "$or" => filters.push(Filter::new(OrFilter::new(parse_clauses(key, value)?))),
                "$nor" => filters.push(Filter::new(NorFilter::new(parse_clauses(key, value)?))),
                "$comment" => {}
                _ => return Err(unknown_operator(key)),
            }
        } else {
            filters.push(parse_field(key, value)?);
        }
    }

    Ok(match filters.len() {
        0 => all(),
        1 => filters.remove(0),
        _ => and(filters),
    })
}

/// Compiles a filter given as an arbitrary value; anything but a document is
/// rejected.
pub(crate) fn parse_filter_value(filter: &Value) -> DocsimResult<Filter> {
    match filter {
        Value::Document(doc) => parse_filter(doc),
        Value::Null => Ok(all()),
        other => Err(validation_error(&format!(
            "filter must be an object, found {}",
            other.type_alias()
        ))),
    }
}

fn parse_clauses(operator: &str, value: &Value) -> DocsimResult<Vec<Filter>> {
    let clauses = match value {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(validation_error(&format!(
                "{} must be a nonempty array",
                operator
            )))
        }
    };

    clauses
        .iter()
        .map(|clause| match clause {
            Value::Document(doc) => parse_filter(doc),
            _ => Err(validation_error(&format!(
                "{} argument's entries must be objects",
                operator
            ))),
        })
        .collect()
}

fn parse_field(field_name: &str, value: &Value) -> DocsimResult<Filter> {
    match value {
        Value::Document(ops) if ops.keys().next().is_some_and(|k| is_operator(k)) => {
            parse_operators(field_name, ops)
        }
        Value::Regex { pattern, options } => Ok(Filter::new(RegexFilter::new(
            field_name.to_string(),
            pattern,
            options,
        )?)),
        other => Ok(Filter::new(EqualsFilter::new(
            field_name.to_string(),
            other.clone(),
        ))),
    }
}

/// Compiles an operator document such as `{"$gte": 1, "$lt": 5}` for one field.
pub(crate) fn parse_operators(field_name: &str, ops: &Document) -> DocsimResult<Filter> {
    let field = field_name.to_string();
    let mut filters = Vec::with_capacity(ops.size());

    let options = match ops.get("$options") {
        Some(Value::String(options)) => Some(options.as_str()),
        Some(_) => return Err(validation_error("$options has to be a string")),
        None => None,
    };
    if options.is_some() && !ops.contains_key("$regex") {
        return Err(validation_error("$options needs a $regex"));
    }

    for (operator, argument) in ops.iter() {
        let filter = match operator.as_str() {
            "$eq" => Filter::new(EqualsFilter::new(field.clone(), argument.clone())),
            "$ne" => Filter::new(NotEqualsFilter::new(field.clone(), argument.clone())),
            "$gt" => comparison(&field, argument, ComparisonMode::Greater),
            "$gte" => comparison(&field, argument, ComparisonMode::GreaterEqual),
            "$lt" => comparison(&field, argument, ComparisonMode::Lesser),
            "$lte" => comparison(&field, argument, ComparisonMode::LesserEqual),
            "$in" => Filter::new(InFilter::new(field.clone(), array_argument(operator, argument)?)?),
            "$nin" => Filter::new(NotInFilter::new(
                field.clone(),
                array_argument(operator, argument)?,
            )?),
            "$exists" => Filter::new(ExistsFilter::new(field.clone(), argument.is_truthy())),
            "$type" => Filter::new(TypeFilter::new(field.clone(), type_aliases(argument)?)),
            "$size" => Filter::new(SizeFilter::new(field.clone(), size_argument(argument)?)),
            "$all" => Filter::new(AllElementsFilter::new(
                field.clone(),
                array_argument(operator, argument)?,
            )),
            "$elemMatch" => parse_element_match(&field, argument)?,
            "$mod" => {
                let (divisor, remainder) = mod_argument(argument)?;
                Filter::new(ModFilter::new(field.clone(), divisor, remainder)?)
            }
            "$regex" => regex_filter(&field, argument, options)?,
            "$options" => continue,
            "$not" => match argument {
                Value::Document(inner) if inner.keys().next().is_some_and(|k| is_operator(k)) => {
                    Filter::new(NotFilter::new(parse_operators(field_name, inner)?))
                }
                Value::Regex { pattern, options } => Filter::new(NotFilter::new(Filter::new(
                    RegexFilter::new(field.clone(), pattern, options)?,
                ))),
                _ => return Err(validation_error("$not needs a regex or a document")),
            },
            other => return Err(unknown_operator(other)),
        };
        filters.push(filter);
    }

    Ok(match filters.len() {
        1 => filters.remove(0),
        _ => and(filters),
    })
}

#[inline]
fn comparison(field: &str, argument: &Value, mode: ComparisonMode) -> Filter {
    Filter::new(ComparisonFilter::new(field.to_string(), argument.clone(), mode))
}

fn array_argument(operator: &str, argument: &Value) -> DocsimResult<Vec<Value>> {
    match argument {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(validation_error(&format!("{} needs an array", operator))),
    }
}

fn size_argument(argument: &Value) -> DocsimResult<usize> {
    let size = match argument {
        Value::Int64(n) => Some(*n),
        Value::Float64(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    };
    match size {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => Err(validation_error(
            "$size needs a non-negative whole number",
        )),
    }
}

fn mod_argument(argument: &Value) -> DocsimResult<(i64, i64)> {
    let parts = match argument {
        Value::Array(items) if items.len() == 2 => items,
        Value::Array(items) if items.len() < 2 => {
            return Err(validation_error("malformed mod, not enough elements"))
        }
        Value::Array(_) => return Err(validation_error("malformed mod, too many elements")),
        _ => return Err(validation_error("malformed mod, needs to be an array")),
    };

    let number = |value: &Value| match value {
        Value::Int64(n) => Ok(*n),
        Value::Float64(f) if f.is_finite() => Ok(f.trunc() as i64),
        _ => Err(validation_error("malformed mod, arguments must be numbers")),
    };
    Ok((number(&parts[0])?, number(&parts[1])?))
}

fn type_aliases(argument: &Value) -> DocsimResult<Vec<String>> {
    let alias = |value: &Value| -> DocsimResult<String> {
        match value {
            Value::String(name) => {
                let known = name == "number" || TYPE_CODES.iter().any(|(_, alias)| alias == name);
                if known {
                    Ok(name.clone())
                } else {
                    Err(validation_error(&format!("unknown type name alias: {}", name)))
                }
            }
            Value::Int64(_) | Value::Float64(_) => {
                let code = value.as_i64().unwrap_or_default();
                TYPE_CODES
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, alias)| alias.to_string())
                    .ok_or_else(|| validation_error(&format!("invalid numerical type code: {}", code)))
            }
            _ => Err(validation_error("type must be represented as a number or a string")),
        }
    };

    match argument {
        Value::Array(items) => items.iter().map(alias).collect(),
        single => Ok(vec![alias(single)?]),
    }
}

fn regex_filter(field: &str, argument: &Value, options: Option<&str>) -> DocsimResult<Filter> {
    let (pattern, own_options) = match argument {
        Value::String(pattern) => (pattern.as_str(), ""),
        Value::Regex { pattern, options } => (pattern.as_str(), options.as_str()),
        _ => return Err(validation_error("$regex has to be a string")),
    };
    let options = options.unwrap_or(own_options);
    Ok(Filter::new(RegexFilter::new(field.to_string(), pattern, options)?))
}

fn parse_element_match(field: &str, argument: &Value) -> DocsimResult<Filter> {
    let inner = match argument {
        Value::Document(inner) => inner,
        _ => return Err(validation_error("$elemMatch needs an Object")),
    };

    let value_mode = !inner.is_empty()
        && inner
            .keys()
            .all(|k| is_operator(k) && !matches!(k.as_str(), "$and" | "$or" | "$nor"));

    let filter = if value_mode {
        parse_operators("", inner)?
    } else {
        parse_filter(inner)?
    };
    Ok(Filter::new(ElementMatchFilter::new(
        field.to_string(),
        filter,
        value_mode,
    )))
}

/// Collects the equality clauses of a filter document, the way an upsert
/// seeds its new document: plain values and `$eq`, including clauses nested
/// in a top-level `$and`.
pub(crate) fn equality_clauses(filter: &Document) -> Vec<(String, Value)> {
    let mut clauses = Vec::new();
    for (key, value) in filter.iter() {
        if key == "$and" {
            if let Value::Array(items) = value {
                for item in items {
                    if let Value::Document(doc) = item {
                        clauses.extend(equality_clauses(doc));
                    }
                }
            }
            continue;
        }
        if is_operator(key) {
            continue;
        }

        match value {
            Value::Document(ops) if ops.keys().next().is_some_and(|k| is_operator(k)) => {
                if let Some(eq) = ops.get("$eq") {
                    clauses.push((key.clone(), eq.clone()));
                }
            }
            Value::Regex { .. } => {}
            other => clauses.push((key.clone(), other.clone())),
        }
    }
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn people() -> Vec<Document> {
        vec![
            doc! { name: "Alice", age: 25, status: "active" },
            doc! { name: "Bob", age: 30, status: "inactive" },
            doc! { name: "Charlie", age: 35, status: "active" },
        ]
    }

    fn names(filter: Document) -> Vec<String> {
        let filter = parse_filter(&filter).unwrap();
        people()
            .into_iter()
            .filter(|d| filter.matches(d).unwrap())
            .map(|d| d.get("name").and_then(|v| v.as_str()).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_plain_equality() {
        assert_eq!(names(doc! { status: "active" }), vec!["Alice", "Charlie"]);
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(names(doc! { age: { "$gte": 30 } }), vec!["Bob", "Charlie"]);
        assert_eq!(names(doc! { age: { "$gt": 25, "$lt": 35 } }), vec!["Bob"]);
    }

    #[test]
    fn test_logical_operators() {
        let or = doc! { "$or": [{ name: "Alice" }, { age: 35 }] };
        assert_eq!(names(or), vec!["Alice", "Charlie"]);
        let nor = doc! { "$nor": [{ name: "Alice" }, { age: 35 }] };
        assert_eq!(names(nor), vec!["Bob"]);
        let and = doc! { "$and": [{ status: "active" }, { age: { "$lt": 30 } }] };
        assert_eq!(names(and), vec!["Alice"]);
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert_eq!(names(doc! {}).len(), 3);
    }

    #[test]
    fn test_comment_is_ignored() {
        assert_eq!(names(doc! { "$comment": "x", name: "Bob" }), vec!["Bob"]);
    }

    #[test]
    fn test_unknown_operators() {
        let err = parse_filter(&doc! { "$where": "1" }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
        let err = parse_filter(&doc! { a: { "$foo": 1 } }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
        let err = parse_filter(&doc! { a: { "$gt": 1, b: 1 } }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
    }

    #[test]
    fn test_malformed_arguments() {
        let cases = vec![
            doc! { "$and": {} },
            doc! { "$or": [] },
            doc! { "$or": [1] },
            doc! { a: { "$in": 1 } },
            doc! { a: { "$size": (-1) } },
            doc! { a: { "$size": "2" } },
            doc! { a: { "$mod": [2] } },
            doc! { a: { "$options": "i" } },
            doc! { a: { "$not": 5 } },
            doc! { a: { "$type": "nope" } },
        ];
        for case in cases {
            let err = parse_filter(&case).err().unwrap();
            assert_eq!(err.kind(), &ErrorKind::ValidationError, "{}", case);
        }
    }

    #[test]
    fn test_invalid_regex_and_mod_divisor() {
        let err = parse_filter(&doc! { a: { "$regex": "(" } }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        let err = parse_filter(&doc! { a: { "$mod": [0, 1] } }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_regex_with_options() {
        assert_eq!(names(doc! { name: { "$regex": "^a", "$options": "i" } }), vec!["Alice"]);
        let regex = Value::Regex {
            pattern: "^c".to_string(),
            options: "i".to_string(),
        };
        assert_eq!(names(doc! { name: regex }), vec!["Charlie"]);
    }

    #[test]
    fn test_not_operator() {
        assert_eq!(names(doc! { age: { "$not": { "$gte": 30 } } }), vec!["Alice"]);
        assert_eq!(names(doc! { missing: { "$not": { "$gt": 1 } } }).len(), 3);
    }

    #[test]
    fn test_missing_field_semantics() {
        let doc = doc! { a: 1 };
        let check = |f: Document| parse_filter(&f).unwrap().matches(&doc).unwrap();
        assert!(!check(doc! { b: { "$gt": 0 } }));
        assert!(!check(doc! { b: { "$in": [1] } }));
        assert!(check(doc! { b: { "$exists": false } }));
        assert!(check(doc! { b: { "$ne": 1 } }));
        assert!(check(doc! { b: { "$nin": [1] } }));
        assert!(!check(doc! { b: (Value::Null) }));
    }

    #[test]
    fn test_nested_paths_and_arrays() {
        let doc = doc! {
            address: { city: "Paris" },
            items: [{ sku: "a", qty: 1 }, { sku: "b", qty: 5 }],
            scores: [70, 82, 90]
        };
        let check = |f: Document| parse_filter(&f).unwrap().matches(&doc).unwrap();
        assert!(check(doc! { "address.city": "Paris" }));
        assert!(check(doc! { "items.sku": "b" }));
        assert!(check(doc! { "items.1.qty": 5 }));
        assert!(check(doc! { "items.qty": { "$gt": 4 } }));
        assert!(check(doc! { scores: { "$elemMatch": { "$gte": 80, "$lt": 85 } } }));
        assert!(!check(doc! { items: { "$elemMatch": { sku: "a", qty: 5 } } }));
        assert!(check(doc! { scores: { "$all": [90, 70] } }));
        assert!(check(doc! { scores: { "$size": 3 } }));
        assert!(check(doc! { scores: { "$type": "array" } }));
        assert!(check(doc! { scores: { "$type": 18 } }));
    }

    #[test]
    fn test_parse_filter_value() {
        assert!(parse_filter_value(&Value::Null).is_ok());
        let err = parse_filter_value(&val!(1)).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_equality_clauses() {
        let filter = doc! {
            name: "x",
            age: { "$gt": 3 },
            kind: { "$eq": "k" },
            "$and": [{ a: 1 }, { b: { "$lt": 2 } }]
        };
        let clauses = equality_clauses(&filter);
        assert_eq!(
            clauses,
            vec![
                ("name".to_string(), val!("x")),
                ("kind".to_string(), val!("k")),
                ("a".to_string(), val!(1)),
            ]
        );
    }
}
