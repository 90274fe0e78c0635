use crate::collection::Document;
use crate::common::{Value, FIELD_REF_PREFIX, OPERATOR_PREFIX, ROOT_REF};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};

/// Operators available inside aggregation expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    ToUpper,
    ToLower,
    IfNull,
    Size,
}

impl ExpressionOperator {
    fn from_name(name: &str) -> Option<ExpressionOperator> {
        let operator = match name {
            "$add" => ExpressionOperator::Add,
            "$subtract" => ExpressionOperator::Subtract,
            "$multiply" => ExpressionOperator::Multiply,
            "$divide" => ExpressionOperator::Divide,
            "$concat" => ExpressionOperator::Concat,
            "$toUpper" => ExpressionOperator::ToUpper,
            "$toLower" => ExpressionOperator::ToLower,
            "$ifNull" => ExpressionOperator::IfNull,
            "$size" => ExpressionOperator::Size,
            _ => return None,
        };
        Some(operator)
    }

    fn name(&self) -> &'static str {
        match self {
            ExpressionOperator::Add => "$add",
            ExpressionOperator::Subtract => "$subtract",
            ExpressionOperator::Multiply => "$multiply",
            ExpressionOperator::Divide => "$divide",
            ExpressionOperator::Concat => "$concat",
            ExpressionOperator::ToUpper => "$toUpper",
            ExpressionOperator::ToLower => "$toLower",
            ExpressionOperator::IfNull => "$ifNull",
            ExpressionOperator::Size => "$size",
        }
    }

    /// Accepted argument count as an inclusive range.
    fn arity(&self) -> (usize, usize) {
        match self {
            ExpressionOperator::Add | ExpressionOperator::Multiply | ExpressionOperator::Concat => {
                (0, usize::MAX)
            }
            ExpressionOperator::Subtract | ExpressionOperator::Divide => (2, 2),
            ExpressionOperator::ToUpper | ExpressionOperator::ToLower | ExpressionOperator::Size => {
                (1, 1)
            }
            ExpressionOperator::IfNull => (2, usize::MAX),
        }
    }
}

/// A compiled aggregation expression.
///
/// Strings starting with `$` are field paths, `$$ROOT` is the whole current
/// document, single-key objects whose key starts with `$` are operators and
/// everything else is a literal (objects and arrays are evaluated element by
/// element).
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    FieldPath(String),
    Root,
    Object(Vec<(String, Expression)>),
    Array(Vec<Expression>),
    Operator(ExpressionOperator, Vec<Expression>),
}

fn invalid(message: &str) -> DocsimError {
    log::error!("{}", message);
    DocsimError::new(message, ErrorKind::ValidationError)
}

fn type_mismatch(message: &str) -> DocsimError {
    log::error!("{}", message);
    DocsimError::new(message, ErrorKind::TypeMismatch)
}

impl Expression {
    pub fn parse(value: &Value) -> DocsimResult<Expression> {
        match value {
            Value::String(text) if text.starts_with("$$") => match text.as_str() {
                ROOT_REF | "$$CURRENT" => Ok(Expression::Root),
                _ => Err(invalid(&format!("Use of undefined variable: {}", &text[2..]))),
            },
            Value::String(text) if text.starts_with(FIELD_REF_PREFIX) => {
                let path = &text[1..];
                if path.is_empty() || path.split('.').any(|s| s.is_empty()) {
                    return Err(invalid(&format!("'{}' is not a valid field path", text)));
                }
                Ok(Expression::FieldPath(path.to_string()))
            }
            Value::Document(doc) => Self::parse_document(doc),
            Value::Array(items) => Ok(Expression::Array(
                items.iter().map(Expression::parse).collect::<DocsimResult<_>>()?,
            )),
            other => Ok(Expression::Literal(other.clone())),
        }
    }

    fn parse_document(doc: &Document) -> DocsimResult<Expression> {
        let operator_keys = doc.keys().filter(|k| k.starts_with(OPERATOR_PREFIX)).count();
        if operator_keys == 0 {
            let mut fields = Vec::with_capacity(doc.size());
            for (key, value) in doc.iter() {
                fields.push((key.clone(), Expression::parse(value)?));
            }
            return Ok(Expression::Object(fields));
        }
        if operator_keys != doc.size() || doc.size() != 1 {
            return Err(invalid(
                "an expression specification must contain exactly one field, the name of the expression",
            ));
        }

        let (name, argument) = match doc.iter().next() {
            Some(entry) => entry,
            None => return Err(invalid("empty expression")),
        };
        if name == "$literal" {
            return Ok(Expression::Literal(argument.clone()));
        }

        let operator = match ExpressionOperator::from_name(name) {
            Some(operator) => operator,
            None => {
                log::error!("Unknown expression operator {}", name);
                return Err(DocsimError::new(
                    &format!("Unrecognized expression '{}'", name),
                    ErrorKind::UnknownOperator,
                ));
            }
        };

        let arguments: Vec<Expression> = match argument {
            Value::Array(items) => items.iter().map(Expression::parse).collect::<DocsimResult<_>>()?,
            single => vec![Expression::parse(single)?],
        };
        let (min, max) = operator.arity();
        if arguments.len() < min || arguments.len() > max {
            return Err(invalid(&format!(
                "Invalid number of arguments for {}: {}",
                operator.name(),
                arguments.len()
            )));
        }
        Ok(Expression::Operator(operator, arguments))
    }

    /// Evaluates the expression; a field path that does not resolve yields
    /// `None`.
    pub fn evaluate_optional(&self, document: &Document) -> DocsimResult<Option<Value>> {
        match self {
            Expression::FieldPath(path) => Ok(document.resolve(path)),
            other => other.evaluate(document).map(Some),
        }
    }

    /// Evaluates the expression; unresolved field paths yield `Null`.
    pub fn evaluate(&self, document: &Document) -> DocsimResult<Value> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::FieldPath(path) => Ok(document.resolve(path).unwrap_or(Value::Null)),
            Expression::Root => Ok(Value::Document(document.clone())),
            Expression::Object(fields) => {
                let mut result = Document::new();
                for (key, expression) in fields {
                    if let Some(value) = expression.evaluate_optional(document)? {
                        result.insert(key.clone(), value);
                    }
                }
                Ok(Value::Document(result))
            }
            Expression::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| item.evaluate(document))
                    .collect::<DocsimResult<_>>()?,
            )),
            Expression::Operator(operator, arguments) => {
                if *operator == ExpressionOperator::IfNull {
                    return if_null(arguments, document);
                }
                let values = arguments
                    .iter()
                    .map(|argument| argument.evaluate(document))
                    .collect::<DocsimResult<Vec<_>>>()?;
                apply_operator(*operator, values)
            }
        }
    }
}

fn if_null(arguments: &[Expression], document: &Document) -> DocsimResult<Value> {
    let (last, candidates) = match arguments.split_last() {
        Some(split) => split,
        None => return Ok(Value::Null),
    };
    for candidate in candidates {
        match candidate.evaluate_optional(document)? {
            Some(Value::Null) | None => continue,
            Some(value) => return Ok(value),
        }
    }
    last.evaluate(document)
}

fn apply_operator(operator: ExpressionOperator, values: Vec<Value>) -> DocsimResult<Value> {
    match operator {
        ExpressionOperator::Add => add(values),
        ExpressionOperator::Subtract => subtract(&values[0], &values[1]),
        ExpressionOperator::Multiply => multiply(values),
        ExpressionOperator::Divide => divide(&values[0], &values[1]),
        ExpressionOperator::Concat => concat(values),
        ExpressionOperator::ToUpper => change_case(&values[0], true),
        ExpressionOperator::ToLower => change_case(&values[0], false),
        ExpressionOperator::Size => match &values[0] {
            Value::Array(items) => Ok(Value::Int64(items.len() as i64)),
            other => Err(type_mismatch(&format!(
                "The argument to $size must be an array. Type of argument: {}",
                other.type_alias()
            ))),
        },
        ExpressionOperator::IfNull => Ok(values.into_iter().find(|v| !v.is_null()).unwrap_or_default()),
    }
}

/// Running numeric result that stays integral until a double participates or
/// the integer sum overflows.
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn into_value(self) -> Value {
        match self {
            Number::Int(v) => Value::Int64(v),
            Number::Float(v) => Value::Float64(v),
        }
    }

    fn combine(self, other: &Value, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Option<Number> {
        Some(match (self, other) {
            (Number::Int(a), Value::Int64(b)) => match int_op(a, *b) {
                Some(v) => Number::Int(v),
                None => Number::Float(float_op(a as f64, *b as f64)),
            },
            (Number::Int(a), Value::Float64(b)) => Number::Float(float_op(a as f64, *b)),
            (Number::Float(a), other) => Number::Float(float_op(a, other.as_f64()?)),
            _ => return None,
        })
    }
}

fn add(values: Vec<Value>) -> DocsimResult<Value> {
    if values.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }

    let mut date: Option<i64> = None;
    let mut total = Number::Int(0);
    for value in &values {
        match value {
            Value::DateTime(ms) if date.is_none() => date = Some(*ms),
            Value::DateTime(_) => return Err(type_mismatch("only one date allowed in an $add expression")),
            number => {
                total = total
                    .combine(number, i64::checked_add, |a, b| a + b)
                    .ok_or_else(|| type_mismatch(&format!("$add only supports numeric or date types, not {}", number.type_alias())))?;
            }
        }
    }

    Ok(match (date, total) {
        (Some(ms), Number::Int(offset)) => Value::DateTime(ms.saturating_add(offset)),
        (Some(ms), Number::Float(offset)) => Value::DateTime(ms.saturating_add(offset.round() as i64)),
        (None, total) => total.into_value(),
    })
}

fn subtract(left: &Value, right: &Value) -> DocsimResult<Value> {
    Ok(match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::DateTime(a), Value::DateTime(b)) => Value::Int64(a.saturating_sub(*b)),
        (Value::DateTime(a), Value::Int64(b)) => Value::DateTime(a.saturating_sub(*b)),
        (Value::DateTime(a), Value::Float64(b)) => Value::DateTime(a.saturating_sub(b.round() as i64)),
        (Value::Int64(a), Value::Int64(b)) => match a.checked_sub(*b) {
            Some(v) => Value::Int64(v),
            None => Value::Float64(*a as f64 - *b as f64),
        },
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Value::Float64(x - y),
            _ => {
                return Err(type_mismatch(&format!(
                    "can't $subtract {} from {}",
                    b.type_alias(),
                    a.type_alias()
                )))
            }
        },
    })
}

fn multiply(values: Vec<Value>) -> DocsimResult<Value> {
    if values.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let mut total = Number::Int(1);
    for value in &values {
        total = total
            .combine(value, i64::checked_mul, |a, b| a * b)
            .ok_or_else(|| type_mismatch(&format!("$multiply only supports numeric types, not {}", value.type_alias())))?;
    }
    Ok(total.into_value())
}

fn divide(left: &Value, right: &Value) -> DocsimResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(_), Some(divisor)) if divisor == 0.0 => {
            log::error!("$divide by zero");
            Err(DocsimError::new("can't $divide by zero", ErrorKind::InvalidArgument))
        }
        (Some(dividend), Some(divisor)) => Ok(Value::Float64(dividend / divisor)),
        _ => Err(type_mismatch(&format!(
            "$divide only supports numeric types, not {} and {}",
            left.type_alias(),
            right.type_alias()
        ))),
    }
}

fn concat(values: Vec<Value>) -> DocsimResult<Value> {
    let mut result = String::new();
    for value in values {
        match value {
            Value::Null => return Ok(Value::Null),
            Value::String(s) => result.push_str(&s),
            other => {
                return Err(type_mismatch(&format!(
                    "$concat only supports strings, not {}",
                    other.type_alias()
                )))
            }
        }
    }
    Ok(Value::String(result))
}

fn change_case(value: &Value, upper: bool) -> DocsimResult<Value> {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Int64(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Decimal(v) => v.clone(),
        other => {
            return Err(type_mismatch(&format!(
                "can't convert {} to a string",
                other.type_alias()
            )))
        }
    };
    Ok(Value::String(if upper {
        text.to_uppercase()
    } else {
        text.to_lowercase()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn eval(expression: Value, document: &Document) -> DocsimResult<Value> {
        Expression::parse(&expression)?.evaluate(document)
    }

    #[test]
    fn test_field_paths_and_root() {
        let doc = doc! { a: { b: 2 }, name: "x" };
        assert_eq!(eval(val!("$a.b"), &doc).unwrap(), val!(2));
        assert_eq!(eval(val!("$missing"), &doc).unwrap(), Value::Null);
        assert_eq!(eval(val!("$$ROOT"), &doc).unwrap(), Value::Document(doc.clone()));
        assert_eq!(eval(val!("plain"), &doc).unwrap(), val!("plain"));
    }

    #[test]
    fn test_literal_and_object() {
        let doc = doc! { a: 1 };
        let expr = Value::Document(doc! { "$literal": "$a" });
        assert_eq!(eval(expr, &doc).unwrap(), val!("$a"));
        let expr = Value::Document(doc! { x: "$a", y: "$missing" });
        assert_eq!(eval(expr, &doc).unwrap(), Value::Document(doc! { x: 1 }));
    }

    #[test]
    fn test_arithmetic() {
        let doc = doc! { a: 6, b: 4, f: 0.5 };
        assert_eq!(eval(Value::Document(doc! { "$add": ["$a", "$b", 1] }), &doc).unwrap(), val!(11));
        assert_eq!(eval(Value::Document(doc! { "$add": ["$a", "$f"] }), &doc).unwrap(), Value::Float64(6.5));
        assert_eq!(eval(Value::Document(doc! { "$subtract": ["$a", "$b"] }), &doc).unwrap(), val!(2));
        assert_eq!(eval(Value::Document(doc! { "$multiply": ["$a", "$b"] }), &doc).unwrap(), val!(24));
        assert_eq!(eval(Value::Document(doc! { "$divide": ["$a", "$b"] }), &doc).unwrap(), Value::Float64(1.5));
        assert_eq!(eval(Value::Document(doc! { "$add": ["$a", "$missing"] }), &doc).unwrap(), Value::Null);
    }

    #[test]
    fn test_arithmetic_errors() {
        let doc = doc! { a: 6, s: "x" };
        let err = eval(Value::Document(doc! { "$divide": ["$a", 0] }), &doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        let err = eval(Value::Document(doc! { "$add": ["$a", "$s"] }), &doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
        let err = eval(Value::Document(doc! { "$subtract": ["$a"] }), &doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_date_arithmetic() {
        let doc = doc! { d: (Value::DateTime(1000)), e: (Value::DateTime(400)) };
        assert_eq!(eval(Value::Document(doc! { "$add": ["$d", 5] }), &doc).unwrap(), Value::DateTime(1005));
        assert_eq!(eval(Value::Document(doc! { "$subtract": ["$d", "$e"] }), &doc).unwrap(), val!(600));
    }

    #[test]
    fn test_string_operators() {
        let doc = doc! { first: "Ada", last: "Lovelace" };
        let expr = Value::Document(doc! { "$concat": ["$first", " ", "$last"] });
        assert_eq!(eval(expr, &doc).unwrap(), val!("Ada Lovelace"));
        assert_eq!(eval(Value::Document(doc! { "$toUpper": "$first" }), &doc).unwrap(), val!("ADA"));
        assert_eq!(eval(Value::Document(doc! { "$toLower": "$last" }), &doc).unwrap(), val!("lovelace"));
        assert_eq!(eval(Value::Document(doc! { "$toLower": "$nope" }), &doc).unwrap(), val!(""));
    }

    #[test]
    fn test_if_null_and_size() {
        let doc = doc! { a: (Value::Null), tags: [1, 2, 3] };
        let expr = Value::Document(doc! { "$ifNull": ["$a", "$missing", "fallback"] });
        assert_eq!(eval(expr, &doc).unwrap(), val!("fallback"));
        assert_eq!(eval(Value::Document(doc! { "$size": "$tags" }), &doc).unwrap(), val!(3));
        let err = eval(Value::Document(doc! { "$size": "$a" }), &doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_parse_errors() {
        let err = Expression::parse(&Value::Document(doc! { "$bogus": 1 })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
        let err = Expression::parse(&val!("$$NOW")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        let err = Expression::parse(&Value::Document(doc! { "$add": [1], x: 1 })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
