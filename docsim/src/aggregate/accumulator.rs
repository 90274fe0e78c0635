use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};

use super::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccumulatorKind {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Push,
    AddToSet,
    Count,
}

impl AccumulatorKind {
    fn from_name(name: &str) -> Option<AccumulatorKind> {
        let kind = match name {
            "$sum" => AccumulatorKind::Sum,
            "$avg" => AccumulatorKind::Avg,
            "$min" => AccumulatorKind::Min,
            "$max" => AccumulatorKind::Max,
            "$first" => AccumulatorKind::First,
            "$last" => AccumulatorKind::Last,
            "$push" => AccumulatorKind::Push,
            "$addToSet" => AccumulatorKind::AddToSet,
            "$count" => AccumulatorKind::Count,
            _ => return None,
        };
        Some(kind)
    }
}

/// An accumulator field of a `$group` stage, e.g. `{"$sum": "$amount"}`.
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    kind: AccumulatorKind,
    expression: Expression,
}

impl Accumulator {
    pub(crate) fn parse(field: &str, spec: &Value) -> DocsimResult<Accumulator> {
        let spec = match spec {
            Value::Document(spec) if spec.size() == 1 => spec,
            _ => {
                log::error!("Accumulator for field {} is not a single-key object", field);
                return Err(DocsimError::new(
                    &format!("The field '{}' must be an accumulator object", field),
                    ErrorKind::ValidationError,
                ));
            }
        };

        let (name, argument) = match spec.iter().next() {
            Some(entry) => entry,
            None => return Err(DocsimError::new("empty accumulator", ErrorKind::ValidationError)),
        };
        let kind = match AccumulatorKind::from_name(name) {
            Some(kind) => kind,
            None => {
                log::error!("Unknown group accumulator {}", name);
                return Err(DocsimError::new(
                    &format!("unknown group operator '{}'", name),
                    ErrorKind::UnknownOperator,
                ));
            }
        };

        if kind == AccumulatorKind::Count {
            if !matches!(argument, Value::Document(args) if args.is_empty()) {
                log::error!("$count accumulator takes an empty object");
                return Err(DocsimError::new(
                    "$count takes no arguments, i.e. $count:{}",
                    ErrorKind::ValidationError,
                ));
            }
            return Ok(Accumulator {
                kind,
                expression: Expression::Literal(Value::Null),
            });
        }

        Ok(Accumulator {
            kind,
            expression: Expression::parse(argument)?,
        })
    }

    pub(crate) fn init(&self) -> AccumulatorState {
        match self.kind {
            AccumulatorKind::Sum => AccumulatorState::Sum { int: 0, float: 0.0, is_float: false },
            AccumulatorKind::Avg => AccumulatorState::Avg { total: 0.0, count: 0 },
            AccumulatorKind::Min => AccumulatorState::Min(None),
            AccumulatorKind::Max => AccumulatorState::Max(None),
            AccumulatorKind::First => AccumulatorState::First(None),
            AccumulatorKind::Last => AccumulatorState::Last(Value::Null),
            AccumulatorKind::Push => AccumulatorState::Push(Vec::new()),
            AccumulatorKind::AddToSet => AccumulatorState::AddToSet(Vec::new()),
            AccumulatorKind::Count => AccumulatorState::Count(0),
        }
    }

    /// Folds one group member into `state`.
    pub(crate) fn accumulate(&self, state: &mut AccumulatorState, member: &Document) -> DocsimResult<()> {
        let value = self.expression.evaluate_optional(member)?;
        state.accept(value);
        Ok(())
    }
}

/// Running state of one accumulator within one group.
#[derive(Debug, Clone)]
pub(crate) enum AccumulatorState {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Last(Value),
    Push(Vec<Value>),
    AddToSet(Vec<Value>),
    Count(i64),
}

impl AccumulatorState {
    fn accept(&mut self, value: Option<Value>) {
        match self {
            AccumulatorState::Sum { int, float, is_float } => match value {
                Some(Value::Int64(v)) if !*is_float => match int.checked_add(v) {
                    Some(sum) => *int = sum,
                    None => {
                        *is_float = true;
                        *float = *int as f64 + v as f64;
                    }
                },
                Some(Value::Int64(v)) => *float += v as f64,
                Some(Value::Float64(v)) => {
                    if !*is_float {
                        *is_float = true;
                        *float = *int as f64;
                    }
                    *float += v;
                }
                _ => {}
            },
            AccumulatorState::Avg { total, count } => {
                if let Some(v) = value.as_ref().filter(|v| v.is_number()).and_then(|v| v.as_f64()) {
                    *total += v;
                    *count += 1;
                }
            }
            AccumulatorState::Min(current) => keep_extreme(current, value, std::cmp::Ordering::Less),
            AccumulatorState::Max(current) => keep_extreme(current, value, std::cmp::Ordering::Greater),
            AccumulatorState::First(first) => {
                if first.is_none() {
                    *first = Some(value.unwrap_or_default());
                }
            }
            AccumulatorState::Last(last) => *last = value.unwrap_or_default(),
            AccumulatorState::Push(items) => {
                if let Some(value) = value {
                    items.push(value);
                }
            }
            AccumulatorState::AddToSet(items) => {
                if let Some(value) = value {
                    if !items.contains(&value) {
                        items.push(value);
                    }
                }
            }
            AccumulatorState::Count(count) => *count += 1,
        }
    }

    pub(crate) fn finish(self) -> Value {
        match self {
            AccumulatorState::Sum { int, float, is_float } => {
                if is_float {
                    Value::Float64(float)
                } else {
                    Value::Int64(int)
                }
            }
            AccumulatorState::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Float64(total / count as f64)
                }
            }
            AccumulatorState::Min(value) | AccumulatorState::Max(value) | AccumulatorState::First(value) => {
                value.unwrap_or_default()
            }
            AccumulatorState::Last(value) => value,
            AccumulatorState::Push(items) | AccumulatorState::AddToSet(items) => Value::Array(items),
            AccumulatorState::Count(count) => Value::Int64(count),
        }
    }
}

fn keep_extreme(current: &mut Option<Value>, candidate: Option<Value>, wanted: std::cmp::Ordering) {
    let candidate = match candidate {
        Some(Value::Null) | None => return,
        Some(candidate) => candidate,
    };
    let replace = match current {
        None => true,
        Some(existing) => candidate.sort_cmp(existing) == wanted,
    };
    if replace {
        *current = Some(candidate);
    }
}
