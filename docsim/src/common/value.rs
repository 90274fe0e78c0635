use crate::collection::{Document, ObjectId};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Compare an integer and a float for numeric equality without losing precision
/// for integral floats.
#[inline]
fn num_eq_int_float(a: i64, b: f64) -> bool {
    match float_as_exact_i64(b) {
        Some(b) => a == b,
        None => false,
    }
}

/// Compare two floats for equality with NaN equal to itself.
#[inline]
fn num_eq_float(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// Total order over floats where NaN sorts below every other number.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Orders an integer against a non-NaN float without rounding the integer.
#[inline]
fn num_cmp_int_float(a: i64, b: f64) -> Ordering {
    // 2^63, the first float above every i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if b >= LIMIT {
        return Ordering::Less;
    }
    if b < -LIMIT {
        return Ordering::Greater;
    }
    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(b - whole)).unwrap_or(Ordering::Equal),
        ordering => ordering,
    }
}

/// Total numeric order over integers and floats, NaN lowest.
#[inline]
fn num_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => Some(x.cmp(y)),
        (Value::Float64(x), Value::Float64(y)) => Some(num_cmp_float(*x, *y)),
        (Value::Int64(_), Value::Float64(y)) if y.is_nan() => Some(Ordering::Greater),
        (Value::Float64(x), Value::Int64(_)) if x.is_nan() => Some(Ordering::Less),
        (Value::Int64(x), Value::Float64(y)) => Some(num_cmp_int_float(*x, *y)),
        (Value::Float64(x), Value::Int64(y)) => Some(num_cmp_int_float(*y, *x).reverse()),
        _ => None,
    }
}

#[inline]
fn float_as_exact_i64(value: f64) -> Option<i64> {
    if value.is_finite()
        && value.fract() == 0.0
        && value >= i64::MIN as f64
        && value < i64::MAX as f64
    {
        Some(value as i64)
    } else {
        None
    }
}

/// Represents a [Document] field value.
///
/// `Value` is the closed set of types the engine understands. All query, update
/// and aggregation logic pattern-matches over these variants.
///
/// # Equality
/// `Int64` and `Float64` compare by numeric value, every other pair of distinct
/// variants is unequal. `Float64(NaN)` equals itself so that `Value` can be used
/// as a hash key. Embedded documents compare field by field in order.
///
/// # Ordering
/// [`Value::compare`] orders two values of a comparable type and returns `None`
/// for cross-type pairs. [`Value::sort_cmp`] is the total order used for
/// sorting, ranking types first:
/// MinKey < Null < numbers < String < Document < Array < Binary < ObjectId
/// < Bool < DateTime < Timestamp < Regex < MaxKey.
///
/// # Usage
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let v3 = val!(true);
/// ```
#[derive(Clone, Default)]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 64-bit integer value.
    Int64(i64),
    /// Represents a 64-bit floating point value.
    Float64(f64),
    /// Represents a string value.
    String(String),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents an embedded document value.
    Document(Document),
    /// Represents a 12-byte object identifier.
    ObjectId(ObjectId),
    /// Represents a point in time as milliseconds since the Unix epoch.
    DateTime(i64),
    /// Represents an internal replication timestamp.
    Timestamp { seconds: i64, increment: i64 },
    /// Represents binary data with its subtype.
    Binary { subtype: u8, bytes: Vec<u8> },
    /// Represents a decimal kept as its textual form.
    Decimal(String),
    /// Sorts below every other value.
    MinKey,
    /// Sorts above every other value.
    MaxKey,
    /// Represents a regular expression with its option flags.
    Regex { pattern: String, options: String },
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::codec::encode_value(self))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => num_eq_float(*a, *b),
            (Value::Int64(a), Value::Float64(b)) => num_eq_int_float(*a, *b),
            (Value::Float64(a), Value::Int64(b)) => num_eq_int_float(*b, *a),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (
                Value::Timestamp { seconds: s1, increment: i1 },
                Value::Timestamp { seconds: s2, increment: i2 },
            ) => s1 == s2 && i1 == i2,
            (
                Value::Binary { subtype: t1, bytes: b1 },
                Value::Binary { subtype: t2, bytes: b2 },
            ) => t1 == t2 && b1 == b2,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::MinKey, Value::MinKey) => true,
            (Value::MaxKey, Value::MaxKey) => true,
            (
                Value::Regex { pattern: p1, options: o1 },
                Value::Regex { pattern: p2, options: o2 },
            ) => p1 == p2 && o1 == o2,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(v) => {
                1u8.hash(state);
                v.hash(state)
            }
            // equal numbers must hash alike across Int64 and Float64
            Value::Int64(v) => {
                2u8.hash(state);
                v.hash(state)
            }
            Value::Float64(v) => match float_as_exact_i64(*v) {
                Some(i) => {
                    2u8.hash(state);
                    i.hash(state)
                }
                None if v.is_nan() => 3u8.hash(state),
                None => {
                    3u8.hash(state);
                    v.to_bits().hash(state)
                }
            },
            Value::String(v) => {
                4u8.hash(state);
                v.hash(state)
            }
            Value::Array(v) => {
                5u8.hash(state);
                v.hash(state)
            }
            Value::Document(v) => {
                6u8.hash(state);
                v.hash(state)
            }
            Value::ObjectId(v) => {
                7u8.hash(state);
                v.hash(state)
            }
            Value::DateTime(v) => {
                8u8.hash(state);
                v.hash(state)
            }
            Value::Timestamp { seconds, increment } => {
                9u8.hash(state);
                seconds.hash(state);
                increment.hash(state)
            }
            Value::Binary { subtype, bytes } => {
                10u8.hash(state);
                subtype.hash(state);
                bytes.hash(state)
            }
            Value::Decimal(v) => {
                11u8.hash(state);
                v.hash(state)
            }
            Value::MinKey => 12u8.hash(state),
            Value::MaxKey => 13u8.hash(state),
            Value::Regex { pattern, options } => {
                14u8.hash(state);
                pattern.hash(state);
                options.hash(state)
            }
        }
    }
}

impl Value {
    pub fn from<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    pub fn from_vec<T: Into<Value>>(values: Vec<T>) -> Value {
        Value::Array(values.into_iter().map(|v| v.into()).collect())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Float64(v) => float_as_exact_i64(*v),
            _ => None,
        }
    }

    /// Numeric view of `Int64` and `Float64` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&String> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_string().map(|s| s.as_str())
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int64(_) | Value::Float64(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Interprets the value the way a projection or `$exists` argument does.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(v) => *v,
            Value::Int64(v) => *v != 0,
            Value::Float64(v) => *v != 0.0,
            _ => true,
        }
    }

    /// Useful for extracting a value from a mutable reference while leaving a
    /// placeholder behind.
    pub fn take(&mut self) -> Value {
        std::mem::replace(self, Value::Null)
    }

    /// Type alias as accepted by the `$type` query operator.
    pub fn type_alias(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int64(_) => "long",
            Value::Float64(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Document(_) => "object",
            Value::ObjectId(_) => "objectId",
            Value::DateTime(_) => "date",
            Value::Timestamp { .. } => "timestamp",
            Value::Binary { .. } => "binData",
            Value::Decimal(_) => "decimal",
            Value::MinKey => "minKey",
            Value::MaxKey => "maxKey",
            Value::Regex { .. } => "regex",
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::MinKey => 0,
            Value::Null => 1,
            Value::Int64(_) | Value::Float64(_) | Value::Decimal(_) => 2,
            Value::String(_) => 3,
            Value::Document(_) => 4,
            Value::Array(_) => 5,
            Value::Binary { .. } => 6,
            Value::ObjectId(_) => 7,
            Value::Bool(_) => 8,
            Value::DateTime(_) => 9,
            Value::Timestamp { .. } => 10,
            Value::Regex { .. } => 11,
            Value::MaxKey => 12,
        }
    }

    fn decimal_as_f64(&self) -> Option<f64> {
        match self {
            Value::Decimal(text) => text.trim().parse::<f64>().ok(),
            _ => self.as_f64(),
        }
    }

    /// Orders two values of the same comparable type.
    ///
    /// Returns `None` for cross-type pairs, which query comparison operators
    /// treat as non-matching.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float64(a), Value::Float64(b)) if a.is_nan() && b.is_nan() => {
                Some(Ordering::Equal)
            }
            (Value::Int64(_), Value::Float64(_))
            | (Value::Float64(_), Value::Int64(_))
            | (Value::Float64(_), Value::Float64(_)) => {
                let nan = |value: &Value| matches!(value, Value::Float64(v) if v.is_nan());
                if nan(self) || nan(other) {
                    return None;
                }
                num_cmp(self, other)
            }
            (Value::Decimal(a), Value::Decimal(b)) => {
                match (self.decimal_as_f64(), other.decimal_as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => Some(a.cmp(b)),
                }
            }
            (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::ObjectId(a), Value::ObjectId(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Timestamp { .. }, Value::Timestamp { .. })
            | (Value::Binary { .. }, Value::Binary { .. })
            | (Value::Document(_), Value::Document(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Regex { .. }, Value::Regex { .. }) => Some(self.sort_cmp(other)),
            (Value::Null, Value::Null)
            | (Value::MinKey, Value::MinKey)
            | (Value::MaxKey, Value::MaxKey) => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Total order used for sorting mixed-type values.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Int64(_), Value::Int64(_))
            | (Value::Int64(_), Value::Float64(_))
            | (Value::Float64(_), Value::Int64(_))
            | (Value::Float64(_), Value::Float64(_)) => {
                num_cmp(self, other).unwrap_or(Ordering::Equal)
            }
            (Value::Int64(_), _) | (Value::Float64(_), _) | (Value::Decimal(_), _) => {
                match (self, other) {
                    (Value::Decimal(a), Value::Decimal(b))
                        if self.decimal_as_f64().is_none() || other.decimal_as_f64().is_none() =>
                    {
                        a.cmp(b)
                    }
                    _ => num_cmp_float(
                        self.decimal_as_f64().unwrap_or(f64::NAN),
                        other.decimal_as_f64().unwrap_or(f64::NAN),
                    ),
                }
            }
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Document(a), Value::Document(b)) => {
                for ((k1, v1), (k2, v2)) in a.iter().zip(b.iter()) {
                    let ord = v1
                        .type_rank()
                        .cmp(&v2.type_rank())
                        .then_with(|| k1.cmp(k2))
                        .then_with(|| v1.sort_cmp(v2));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.size().cmp(&b.size())
            }
            (Value::Array(a), Value::Array(b)) => {
                for (v1, v2) in a.iter().zip(b.iter()) {
                    let ord = v1.sort_cmp(v2);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (
                Value::Binary { subtype: t1, bytes: b1 },
                Value::Binary { subtype: t2, bytes: b2 },
            ) => b1.len().cmp(&b2.len()).then(t1.cmp(t2)).then_with(|| b1.cmp(b2)),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (
                Value::Timestamp { seconds: s1, increment: i1 },
                Value::Timestamp { seconds: s2, increment: i2 },
            ) => s1.cmp(s2).then(i1.cmp(i2)),
            (
                Value::Regex { pattern: p1, options: o1 },
                Value::Regex { pattern: p2, options: o2 },
            ) => p1.cmp(p2).then_with(|| o1.cmp(o2)),
            _ => Ordering::Equal,
        }
    }

    /// Type-strict structural equality, where `Int64(1)` and `Float64(1.0)`
    /// differ. Used to decide whether an update really changed a document.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int64(_), Value::Float64(_)) | (Value::Float64(_), Value::Int64(_)) => false,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits() || a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_identical(y))
            }
            (Value::Document(a), Value::Document(b)) => a.is_identical(b),
            _ => self == other,
        }
    }

    pub(crate) fn to_debug_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => format!("bool({})", v),
            Value::Int64(v) => format!("i64({})", v),
            Value::Float64(v) => format!("f64({})", v),
            Value::String(v) => format!("string(\"{}\")", v),
            Value::Array(v) => format!(
                "array([{}])",
                v.iter().map(|i| i.to_debug_string()).collect::<Vec<_>>().join(", ")
            ),
            Value::Document(v) => format!("object({:?})", v),
            Value::ObjectId(v) => format!("object_id(\"{}\")", v),
            Value::DateTime(v) => format!(
                "date({})",
                crate::common::format_millis(*v).unwrap_or_else(|| v.to_string())
            ),
            Value::Timestamp { seconds, increment } => format!("timestamp({}, {})", seconds, increment),
            Value::Binary { subtype, bytes } => format!("binary({}, {} bytes)", subtype, bytes.len()),
            Value::Decimal(v) => format!("decimal(\"{}\")", v),
            Value::MinKey => "min_key".to_string(),
            Value::MaxKey => "max_key".to_string(),
            Value::Regex { pattern, options } => format!("regex(/{}/{})", pattern, options),
        }
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(value: i32) -> Self {
        Value::Int64(value as i64)
    }
}

impl From<u32> for Value {
    #[inline]
    fn from(value: u32) -> Self {
        Value::Int64(value as i64)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<u64> for Value {
    #[inline]
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Float64(value as f64),
        }
    }
}

impl From<usize> for Value {
    #[inline]
    fn from(value: usize) -> Self {
        Value::from(value as u64)
    }
}

impl From<f32> for Value {
    #[inline]
    fn from(value: f32) -> Self {
        Value::Float64(value as f64)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::ObjectId(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Vec<T>) -> Self {
        Value::from_vec(value)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// A macro to create a `Value` from a given expression.
///
/// ```rust
/// use docsim::common::Value;
/// use docsim::val;
///
/// assert_eq!(val!(42), Value::Int64(42));
/// assert_eq!(val!("hello"), Value::String("hello".to_string()));
/// assert_eq!(val!(true), Value::Bool(true));
/// ```
#[macro_export]
macro_rules! val {
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
