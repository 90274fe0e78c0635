use crate::common::{Value, DOC_ID, FIELD_SEPARATOR, MAX_ARRAY_PAD_INDEX};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};

pub(crate) type PathSplits<'a> = SmallVec<[&'a str; 8]>;

/// Splits a dot-path into its segments.
pub(crate) fn split_path(path: &str) -> PathSplits<'_> {
    path.split(FIELD_SEPARATOR).collect()
}

/// An ordered set of uniquely named fields.
///
/// Field order is insertion order: re-inserting an existing key keeps its
/// position, removing a key shifts the later keys forward. Two documents are
/// equal when they hold equal values under the same keys in the same order.
///
/// Nested fields are addressed with dot-paths (`"address.city"`, `"items.0"`)
/// through [Document::put], [Document::get_path], [Document::resolve] and
/// [Document::remove_path]. The plain [Document::insert]/[Document::get]
/// methods treat the key literally.
///
/// ```ignore
/// let mut doc = doc! { name: "Alice" };
/// doc.put("address.city", "Paris")?;
/// assert_eq!(doc.get_path("address.city"), Some(&val!("Paris")));
/// ```
#[derive(Clone, Default)]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sets a top-level field, keeping its position if it already exists.
    pub fn insert<T: Into<Value>>(&mut self, key: impl Into<String>, value: T) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    /// Returns the top-level field named `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Removes a top-level field, preserving the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.data.iter()
    }

    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID)
    }

    pub fn has_id(&self) -> bool {
        self.data.contains_key(DOC_ID)
    }

    /// Returns a copy with `_id` set to `id` and moved to the first position.
    pub(crate) fn with_id_first(mut self, id: Value) -> Document {
        self.data.shift_remove(DOC_ID);
        self.data.shift_insert(0, DOC_ID.to_string(), id);
        self
    }

    /// Associates `value` with a dot-path, creating intermediate documents.
    ///
    /// A numeric segment addresses an array element; setting past the end of
    /// an array pads it with nulls. Traversing into a scalar fails with
    /// [ErrorKind::TypeMismatch].
    pub fn put<T: Into<Value>>(&mut self, path: &str, value: T) -> DocsimResult<()> {
        let splits = split_path(path);
        validate_splits(path, &splits)?;
        put_in_document(self, &splits, value.into())
    }

    /// Looks up a dot-path without fanning out over arrays.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let splits = split_path(path);
        let (first, rest) = splits.split_first()?;
        let mut current = self.data.get(*first)?;
        for segment in rest {
            current = match current {
                Value::Document(doc) => doc.data.get(*segment)?,
                Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub(crate) fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let splits = split_path(path);
        let (first, rest) = splits.split_first()?;
        let mut current = self.data.get_mut(*first)?;
        for segment in rest {
            current = match current {
                Value::Document(doc) => doc.data.get_mut(*segment)?,
                Value::Array(arr) => arr.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Resolves a dot-path the way a query does.
    ///
    /// When a non-numeric segment meets an array, the lookup fans out over the
    /// array's embedded documents and the found values are collected into an
    /// array. `None` means the path does not exist.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        self.resolve_fanned(path).map(|(value, _)| value)
    }

    /// Resolves a dot-path and reports whether it fanned out over an array.
    ///
    /// A fanned-out result is an array holding one entry per value found,
    /// each kept as stored.
    pub(crate) fn resolve_fanned(&self, path: &str) -> Option<(Value, bool)> {
        let splits = split_path(path);
        let (first, rest) = splits.split_first()?;
        let mut fanned = false;
        let value = resolve_in_value(self.data.get(*first)?, rest, &mut fanned)?;
        Some((value, fanned))
    }

    /// Resolves a dot-path into the value a query condition is tested against.
    ///
    /// For a fanned-out path the elements of every array value found are
    /// appended, so a condition can match either a whole value or one of its
    /// elements.
    pub(crate) fn query_candidates(&self, path: &str) -> Option<Value> {
        match self.resolve_fanned(path)? {
            (Value::Array(found), true) => {
                let mut candidates = found.clone();
                for value in &found {
                    if let Value::Array(elements) = value {
                        candidates.extend(elements.iter().cloned());
                    }
                }
                Some(Value::Array(candidates))
            }
            (value, _) => Some(value),
        }
    }

    /// Removes the value at a dot-path and returns it.
    ///
    /// Removing an array element by index leaves a null in its place so that
    /// the positions of the other elements do not move.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let splits = split_path(path);
        let (last, parents) = splits.split_last()?;
        if parents.is_empty() {
            return self.remove(last);
        }

        let parent_path = parents.join(".");
        match self.get_path_mut(&parent_path)? {
            Value::Document(doc) => doc.remove(last),
            Value::Array(arr) => {
                let index = last.parse::<usize>().ok()?;
                arr.get_mut(index).map(|slot| slot.take())
            }
            _ => None,
        }
    }

    /// Nesting depth, where a document with only scalar fields has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.data.values().map(value_depth).max().unwrap_or(0)
    }

    /// Type-strict, order-sensitive equality.
    pub fn is_identical(&self, other: &Document) -> bool {
        self.size() == other.size()
            && self
                .iter()
                .zip(other.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1.is_identical(v2))
    }
}

fn validate_splits(path: &str, splits: &[&str]) -> DocsimResult<()> {
    if splits.iter().any(|s| s.is_empty()) {
        log::error!("Invalid field path {:?}", path);
        return Err(DocsimError::new(
            &format!("The update path '{}' contains an empty field name, which is not allowed", path),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

fn value_depth(value: &Value) -> usize {
    match value {
        Value::Document(doc) => doc.depth(),
        Value::Array(arr) => 1 + arr.iter().map(value_depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn cannot_create(segment: &str, parent: &str, value: &Value) -> DocsimError {
    log::error!("Cannot create field {:?} in element {{{}: {}}}", segment, parent, value);
    DocsimError::new(
        &format!("Cannot create field '{}' in element {{{}: {}}}", segment, parent, value),
        ErrorKind::TypeMismatch,
    )
}

fn put_in_document(doc: &mut Document, splits: &[&str], value: Value) -> DocsimResult<()> {
    let key = splits[0];
    if splits.len() == 1 {
        doc.data.insert(key.to_string(), value);
        return Ok(());
    }

    let slot = doc
        .data
        .entry(key.to_string())
        .or_insert_with(|| Value::Document(Document::new()));
    put_in_value(slot, key, &splits[1..], value)
}

fn put_in_value(target: &mut Value, name: &str, splits: &[&str], value: Value) -> DocsimResult<()> {
    match target {
        Value::Document(doc) => put_in_document(doc, splits, value),
        Value::Array(arr) => {
            let segment = splits[0];
            let index = match segment.parse::<usize>() {
                Ok(index) => index,
                Err(_) => return Err(cannot_create(segment, name, &Value::Array(arr.clone()))),
            };
            if index >= arr.len() && index > MAX_ARRAY_PAD_INDEX {
                log::error!("Array index {} in field {} exceeds the padding limit", index, name);
                return Err(DocsimError::new(
                    &format!(
                        "can't backfill array to position {} in field '{}', the limit is {}",
                        index, name, MAX_ARRAY_PAD_INDEX
                    ),
                    ErrorKind::ValidationError,
                ));
            }
            if index >= arr.len() {
                arr.resize(index + 1, Value::Null);
            }
            if splits.len() == 1 {
                arr[index] = value;
                Ok(())
            } else {
                if arr[index].is_null() {
                    arr[index] = Value::Document(Document::new());
                }
                put_in_value(&mut arr[index], segment, &splits[1..], value)
            }
        }
        other => Err(cannot_create(splits[0], name, other)),
    }
}

fn resolve_in_value(value: &Value, splits: &[&str], fanned: &mut bool) -> Option<Value> {
    if splits.is_empty() {
        return Some(value.clone());
    }

    let key = splits[0];
    match value {
        Value::Document(doc) => resolve_in_value(doc.data.get(key)?, &splits[1..], fanned),
        Value::Array(arr) => {
            if let Ok(index) = key.parse::<usize>() {
                return resolve_in_value(arr.get(index)?, &splits[1..], fanned);
            }
            *fanned = true;
            decompose(arr, splits)
        }
        _ => None,
    }
}

// Leaf values stay intact; only the fan-out levels are flattened.
fn decompose(arr: &[Value], splits: &[&str]) -> Option<Value> {
    let mut items: Vec<Value> = Vec::with_capacity(arr.len());
    let mut found = false;

    for item in arr {
        if let Value::Document(_) = item {
            let mut nested = false;
            if let Some(result) = resolve_in_value(item, splits, &mut nested) {
                found = true;
                match result {
                    Value::Array(values) if nested => items.extend(values),
                    value => items.push(value),
                }
            }
        }
    }

    if found {
        Some(Value::Array(items))
    } else {
        None
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size()
            && self
                .iter()
                .zip(other.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1 == v2)
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size().hash(state);
        for (key, value) in self.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.data.iter()).finish()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::codec::encode_document(self))
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a Document with JSON-like syntax.
///
/// Keys are taken literally, so dotted and `$`-prefixed keys can be written as
/// string literals. Negative numbers need parentheses.
///
/// ```rust
/// use docsim::doc;
///
/// let empty = doc!{};
///
/// let filter = doc!{
///     "address.city": "Paris",
///     age: { "$gte": 18, "$lt": 65 },
///     score: (-1)
/// };
///
/// let complex = doc!{
///     user: {
///         name: "Charlie",
///         tags: ["admin", "user"]
///     },
///     values: [1, 2, 3]
/// };
/// ```
#[macro_export]
macro_rules! doc {
    // match an empty document (with braces for backward compat)
    ({}) => {
        $crate::collection::Document::new()
    };

    // match an empty document
    () => {
        $crate::collection::Document::new()
    };

    // match a document with key value pairs wrapped in outer braces
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    // match a document with key value pairs
    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.insert($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper macro to convert values for the doc! macro.
/// Handles nested documents, arrays, and expressions.
#[macro_export]
macro_rules! doc_value {
    // match a nested document
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
        }
    };

    // match an array of values
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    // match an expression (variable, function call, arithmetic in parens, literals, etc.)
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
