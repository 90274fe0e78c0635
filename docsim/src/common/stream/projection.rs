use crate::aggregate::Expression;
use crate::collection::{split_path, Document};
use crate::common::{Value, DOC_ID, OPERATOR_PREFIX};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
enum PathNode {
    Leaf,
    Computed,
    Branch(IndexMap<String, PathNode>),
}

#[derive(Debug, Clone)]
enum ProjectionMode {
    Inclusion {
        tree: IndexMap<String, PathNode>,
        computed: Vec<(String, Expression)>,
    },
    Exclusion {
        paths: Vec<String>,
    },
}

/// A compiled projection document.
///
/// `{name: 1, "address.city": 1}` keeps only the listed fields,
/// `{password: 0}` removes the listed fields and the two styles cannot be
/// mixed except for `_id`, which is kept unless explicitly excluded.
/// Any other value is an expression and the field is computed from the
/// source document, which counts as an inclusion.
#[derive(Debug, Clone)]
pub struct Projection {
    mode: ProjectionMode,
    include_id: bool,
    computed_id: Option<Expression>,
}

enum Item {
    Include,
    Exclude,
    Computed(Expression),
}

impl Projection {
    pub fn parse(spec: &Document) -> DocsimResult<Projection> {
        if spec.is_empty() {
            log::error!("Empty projection specification");
            return Err(DocsimError::new(
                "projection specification must have at least one field",
                ErrorKind::ValidationError,
            ));
        }

        let mut items = Vec::new();
        flatten(spec, "", &mut items)?;

        let mut include_id = true;
        let mut computed_id = None;
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        let mut computed = Vec::new();

        for (path, item) in items {
            if path == DOC_ID {
                match item {
                    Item::Include => include_id = true,
                    Item::Exclude => include_id = false,
                    Item::Computed(expression) => computed_id = Some(expression),
                }
                continue;
            }
            match item {
                Item::Include => includes.push(path),
                Item::Exclude => excludes.push(path),
                Item::Computed(expression) => computed.push((path, expression)),
            }
        }

        let inclusion = !includes.is_empty() || !computed.is_empty() || computed_id.is_some();
        if inclusion && !excludes.is_empty() {
            log::error!("Projection mixes inclusion and exclusion");
            return Err(DocsimError::new(
                &format!(
                    "Cannot do exclusion on field {} in inclusion projection",
                    excludes[0]
                ),
                ErrorKind::ProjectionConflict,
            ));
        }

        let mode = if inclusion {
            let mut tree = IndexMap::new();
            for path in &includes {
                add_path(&mut tree, path, PathNode::Leaf)?;
            }
            for (path, _) in &computed {
                add_path(&mut tree, path, PathNode::Computed)?;
            }
            ProjectionMode::Inclusion { tree, computed }
        } else if excludes.is_empty() {
            // only `_id` was mentioned
            if include_id {
                ProjectionMode::Inclusion {
                    tree: IndexMap::new(),
                    computed: Vec::new(),
                }
            } else {
                ProjectionMode::Exclusion { paths: Vec::new() }
            }
        } else {
            ProjectionMode::Exclusion { paths: excludes }
        };

        Ok(Projection {
            mode,
            include_id,
            computed_id,
        })
    }

    /// Produces the projected copy of `document`.
    pub fn apply(&self, document: &Document) -> DocsimResult<Document> {
        match &self.mode {
            ProjectionMode::Inclusion { tree, computed } => {
                let mut result = Document::new();
                for (key, value) in document.iter() {
                    if key == DOC_ID {
                        if self.include_id && self.computed_id.is_none() {
                            result.insert(key.clone(), value.clone());
                        }
                        continue;
                    }
                    match tree.get(key) {
                        Some(PathNode::Leaf) => {
                            result.insert(key.clone(), value.clone());
                        }
                        Some(PathNode::Branch(children)) => {
                            if let Some(projected) = include_value(value, children) {
                                result.insert(key.clone(), projected);
                            }
                        }
                        _ => {}
                    }
                }

                if let Some(expression) = &self.computed_id {
                    if let Some(value) = expression.evaluate_optional(document)? {
                        result.insert(DOC_ID, value);
                    }
                }
                for (path, expression) in computed {
                    if let Some(value) = expression.evaluate_optional(document)? {
                        result.put(path, value)?;
                    }
                }
                Ok(result)
            }
            ProjectionMode::Exclusion { paths } => {
                let mut result = document.clone();
                if !self.include_id {
                    result.remove(DOC_ID);
                }
                for path in paths {
                    exclude_path(&mut result, &split_path(path));
                }
                Ok(result)
            }
        }
    }
}

fn flatten(spec: &Document, prefix: &str, items: &mut Vec<(String, Item)>) -> DocsimResult<()> {
    for (key, value) in spec.iter() {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        if key.is_empty() || key.starts_with(OPERATOR_PREFIX) {
            log::error!("Invalid projection field {:?}", path);
            return Err(DocsimError::new(
                &format!("FieldPath field names may not start with '$' or be empty: {}", path),
                ErrorKind::ValidationError,
            ));
        }

        let item = match value {
            Value::Bool(flag) => {
                if *flag {
                    Item::Include
                } else {
                    Item::Exclude
                }
            }
            Value::Int64(_) | Value::Float64(_) => {
                if value.as_f64().unwrap_or(0.0) != 0.0 {
                    Item::Include
                } else {
                    Item::Exclude
                }
            }
            Value::Document(nested)
                if !nested.is_empty()
                    && !nested.keys().any(|k| k.starts_with(OPERATOR_PREFIX)) =>
            {
                flatten(nested, &path, items)?;
                continue;
            }
            other => Item::Computed(Expression::parse(other)?),
        };
        items.push((path, item));
    }
    Ok(())
}

fn add_path(tree: &mut IndexMap<String, PathNode>, path: &str, node: PathNode) -> DocsimResult<()> {
    let splits = split_path(path);
    let mut current = tree;
    for (position, segment) in splits.iter().enumerate() {
        let last = position + 1 == splits.len();
        if last {
            if current.contains_key(*segment) {
                return Err(path_collision(path));
            }
            current.insert(segment.to_string(), node);
            return Ok(());
        }

        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| PathNode::Branch(IndexMap::new()));
        current = match entry {
            PathNode::Branch(children) => children,
            _ => return Err(path_collision(path)),
        };
    }
    Ok(())
}

fn path_collision(path: &str) -> DocsimError {
    log::error!("Projection path collision at {}", path);
    DocsimError::new(
        &format!("Path collision at {}", path),
        ErrorKind::ValidationError,
    )
}

fn include_value(value: &Value, children: &IndexMap<String, PathNode>) -> Option<Value> {
    match value {
        Value::Document(doc) => {
            let mut projected = Document::new();
            for (key, child) in doc.iter() {
                match children.get(key) {
                    Some(PathNode::Leaf) => {
                        projected.insert(key.clone(), child.clone());
                    }
                    Some(PathNode::Branch(grandchildren)) => {
                        if let Some(value) = include_value(child, grandchildren) {
                            projected.insert(key.clone(), value);
                        }
                    }
                    _ => {}
                }
            }
            Some(Value::Document(projected))
        }
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter(|item| item.is_document() || item.is_array())
                .filter_map(|item| include_value(item, children))
                .collect(),
        )),
        _ => None,
    }
}

fn exclude_path(document: &mut Document, splits: &[&str]) {
    let (first, rest) = match splits.split_first() {
        Some(split) => split,
        None => return,
    };
    if rest.is_empty() {
        document.remove(first);
        return;
    }
    if let Some(value) = document.get_mut(first) {
        exclude_in_value(value, rest);
    }
}

fn exclude_in_value(value: &mut Value, splits: &[&str]) {
    match value {
        Value::Document(doc) => exclude_path(doc, splits),
        Value::Array(items) => {
            for item in items.iter_mut() {
                exclude_in_value(item, splits);
            }
        }
        _ => {}
    }
}
