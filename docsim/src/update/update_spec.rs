use crate::collection::{split_path, Document};
use crate::common::{Value, DOC_ID, OPERATOR_PREFIX};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};

use super::operators;

/// Update operators understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Set,
    Unset,
    SetOnInsert,
    Inc,
    Mul,
    Min,
    Max,
    Rename,
    CurrentDate,
    Push,
    AddToSet,
    Pop,
    Pull,
    PullAll,
}

impl UpdateOperator {
    pub fn from_name(name: &str) -> Option<UpdateOperator> {
        let operator = match name {
            "$set" => UpdateOperator::Set,
            "$unset" => UpdateOperator::Unset,
            "$setOnInsert" => UpdateOperator::SetOnInsert,
            "$inc" => UpdateOperator::Inc,
            "$mul" => UpdateOperator::Mul,
            "$min" => UpdateOperator::Min,
            "$max" => UpdateOperator::Max,
            "$rename" => UpdateOperator::Rename,
            "$currentDate" => UpdateOperator::CurrentDate,
            "$push" => UpdateOperator::Push,
            "$addToSet" => UpdateOperator::AddToSet,
            "$pop" => UpdateOperator::Pop,
            "$pull" => UpdateOperator::Pull,
            "$pullAll" => UpdateOperator::PullAll,
            _ => return None,
        };
        Some(operator)
    }

    pub fn name(&self) -> &'static str {
        match self {
            UpdateOperator::Set => "$set",
            UpdateOperator::Unset => "$unset",
            UpdateOperator::SetOnInsert => "$setOnInsert",
            UpdateOperator::Inc => "$inc",
            UpdateOperator::Mul => "$mul",
            UpdateOperator::Min => "$min",
            UpdateOperator::Max => "$max",
            UpdateOperator::Rename => "$rename",
            UpdateOperator::CurrentDate => "$currentDate",
            UpdateOperator::Push => "$push",
            UpdateOperator::AddToSet => "$addToSet",
            UpdateOperator::Pop => "$pop",
            UpdateOperator::Pull => "$pull",
            UpdateOperator::PullAll => "$pullAll",
        }
    }
}

/// One operator applied to one path.
#[derive(Debug, Clone)]
pub(crate) struct FieldUpdate {
    pub(crate) operator: UpdateOperator,
    pub(crate) path: String,
    pub(crate) argument: Value,
}

/// A parsed and validated update document.
///
/// Parsing checks the shape of the whole update up front, so a malformed
/// update fails before any document is touched. Applying is pure: the input
/// document is cloned and the clone is returned.
///
/// ```rust,ignore
/// let spec = UpdateSpec::parse(&doc! { "$inc": { count: 3 } })?;
/// let updated = spec.apply(&doc! { _id: 1, count: 5 })?;
/// assert_eq!(updated.get("count"), Some(&val!(8)));
/// ```
#[derive(Debug, Clone)]
pub struct UpdateSpec {
    updates: Vec<FieldUpdate>,
}

impl UpdateSpec {
    /// Parses an update document. The empty document is a valid no-op.
    pub fn parse(update: &Document) -> DocsimResult<UpdateSpec> {
        let mut updates = Vec::new();
        for (name, fields) in update.iter() {
            if !name.starts_with(OPERATOR_PREFIX) {
                log::error!("Update document key {} is not an operator", name);
                return Err(DocsimError::new(
                    &format!(
                        "Update document requires atomic operators, found field '{}'",
                        name
                    ),
                    ErrorKind::ValidationError,
                ));
            }

            let operator = match UpdateOperator::from_name(name) {
                Some(operator) => operator,
                None => {
                    log::error!("Unknown update operator {}", name);
                    return Err(DocsimError::new(
                        &format!("Unknown modifier: {}", name),
                        ErrorKind::UnknownOperator,
                    ));
                }
            };

            let fields = match fields {
                Value::Document(fields) => fields,
                other => {
                    log::error!("Argument of {} is {}, not an object", name, other.type_alias());
                    return Err(DocsimError::new(
                        &format!(
                            "Modifiers operate on fields but we found type {} instead",
                            other.type_alias()
                        ),
                        ErrorKind::ValidationError,
                    ));
                }
            };

            for (path, argument) in fields.iter() {
                validate_path(path)?;
                updates.push(FieldUpdate {
                    operator,
                    path: path.clone(),
                    argument: argument.clone(),
                });
            }
        }

        validate_conflicts(&updates)?;
        Ok(UpdateSpec { updates })
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Applies the update to an existing document.
    pub fn apply(&self, document: &Document) -> DocsimResult<Document> {
        self.apply_with_mode(document, false)
    }

    /// Applies the update to a document that an upsert is about to insert;
    /// `$setOnInsert` takes effect only here.
    pub fn apply_for_insert(&self, document: &Document) -> DocsimResult<Document> {
        self.apply_with_mode(document, true)
    }

    fn apply_with_mode(&self, document: &Document, is_insert: bool) -> DocsimResult<Document> {
        let mut updated = document.clone();
        for update in &self.updates {
            operators::apply_field_update(&mut updated, update, is_insert)?;
        }

        if let Some(original_id) = document.id() {
            let unchanged = updated
                .id()
                .is_some_and(|new_id| new_id.is_identical(original_id));
            if !unchanged {
                log::error!("Update attempted to modify _id of document {}", original_id);
                return Err(DocsimError::new(
                    "Performing an update on the path '_id' would modify the immutable field '_id'",
                    ErrorKind::ImmutableField,
                ));
            }
        }
        Ok(updated)
    }
}

/// Applies an update document to `document` and returns the updated copy.
pub fn apply_update(document: &Document, update: &Document) -> DocsimResult<Document> {
    UpdateSpec::parse(update)?.apply(document)
}

fn validate_path(path: &str) -> DocsimResult<()> {
    if path.is_empty() || split_path(path).iter().any(|s| s.is_empty()) {
        log::error!("Invalid update path {:?}", path);
        return Err(DocsimError::new(
            &format!("The update path '{}' contains an empty field name, which is not allowed", path),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

#[inline]
fn overlaps(a: &str, b: &str) -> bool {
    let prefix_of = |short: &str, long: &str| {
        long.len() > short.len()
            && long.starts_with(short)
            && long.as_bytes()[short.len()] == b'.'
    };
    a == b || prefix_of(a, b) || prefix_of(b, a)
}

fn validate_conflicts(updates: &[FieldUpdate]) -> DocsimResult<()> {
    let mut targets: Vec<&str> = Vec::with_capacity(updates.len());
    for update in updates {
        targets.push(&update.path);
        if update.operator == UpdateOperator::Rename {
            if let Value::String(destination) = &update.argument {
                validate_path(destination)?;
                targets.push(destination);
            }
        }
    }

    for (i, a) in targets.iter().enumerate() {
        if let Some(b) = targets[i + 1..].iter().find(|b| overlaps(a, b)) {
            log::error!("Update paths {} and {} conflict", a, b);
            return Err(DocsimError::new(
                &format!("Updating the path '{}' would create a conflict at '{}'", b, a),
                ErrorKind::ValidationError,
            ));
        }
    }
    Ok(())
}

/// Builds the document an upsert inserts: the filter's equality clauses,
/// then the update applied in insert mode, then a generated `_id` if none was
/// provided.
pub(crate) fn upsert_document(
    seed: Vec<(String, Value)>,
    spec: &UpdateSpec,
) -> DocsimResult<Document> {
    let mut document = Document::new();
    for (path, value) in seed {
        if !path.starts_with(OPERATOR_PREFIX) {
            document.put(&path, value)?;
        }
    }
    let mut inserted = spec.apply_for_insert(&document)?;
    if !inserted.has_id() {
        inserted = inserted.with_id_first(Value::ObjectId(crate::collection::ObjectId::new()));
    } else if let Some(id) = inserted.remove(DOC_ID) {
        inserted = inserted.with_id_first(id);
    }
    Ok(inserted)
}
