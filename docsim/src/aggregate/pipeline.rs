use crate::aggregate::accumulator::{Accumulator, AccumulatorState};
use crate::aggregate::Expression;
use crate::collection::Document;
use crate::common::stream::sorted_stream::SortedStream;
use crate::common::stream::Projection;
use crate::common::{SortOrder, SortSpec, Value, DOC_ID, FIELD_REF_PREFIX, FIELD_SEPARATOR, OPERATOR_PREFIX};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use crate::filter::Filter;
use indexmap::IndexMap;

/// Resolves the documents of another collection in the same database,
/// used by `$lookup`.
pub type ForeignResolver<'a> = &'a dyn Fn(&str) -> Vec<Document>;

#[derive(Debug, Clone)]
struct Unwind {
    path: String,
    preserve_null_and_empty: bool,
    include_array_index: Option<String>,
}

#[derive(Debug, Clone)]
struct Lookup {
    from: String,
    local_field: String,
    foreign_field: String,
    as_field: String,
}

#[derive(Clone)]
enum Stage {
    Match(Filter),
    Sort(SortSpec),
    Skip(usize),
    Limit(usize),
    Count(String),
    Project(Projection),
    Group {
        id: Expression,
        accumulators: Vec<(String, Accumulator)>,
    },
    Unwind(Unwind),
    AddFields(Vec<(String, Expression)>),
    Unset(Projection),
    ReplaceRoot(Expression),
    SortByCount(Expression),
    Lookup(Lookup),
}

/// A parsed aggregation pipeline.
///
/// Stages run strictly in order, each one consuming the output of the
/// previous one:
///
/// ```ignore
/// let pipeline = Pipeline::parse(&[
///     doc_value!({ "$match": { status: "active" } }),
///     doc_value!({ "$group": { _id: "$category", total: { "$sum": "$amount" } } }),
///     doc_value!({ "$sort": { total: (-1) } }),
/// ])?;
/// let results = pipeline.execute(documents, &|_| Vec::new())?;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

fn invalid(message: &str) -> DocsimError {
    log::error!("{}", message);
    DocsimError::new(message, ErrorKind::ValidationError)
}

fn invalid_argument(message: &str) -> DocsimError {
    log::error!("{}", message);
    DocsimError::new(message, ErrorKind::InvalidArgument)
}

impl Pipeline {
    pub fn parse(stages: &[Value]) -> DocsimResult<Pipeline> {
        let mut parsed = Vec::with_capacity(stages.len());
        for stage in stages {
            let stage = match stage {
                Value::Document(stage) if stage.size() == 1 => stage,
                _ => {
                    return Err(invalid(
                        "A pipeline stage specification object must contain exactly one field.",
                    ))
                }
            };
            if let Some((name, argument)) = stage.iter().next() {
                parsed.push(parse_stage(name, argument)?);
            }
        }
        Ok(Pipeline { stages: parsed })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs the pipeline over `input`.
    pub fn execute(&self, input: Vec<Document>, foreign: ForeignResolver) -> DocsimResult<Vec<Document>> {
        let mut documents = input;
        for stage in &self.stages {
            documents = run_stage(stage, documents, foreign)?;
        }
        Ok(documents)
    }
}

fn parse_stage(name: &str, argument: &Value) -> DocsimResult<Stage> {
    match name {
        "$match" => match argument {
            Value::Document(filter) => Ok(Stage::Match(Filter::parse(filter)?)),
            _ => Err(invalid("the match filter must be an expression in an object")),
        },
        "$sort" => match argument {
            Value::Document(spec) => Ok(Stage::Sort(SortSpec::parse(spec)?)),
            _ => Err(invalid("the $sort key specification must be an object")),
        },
        "$skip" => Ok(Stage::Skip(non_negative_integer("$skip", argument)?)),
        "$limit" => {
            let limit = non_negative_integer("$limit", argument)?;
            if limit == 0 {
                return Err(invalid_argument("the limit must be positive"));
            }
            Ok(Stage::Limit(limit))
        }
        "$count" => {
            let field = match argument {
                Value::String(field) => field,
                _ => return Err(invalid("the count field must be a non-empty string")),
            };
            if field.is_empty() {
                return Err(invalid("the count field must be a non-empty string"));
            }
            if field.starts_with(OPERATOR_PREFIX) {
                return Err(invalid("the count field cannot be a $-prefixed path"));
            }
            if field.contains(FIELD_SEPARATOR) {
                return Err(invalid("the count field cannot contain '.'"));
            }
            Ok(Stage::Count(field.clone()))
        }
        "$project" => match argument {
            Value::Document(spec) => Ok(Stage::Project(Projection::parse(spec)?)),
            _ => Err(invalid("$project specification must be an object")),
        },
        "$group" => parse_group(argument),
        "$unwind" => parse_unwind(argument),
        "$addFields" | "$set" => {
            let spec = match argument {
                Value::Document(spec) if !spec.is_empty() => spec,
                _ => return Err(invalid(&format!("{} specification must be a non-empty object", name))),
            };
            let mut fields = Vec::with_capacity(spec.size());
            for (field, expression) in spec.iter() {
                if field.is_empty() || field.starts_with(OPERATOR_PREFIX) {
                    return Err(invalid(&format!("invalid field name '{}' in {}", field, name)));
                }
                fields.push((field.clone(), Expression::parse(expression)?));
            }
            Ok(Stage::AddFields(fields))
        }
        "$unset" => {
            let fields: Vec<&Value> = match argument {
                Value::String(_) => vec![argument],
                Value::Array(items) if !items.is_empty() => items.iter().collect(),
                _ => return Err(invalid("$unset specification must be a string or a non-empty array")),
            };
            let mut spec = Document::new();
            for field in fields {
                match field {
                    Value::String(path) if !path.is_empty() => {
                        spec.insert(path.clone(), 0);
                    }
                    _ => return Err(invalid("$unset specification must contain non-empty strings")),
                }
            }
            Ok(Stage::Unset(Projection::parse(&spec)?))
        }
        "$replaceRoot" => {
            let new_root = argument
                .as_document()
                .and_then(|spec| spec.get("newRoot"))
                .ok_or_else(|| invalid("no newRoot specified for the $replaceRoot stage"))?;
            Ok(Stage::ReplaceRoot(Expression::parse(new_root)?))
        }
        "$sortByCount" => {
            let valid = match argument {
                Value::String(path) => path.starts_with(FIELD_REF_PREFIX),
                Value::Document(doc) => doc.size() == 1 && doc.keys().all(|k| k.starts_with(OPERATOR_PREFIX)),
                _ => false,
            };
            if !valid {
                return Err(invalid(
                    "the $sortByCount field must be defined as a $-prefixed path or an expression",
                ));
            }
            Ok(Stage::SortByCount(Expression::parse(argument)?))
        }
        "$lookup" => parse_lookup(argument),
        _ => {
            log::error!("Unrecognized pipeline stage {}", name);
            Err(DocsimError::new(
                &format!("Unrecognized pipeline stage name: '{}'", name),
                ErrorKind::UnknownOperator,
            ))
        }
    }
}

fn non_negative_integer(stage: &str, argument: &Value) -> DocsimResult<usize> {
    match argument.as_i64() {
        Some(value) if value >= 0 => Ok(value as usize),
        _ => Err(invalid_argument(&format!(
            "invalid argument to {} stage: {} is not a non-negative integer",
            stage, argument
        ))),
    }
}

fn parse_group(argument: &Value) -> DocsimResult<Stage> {
    let spec = match argument {
        Value::Document(spec) => spec,
        _ => return Err(invalid("a group's fields must be specified in an object")),
    };
    let id = match spec.get(DOC_ID) {
        Some(id) => Expression::parse(id)?,
        None => return Err(invalid("a group specification must include an _id")),
    };

    let mut accumulators = Vec::new();
    for (field, accumulator) in spec.iter() {
        if field == DOC_ID {
            continue;
        }
        if field.contains(FIELD_SEPARATOR) {
            return Err(invalid(&format!(
                "the group aggregate field name '{}' cannot contain '.'",
                field
            )));
        }
        accumulators.push((field.clone(), Accumulator::parse(field, accumulator)?));
    }
    Ok(Stage::Group { id, accumulators })
}

fn parse_unwind(argument: &Value) -> DocsimResult<Stage> {
    let (path, preserve_null_and_empty, include_array_index) = match argument {
        Value::String(path) => (path.clone(), false, None),
        Value::Document(spec) => {
            let path = match spec.get("path") {
                Some(Value::String(path)) => path.clone(),
                _ => return Err(invalid("no path specified to $unwind stage")),
            };
            let preserve = match spec.get("preserveNullAndEmptyArrays") {
                None => false,
                Some(Value::Bool(flag)) => *flag,
                Some(_) => return Err(invalid("preserveNullAndEmptyArrays must be a boolean")),
            };
            let index = match spec.get("includeArrayIndex") {
                None => None,
                Some(Value::String(name)) if !name.is_empty() && !name.starts_with(OPERATOR_PREFIX) => {
                    Some(name.clone())
                }
                Some(_) => return Err(invalid("includeArrayIndex must be a non-empty string")),
            };
            (path, preserve, index)
        }
        _ => return Err(invalid("$unwind requires a string or an object argument")),
    };

    let path = match path.strip_prefix(FIELD_REF_PREFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => {
            return Err(invalid(&format!(
                "path option to $unwind stage should be prefixed with a '$': {}",
                path
            )))
        }
    };
    Ok(Stage::Unwind(Unwind {
        path,
        preserve_null_and_empty,
        include_array_index,
    }))
}

fn parse_lookup(argument: &Value) -> DocsimResult<Stage> {
    let spec = match argument {
        Value::Document(spec) => spec,
        _ => return Err(invalid("the $lookup stage specification must be an object")),
    };
    let text = |name: &str| -> DocsimResult<String> {
        match spec.get(name) {
            Some(Value::String(value)) if !value.is_empty() => Ok(value.clone()),
            _ => Err(invalid(&format!("$lookup requires a string '{}' field", name))),
        }
    };
    Ok(Stage::Lookup(Lookup {
        from: text("from")?,
        local_field: text("localField")?,
        foreign_field: text("foreignField")?,
        as_field: text("as")?,
    }))
}

fn run_stage(stage: &Stage, documents: Vec<Document>, foreign: ForeignResolver) -> DocsimResult<Vec<Document>> {
    match stage {
        Stage::Match(filter) => {
            let mut matched = Vec::with_capacity(documents.len());
            for document in documents {
                if filter.matches(&document)? {
                    matched.push(document);
                }
            }
            Ok(matched)
        }
        Stage::Sort(spec) => Ok(SortedStream::new(documents, spec).collect()),
        Stage::Skip(skip) => Ok(documents.into_iter().skip(*skip).collect()),
        Stage::Limit(limit) => Ok(documents.into_iter().take(*limit).collect()),
        Stage::Count(field) => {
            if documents.is_empty() {
                return Ok(Vec::new());
            }
            let mut result = Document::new();
            result.insert(field.clone(), Value::Int64(documents.len() as i64));
            Ok(vec![result])
        }
        Stage::Project(projection) | Stage::Unset(projection) => {
            documents.iter().map(|document| projection.apply(document)).collect()
        }
        Stage::Group { id, accumulators } => group(documents, id, accumulators),
        Stage::Unwind(unwind) => {
            let mut unwound = Vec::with_capacity(documents.len());
            for document in documents {
                unwind_document(document, unwind, &mut unwound)?;
            }
            Ok(unwound)
        }
        Stage::AddFields(fields) => {
            let mut results = Vec::with_capacity(documents.len());
            for document in documents {
                let mut result = document.clone();
                for (field, expression) in fields {
                    if let Some(value) = expression.evaluate_optional(&document)? {
                        result.put(field, value)?;
                    }
                }
                results.push(result);
            }
            Ok(results)
        }
        Stage::ReplaceRoot(expression) => {
            let mut results = Vec::with_capacity(documents.len());
            for document in documents {
                match expression.evaluate(&document)? {
                    Value::Document(root) => results.push(root),
                    other => {
                        return Err(invalid(&format!(
                            "'newRoot' expression must evaluate to an object, but resulting value was: {}",
                            other
                        )))
                    }
                }
            }
            Ok(results)
        }
        Stage::SortByCount(expression) => {
            let mut counts: IndexMap<Value, i64> = IndexMap::new();
            for document in &documents {
                let key = expression.evaluate(document)?;
                *counts.entry(key).or_insert(0) += 1;
            }
            let grouped = counts.into_iter().map(|(key, count)| {
                let mut result = Document::new();
                result.insert(DOC_ID, key);
                result.insert("count", Value::Int64(count));
                result
            });
            let spec = SortSpec::new().by("count", SortOrder::Descending);
            Ok(SortedStream::new(grouped, &spec).collect())
        }
        Stage::Lookup(lookup) => {
            let foreign_documents = foreign(&lookup.from);
            let mut results = Vec::with_capacity(documents.len());
            for mut document in documents {
                let local = document.query_candidates(&lookup.local_field).unwrap_or(Value::Null);
                let joined: Vec<Value> = foreign_documents
                    .iter()
                    .filter(|candidate| {
                        let remote = candidate
                            .query_candidates(&lookup.foreign_field)
                            .unwrap_or(Value::Null);
                        lookup_matches(&local, &remote)
                    })
                    .map(|candidate| Value::Document(candidate.clone()))
                    .collect();
                document.put(&lookup.as_field, Value::Array(joined))?;
                results.push(document);
            }
            Ok(results)
        }
    }
}

fn group(
    documents: Vec<Document>,
    id: &Expression,
    accumulators: &[(String, Accumulator)],
) -> DocsimResult<Vec<Document>> {
    let mut groups: IndexMap<Value, Vec<AccumulatorState>> = IndexMap::new();
    for document in &documents {
        let key = id.evaluate(document)?;
        let states = groups
            .entry(key)
            .or_insert_with(|| accumulators.iter().map(|(_, acc)| acc.init()).collect());
        for ((_, accumulator), state) in accumulators.iter().zip(states.iter_mut()) {
            accumulator.accumulate(state, document)?;
        }
    }

    let mut results = Vec::with_capacity(groups.len());
    for (key, states) in groups {
        let mut result = Document::new();
        result.insert(DOC_ID, key);
        for ((field, _), state) in accumulators.iter().zip(states) {
            result.insert(field.clone(), state.finish());
        }
        results.push(result);
    }
    Ok(results)
}

fn unwind_document(document: Document, unwind: &Unwind, output: &mut Vec<Document>) -> DocsimResult<()> {
    let value = document.get_path(&unwind.path).cloned();
    match value {
        Some(Value::Array(items)) if !items.is_empty() => {
            for (index, item) in items.into_iter().enumerate() {
                let mut unwound = document.clone();
                unwound.put(&unwind.path, item)?;
                if let Some(index_field) = &unwind.include_array_index {
                    unwound.put(index_field, Value::Int64(index as i64))?;
                }
                output.push(unwound);
            }
        }
        Some(Value::Array(_)) | Some(Value::Null) | None => {
            if unwind.preserve_null_and_empty {
                let mut preserved = document;
                if matches!(preserved.get_path(&unwind.path), Some(Value::Array(_))) {
                    preserved.remove_path(&unwind.path);
                }
                if let Some(index_field) = &unwind.include_array_index {
                    preserved.put(index_field, Value::Null)?;
                }
                output.push(preserved);
            }
        }
        Some(_) => {
            let mut single = document;
            if let Some(index_field) = &unwind.include_array_index {
                single.put(index_field, Value::Null)?;
            }
            output.push(single);
        }
    }
    Ok(())
}

fn lookup_matches(local: &Value, remote: &Value) -> bool {
    let candidates = |value: &Value| -> Vec<Value> {
        match value {
            Value::Array(items) => {
                let mut all = items.clone();
                all.push(value.clone());
                all
            }
            other => vec![other.clone()],
        }
    };
    let remote_candidates = candidates(remote);
    candidates(local)
        .iter()
        .any(|left| remote_candidates.iter().any(|right| left == right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, doc_value, val};

    fn no_foreign(_: &str) -> Vec<Document> {
        Vec::new()
    }

    fn run(stages: Vec<Value>, input: Vec<Document>) -> DocsimResult<Vec<Document>> {
        Pipeline::parse(&stages)?.execute(input, &no_foreign)
    }

    fn stage(document: Document) -> Value {
        Value::Document(document)
    }

    fn sales() -> Vec<Document> {
        vec![
            doc! { _id: 1, category: "A", amount: 10, item: "pen" },
            doc! { _id: 2, category: "A", amount: 20, item: "ink" },
            doc! { _id: 3, category: "B", amount: 30, item: "pad" },
        ]
    }

    #[test]
    fn test_group_sum() {
        let results = run(
            vec![stage(doc! { "$group": { _id: "$category", total: { "$sum": "$amount" } } })],
            sales(),
        )
        .unwrap();
        assert_eq!(
            results,
            vec![doc! { _id: "A", total: 30 }, doc! { _id: "B", total: 30 }]
        );
    }

    #[test]
    fn test_group_first_last_follow_sort() {
        let results = run(
            vec![
                stage(doc! { "$sort": { amount: (-1) } }),
                stage(doc! { "$group": {
                    _id: (Value::Null),
                    first: { "$first": "$item" },
                    last: { "$last": "$item" },
                    count: { "$count": {} }
                } }),
            ],
            sales(),
        )
        .unwrap();
        assert_eq!(
            results,
            vec![doc! { _id: (Value::Null), first: "pad", last: "pen", count: 3 }]
        );
    }

    #[test]
    fn test_match_sort_skip_limit() {
        let results = run(
            vec![
                stage(doc! { "$match": { category: "A" } }),
                stage(doc! { "$sort": { amount: (-1) } }),
                stage(doc! { "$skip": 1 }),
                stage(doc! { "$limit": 5 }),
            ],
            sales(),
        )
        .unwrap();
        assert_eq!(results, vec![sales()[0].clone()]);
    }

    #[test]
    fn test_count() {
        let results = run(vec![stage(doc! { "$count": "total" })], sales()).unwrap();
        assert_eq!(results, vec![doc! { total: 3 }]);

        let results = run(
            vec![
                stage(doc! { "$match": { category: "Z" } }),
                stage(doc! { "$count": "total" }),
            ],
            sales(),
        )
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_project_and_add_fields() {
        let results = run(
            vec![
                stage(doc! { "$addFields": { doubled: { "$multiply": ["$amount", 2] } } }),
                stage(doc! { "$project": { _id: 0, item: 1, doubled: 1 } }),
                stage(doc! { "$limit": 1 }),
            ],
            sales(),
        )
        .unwrap();
        assert_eq!(results, vec![doc! { item: "pen", doubled: 20 }]);
    }

    #[test]
    fn test_unset_and_replace_root() {
        let results = run(
            vec![
                stage(doc! { "$unset": ["amount", "category"] }),
                stage(doc! { "$limit": 1 }),
            ],
            sales(),
        )
        .unwrap();
        assert_eq!(results, vec![doc! { _id: 1, item: "pen" }]);

        let input = vec![doc! { _id: 1, inner: { x: 1 } }];
        let results = run(
            vec![stage(doc! { "$replaceRoot": { newRoot: "$inner" } })],
            input.clone(),
        )
        .unwrap();
        assert_eq!(results, vec![doc! { x: 1 }]);

        let err = run(
            vec![stage(doc! { "$replaceRoot": { newRoot: "$_id" } })],
            input,
        )
        .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_unwind() {
        let input = vec![
            doc! { _id: 1, tags: ["a", "b"] },
            doc! { _id: 2, tags: [] },
            doc! { _id: 3 },
            doc! { _id: 4, tags: "solo" },
        ];
        let results = run(vec![stage(doc! { "$unwind": "$tags" })], input.clone()).unwrap();
        assert_eq!(
            results,
            vec![
                doc! { _id: 1, tags: "a" },
                doc! { _id: 1, tags: "b" },
                doc! { _id: 4, tags: "solo" },
            ]
        );

        let results = run(
            vec![stage(doc! { "$unwind": {
                path: "$tags",
                preserveNullAndEmptyArrays: true,
                includeArrayIndex: "idx"
            } })],
            input,
        )
        .unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[1], doc! { _id: 1, tags: "b", idx: 1 });
        assert_eq!(results[2], doc! { _id: 2, idx: (Value::Null) });
        assert_eq!(results[3], doc! { _id: 3, idx: (Value::Null) });
    }

    #[test]
    fn test_sort_by_count() {
        let input = vec![
            doc! { c: "x" },
            doc! { c: "y" },
            doc! { c: "y" },
            doc! { c: "z" },
        ];
        let results = run(vec![stage(doc! { "$sortByCount": "$c" })], input).unwrap();
        assert_eq!(
            results,
            vec![
                doc! { _id: "y", count: 2 },
                doc! { _id: "x", count: 1 },
                doc! { _id: "z", count: 1 },
            ]
        );
    }

    #[test]
    fn test_lookup() {
        let orders = vec![doc! { _id: 1, sku: "pen" }, doc! { _id: 2, sku: "cup" }];
        let foreign = |name: &str| -> Vec<Document> {
            if name == "inventory" {
                vec![
                    doc! { sku: "pen", stock: 5 },
                    doc! { sku: "ink", stock: 1 },
                    doc! { sku: "pen", stock: 7 },
                ]
            } else {
                Vec::new()
            }
        };
        let pipeline = Pipeline::parse(&[stage(doc! { "$lookup": {
            from: "inventory",
            localField: "sku",
            foreignField: "sku",
            as: "stock"
        } })])
        .unwrap();
        let results = pipeline.execute(orders, &foreign).unwrap();
        assert_eq!(
            results[0].get("stock"),
            Some(&doc_value!([{ sku: "pen", stock: 5 }, { sku: "pen", stock: 7 }]))
        );
        assert_eq!(results[1].get("stock"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn test_stage_errors() {
        let cases = vec![
            (stage(doc! { "$bogus": 1 }), ErrorKind::UnknownOperator),
            (stage(doc! { "$skip": (-1) }), ErrorKind::InvalidArgument),
            (stage(doc! { "$limit": 0 }), ErrorKind::InvalidArgument),
            (stage(doc! { "$limit": "ten" }), ErrorKind::InvalidArgument),
            (stage(doc! { "$count": "" }), ErrorKind::ValidationError),
            (stage(doc! { "$count": "$n" }), ErrorKind::ValidationError),
            (stage(doc! { "$count": "a.b" }), ErrorKind::ValidationError),
            (stage(doc! { "$project": {} }), ErrorKind::ValidationError),
            (stage(doc! { "$project": { a: 1, b: 0 } }), ErrorKind::ProjectionConflict),
            (stage(doc! { "$group": { total: { "$sum": 1 } } }), ErrorKind::ValidationError),
            (stage(doc! { "$group": { _id: 1, "a.b": { "$sum": 1 } } }), ErrorKind::ValidationError),
            (stage(doc! { "$unwind": "tags" }), ErrorKind::ValidationError),
            (stage(doc! { "$match": 1, "$limit": 1 }), ErrorKind::ValidationError),
            (val!(5), ErrorKind::ValidationError),
        ];
        for (spec, kind) in cases {
            let err = Pipeline::parse(&[spec.clone()]).err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(kind), "stage {}", spec);
        }
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline = Pipeline::parse(&[]).unwrap();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.execute(sales(), &no_foreign).unwrap(), sales());
    }
}
