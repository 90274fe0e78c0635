use crate::collection::{Collection, Document, FindOptions, IndexOptions, UpdateOptions};
use crate::command::{Operation, Request};
use crate::common::Value;
use crate::database::{ok_reply, Database};
use crate::docsim::Docsim;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};

/// Executes a request against the store and returns its reply value.
pub(crate) fn dispatch(store: &Docsim, request: &Request) -> DocsimResult<Value> {
    let operation = request.operation();
    log::debug!(
        "Dispatching {} on {}.{}",
        operation,
        request.database(),
        request.collection_name().unwrap_or("")
    );

    match operation {
        Operation::ListDatabases => return list_databases(store),
        Operation::DropDatabase => {
            store.drop_database(request.database())?;
            let mut reply = ok_reply();
            reply.insert("dropped", request.database());
            return Ok(Value::Document(reply));
        }
        _ => {}
    }

    let database = store.database(request.database())?;
    let args = request.arguments();
    match operation {
        Operation::ListCollections => {
            let collections = database.list_collections()?;
            return Ok(documents_value(collections));
        }
        Operation::RunCommand => {
            let command = required_document(args, "command")?;
            return Ok(Value::Document(database.run_command(command)?));
        }
        Operation::DropCollection => {
            let dropped = database.drop_collection(collection_name(request)?)?;
            let mut reply = ok_reply();
            reply.insert("dropped", dropped);
            return Ok(Value::Document(reply));
        }
        _ => {}
    }

    let collection = database.collection(collection_name(request)?)?;
    dispatch_collection(&database, &collection, operation, args)
}

fn dispatch_collection(
    database: &Database,
    collection: &Collection,
    operation: Operation,
    args: &Document,
) -> DocsimResult<Value> {
    let filter = optional_document(args, "filter")?.cloned().unwrap_or_default();

    let reply: Value = match operation {
        Operation::InsertOne => {
            let document = required_document(args, "document")?.clone();
            collection.insert_one(document)?.to_document().into()
        }
        Operation::InsertMany => {
            let documents = required_documents(args, "documents")?;
            collection.insert_many(documents)?.to_document().into()
        }
        Operation::Find => {
            let mut options = FindOptions::new()
                .skip(optional_count(args, "skip")?)
                .limit(optional_count(args, "limit")?);
            if let Some(sort) = optional_document(args, "sort")? {
                options = options.sort(sort)?;
            }
            if let Some(projection) = optional_document(args, "projection")? {
                options = options.projection(projection)?;
            }
            let documents = collection.find_with_options(&filter, &options)?.to_list()?;
            documents_value(documents)
        }
        Operation::FindOne => {
            let options = match optional_document(args, "projection")? {
                Some(projection) => FindOptions::new().projection(projection)?,
                None => FindOptions::new(),
            };
            let mut cursor = collection.find_with_options(&filter, &options.limit(1))?;
            match cursor.try_next()? {
                Some(document) => Value::Document(document),
                None => Value::Null,
            }
        }
        Operation::UpdateOne | Operation::UpdateMany => {
            let update = required_document(args, "update")?;
            let options = UpdateOptions::new().upsert(optional_bool(args, "upsert"));
            let result = if operation == Operation::UpdateOne {
                collection.update_one(&filter, update, &options)?
            } else {
                collection.update_many(&filter, update, &options)?
            };
            result.to_document().into()
        }
        Operation::ReplaceOne => {
            let replacement = required_document(args, "replacement")?.clone();
            let options = UpdateOptions::new().upsert(optional_bool(args, "upsert"));
            collection.replace_one(&filter, replacement, &options)?.to_document().into()
        }
        Operation::DeleteOne => collection.delete_one(&filter)?.to_document().into(),
        Operation::DeleteMany => collection.delete_many(&filter)?.to_document().into(),
        Operation::CountDocuments => {
            let skip = optional_count(args, "skip")?;
            let limit = optional_count(args, "limit")?;
            Value::from(collection.count_documents(&filter, skip, limit)?)
        }
        Operation::Distinct => {
            let field = required_string(args, "field")?;
            Value::Array(collection.distinct(field, &filter)?)
        }
        Operation::Aggregate => {
            let pipeline: &[Value] = match args.get("pipeline") {
                Some(Value::Array(stages)) => stages.as_slice(),
                None => &[],
                Some(other) => {
                    log::error!("aggregate pipeline must be an array, found {}", other);
                    return Err(DocsimError::new(
                        "'pipeline' must be an array of stage documents",
                        ErrorKind::ValidationError,
                    ));
                }
            };
            let documents = collection.aggregate(pipeline)?.to_list()?;
            documents_value(documents)
        }
        Operation::CreateIndex => {
            let keys = required_document(args, "keys")?;
            let options = match optional_document(args, "options")? {
                Some(options) => IndexOptions::from_document(options)?,
                None => IndexOptions::new(),
            };
            Value::from(collection.create_index(keys, &options)?)
        }
        Operation::ListIndexes => {
            let indexes = collection
                .list_indexes()?
                .iter()
                .map(|index| index.to_document())
                .collect();
            documents_value(indexes)
        }
        Operation::DropIndex => {
            match (args.get("name"), optional_document(args, "keys")?) {
                (Some(Value::String(name)), _) => collection.drop_index(name)?,
                (_, Some(keys)) => collection.drop_index_by_keys(keys)?,
                _ => {
                    log::error!("dropIndex requires an index name or key pattern");
                    return Err(DocsimError::new(
                        "dropIndex requires 'name' or 'keys'",
                        ErrorKind::ValidationError,
                    ));
                }
            }
            Value::Document(ok_reply())
        }
        Operation::CreateCollection => {
            database.create_collection(collection.name())?;
            Value::Document(ok_reply())
        }
        Operation::ListDatabases
        | Operation::DropDatabase
        | Operation::ListCollections
        | Operation::RunCommand
        | Operation::DropCollection => {
            log::error!("{} reached collection dispatch", operation);
            return Err(DocsimError::new(
                &format!("{} is not a collection operation", operation),
                ErrorKind::InternalError,
            ));
        }
    };
    Ok(reply)
}

fn list_databases(store: &Docsim) -> DocsimResult<Value> {
    let mut databases = Vec::new();
    for name in store.list_database_names() {
        let empty = store.database(&name)?.is_empty();
        let mut info = Document::new();
        info.insert("name", name);
        info.insert("sizeOnDisk", 0);
        info.insert("empty", empty);
        databases.push(info);
    }

    let mut reply = Document::new();
    reply.insert("databases", documents_value(databases));
    reply.insert("totalSize", 0);
    reply.insert("ok", 1);
    Ok(Value::Document(reply))
}

fn collection_name(request: &Request) -> DocsimResult<&str> {
    match request.collection_name() {
        Some(name) => Ok(name),
        None => {
            log::error!("{} requires a collection name", request.operation());
            Err(DocsimError::new(
                &format!("{} requires a collection", request.operation()),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn documents_value(documents: Vec<Document>) -> Value {
    Value::Array(documents.into_iter().map(Value::Document).collect())
}

fn optional_document<'a>(args: &'a Document, key: &str) -> DocsimResult<Option<&'a Document>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Document(document)) => Ok(Some(document)),
        Some(other) => {
            log::error!("Argument {} must be a document, found {}", key, other);
            Err(DocsimError::new(
                &format!("'{}' must be a document", key),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn required_document<'a>(args: &'a Document, key: &str) -> DocsimResult<&'a Document> {
    match optional_document(args, key)? {
        Some(document) => Ok(document),
        None => {
            log::error!("Missing required argument {}", key);
            Err(DocsimError::new(
                &format!("'{}' is required", key),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn required_documents(args: &Document, key: &str) -> DocsimResult<Vec<Document>> {
    let items = match args.get(key) {
        Some(Value::Array(items)) => items,
        _ => {
            log::error!("Argument {} must be an array of documents", key);
            return Err(DocsimError::new(
                &format!("'{}' must be an array of documents", key),
                ErrorKind::ValidationError,
            ));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::Document(document) => Ok(document.clone()),
            other => {
                log::error!("Expected a document in {}, found {}", key, other);
                Err(DocsimError::new(
                    &format!("'{}' must contain only documents", key),
                    ErrorKind::ValidationError,
                ))
            }
        })
        .collect()
}

fn required_string<'a>(args: &'a Document, key: &str) -> DocsimResult<&'a str> {
    match args.get(key).and_then(|value| value.as_str()) {
        Some(value) => Ok(value),
        None => {
            log::error!("Argument {} must be a string", key);
            Err(DocsimError::new(
                &format!("'{}' must be a string", key),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn optional_bool(args: &Document, key: &str) -> bool {
    args.get(key).map(|value| value.is_truthy()).unwrap_or(false)
}

/// Reads a non-negative integer argument; absent means `0`.
fn optional_count(args: &Document, key: &str) -> DocsimResult<u64> {
    let value = match args.get(key) {
        None | Some(Value::Null) => return Ok(0),
        Some(value) => value,
    };
    match value.as_i64() {
        Some(count) if count >= 0 => Ok(count as u64),
        _ => {
            log::error!("Argument {} must be a non-negative integer, found {}", key, value);
            Err(DocsimError::new(
                &format!("'{}' must be a non-negative integer", key),
                ErrorKind::InvalidArgument,
            ))
        }
    }
}
