use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use std::fmt::{Display, Formatter};

/// Operations accepted at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InsertOne,
    InsertMany,
    Find,
    FindOne,
    UpdateOne,
    UpdateMany,
    ReplaceOne,
    DeleteOne,
    DeleteMany,
    CountDocuments,
    Distinct,
    Aggregate,
    CreateIndex,
    ListIndexes,
    DropIndex,
    CreateCollection,
    DropCollection,
    ListCollections,
    DropDatabase,
    ListDatabases,
    RunCommand,
}

impl Operation {
    pub fn from_name(name: &str) -> Option<Operation> {
        let operation = match name {
            "insertOne" => Operation::InsertOne,
            "insertMany" => Operation::InsertMany,
            "find" => Operation::Find,
            "findOne" => Operation::FindOne,
            "updateOne" => Operation::UpdateOne,
            "updateMany" => Operation::UpdateMany,
            "replaceOne" => Operation::ReplaceOne,
            "deleteOne" => Operation::DeleteOne,
            "deleteMany" => Operation::DeleteMany,
            "countDocuments" => Operation::CountDocuments,
            "distinct" => Operation::Distinct,
            "aggregate" => Operation::Aggregate,
            "createIndex" => Operation::CreateIndex,
            "listIndexes" => Operation::ListIndexes,
            "dropIndex" => Operation::DropIndex,
            "createCollection" => Operation::CreateCollection,
            "dropCollection" => Operation::DropCollection,
            "listCollections" => Operation::ListCollections,
            "dropDatabase" => Operation::DropDatabase,
            "listDatabases" => Operation::ListDatabases,
            "runCommand" => Operation::RunCommand,
            _ => return None,
        };
        Some(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::InsertOne => "insertOne",
            Operation::InsertMany => "insertMany",
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::UpdateOne => "updateOne",
            Operation::UpdateMany => "updateMany",
            Operation::ReplaceOne => "replaceOne",
            Operation::DeleteOne => "deleteOne",
            Operation::DeleteMany => "deleteMany",
            Operation::CountDocuments => "countDocuments",
            Operation::Distinct => "distinct",
            Operation::Aggregate => "aggregate",
            Operation::CreateIndex => "createIndex",
            Operation::ListIndexes => "listIndexes",
            Operation::DropIndex => "dropIndex",
            Operation::CreateCollection => "createCollection",
            Operation::DropCollection => "dropCollection",
            Operation::ListCollections => "listCollections",
            Operation::DropDatabase => "dropDatabase",
            Operation::ListDatabases => "listDatabases",
            Operation::RunCommand => "runCommand",
        }
    }

    /// Whether the operation addresses a single collection.
    pub fn requires_collection(&self) -> bool {
        !matches!(
            self,
            Operation::ListCollections
                | Operation::DropDatabase
                | Operation::ListDatabases
                | Operation::RunCommand
        )
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single operation addressed to a database and, where needed, a collection.
///
/// Arguments are operation specific:
///
/// | operation | arguments |
/// |-----------|-----------|
/// | `insertOne` | `document` |
/// | `insertMany` | `documents` |
/// | `find` | `filter?`, `sort?`, `skip?`, `limit?`, `projection?` |
/// | `findOne` | `filter?`, `projection?` |
/// | `updateOne`, `updateMany` | `filter?`, `update`, `upsert?` |
/// | `replaceOne` | `filter?`, `replacement`, `upsert?` |
/// | `deleteOne`, `deleteMany` | `filter?` |
/// | `countDocuments` | `filter?`, `skip?`, `limit?` |
/// | `distinct` | `field`, `filter?` |
/// | `aggregate` | `pipeline` |
/// | `createIndex` | `keys`, `options?` |
/// | `dropIndex` | `name` or `keys` |
/// | `runCommand` | `command` |
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    operation: Operation,
    database: String,
    collection: Option<String>,
    args: Document,
}

impl Request {
    pub fn new(operation: Operation, database: &str) -> Self {
        Request {
            operation,
            database: database.to_string(),
            collection: None,
            args: Document::new(),
        }
    }

    pub fn collection(mut self, collection: &str) -> Self {
        self.collection = Some(collection.to_string());
        self
    }

    pub fn args(mut self, args: Document) -> Self {
        self.args = args;
        self
    }

    /// Reads `{op, db, collection?, args?}`.
    pub fn from_document(request: &Document) -> DocsimResult<Request> {
        let op = required_string(request, "op")?;
        let operation = match Operation::from_name(op) {
            Some(operation) => operation,
            None => {
                log::error!("Unknown operation {}", op);
                return Err(DocsimError::new(
                    &format!("no such operation: '{}'", op),
                    ErrorKind::UnknownOperator,
                ));
            }
        };

        let database = required_string(request, "db")?;
        let collection = match request.get("collection") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => {
                log::error!("Collection name must be a string, found {}", other);
                return Err(DocsimError::new(
                    "collection must be a string",
                    ErrorKind::ValidationError,
                ));
            }
        };
        let args = match request.get("args") {
            None | Some(Value::Null) => Document::new(),
            Some(Value::Document(args)) => args.clone(),
            Some(other) => {
                log::error!("Request args must be a document, found {}", other);
                return Err(DocsimError::new(
                    "args must be a document",
                    ErrorKind::ValidationError,
                ));
            }
        };

        Ok(Request {
            operation,
            database: database.to_string(),
            collection,
            args,
        })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn arguments(&self) -> &Document {
        &self.args
    }
}

fn required_string<'a>(request: &'a Document, key: &str) -> DocsimResult<&'a str> {
    match request.get(key).and_then(|value| value.as_str()) {
        Some(value) => Ok(value),
        None => {
            log::error!("Request is missing string field {}", key);
            Err(DocsimError::new(
                &format!("request field '{}' must be a string", key),
                ErrorKind::ValidationError,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_operation_names_round_trip() {
        for name in [
            "insertOne", "insertMany", "find", "findOne", "updateOne", "updateMany",
            "replaceOne", "deleteOne", "deleteMany", "countDocuments", "distinct",
            "aggregate", "createIndex", "listIndexes", "dropIndex", "createCollection",
            "dropCollection", "listCollections", "dropDatabase", "listDatabases", "runCommand",
        ] {
            let operation = Operation::from_name(name).unwrap();
            assert_eq!(operation.name(), name);
        }
        assert!(Operation::from_name("explain").is_none());
    }

    #[test]
    fn test_requires_collection() {
        assert!(Operation::Find.requires_collection());
        assert!(Operation::DropCollection.requires_collection());
        assert!(!Operation::ListDatabases.requires_collection());
        assert!(!Operation::RunCommand.requires_collection());
    }

    #[test]
    fn test_from_document() {
        let request = Request::from_document(&doc! {
            op: "find",
            db: "app",
            collection: "users",
            args: { filter: { age: 1 } }
        })
        .unwrap();
        assert_eq!(request.operation(), Operation::Find);
        assert_eq!(request.database(), "app");
        assert_eq!(request.collection_name(), Some("users"));
        assert_eq!(request.arguments(), &doc! { filter: { age: 1 } });

        let request = Request::from_document(&doc! { op: "listDatabases", db: "admin" }).unwrap();
        assert_eq!(
            request,
            Request::new(Operation::ListDatabases, "admin")
        );
    }

    #[test]
    fn test_from_document_errors() {
        let err = Request::from_document(&doc! { op: "explode", db: "a" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
        let err = Request::from_document(&doc! { op: "find" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        let err = Request::from_document(&doc! { op: "find", db: "a", args: 3 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
