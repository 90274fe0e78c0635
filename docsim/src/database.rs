use crate::collection::{Collection, Document};
use crate::common::{current_time_seconds, Value, COLLECTION_TYPE};
use crate::docsim_config::DocsimConfig;
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use dashmap::DashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DATABASE_NAME_FORBIDDEN: &[char] = &['/', '\\', '.', ' ', '"', '$', '\0'];

const SUPPORTED_COMMANDS: &[&str] = &[
    "ping",
    "dbStats",
    "collStats",
    "buildInfo",
    "serverStatus",
    "listCommands",
];

/// A named group of collections.
///
/// Collections are created on first reference, so `collection("users")`
/// never fails for a valid name. `Database` is a cheap handle; clones share
/// the same collections.
///
/// # Examples
///
/// ```rust,ignore
/// let db = store.database("app")?;
/// db.create_collection("users")?;
/// db.collection("orders")?.insert_one(doc! { total: 10 })?;
///
/// assert_eq!(db.list_collection_names()?, vec!["orders", "users"]);
/// let stats = db.run_command(&doc! { dbStats: 1 })?;
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    name: String,
    collections: Arc<DashMap<String, Collection>>,
    config: DocsimConfig,
    started_at: i64,
    dropped: AtomicBool,
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .field("collections", &self.inner.collections.len())
            .finish()
    }
}

impl Database {
    pub(crate) fn new(name: &str, config: DocsimConfig, started_at: i64) -> Self {
        log::debug!("Creating database {}", name);
        Database {
            inner: Arc::new(DatabaseInner {
                name: name.to_string(),
                collections: Arc::new(DashMap::new()),
                config,
                started_at,
                dropped: AtomicBool::from(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the named collection, creating it empty if it does not exist.
    pub fn collection(&self, name: &str) -> DocsimResult<Collection> {
        self.ensure_opened()?;
        validate_collection_name(name)?;

        if let Some(collection) = self.inner.collections.get(name) {
            return Ok(collection.value().clone());
        }

        let siblings = Arc::downgrade(&self.inner.collections);
        let collection = self
            .inner
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                Collection::new(name, &self.inner.name, self.inner.config.clone(), siblings)
            })
            .value()
            .clone();
        Ok(collection)
    }

    /// Creates the named collection; creating an existing collection is a no-op.
    pub fn create_collection(&self, name: &str) -> DocsimResult<Collection> {
        self.collection(name)
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.collections.contains_key(name)
    }

    /// Drops the named collection and returns whether it existed.
    ///
    /// Handles to the dropped collection fail with
    /// [ErrorKind::InvalidOperation] afterwards.
    pub fn drop_collection(&self, name: &str) -> DocsimResult<bool> {
        self.ensure_opened()?;
        match self.inner.collections.remove(name) {
            Some((_, collection)) => {
                collection.drop_collection();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Collection names in ascending order.
    pub fn list_collection_names(&self) -> DocsimResult<Vec<String>> {
        self.ensure_opened()?;
        let mut names: Vec<String> = self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    /// `[{name, type: "collection"}, ...]` in name order.
    pub fn list_collections(&self) -> DocsimResult<Vec<Document>> {
        let names = self.list_collection_names()?;
        Ok(names
            .into_iter()
            .map(|name| {
                let mut info = Document::new();
                info.insert("name", name);
                info.insert("type", COLLECTION_TYPE);
                info
            })
            .collect())
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .collections
            .iter()
            .all(|entry| entry.value().estimated_document_count().unwrap_or(0) == 0)
    }

    /// `{db, collections, objects, indexes, ok: 1}`
    pub fn stats(&self) -> DocsimResult<Document> {
        self.ensure_opened()?;
        let mut objects = 0u64;
        let mut indexes = 0u64;
        for entry in self.inner.collections.iter() {
            objects += entry.value().estimated_document_count()?;
            indexes += entry.value().index_count() as u64;
        }

        let mut stats = Document::new();
        stats.insert("db", self.inner.name.clone());
        stats.insert("collections", self.inner.collections.len());
        stats.insert("objects", objects);
        stats.insert("indexes", indexes);
        stats.insert("ok", 1);
        Ok(stats)
    }

    /// Runs a database command.
    ///
    /// The command name is the first key of `command`. `ping`, `dbStats`,
    /// `collStats`, `buildInfo`, `serverStatus` and `listCommands` are
    /// answered; any other command is acknowledged with `{ok: 1}`.
    pub fn run_command(&self, command: &Document) -> DocsimResult<Document> {
        self.ensure_opened()?;
        let (name, argument) = match command.iter().next() {
            Some(entry) => entry,
            None => {
                log::error!("Empty command document");
                return Err(DocsimError::new(
                    "no command specified",
                    ErrorKind::ValidationError,
                ));
            }
        };

        log::debug!("Running command {} on database {}", name, self.inner.name);
        match name.as_str() {
            "dbStats" => self.stats(),
            "collStats" => self.collection_stats(argument),
            "buildInfo" => {
                let mut reply = Document::new();
                reply.insert("version", self.inner.config.server_version());
                reply.insert("ok", 1);
                Ok(reply)
            }
            "serverStatus" => {
                let uptime = (current_time_seconds() - self.inner.started_at).max(0);
                let mut reply = Document::new();
                reply.insert("version", self.inner.config.server_version());
                reply.insert("uptime", uptime);
                reply.insert("ok", 1);
                Ok(reply)
            }
            "listCommands" => {
                let commands = SUPPORTED_COMMANDS
                    .iter()
                    .map(|command| (command.to_string(), Value::Document(Document::new())))
                    .collect::<Document>();
                let mut reply = Document::new();
                reply.insert("commands", commands);
                reply.insert("ok", 1);
                Ok(reply)
            }
            _ => Ok(ok_reply()),
        }
    }

    /// Drops every collection and invalidates this handle and its clones.
    pub(crate) fn drop_database(&self) {
        self.inner.dropped.store(true, Ordering::Relaxed);
        for entry in self.inner.collections.iter() {
            entry.value().drop_collection();
        }
        self.inner.collections.clear();
        log::debug!("Dropped database {}", self.inner.name);
    }

    fn collection_stats(&self, argument: &Value) -> DocsimResult<Document> {
        let name = match argument.as_str() {
            Some(name) => name,
            None => {
                log::error!("collStats expects a collection name, found {}", argument);
                return Err(DocsimError::new(
                    "collStats requires a collection name",
                    ErrorKind::ValidationError,
                ));
            }
        };

        let (count, indexes) = match self.inner.collections.get(name) {
            Some(collection) => (
                collection.estimated_document_count()?,
                collection.index_count() as u64,
            ),
            None => (0, 0),
        };

        let mut reply = Document::new();
        reply.insert("ns", format!("{}.{}", self.inner.name, name));
        reply.insert("count", count);
        reply.insert("nindexes", indexes);
        reply.insert("ok", 1);
        Ok(reply)
    }

    fn ensure_opened(&self) -> DocsimResult<()> {
        if self.inner.dropped.load(Ordering::Relaxed) {
            log::error!("Database {} is dropped", self.inner.name);
            return Err(DocsimError::new(
                &format!("Database '{}' is dropped and cannot be accessed", self.inner.name),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

pub(crate) fn ok_reply() -> Document {
    let mut reply = Document::new();
    reply.insert("ok", 1);
    reply
}

pub(crate) fn validate_database_name(name: &str) -> DocsimResult<()> {
    if name.is_empty() {
        log::error!("Database name cannot be empty");
        return Err(DocsimError::new(
            "Database name cannot be empty",
            ErrorKind::ValidationError,
        ));
    }

    if let Some(c) = name.chars().find(|c| DATABASE_NAME_FORBIDDEN.contains(c)) {
        log::error!("Database name {:?} contains invalid character {:?}", name, c);
        return Err(DocsimError::new(
            &format!("Database name '{}' cannot contain {:?}", name, c),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

fn validate_collection_name(name: &str) -> DocsimResult<()> {
    if name.is_empty() {
        log::error!("Collection name cannot be empty");
        return Err(DocsimError::new(
            "Collection name cannot be empty",
            ErrorKind::ValidationError,
        ));
    }

    if name.contains('$') || name.contains('\0') {
        log::error!("Collection name {:?} contains an invalid character", name);
        return Err(DocsimError::new(
            &format!("Invalid collection name '{}'", name),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}
