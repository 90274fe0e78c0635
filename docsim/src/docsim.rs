use crate::codec::{decode_document, encode_value};
use crate::collection::Document;
use crate::command::{dispatch, error_reply, Request};
use crate::common::{current_time_seconds, Value};
use crate::database::{validate_database_name, Database};
use crate::docsim_builder::DocsimBuilder;
use crate::docsim_config::DocsimConfig;
use crate::errors::DocsimResult;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The in-memory document store.
///
/// `Docsim` is the root of the engine: it owns named [Database]s, which own
/// collections of documents. Databases and collections spring into existence
/// on first reference and disappear on drop. Nothing is persisted.
///
/// The store is a cheap handle; clones share the same databases and may be
/// used from several threads.
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::docsim::Docsim;
/// use docsim::doc;
///
/// let store = Docsim::builder().open()?;
/// let users = store.database("app")?.collection("users")?;
/// users.insert_one(doc! { name: "Alice", age: 25 })?;
///
/// // the same operation through the request boundary
/// let reply = store.execute_json(&serde_json::json!({
///     "op": "find",
///     "db": "app",
///     "collection": "users",
///     "args": { "filter": { "age": { "$gte": 18 } } }
/// }));
/// ```
#[derive(Clone)]
pub struct Docsim {
    inner: Arc<DocsimInner>,
}

struct DocsimInner {
    databases: DashMap<String, Database>,
    config: DocsimConfig,
    started_at: i64,
}

impl Debug for Docsim {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Docsim")
            .field("databases", &self.list_database_names())
            .finish()
    }
}

impl Docsim {
    /// Creates a builder for configuring and opening a store.
    pub fn builder() -> DocsimBuilder {
        DocsimBuilder::new()
    }

    pub(crate) fn new(config: DocsimConfig) -> Self {
        log::info!(
            "Opened docsim store (server version {})",
            config.server_version()
        );
        Docsim {
            inner: Arc::new(DocsimInner {
                databases: DashMap::new(),
                config,
                started_at: current_time_seconds(),
            }),
        }
    }

    pub fn config(&self) -> &DocsimConfig {
        &self.inner.config
    }

    /// Returns the named database, creating it empty if it does not exist.
    pub fn database(&self, name: &str) -> DocsimResult<Database> {
        validate_database_name(name)?;
        if let Some(database) = self.inner.databases.get(name) {
            return Ok(database.value().clone());
        }

        let database = self
            .inner
            .databases
            .entry(name.to_string())
            .or_insert_with(|| {
                Database::new(name, self.inner.config.clone(), self.inner.started_at)
            })
            .value()
            .clone();
        Ok(database)
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.inner.databases.contains_key(name)
    }

    /// Database names in ascending order.
    pub fn list_database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .databases
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Drops the named database with all its collections and returns whether
    /// it existed.
    pub fn drop_database(&self, name: &str) -> DocsimResult<bool> {
        validate_database_name(name)?;
        match self.inner.databases.remove(name) {
            Some((_, database)) => {
                database.drop_database();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Executes a request and returns its reply.
    pub fn execute(&self, request: &Request) -> DocsimResult<Value> {
        dispatch(self, request)
    }

    /// Executes a `{op, db, collection?, args?}` request document.
    ///
    /// Failures come back as `{ok: 0, errmsg, code, codeName}` replies
    /// instead of errors.
    pub fn execute_document(&self, request: &Document) -> Value {
        let reply = Request::from_document(request).and_then(|request| self.execute(&request));
        match reply {
            Ok(value) => value,
            Err(error) => Value::Document(error_reply(&error)),
        }
    }

    /// Executes a request given in canonical-form JSON and returns the
    /// canonical-form reply.
    pub fn execute_json(&self, request: &JsonValue) -> JsonValue {
        let reply = match decode_document(request) {
            Ok(request) => self.execute_document(&request),
            Err(error) => Value::Document(error_reply(&error)),
        };
        encode_value(&reply)
    }
}

impl Default for Docsim {
    fn default() -> Self {
        let config = DocsimConfig::new();
        if let Err(error) = config.initialize() {
            log::warn!("Default configuration failed validation: {}", error);
        }
        Docsim::new(config)
    }
}
