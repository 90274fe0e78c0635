//! Configuration management for a docsim store.

use crate::common::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_NESTING_DEPTH, DOCSIM_VERSION};
use crate::errors::{DocsimError, DocsimResult, ErrorKind};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Public interface for store configuration.
///
/// Settings can be changed until the store is opened; afterwards the
/// configuration is frozen and setters fail with
/// [ErrorKind::InvalidOperation].
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::docsim::Docsim;
///
/// let store = Docsim::builder()
///     .atomic_batch_insert(true)
///     .max_nesting_depth(32)
///     .open()?;
/// assert!(store.config().atomic_batch_insert());
/// ```
#[derive(Clone)]
pub struct DocsimConfig {
    /// The pointer to implementation. Uses Arc for cheap cloning and thread safety.
    inner: Arc<DocsimConfigInner>,
}

impl Default for DocsimConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DocsimConfig {
    /// Creates a new configuration instance with default values.
    pub fn new() -> Self {
        DocsimConfig {
            inner: Arc::new(DocsimConfigInner::new()),
        }
    }

    /// Whether `insert_many` validates the whole batch before inserting.
    ///
    /// Off by default: a batch stops at the first failing document and the
    /// documents before it stay inserted.
    pub fn atomic_batch_insert(&self) -> bool {
        self.inner.atomic_batch_insert.load(Ordering::Relaxed)
    }

    pub fn set_atomic_batch_insert(&self, atomic: bool) -> DocsimResult<()> {
        self.inner.ensure_not_configured("atomic_batch_insert")?;
        self.inner.atomic_batch_insert.store(atomic, Ordering::Relaxed);
        Ok(())
    }

    /// Deepest document nesting accepted on insert and replace.
    pub fn max_nesting_depth(&self) -> usize {
        self.inner.max_nesting_depth.load(Ordering::Relaxed)
    }

    pub fn set_max_nesting_depth(&self, depth: usize) -> DocsimResult<()> {
        self.inner.ensure_not_configured("max_nesting_depth")?;
        self.inner.max_nesting_depth.store(depth, Ordering::Relaxed);
        Ok(())
    }

    /// Number of documents a cursor returns per `next_batch` call.
    pub fn default_batch_size(&self) -> usize {
        self.inner.default_batch_size.load(Ordering::Relaxed)
    }

    pub fn set_default_batch_size(&self, batch_size: usize) -> DocsimResult<()> {
        self.inner.ensure_not_configured("default_batch_size")?;
        self.inner.default_batch_size.store(batch_size, Ordering::Relaxed);
        Ok(())
    }

    /// Version reported by `buildInfo` and `serverStatus`.
    pub fn server_version(&self) -> String {
        self.inner.server_version.read().clone()
    }

    pub fn set_server_version(&self, version: &str) -> DocsimResult<()> {
        self.inner.ensure_not_configured("server_version")?;
        *self.inner.server_version.write() = version.to_string();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Validates the settings and freezes the configuration.
    pub(crate) fn initialize(&self) -> DocsimResult<()> {
        self.inner.validate()?;
        self.inner.configured.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Private implementation of the store configuration.
struct DocsimConfigInner {
    /// Set once the store is opened
    configured: AtomicBool,
    atomic_batch_insert: AtomicBool,
    max_nesting_depth: AtomicUsize,
    default_batch_size: AtomicUsize,
    server_version: RwLock<String>,
}

impl DocsimConfigInner {
    fn new() -> Self {
        DocsimConfigInner {
            configured: AtomicBool::from(false),
            atomic_batch_insert: AtomicBool::from(false),
            max_nesting_depth: AtomicUsize::from(DEFAULT_MAX_NESTING_DEPTH),
            default_batch_size: AtomicUsize::from(DEFAULT_BATCH_SIZE),
            server_version: RwLock::new(DOCSIM_VERSION.to_string()),
        }
    }

    fn ensure_not_configured(&self, setting: &str) -> DocsimResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after the store is opened", setting);
            return Err(DocsimError::new(
                &format!("{} cannot be changed after the store is opened", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn validate(&self) -> DocsimResult<()> {
        if self.max_nesting_depth.load(Ordering::Relaxed) == 0 {
            log::error!("Max nesting depth must be positive");
            return Err(DocsimError::new(
                "max nesting depth must be greater than 0",
                ErrorKind::InvalidArgument,
            ));
        }
        if self.default_batch_size.load(Ordering::Relaxed) == 0 {
            log::error!("Default batch size must be positive");
            return Err(DocsimError::new(
                "default batch size must be greater than 0",
                ErrorKind::InvalidArgument,
            ));
        }
        if self.server_version.read().is_empty() {
            log::error!("Server version cannot be empty");
            return Err(DocsimError::new(
                "server version cannot be empty",
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(())
    }
}
