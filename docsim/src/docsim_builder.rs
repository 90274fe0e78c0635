use crate::docsim::Docsim;
use crate::docsim_config::DocsimConfig;
use crate::errors::{DocsimError, DocsimResult};

/// Builder for configuring and opening a [Docsim] store.
///
/// The first failing setter is remembered and reported by [DocsimBuilder::open].
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::docsim::Docsim;
///
/// let store = Docsim::builder()
///     .atomic_batch_insert(true)
///     .default_batch_size(50)
///     .open()?;
/// ```
#[derive(Default)]
pub struct DocsimBuilder {
    error: Option<DocsimError>,
    config: DocsimConfig,
}

impl DocsimBuilder {
    pub fn new() -> Self {
        DocsimBuilder {
            error: None,
            config: DocsimConfig::new(),
        }
    }

    /// Validate a whole `insert_many` batch before inserting any of it.
    pub fn atomic_batch_insert(mut self, atomic: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_atomic_batch_insert(atomic) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_max_nesting_depth(depth) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn default_batch_size(mut self, batch_size: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_default_batch_size(batch_size) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn server_version(mut self, version: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_server_version(version) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Validates the configuration and opens an empty store.
    pub fn open(self) -> DocsimResult<Docsim> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.initialize()?;
        Ok(Docsim::new(self.config))
    }
}
