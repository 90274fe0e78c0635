/// Options for controlling update and replace operations.
///
/// When `upsert` is set and no document matches the filter, a new document
/// is built from the filter's equality clauses and the update, then inserted.
///
/// # Examples
///
/// ```rust,ignore
/// use docsim::collection::UpdateOptions;
///
/// let options = UpdateOptions::new().upsert(true);
/// let options = insert_if_absent();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    upsert: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Returns whether to insert if no matching documents are found.
    pub fn is_upsert(&self) -> bool {
        self.upsert
    }
}

/// Creates `UpdateOptions` with upsert behavior.
pub fn insert_if_absent() -> UpdateOptions {
    UpdateOptions::new().upsert(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_not_upsert() {
        assert!(!UpdateOptions::default().is_upsert());
        assert!(!UpdateOptions::new().is_upsert());
    }

    #[test]
    fn test_upsert() {
        assert!(UpdateOptions::new().upsert(true).is_upsert());
        assert!(insert_if_absent().is_upsert());
        assert_eq!(insert_if_absent(), UpdateOptions::new().upsert(true));
    }
}
