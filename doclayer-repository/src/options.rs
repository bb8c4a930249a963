/// Default number of per-item reference validations run concurrently.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 16;

/// Tuning knobs of a [`DocumentRepository`](crate::DocumentRepository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Maximum per-item reference validations in flight within one call.
    pub probe_concurrency: usize,
    /// Reject payload keys the schema does not declare.
    pub strict_schema: bool,
    /// Run reference validation before writes.
    pub validate_references: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            strict_schema: false,
            validate_references: true,
        }
    }
}

impl RepositoryOptions {
    /// Concurrency actually used; zero is treated as one.
    pub(crate) fn effective_concurrency(&self) -> usize {
        self.probe_concurrency.max(1)
    }
}
