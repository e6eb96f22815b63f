use thiserror::Error;

/// Error taxonomy for the discovery engine. Per-strategy failures are
/// recovered locally by the orchestrator; only `StoreUnavailable` and
/// `ReferenceDataUnavailable` escalate to a cycle-level abort.
#[derive(Debug, Error)]
pub enum ImolinkError {
    #[error("reference data unavailable: {0}")]
    ReferenceDataUnavailable(String),

    #[error("could not resolve identifiers: {0}")]
    PersistenceConflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl ImolinkError {
    /// True when the error must abort the whole cycle rather than just
    /// the current target.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            ImolinkError::StoreUnavailable(_) | ImolinkError::ReferenceDataUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for ImolinkError {
    fn from(err: sqlx::Error) -> Self {
        // An FK violation means the caller named reference rows that do
        // not exist; everything else is the store being unreachable.
        if let sqlx::Error::Database(db) = &err {
            if matches!(db.kind(), sqlx::error::ErrorKind::ForeignKeyViolation) {
                return ImolinkError::PersistenceConflict(db.message().to_string());
            }
        }
        ImolinkError::StoreUnavailable(err.to_string())
    }
}
