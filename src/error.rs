//! Error types for board onboarding.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Why a cloned welcome template could not yield a board.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedTemplate {
    #[error("template contains no board")]
    NoBoard,

    #[error("template board is not marked as a template")]
    NoTemplateMarker,

    #[error("no template board is titled {expected:?}")]
    TitleMismatch { expected: String },

    #[error("template contains {count} candidate boards, expected exactly one")]
    AmbiguousBoard { count: usize },
}

/// Failures of the onboarding flow.
///
/// Every variant aborts the remaining onboarding steps. Nothing already
/// written to the store is rolled back.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Template {root_id} not found in workspace {workspace_id}")]
    TemplateNotFound {
        workspace_id: String,
        root_id: String,
    },

    #[error("Welcome template is malformed: {0}")]
    TemplateMalformed(#[from] MalformedTemplate),

    #[error("Store write failed during {operation}: {source}")]
    StoreWrite {
        operation: &'static str,
        #[source]
        source: DatabaseError,
    },

    #[error("Store read failed: {0}")]
    StoreRead(DatabaseError),
}

impl OnboardingError {
    /// Wrap a store failure for the named write step.
    pub fn store_write(operation: &'static str, source: DatabaseError) -> Self {
        Self::StoreWrite { operation, source }
    }
}
