//! Error types for schema reconciliation.

/// Errors that can occur while parsing, introspecting or reconciling tables.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The description document produced no table.
    #[error("Could not parse description: {0}")]
    Parse(String),

    /// A desired table violates a model invariant.
    #[error("Invalid table '{table}': {message}")]
    InvalidTable {
        /// Table name.
        table: String,
        /// What is wrong with it.
        message: String,
    },

    /// Connectivity or query failure reported by the driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading description documents).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No driver or adapter exists for the requested backend.
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Several tables failed to reconcile.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<SyncError>),
}

impl SyncError {
    /// Builds an [`SyncError::InvalidTable`].
    pub fn invalid_table(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, SyncError>;
