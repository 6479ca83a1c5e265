//! Error types for pgmux

use thiserror::Error;

/// Result type alias for pgmux operations
pub type MuxResult<T> = Result<T, MuxError>;

/// Error types for manifest handling, query synthesis and execution
#[derive(Debug, Error)]
pub enum MuxError {
    /// Malformed manifest (missing/duplicate shared key, conflicting columns, missing index)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed request (ambiguous identity, bad paging, unknown column, bad value)
    #[error("Request error: {0}")]
    Request(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error
    #[error("Statement error: {0}")]
    Statement(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Result column decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Config file missing, unparseable or incomplete
    #[error("Config error: {0}")]
    Config(String),
}

impl MuxError {
    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create a request error
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether the error came from executing a statement (including constraint violations).
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Self::Statement(_)
                | Self::UniqueViolation(_)
                | Self::ForeignKeyViolation(_)
                | Self::CheckViolation(_)
        )
    }

    /// Classify a tokio_postgres error.
    ///
    /// Constraint violations are refined by SQLSTATE; a closed connection becomes
    /// [`MuxError::Connection`]; everything else stays a [`MuxError::Statement`].
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        } else if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Statement(err)
    }
}
