//! Error types for table-export.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for table-export operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
        /// Source error if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// PostgreSQL connection error
    #[error("PostgreSQL connection error: {message}")]
    PostgresConnection {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<tokio_postgres::Error>,
    },

    /// PostgreSQL query error
    #[error("PostgreSQL query error on table '{table}': {message}")]
    PostgresQuery {
        /// Table name
        table: String,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<tokio_postgres::Error>,
    },

    /// Object store could not be set up (credentials, bucket, endpoint)
    #[error("Object storage error: {message}")]
    Storage {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<object_store::Error>,
    },

    /// Upload of an artifact failed
    #[error("Upload of '{key}' failed: {message}")]
    Upload {
        /// Remote object key
        key: String,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<object_store::Error>,
    },

    /// Checkpoint file is unreadable or malformed
    #[error("Checkpoint error for table '{table}': {message}")]
    Checkpoint {
        /// Table name
        table: String,
        /// Error message
        message: String,
    },

    /// Schema error
    #[error("Schema error on table '{table}': {message}")]
    Schema {
        /// Table name
        table: String,
        /// Error message
        message: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Another run holds the lock
    #[error("Another export run holds the lock at {}", path.display())]
    Locked {
        /// Lock file path
        path: PathBuf,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a PostgreSQL connection error with tokio_postgres::Error.
    pub fn postgres_connection(message: impl Into<String>, source: tokio_postgres::Error) -> Self {
        Self::PostgresConnection {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a PostgreSQL connection error without an underlying driver error (TLS setup).
    pub fn postgres_setup(message: impl Into<String>) -> Self {
        Self::PostgresConnection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a PostgreSQL query error.
    pub fn postgres_query(
        table: impl Into<String>,
        message: impl Into<String>,
        source: tokio_postgres::Error,
    ) -> Self {
        Self::PostgresQuery {
            table: table.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an object storage setup error.
    pub fn storage(message: impl Into<String>, source: object_store::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an upload error.
    pub fn upload(
        key: impl Into<String>,
        message: impl Into<String>,
        source: object_store::Error,
    ) -> Self {
        Self::Upload {
            key: key.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a checkpoint error.
    pub fn checkpoint(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Checkpoint {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error aborts the whole run rather than a single table.
    ///
    /// Configuration, connectivity and locking failures happen before any
    /// table-specific work, so there is nothing left to isolate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::Validation(_)
                | Error::PostgresConnection { .. }
                | Error::Storage { .. }
                | Error::Locked { .. }
        )
    }

    /// Get the error code for metrics/logging.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "CONFIG_ERROR",
            Error::PostgresConnection { .. } => "PG_CONNECTION_ERROR",
            Error::PostgresQuery { .. } => "PG_QUERY_ERROR",
            Error::Storage { .. } => "STORAGE_ERROR",
            Error::Upload { .. } => "UPLOAD_ERROR",
            Error::Checkpoint { .. } => "CHECKPOINT_ERROR",
            Error::Schema { .. } => "SCHEMA_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Serialization { .. } => "SERIALIZATION_ERROR",
            Error::Locked { .. } => "LOCKED",
            Error::Io(_) => "IO_ERROR",
        }
    }
}

/// Error context extension trait.
pub trait ErrorContext<T> {
    /// Add context with a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ErrorContext<T>
    for std::result::Result<T, E>
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::config_with_source(f(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::config("test").code(), "CONFIG_ERROR");
        assert_eq!(Error::validation("test").code(), "VALIDATION_ERROR");
        assert_eq!(Error::schema("users", "test").code(), "SCHEMA_ERROR");
        assert_eq!(Error::checkpoint("users", "bad").code(), "CHECKPOINT_ERROR");
    }

    #[test]
    fn test_fatal_taxonomy() {
        assert!(Error::config("missing DB_HOST").is_fatal());
        assert!(
            Error::Locked {
                path: PathBuf::from("timestamps/.table-export.lock")
            }
            .is_fatal()
        );
        assert!(!Error::checkpoint("orders", "garbage").is_fatal());
        assert!(!Error::schema("users", "no updated_at").is_fatal());
        assert!(!Error::Io(std::io::Error::other("disk full")).is_fatal());
    }

    #[test]
    fn test_messages_name_the_table() {
        let err = Error::checkpoint("orders", "cannot parse 'garbage'");
        assert_eq!(
            err.to_string(),
            "Checkpoint error for table 'orders': cannot parse 'garbage'"
        );
    }

    #[test]
    fn test_context_wraps_as_config() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "nope"));
        let err = res
            .with_context(|| "reading config".to_string())
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(err.to_string(), "Configuration error: reading config");
    }
}
