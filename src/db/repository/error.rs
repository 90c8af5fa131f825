//! Error types for repository operations.
//!
//! Repository errors carry structured context (operation, entity id,
//! details) plus a retryability flag the conflict guard uses to decide
//! whether a failure is a transient infrastructure hiccup or final.

use std::fmt;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Structured context attached to repository errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "insert_scheduled_if_free").
    pub operation: Option<String>,
    /// The entity id involved, if applicable.
    pub entity_id: Option<String>,
    /// Additional details about the failure.
    pub details: Option<String>,
    /// Whether the operation may succeed on retry.
    pub retryable: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Connection pool or database connection failures. Typically transient.
    #[error("connection error: {message} {context}")]
    Connection { message: String, context: ErrorContext },

    /// Query execution failures.
    #[error("query error: {message} {context}")]
    Query { message: String, context: ErrorContext },

    /// Requested entity was not found.
    #[error("not found: {message} {context}")]
    NotFound { message: String, context: ErrorContext },

    /// Data failed validation before or after a storage operation.
    #[error("validation error: {message} {context}")]
    Validation { message: String, context: ErrorContext },

    /// Configuration or initialization failure.
    #[error("configuration error: {message} {context}")]
    Configuration { message: String, context: ErrorContext },

    /// Transaction commit/rollback failure.
    #[error("transaction error: {message} {context}")]
    Transaction { message: String, context: ErrorContext },

    /// Timed out waiting for a connection or query.
    #[error("timeout error: {message} {context}")]
    Timeout { message: String, context: ErrorContext },

    /// Unexpected internal failure.
    #[error("internal error: {message} {context}")]
    Internal { message: String, context: ErrorContext },
}

impl RepositoryError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn query_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Query {
            message: message.into(),
            context,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Whether the conflict guard may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Connection { context, .. }
            | Self::Query { context, .. }
            | Self::NotFound { context, .. }
            | Self::Validation { context, .. }
            | Self::Configuration { context, .. }
            | Self::Transaction { context, .. }
            | Self::Timeout { context, .. }
            | Self::Internal { context, .. } => context,
        }
    }

    /// Attach or replace the operation name in the context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::Connection { context, .. }
            | Self::Query { context, .. }
            | Self::NotFound { context, .. }
            | Self::Validation { context, .. }
            | Self::Configuration { context, .. }
            | Self::Transaction { context, .. }
            | Self::Timeout { context, .. }
            | Self::Internal { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => RepositoryError::not_found("record not found"),
            diesel::result::Error::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                let mut context =
                    ErrorContext::default().with_details(format!("db_error_kind={:?}", kind));

                // Deadlocks and serialization failures resolve on retry.
                if matches!(kind, diesel::result::DatabaseErrorKind::SerializationFailure) {
                    context = context.retryable();
                }

                RepositoryError::Query { message, context }
            }
            other => RepositoryError::query(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_and_timeout_are_retryable() {
        assert!(RepositoryError::connection("pool exhausted").is_retryable());
        assert!(RepositoryError::timeout("query timed out").is_retryable());
    }

    #[test]
    fn test_query_and_validation_are_final() {
        assert!(!RepositoryError::query("syntax error").is_retryable());
        assert!(!RepositoryError::validation("bad status").is_retryable());
        assert!(!RepositoryError::not_found("missing").is_retryable());
    }

    #[test]
    fn test_context_display() {
        let err = RepositoryError::query_with_context(
            "boom",
            ErrorContext::new("insert_scheduled_if_free")
                .with_entity_id(42)
                .retryable(),
        );
        let text = err.to_string();
        assert!(text.contains("operation=insert_scheduled_if_free"));
        assert!(text.contains("id=42"));
        assert!(text.contains("retryable=true"));
    }
}
