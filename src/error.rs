//! Application error taxonomy
//!
//! Every fallible service operation returns [`AppResult`]. The HTTP layer maps
//! [`AppErrorKind`] onto status codes; store and cache errors are folded into
//! [`InfrastructureError`] and never shown verbatim to clients.

use crate::database::error::DatabaseError;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

/// Business-rule failures caused by the caller's input
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Payment not found")]
    PaymentNotFound { id: Uuid },

    #[error("Unknown payment provider: {name}")]
    UnknownProvider { name: String },

    #[error("Invalid webhook signature for provider {provider}")]
    InvalidWebhookSignature { provider: String },

    #[error("Invalid webhook payload: {reason}")]
    InvalidWebhookPayload { reason: String },
}

/// Failures of the payment providers we depend on
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExternalError {
    #[error("Payment provider {provider} failed: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },

    #[error("No payment providers available")]
    NoProviderAvailable,
}

#[derive(Debug, Clone, Error)]
pub enum InfrastructureError {
    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Background task failed: {message}")]
    Task { message: String },
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    External(ExternalError),
    Infrastructure(InfrastructureError),
    /// Malformed request input; never retried
    Validation { message: String },
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Validation {
            message: message.into(),
        })
    }

    pub fn domain(error: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(error))
    }

    pub fn provider<P: Into<String>, M: Into<String>>(
        provider: P,
        message: M,
        is_retryable: bool,
    ) -> Self {
        Self::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: provider.into(),
            message: message.into(),
            is_retryable,
        }))
    }

    pub fn no_provider_available() -> Self {
        Self::new(AppErrorKind::External(ExternalError::NoProviderAvailable))
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Whether repeating the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::External(ExternalError::PaymentProvider { is_retryable, .. }) => {
                *is_retryable
            }
            AppErrorKind::Infrastructure(InfrastructureError::Database(e)) => e.is_retryable(),
            _ => false,
        }
    }

    /// Message safe to return to API clients
    pub fn public_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(e) => e.to_string(),
            AppErrorKind::External(e) => e.to_string(),
            AppErrorKind::Validation { message } => message.clone(),
            AppErrorKind::Infrastructure(_) => "Internal server error".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            AppErrorKind::Domain(e) => e.to_string(),
            AppErrorKind::External(e) => e.to_string(),
            AppErrorKind::Infrastructure(e) => e.to_string(),
            AppErrorKind::Validation { message } => format!("Validation failed: {}", message),
        };

        match &self.context {
            Some(context) => write!(f, "{} ({})", message, context),
            None => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Database(
            error,
        )))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Task {
            message: error.to_string(),
        }))
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        Self::domain(error)
    }
}

#[cfg(feature = "cache")]
impl From<crate::cache::CacheError> for AppError {
    fn from(error: crate::cache::CacheError) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Cache {
            message: error.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::error::DatabaseErrorKind;

    #[test]
    fn test_provider_error_retryability() {
        assert!(AppError::provider("stripe", "timeout", true).is_retryable());
        assert!(!AppError::provider("stripe", "bad card", false).is_retryable());
        assert!(!AppError::validation("amount is required").is_retryable());
    }

    #[test]
    fn test_database_errors_hidden_from_clients() {
        let err: AppError = DatabaseError::new(DatabaseErrorKind::QueryError {
            message: "relation \"payments\" does not exist".to_string(),
        })
        .into();

        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("relation"));
    }

    #[test]
    fn test_display_includes_context() {
        let err = AppError::domain(DomainError::UnknownProvider {
            name: "square".to_string(),
        })
        .with_context("webhook");
        assert_eq!(err.to_string(), "Unknown payment provider: square (webhook)");
    }

    #[tokio::test]
    async fn test_panicked_task_is_internal_error() {
        let join_err = tokio::spawn(async { panic!("worker crashed") })
            .await
            .unwrap_err();
        let err: AppError = join_err.into();

        assert!(matches!(
            err.kind,
            AppErrorKind::Infrastructure(InfrastructureError::Task { .. })
        ));
        assert_eq!(err.public_message(), "Internal server error");
    }
}
