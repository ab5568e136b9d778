use thiserror::Error;

use crate::models::SourceType;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    /// The remote service could not be reached.
    Connection,
    /// Credentials are missing, expired or rejected. Needs user action.
    Authentication,
    /// The remote answered with something we could not interpret.
    Validation,
    Storage,
    UnsupportedAction,
    InvalidInput,
    Timeout,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub source_type: Option<SourceType>,
    pub operation: Option<&'static str>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            source_type: None,
            operation: None,
            kind,
            message: message.into(),
        }
    }

    pub fn connection(source_type: SourceType, message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Connection, message).for_source(source_type)
    }

    pub fn auth(source_type: SourceType, message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Authentication, message).for_source(source_type)
    }

    pub fn validation(source_type: SourceType, message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message).for_source(source_type)
    }

    pub fn storage(operation: &'static str, message: impl AsRef<str>) -> Self {
        Self::new(
            CoreErrorKind::Storage,
            format!("sqlite store '{operation}' failed: {}", message.as_ref()),
        )
        .during(operation)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    /// Attributes the error to a source unless it already names one.
    pub fn for_source(mut self, source_type: SourceType) -> Self {
        self.source_type = self.source_type.or(Some(source_type));
        self
    }

    pub fn during(mut self, operation: &'static str) -> Self {
        self.operation = self.operation.or(Some(operation));
        self
    }

    pub fn is_auth(&self) -> bool {
        self.kind == CoreErrorKind::Authentication
    }
}
