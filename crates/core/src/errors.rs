use thiserror::Error;

use crate::review::SessionState;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("review session cannot move from {from:?} to {to:?}")]
    InvalidSessionTransition { from: SessionState, to: SessionState },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("order store failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::from(self).with_correlation_id(correlation_id)
    }
}

/// Failure as shown to the person pasting the report.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("rejected input: {detail}")]
    RejectedInput { detail: String, correlation_id: String },
    #[error("order store unavailable: {detail}")]
    StoreUnavailable { detail: String, correlation_id: String },
    #[error("internal error: {detail}")]
    Internal { detail: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RejectedInput { .. } => {
                "The report could not be processed. Check the line format and try again."
            }
            Self::StoreUnavailable { .. } => {
                "The order store is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::RejectedInput { correlation_id, .. }
            | Self::StoreUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        match &mut self {
            Self::RejectedInput { correlation_id, .. }
            | Self::StoreUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => *correlation_id = id.into(),
        }
        self
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::RejectedInput { detail: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(detail) => Self::StoreUnavailable { detail, correlation_id },
            ApplicationError::Configuration(detail) => Self::Internal { detail, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::review::SessionState;

    #[test]
    fn session_misuse_is_rejected_input_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::InvalidSessionTransition {
            from: SessionState::Committed,
            to: SessionState::Committed,
        })
        .into_interface("report-2025-03-14");

        assert!(matches!(interface, InterfaceError::RejectedInput { .. }));
        assert_eq!(interface.correlation_id(), "report-2025-03-14");
        assert_eq!(
            interface.to_string(),
            "rejected input: review session cannot move from Committed to Committed"
        );
    }

    #[test]
    fn store_failure_asks_for_retry() {
        let interface = InterfaceError::from(ApplicationError::Persistence(
            "database is locked".to_owned(),
        ));

        assert_eq!(interface.correlation_id(), "unassigned");
        assert_eq!(
            interface.user_message(),
            "The order store is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_failure_is_internal() {
        let interface = ApplicationError::Configuration("alias table is empty".to_owned())
            .into_interface("cli");

        assert!(matches!(interface, InterfaceError::Internal { ref detail, .. }
            if detail == "alias table is empty"));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
