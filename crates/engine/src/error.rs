//! The module contains the error the engine can throw.
//!
//! Validation errors ([`InvalidParticipant`], [`NoParticipantsSelected`],
//! [`AlreadyFullyAllocated`], [`InvalidPercentage`], [`PercentageOverflow`])
//! are raised before anything is written. [`ConcurrentModification`] and
//! store failures abort the running transaction.
//!
//! Callers that only care about the class of failure should match on
//! [`EngineError::kind`].
//!
//!  [`InvalidParticipant`]: EngineError::InvalidParticipant
//!  [`NoParticipantsSelected`]: EngineError::NoParticipantsSelected
//!  [`AlreadyFullyAllocated`]: EngineError::AlreadyFullyAllocated
//!  [`InvalidPercentage`]: EngineError::InvalidPercentage
//!  [`PercentageOverflow`]: EngineError::PercentageOverflow
//!  [`ConcurrentModification`]: EngineError::ConcurrentModification
use sea_orm::DbErr;
use thiserror::Error;

use crate::Percentage;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid participant: {0}")]
    InvalidParticipant(String),
    #[error("No participants selected")]
    NoParticipantsSelected,
    #[error("Expense already fully allocated")]
    AlreadyFullyAllocated,
    #[error("Invalid percentage: {0}")]
    InvalidPercentage(String),
    #[error("The total percentage must not exceed 100%. Remaining percentage: {remaining}")]
    PercentageOverflow { remaining: Percentage },
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Audit capture failed: {0}")]
    AuditCapture(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Coarse classification of [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParticipant,
    NoParticipantsSelected,
    AlreadyFullyAllocated,
    InvalidPercentage,
    PercentageOverflow,
    ConcurrentModification,
    NotFound,
    Conflict,
    Forbidden,
    InvalidInput,
    PersistenceFailure,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParticipant(_) => ErrorKind::InvalidParticipant,
            Self::NoParticipantsSelected => ErrorKind::NoParticipantsSelected,
            Self::AlreadyFullyAllocated => ErrorKind::AlreadyFullyAllocated,
            Self::InvalidPercentage(_) => ErrorKind::InvalidPercentage,
            Self::PercentageOverflow { .. } => ErrorKind::PercentageOverflow,
            Self::ConcurrentModification(_) => ErrorKind::ConcurrentModification,
            Self::KeyNotFound(_) => ErrorKind::NotFound,
            Self::ExistingKey(_) => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::InvalidAmount(_)
            | Self::InvalidId(_)
            | Self::InvalidRole(_)
            | Self::InvalidName(_)
            | Self::InvalidCategory(_)
            | Self::InvalidCursor(_) => ErrorKind::InvalidInput,
            Self::AuditCapture(_) | Self::Database(_) => ErrorKind::PersistenceFailure,
        }
    }

    /// `true` for errors detected before any write took place.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidParticipant
                | ErrorKind::NoParticipantsSelected
                | ErrorKind::AlreadyFullyAllocated
                | ErrorKind::InvalidPercentage
                | ErrorKind::PercentageOverflow
        )
    }

    /// `true` when the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConcurrentModification | ErrorKind::PersistenceFailure
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidParticipant(a), Self::InvalidParticipant(b)) => a == b,
            (Self::NoParticipantsSelected, Self::NoParticipantsSelected) => true,
            (Self::AlreadyFullyAllocated, Self::AlreadyFullyAllocated) => true,
            (Self::InvalidPercentage(a), Self::InvalidPercentage(b)) => a == b,
            (
                Self::PercentageOverflow { remaining: a },
                Self::PercentageOverflow { remaining: b },
            ) => a == b,
            (Self::ConcurrentModification(a), Self::ConcurrentModification(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidRole(a), Self::InvalidRole(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::AuditCapture(a), Self::AuditCapture(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_persistence_failures() {
        let err = EngineError::Database(DbErr::Custom("boom".to_string()));
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        assert!(err.is_retryable());

        let err = EngineError::AuditCapture("serialize".to_string());
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let errs = [
            EngineError::NoParticipantsSelected,
            EngineError::AlreadyFullyAllocated,
            EngineError::InvalidPercentage("abc".to_string()),
            EngineError::PercentageOverflow {
                remaining: Percentage::from_units(-100_000),
            },
            EngineError::InvalidParticipant("mallory".to_string()),
        ];
        for err in errs {
            assert!(err.is_validation(), "{err}");
            assert!(!err.is_retryable(), "{err}");
        }
    }

    #[test]
    fn overflow_message_reports_remaining() {
        let err = EngineError::PercentageOverflow {
            remaining: Percentage::from_units(-100_000),
        };
        assert_eq!(
            err.to_string(),
            "The total percentage must not exceed 100%. Remaining percentage: -10%"
        );
    }
}
