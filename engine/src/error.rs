//! Error types for the MedSync engine.

use crate::clinic::ClinicStatus;
use crate::CollectionName;
use thiserror::Error;

/// All possible errors from the MedSync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown collection: {0}")]
    UnknownCollection(CollectionName),

    #[error("collection not allowed for this clinic: {0}")]
    CollectionNotAllowed(CollectionName),

    #[error("change is missing a document id")]
    MissingDocumentId,

    #[error("invalid change: {0}")]
    InvalidChange(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: ClinicStatus,
        to: ClinicStatus,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::UnknownCollection("prescriptions".into());
        assert_eq!(err.to_string(), "unknown collection: prescriptions");

        let err = Error::InvalidStatusTransition {
            from: ClinicStatus::Suspended,
            to: ClinicStatus::PendingApproval,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition: suspended -> pending_approval"
        );
    }
}
