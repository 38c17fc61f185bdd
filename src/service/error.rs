use thiserror::Error;
use ulid::Ulid;

use crate::model::BookingStatus;
use crate::observability;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input, rejected before anything reaches the store.
    #[error("validation failed: {0}")]
    Validation(&'static str),
    /// The requested slot overlaps the named active booking.
    #[error("slot conflicts with booking {0}")]
    Conflict(Ulid),
    #[error("not found: {0}")]
    NotFound(Ulid),
    /// Status change attempted on a terminal booking.
    #[error("booking {id} is already {from}")]
    InvalidTransition { id: Ulid, from: BookingStatus },
    /// Store/network failure. State is left at last-known-good.
    #[error("store unavailable: {0}")]
    Store(String),
}

impl ServiceError {
    /// Only store failures warrant a retry affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Store(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => {
                metrics::counter!(observability::STORE_ERRORS_TOTAL).increment(1);
                ServiceError::Store(msg)
            }
            StoreError::SlotTaken(id) => ServiceError::Conflict(id),
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            StoreError::DuplicateKey("patient_id") => {
                ServiceError::Validation("duplicate patient id")
            }
            StoreError::DuplicateKey("employee_id") => {
                ServiceError::Validation("duplicate employee id")
            }
            StoreError::DuplicateKey(_) => ServiceError::Validation("duplicate business key"),
        }
    }
}
