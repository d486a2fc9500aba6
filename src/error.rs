use crate::notifier::NotifyError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Name of the partial unique index guarding one active booking per slot.
pub const BOOKING_SLOT_CONSTRAINT: &str = "bookings_active_slot_key";
pub const BLOCKED_TIME_SLOT_CONSTRAINT: &str = "blocked_times_slot_key";

/// Reasons a candidate slot can't be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    #[error("The requested date is blocked and can't be booked")]
    DateBlocked,
    #[error("The requested time is blocked and can't be booked")]
    TimeBlocked,
    #[error("The requested time slot is already taken")]
    SlotTaken,
    #[error("The requested date is not a business day")]
    NonBusinessDay,
}

/// Reasons a date range or time slot can't be blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockConflict {
    #[error("There are {0} existing booking(s) in this period. Cancel them first")]
    ActiveBookings(usize),
    #[error("The date is already blocked")]
    DateBlocked,
    #[error("The time slot already holds a booking")]
    SlotBooked,
    #[error("The time slot is already blocked")]
    AlreadyBlocked,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Conflict(#[from] BlockConflict),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<DieselError> for BackendError {
    fn from(err: DieselError) -> Self {
        match &err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                match info.constraint_name() {
                    Some(BOOKING_SLOT_CONSTRAINT) => Rejection::SlotTaken.into(),
                    Some(BLOCKED_TIME_SLOT_CONSTRAINT) => BlockConflict::AlreadyBlocked.into(),
                    _ => BackendError::Database(err.to_string()),
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                BackendError::Unavailable(err.to_string())
            }
            _ => BackendError::Database(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Rejected(Rejection),
    #[error(transparent)]
    Conflict(BlockConflict),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),
    #[error("Blocked period {0} not found")]
    BlockNotFound(Uuid),
    #[error("Booking {0} has no email address")]
    MissingEmail(Uuid),
    #[error("Notification failed: {0}")]
    Notification(#[from] NotifyError),
    #[error(transparent)]
    Backend(BackendError),
}

impl From<Rejection> for BookingError {
    fn from(rejection: Rejection) -> Self {
        BookingError::Rejected(rejection)
    }
}

impl From<BackendError> for BookingError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected(rejection) => BookingError::Rejected(rejection),
            BackendError::Conflict(conflict) => BookingError::Conflict(conflict),
            other => BookingError::Backend(other),
        }
    }
}
