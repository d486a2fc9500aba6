use crate::availability::check_availability;
use crate::backend::BookingBackend;
use crate::conflict::{evaluate, BusinessDays};
use crate::error::BookingError;
use crate::notifier::NotificationDispatcher;
use crate::types::{
    Availability, BlockedDateRange, BlockedTime, Booking, NewBlockedDateRange, NewBlockedTime,
};
use chrono::NaiveDate;
use tracing::{error, info};
use uuid::Uuid;

/// Entry point for everything the intake and the admin panel do with
/// bookings and blocks. Holds no slot state of its own.
#[derive(Clone)]
pub struct BookingManager<T: BookingBackend> {
    pub(crate) backend: T,
    pub(crate) business_days: BusinessDays,
    pub(crate) dispatcher: NotificationDispatcher,
}

impl<T: BookingBackend> BookingManager<T> {
    pub fn new(backend: T, business_days: BusinessDays, dispatcher: NotificationDispatcher) -> Self {
        Self {
            backend,
            business_days,
            dispatcher,
        }
    }

    pub fn check_availability(&self, date: NaiveDate) -> Result<Availability, BookingError> {
        check_availability(&self.backend, date).map_err(|err| {
            error!(%err, %date, "Failed to read availability");
            err.into()
        })
    }

    /// Runs the conflict evaluator against the backend.
    pub fn evaluate(&self, date: Option<NaiveDate>, time: Option<&str>) -> Result<(), BookingError> {
        evaluate(&self.backend, &self.business_days, date, time)?.into_result()?;
        Ok(())
    }

    pub fn bookings(&self) -> Result<Vec<Booking>, BookingError> {
        Ok(self.backend.bookings()?)
    }

    pub fn blocked_date_ranges(&self) -> Result<Vec<BlockedDateRange>, BookingError> {
        Ok(self.backend.blocked_date_ranges()?)
    }

    pub fn block_dates(&self, range: NewBlockedDateRange) -> Result<BlockedDateRange, BookingError> {
        if range.start_date > range.end_date {
            return Err(BookingError::Validation(
                "End date can't be before start date".into(),
            ));
        }
        let blocked = self.backend.insert_blocked_date_range(range)?;
        info!(
            id = %blocked.id,
            start = %blocked.start_date,
            end = %blocked.end_date,
            "Blocked date range"
        );
        Ok(blocked)
    }

    pub fn unblock_dates(&self, id: Uuid) -> Result<(), BookingError> {
        if !self.backend.remove_blocked_date_range(id)? {
            return Err(BookingError::BlockNotFound(id));
        }
        info!(%id, "Removed blocked date range");
        Ok(())
    }

    pub fn blocked_times(&self) -> Result<Vec<BlockedTime>, BookingError> {
        Ok(self.backend.blocked_time_slots()?)
    }

    pub fn block_time(&self, blocked_time: NewBlockedTime) -> Result<BlockedTime, BookingError> {
        let blocked = self.backend.insert_blocked_time(blocked_time)?;
        info!(id = %blocked.id, slot = %blocked.slot(), "Blocked time slot");
        Ok(blocked)
    }

    pub fn unblock_time(&self, id: Uuid) -> Result<(), BookingError> {
        if !self.backend.remove_blocked_time(id)? {
            return Err(BookingError::BlockNotFound(id));
        }
        info!(%id, "Removed blocked time slot");
        Ok(())
    }
}
