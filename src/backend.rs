use crate::error::BackendError;
use crate::types::{
    BlockedDateRange, BlockedTime, Booking, BookingStatus, NewBlockedDateRange, NewBlockedTime,
    NewBooking,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Read side of the slot state. Every call reflects the persisted state at
/// call time.
pub trait AvailabilityStore {
    /// The first blocked date range covering `date`, if any.
    fn day_block(&self, date: NaiveDate) -> Result<Option<BlockedDateRange>, BackendError>;

    /// Time labels withheld on `date` by discrete blocks.
    fn blocked_times(&self, date: NaiveDate) -> Result<BTreeSet<String>, BackendError>;

    /// Time labels held by non-cancelled bookings on `date`. Bookings without
    /// a time label don't occupy anything.
    fn occupied_times(&self, date: NaiveDate) -> Result<BTreeSet<String>, BackendError>;

    fn is_day_blocked(&self, date: NaiveDate) -> Result<bool, BackendError> {
        Ok(self.day_block(date)?.is_some())
    }
}

/// Persistence for bookings and blocks.
///
/// Writes are atomic. In particular `insert_booking` and
/// `update_booking_status` must refuse with `Rejection::SlotTaken` whenever
/// the write would leave two non-cancelled bookings on the same slot, no
/// matter how many callers race for it.
pub trait BookingBackend: AvailabilityStore + Clone + Send + Sync + 'static {
    /// All bookings, newest first.
    fn bookings(&self) -> Result<Vec<Booking>, BackendError>;
    fn booking(&self, id: Uuid) -> Result<Option<Booking>, BackendError>;
    fn insert_booking(&self, booking: NewBooking) -> Result<Booking, BackendError>;
    /// `None` if no booking with `id` exists.
    fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>, BackendError>;

    /// All blocked date ranges, ordered by start date.
    fn blocked_date_ranges(&self) -> Result<Vec<BlockedDateRange>, BackendError>;
    fn insert_blocked_date_range(
        &self,
        range: NewBlockedDateRange,
    ) -> Result<BlockedDateRange, BackendError>;
    /// `false` if nothing was removed.
    fn remove_blocked_date_range(&self, id: Uuid) -> Result<bool, BackendError>;

    /// All blocked time slots, ordered by date and time.
    fn blocked_time_slots(&self) -> Result<Vec<BlockedTime>, BackendError>;
    fn insert_blocked_time(&self, blocked_time: NewBlockedTime) -> Result<BlockedTime, BackendError>;
    fn remove_blocked_time(&self, id: Uuid) -> Result<bool, BackendError>;
}
