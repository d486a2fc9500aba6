use crate::backend::{AvailabilityStore, BookingBackend};
use crate::error::{BackendError, BlockConflict, Rejection};
use crate::slot::Slot;
use crate::types::{
    BlockedDateRange, BlockedTime, Booking, BookingStatus, NewBlockedDateRange, NewBlockedTime,
    NewBooking,
};
use chrono::{NaiveDate, Utc};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    blocked_dates: HashMap<Uuid, BlockedDateRange>,
    blocked_times: HashMap<Uuid, BlockedTime>,
}

impl Tables {
    fn day_block(&self, date: NaiveDate) -> Option<&BlockedDateRange> {
        self.blocked_dates
            .values()
            .filter(|range| range.contains(date))
            .min_by_key(|range| range.start_date)
    }

    fn is_time_blocked(&self, date: NaiveDate, time: &str) -> bool {
        self.blocked_times
            .values()
            .any(|blocked| blocked.date == date && blocked.time == time)
    }

    fn occupant(&self, slot: &Slot, except: Option<Uuid>) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|booking| Some(booking.id) != except && booking.occupies(slot))
    }
}

/// Impersistent backend. One mutex guards all tables, so every check and the
/// write following it happen as one atomic step.
#[derive(Debug, Clone, Default)]
pub struct LocalBookings {
    tables: Arc<Mutex<Tables>>,
}

impl LocalBookings {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, BackendError> {
        self.tables.lock().map_err(|err| {
            error!(%err, "Local booking tables are poisoned");
            BackendError::Unavailable("local booking tables are poisoned".into())
        })
    }
}

impl AvailabilityStore for LocalBookings {
    fn day_block(&self, date: NaiveDate) -> Result<Option<BlockedDateRange>, BackendError> {
        Ok(self.tables()?.day_block(date).cloned())
    }

    fn blocked_times(&self, date: NaiveDate) -> Result<BTreeSet<String>, BackendError> {
        Ok(self
            .tables()?
            .blocked_times
            .values()
            .filter(|blocked| blocked.date == date)
            .map(|blocked| blocked.time.clone())
            .collect())
    }

    fn occupied_times(&self, date: NaiveDate) -> Result<BTreeSet<String>, BackendError> {
        Ok(self
            .tables()?
            .bookings
            .values()
            .filter(|booking| booking.status.occupies_slot() && booking.desired_date == Some(date))
            .filter_map(|booking| booking.desired_time.clone())
            .collect())
    }
}

impl BookingBackend for LocalBookings {
    fn bookings(&self) -> Result<Vec<Booking>, BackendError> {
        let mut bookings: Vec<Booking> = self.tables()?.bookings.values().cloned().collect();
        bookings.sort_unstable_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    fn booking(&self, id: Uuid) -> Result<Option<Booking>, BackendError> {
        Ok(self.tables()?.bookings.get(&id).cloned())
    }

    fn insert_booking(&self, booking: NewBooking) -> Result<Booking, BackendError> {
        let mut tables = self.tables()?;

        if let Some(date) = booking.desired_date {
            if tables.day_block(date).is_some() {
                return Err(Rejection::DateBlocked.into());
            }
            if let Some(time) = booking.desired_time.as_deref() {
                if booking.status.occupies_slot() {
                    if tables.is_time_blocked(date, time) {
                        return Err(Rejection::TimeBlocked.into());
                    }
                    if tables.occupant(&Slot::new(date, time), None).is_some() {
                        return Err(Rejection::SlotTaken.into());
                    }
                }
            }
        }

        let booking = booking.into_booking(Uuid::now_v7(), Utc::now());
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>, BackendError> {
        let mut tables = self.tables()?;
        let Some(current) = tables.bookings.get(&id) else {
            return Ok(None);
        };

        if status.occupies_slot() && !current.status.occupies_slot() {
            if let Some(slot) = current.slot() {
                if tables.occupant(&slot, Some(id)).is_some() {
                    return Err(Rejection::SlotTaken.into());
                }
            }
        }

        let Some(booking) = tables.bookings.get_mut(&id) else {
            return Ok(None);
        };
        booking.status = status;
        if status == BookingStatus::Completed {
            booking.completed = true;
        }
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    fn blocked_date_ranges(&self) -> Result<Vec<BlockedDateRange>, BackendError> {
        let mut ranges: Vec<BlockedDateRange> =
            self.tables()?.blocked_dates.values().cloned().collect();
        ranges.sort_unstable_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(ranges)
    }

    fn insert_blocked_date_range(
        &self,
        range: NewBlockedDateRange,
    ) -> Result<BlockedDateRange, BackendError> {
        let mut tables = self.tables()?;

        let active_bookings = tables
            .bookings
            .values()
            .filter(|booking| booking.status.occupies_slot())
            .filter(|booking| booking.desired_date.is_some_and(|date| range.contains(date)))
            .count();
        if active_bookings > 0 {
            return Err(BlockConflict::ActiveBookings(active_bookings).into());
        }

        let blocked = BlockedDateRange {
            id: Uuid::now_v7(),
            start_date: range.start_date,
            end_date: range.end_date,
            reason: range.reason,
            created_at: Utc::now(),
        };
        tables.blocked_dates.insert(blocked.id, blocked.clone());
        Ok(blocked)
    }

    fn remove_blocked_date_range(&self, id: Uuid) -> Result<bool, BackendError> {
        Ok(self.tables()?.blocked_dates.remove(&id).is_some())
    }

    fn blocked_time_slots(&self) -> Result<Vec<BlockedTime>, BackendError> {
        let mut blocked: Vec<BlockedTime> = self.tables()?.blocked_times.values().cloned().collect();
        blocked.sort_unstable_by(|a, b| a.slot().cmp(&b.slot()));
        Ok(blocked)
    }

    fn insert_blocked_time(&self, blocked_time: NewBlockedTime) -> Result<BlockedTime, BackendError> {
        let mut tables = self.tables()?;
        let slot = blocked_time.slot();

        if tables.day_block(slot.date).is_some() {
            return Err(BlockConflict::DateBlocked.into());
        }
        if tables.occupant(&slot, None).is_some() {
            return Err(BlockConflict::SlotBooked.into());
        }
        if tables.is_time_blocked(slot.date, &slot.time) {
            return Err(BlockConflict::AlreadyBlocked.into());
        }

        let blocked = BlockedTime {
            id: Uuid::now_v7(),
            date: blocked_time.date,
            time: blocked_time.time,
            reason: blocked_time.reason,
            created_at: Utc::now(),
        };
        tables.blocked_times.insert(blocked.id, blocked.clone());
        Ok(blocked)
    }

    fn remove_blocked_time(&self, id: Uuid) -> Result<bool, BackendError> {
        Ok(self.tables()?.blocked_times.remove(&id).is_some())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutils::{date, new_booking};

    #[test]
    fn test_insert_cancel_reinsert_single_slot() {
        let local_bookings = LocalBookings::default();

        let first = local_bookings
            .insert_booking(new_booking("2025-06-01", "14:00"))
            .unwrap();
        assert_eq!(first.status, BookingStatus::Pending);
        assert_eq!(
            local_bookings.occupied_times(date("2025-06-01")).unwrap(),
            BTreeSet::from(["14:00".to_string()])
        );

        let err = local_bookings
            .insert_booking(new_booking("2025-06-01", "14:00"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(Rejection::SlotTaken)));

        local_bookings
            .update_booking_status(first.id, BookingStatus::Cancelled)
            .unwrap()
            .unwrap();
        assert!(local_bookings
            .occupied_times(date("2025-06-01"))
            .unwrap()
            .is_empty());

        local_bookings
            .insert_booking(new_booking("2025-06-01", "14:00"))
            .unwrap();
        assert_eq!(local_bookings.bookings().unwrap().len(), 2);
    }

    #[test]
    fn test_unscheduled_booking_occupies_nothing() {
        let local_bookings = LocalBookings::default();
        let mut booking = new_booking("2025-06-01", "14:00");
        booking.desired_time = None;
        local_bookings.insert_booking(booking.clone()).unwrap();
        local_bookings.insert_booking(booking).unwrap();

        assert!(local_bookings
            .occupied_times(date("2025-06-01"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_concurrent_inserts_admit_exactly_one() {
        let local_bookings = LocalBookings::default();

        let results: Vec<Result<Booking, BackendError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let local_bookings = local_bookings.clone();
                    scope.spawn(move || local_bookings.insert_booking(new_booking("2025-06-01", "14:00")))
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results.iter().filter_map(|result| result.as_ref().err()).all(|err| matches!(
            err,
            BackendError::Rejected(Rejection::SlotTaken)
        )));
    }

    #[test]
    fn test_reopening_taken_slot_is_refused() {
        let local_bookings = LocalBookings::default();
        let first = local_bookings
            .insert_booking(new_booking("2025-06-01", "14:00"))
            .unwrap();
        local_bookings
            .update_booking_status(first.id, BookingStatus::Cancelled)
            .unwrap();
        local_bookings
            .insert_booking(new_booking("2025-06-01", "14:00"))
            .unwrap();

        let err = local_bookings
            .update_booking_status(first.id, BookingStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(Rejection::SlotTaken)));
        assert_eq!(
            local_bookings.booking(first.id).unwrap().unwrap().status,
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn test_update_unknown_booking() {
        let local_bookings = LocalBookings::default();
        assert!(local_bookings
            .update_booking_status(Uuid::now_v7(), BookingStatus::Confirmed)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_block_range_with_active_bookings() {
        let local_bookings = LocalBookings::default();
        let booking = local_bookings
            .insert_booking(new_booking("2025-06-03", "10:00"))
            .unwrap();
        local_bookings
            .insert_booking(new_booking("2025-06-04", "10:00"))
            .unwrap();

        let range = NewBlockedDateRange::new(date("2025-06-01"), Some(date("2025-06-10")), None);
        let err = local_bookings
            .insert_blocked_date_range(range.clone())
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Conflict(BlockConflict::ActiveBookings(2))
        ));
        assert_eq!(local_bookings.booking(booking.id).unwrap().unwrap(), booking);
        assert!(local_bookings.blocked_date_ranges().unwrap().is_empty());

        for booking in local_bookings.bookings().unwrap() {
            local_bookings
                .update_booking_status(booking.id, BookingStatus::Cancelled)
                .unwrap();
        }
        local_bookings.insert_blocked_date_range(range).unwrap();
        assert!(local_bookings.is_day_blocked(date("2025-06-10")).unwrap());
        assert!(!local_bookings.is_day_blocked(date("2025-06-11")).unwrap());
    }

    #[test]
    fn test_insert_into_blocked_day_and_time() {
        let local_bookings = LocalBookings::default();
        local_bookings
            .insert_blocked_date_range(NewBlockedDateRange::new(date("2025-06-01"), None, None))
            .unwrap();
        local_bookings
            .insert_blocked_time(NewBlockedTime {
                date: date("2025-06-02"),
                time: "14:30".into(),
                reason: Some("Break".into()),
            })
            .unwrap();

        let err = local_bookings
            .insert_booking(new_booking("2025-06-01", "09:00"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(Rejection::DateBlocked)));

        let err = local_bookings
            .insert_booking(new_booking("2025-06-02", "14:30"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(Rejection::TimeBlocked)));

        local_bookings
            .insert_booking(new_booking("2025-06-02", "15:00"))
            .unwrap();
    }

    #[test]
    fn test_blocked_time_conflicts() {
        let local_bookings = LocalBookings::default();
        local_bookings
            .insert_blocked_date_range(NewBlockedDateRange::new(date("2025-06-01"), None, None))
            .unwrap();
        local_bookings
            .insert_booking(new_booking("2025-06-02", "10:00"))
            .unwrap();
        let blocked_time = |day: &str, time: &str| NewBlockedTime {
            date: date(day),
            time: time.into(),
            reason: None,
        };

        let err = local_bookings
            .insert_blocked_time(blocked_time("2025-06-01", "10:00"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(BlockConflict::DateBlocked)));

        let err = local_bookings
            .insert_blocked_time(blocked_time("2025-06-02", "10:00"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(BlockConflict::SlotBooked)));

        let blocked = local_bookings
            .insert_blocked_time(blocked_time("2025-06-02", "11:00"))
            .unwrap();
        let err = local_bookings
            .insert_blocked_time(blocked_time("2025-06-02", "11:00"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(BlockConflict::AlreadyBlocked)));

        assert!(local_bookings.remove_blocked_time(blocked.id).unwrap());
        assert!(!local_bookings.remove_blocked_time(blocked.id).unwrap());
        assert!(local_bookings.blocked_time_slots().unwrap().is_empty());
    }

    #[test]
    fn test_listings_are_ordered() {
        let local_bookings = LocalBookings::default();
        let older = local_bookings
            .insert_booking(new_booking("2025-06-01", "10:00"))
            .unwrap();
        let newer = local_bookings
            .insert_booking(new_booking("2025-06-01", "11:00"))
            .unwrap();
        let bookings = local_bookings.bookings().unwrap();
        assert_eq!(bookings[0].id, newer.id);
        assert_eq!(bookings[1].id, older.id);

        local_bookings
            .insert_blocked_date_range(NewBlockedDateRange::new(date("2025-07-10"), None, None))
            .unwrap();
        let first = local_bookings
            .insert_blocked_date_range(NewBlockedDateRange::new(date("2025-07-01"), None, None))
            .unwrap();
        assert_eq!(local_bookings.blocked_date_ranges().unwrap()[0], first);
        assert!(local_bookings.remove_blocked_date_range(first.id).unwrap());
        assert_eq!(local_bookings.blocked_date_ranges().unwrap().len(), 1);
    }
}
