use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::{NaiveDate, Utc, Weekday};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::{
    backend::{AvailabilityStore, BookingBackend},
    configuration::Configuration,
    error::{BackendError, Rejection},
    notifier::{Notification, NotificationDispatcher, Notifier, NotifyError},
    types::{
        BlockedDateRange, BlockedTime, Booking, BookingStatus, NewBlockedDateRange,
        NewBlockedTime, NewBooking, DEFAULT_TREATMENT,
    },
};

pub const TEST_PASSWORD: &str = "123";

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn new_booking(desired_date: &str, desired_time: &str) -> NewBooking {
    NewBooking {
        name: "Stefan".into(),
        email: Some("stefan@example.com".into()),
        phone: "12345678".into(),
        desired_date: Some(date(desired_date)),
        desired_time: Some(desired_time.into()),
        treatment: DEFAULT_TREATMENT.into(),
        message: None,
        status: BookingStatus::Pending,
        gdpr_consent: true,
        created_by_admin: false,
    }
}

pub fn sample_booking() -> Booking {
    new_booking("2025-02-15", "10:00").into_booking(Uuid::now_v7(), Utc::now())
}

#[derive(Clone, Default)]
pub struct TestConfiguration {
    pub closed_weekdays: Vec<Weekday>,
}

impl Configuration for TestConfiguration {
    fn business_name(&self) -> String {
        "Test Clinic".into()
    }

    fn admin_password(&self) -> String {
        TEST_PASSWORD.into()
    }

    fn port(&self) -> String {
        "0".into()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn closed_weekdays(&self) -> Vec<Weekday> {
        self.closed_weekdays.clone()
    }
}

pub struct ChannelNotifier(UnboundedSender<Notification>);

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.0
            .send(notification.clone())
            .map_err(|err| NotifyError(err.to_string()))
    }
}

pub fn channel_dispatcher() -> (NotificationDispatcher, UnboundedReceiver<Notification>) {
    let (sender, receiver) = unbounded_channel();
    (
        NotificationDispatcher::new(Arc::new(ChannelNotifier(sender))),
        receiver,
    )
}

pub async fn next_notification(receiver: &mut UnboundedReceiver<Notification>) -> Notification {
    tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("No notification received in time")
        .expect("Notification channel closed")
}

/// Backend whose slot facts are set by the test. Inserts never touch those
/// facts, which lets a test reproduce a request that passed the pre-check
/// and then lost the race on insert.
pub struct MockBookingBackendInner {
    pub success: AtomicBool,
    pub day_blocked: AtomicBool,
    pub inserts_before_conflict: AtomicU64,
    pub calls_to_day_block: AtomicU64,
    pub calls_to_blocked_times: AtomicU64,
    pub calls_to_occupied_times: AtomicU64,
    pub calls_to_insert_booking: AtomicU64,
    pub calls_to_update_booking_status: AtomicU64,
    pub blocked_times: Mutex<BTreeSet<String>>,
    pub occupied_times: Mutex<BTreeSet<String>>,
    pub bookings: Mutex<HashMap<Uuid, Booking>>,
}

#[derive(Clone)]
pub struct MockBookingBackend(pub Arc<MockBookingBackendInner>);

impl MockBookingBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            day_blocked: AtomicBool::new(false),
            inserts_before_conflict: AtomicU64::new(u64::MAX),
            calls_to_day_block: AtomicU64::default(),
            calls_to_blocked_times: AtomicU64::default(),
            calls_to_occupied_times: AtomicU64::default(),
            calls_to_insert_booking: AtomicU64::default(),
            calls_to_update_booking_status: AtomicU64::default(),
            blocked_times: Mutex::default(),
            occupied_times: Mutex::default(),
            bookings: Mutex::default(),
        }
    }
}

impl MockBookingBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockBookingBackendInner::new()))
    }

    fn result(&self) -> Result<(), BackendError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(BackendError::Database("Supposed to fail".into())),
        }
    }
}

impl AvailabilityStore for MockBookingBackend {
    fn day_block(&self, date: NaiveDate) -> Result<Option<BlockedDateRange>, BackendError> {
        self.0.calls_to_day_block.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.day_blocked.load(Ordering::SeqCst).then(|| BlockedDateRange {
            id: Uuid::nil(),
            start_date: date,
            end_date: date,
            reason: None,
            created_at: Utc::now(),
        }))
    }

    fn blocked_times(&self, _date: NaiveDate) -> Result<BTreeSet<String>, BackendError> {
        self.0.calls_to_blocked_times.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.blocked_times.lock().unwrap().clone())
    }

    fn occupied_times(&self, _date: NaiveDate) -> Result<BTreeSet<String>, BackendError> {
        self.0.calls_to_occupied_times.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.occupied_times.lock().unwrap().clone())
    }
}

impl BookingBackend for MockBookingBackend {
    fn bookings(&self) -> Result<Vec<Booking>, BackendError> {
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().values().cloned().collect())
    }

    fn booking(&self, id: Uuid) -> Result<Option<Booking>, BackendError> {
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().get(&id).cloned())
    }

    fn insert_booking(&self, booking: NewBooking) -> Result<Booking, BackendError> {
        let calls = self.0.calls_to_insert_booking.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        if calls >= self.0.inserts_before_conflict.load(Ordering::SeqCst) {
            return Err(Rejection::SlotTaken.into());
        }
        let booking = booking.into_booking(Uuid::now_v7(), Utc::now());
        self.0
            .bookings
            .lock()
            .unwrap()
            .insert(booking.id, booking.clone());
        Ok(booking)
    }

    fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>, BackendError> {
        self.0
            .calls_to_update_booking_status
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().get_mut(&id).map(|booking| {
            booking.status = status;
            booking.completed |= status == BookingStatus::Completed;
            booking.clone()
        }))
    }

    fn blocked_date_ranges(&self) -> Result<Vec<BlockedDateRange>, BackendError> {
        self.result()?;
        Ok(vec![])
    }

    fn insert_blocked_date_range(
        &self,
        range: NewBlockedDateRange,
    ) -> Result<BlockedDateRange, BackendError> {
        self.result()?;
        Ok(BlockedDateRange {
            id: Uuid::now_v7(),
            start_date: range.start_date,
            end_date: range.end_date,
            reason: range.reason,
            created_at: Utc::now(),
        })
    }

    fn remove_blocked_date_range(&self, _id: Uuid) -> Result<bool, BackendError> {
        self.result()?;
        Ok(true)
    }

    fn blocked_time_slots(&self) -> Result<Vec<BlockedTime>, BackendError> {
        self.result()?;
        Ok(vec![])
    }

    fn insert_blocked_time(&self, blocked_time: NewBlockedTime) -> Result<BlockedTime, BackendError> {
        self.result()?;
        Ok(BlockedTime {
            id: Uuid::now_v7(),
            date: blocked_time.date,
            time: blocked_time.time,
            reason: blocked_time.reason,
            created_at: Utc::now(),
        })
    }

    fn remove_blocked_time(&self, _id: Uuid) -> Result<bool, BackendError> {
        self.result()?;
        Ok(true)
    }
}
