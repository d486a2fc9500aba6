//! Booking creation.
//!
//! The conflict evaluator runs first and answers the common case with a
//! precise reason. It can't see a competing request that has not committed
//! yet, so the backend insert is the real arbiter: it refuses a second
//! non-cancelled booking on the same slot atomically, and that refusal is
//! reported as `SLOT_TAKEN` like any other.

use crate::backend::BookingBackend;
use crate::booking_manager::BookingManager;
use crate::error::{BookingError, Rejection};
use crate::notifier::NotificationKind;
use crate::types::{Booking, BookingStatus, NewBooking};
use tracing::{debug, error, info};

impl<T: BookingBackend> BookingManager<T> {
    /// Admits a booking submitted by a customer.
    pub fn create_booking(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        if !booking.gdpr_consent {
            return Err(BookingError::Validation(
                "Consent to the processing of personal data is required".into(),
            ));
        }
        let booking = self.admit(NewBooking {
            created_by_admin: false,
            status: BookingStatus::Pending,
            ..booking
        })?;
        self.dispatcher
            .dispatch(NotificationKind::BookingReceived, &booking);
        Ok(booking)
    }

    /// Admits a booking entered through the admin panel. Those are bound to a
    /// slot and start out confirmed unless told otherwise.
    pub fn create_admin_booking(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        if booking.slot().is_none() {
            return Err(BookingError::Validation(
                "Admin bookings need a date and a time".into(),
            ));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::Validation(
                "Bookings can't be created as cancelled".into(),
            ));
        }
        self.admit(NewBooking {
            created_by_admin: true,
            ..booking
        })
    }

    fn admit(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        let slot = booking.slot();

        if let Err(err) = self.evaluate(booking.desired_date, booking.desired_time.as_deref()) {
            log_refusal(&err, "Booking rejected by pre-check");
            return Err(err);
        }

        match self.backend.insert_booking(booking) {
            Ok(booking) => {
                info!(
                    id = %booking.id,
                    slot = ?slot.map(|slot| slot.to_string()),
                    status = %booking.status,
                    "Booking created"
                );
                Ok(booking)
            }
            Err(err) => {
                let err = BookingError::from(err);
                log_refusal(&err, "Booking rejected on insert");
                Err(err)
            }
        }
    }
}

fn log_refusal(err: &BookingError, message: &str) {
    match err {
        BookingError::Rejected(Rejection::SlotTaken) => info!(%err, "{message}"),
        BookingError::Rejected(_) => debug!(%err, "{message}"),
        err => error!(%err, "{message}"),
    }
}
