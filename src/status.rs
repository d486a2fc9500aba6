//! Admin driven status changes.
//!
//! Any booking may be moved to `confirmed`, `cancelled` or `completed`.
//! Cancelling releases the slot simply because cancelled bookings don't count
//! as occupants. Moving a cancelled booking back into an occupying status
//! takes the slot again and therefore goes through admission once more.

use crate::backend::BookingBackend;
use crate::booking_manager::BookingManager;
use crate::error::BookingError;
use crate::notifier::NotificationKind;
use crate::types::{Booking, BookingStatus};
use tracing::info;
use uuid::Uuid;

impl<T: BookingBackend> BookingManager<T> {
    pub fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<Booking, BookingError> {
        if status == BookingStatus::Pending {
            return Err(BookingError::Validation(
                "Bookings can't be moved back to pending".into(),
            ));
        }

        let current = self
            .backend
            .booking(id)?
            .ok_or(BookingError::BookingNotFound(id))?;

        if status.occupies_slot() && !current.status.occupies_slot() {
            self.evaluate(current.desired_date, current.desired_time.as_deref())?;
        }

        let booking = self
            .backend
            .update_booking_status(id, status)?
            .ok_or(BookingError::BookingNotFound(id))?;
        info!(%id, from = %current.status, to = %booking.status, "Booking status changed");

        match status {
            BookingStatus::Confirmed => {
                self.dispatcher
                    .dispatch(NotificationKind::BookingConfirmed, &booking);
            }
            BookingStatus::Cancelled => {
                self.dispatcher
                    .dispatch(NotificationKind::BookingCancelled, &booking);
            }
            BookingStatus::Pending | BookingStatus::Completed => {}
        }
        Ok(booking)
    }

    /// Sends the final confirmation for a booking again, on request.
    pub fn resend_final_confirmation(&self, id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .backend
            .booking(id)?
            .ok_or(BookingError::BookingNotFound(id))?;
        if booking.email.is_none() {
            return Err(BookingError::MissingEmail(id));
        }
        self.dispatcher
            .send_now(NotificationKind::FinalConfirmation, &booking)?;
        info!(%id, "Final confirmation sent");
        Ok(booking)
    }
}
