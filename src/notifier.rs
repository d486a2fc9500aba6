//! Fire-and-forget notifications about booking changes.
//!
//! Delivery runs on a blocking task after the triggering write has been
//! committed. A failing notifier is logged and otherwise ignored.

use crate::types::Booking;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingReceived,
    BookingConfirmed,
    BookingCancelled,
    FinalConfirmation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub booking: Booking,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct NotifyError(pub String);

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Records notifications in the log. Mail delivery is plugged in by
/// providing another `Notifier`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            kind = ?notification.kind,
            booking = %notification.booking.id,
            email = ?notification.booking.email,
            "Notification issued"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Hands the notification to a blocking task when a tokio runtime is
    /// around and delivers it in place otherwise. Never fails.
    pub fn dispatch(&self, kind: NotificationKind, booking: &Booking) -> Option<JoinHandle<()>> {
        let notification = Notification {
            kind,
            booking: booking.clone(),
        };
        let notifier = Arc::clone(&self.notifier);

        match Handle::try_current() {
            Ok(handle) => Some(handle.spawn_blocking(move || deliver(notifier.as_ref(), &notification))),
            Err(_) => {
                deliver(notifier.as_ref(), &notification);
                None
            }
        }
    }

    /// Delivers right away and reports the outcome to the caller.
    pub fn send_now(&self, kind: NotificationKind, booking: &Booking) -> Result<(), NotifyError> {
        self.notifier.notify(&Notification {
            kind,
            booking: booking.clone(),
        })
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(LogNotifier))
    }
}

fn deliver(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(err) = notifier.notify(notification) {
        error!(
            %err,
            kind = ?notification.kind,
            booking = %notification.booking.id,
            "Failed to deliver notification"
        );
    }
}
