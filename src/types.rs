use crate::schema::{blocked_dates, blocked_times};
use crate::slot::Slot;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{Queryable, Selectable};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

pub const DEFAULT_TREATMENT: &str = "Single treatment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Every status except `cancelled` holds on to the booked slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(format!("Unknown booking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub desired_date: Option<NaiveDate>,
    pub desired_time: Option<String>,
    pub treatment: String,
    pub message: Option<String>,
    pub status: BookingStatus,
    pub completed: bool,
    pub gdpr_consent: bool,
    pub created_by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn slot(&self) -> Option<Slot> {
        Slot::from_parts(self.desired_date, self.desired_time.as_deref())
    }

    pub fn occupies(&self, slot: &Slot) -> bool {
        self.status.occupies_slot() && self.slot().as_ref() == Some(slot)
    }
}

/// A booking candidate as handed over by the intake or the admin panel.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub desired_date: Option<NaiveDate>,
    pub desired_time: Option<String>,
    pub treatment: String,
    pub message: Option<String>,
    pub status: BookingStatus,
    pub gdpr_consent: bool,
    pub created_by_admin: bool,
}

impl NewBooking {
    pub fn slot(&self) -> Option<Slot> {
        Slot::from_parts(self.desired_date, self.desired_time.as_deref())
    }

    pub fn into_booking(self, id: Uuid, created_at: DateTime<Utc>) -> Booking {
        Booking {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            desired_date: self.desired_date,
            desired_time: self.desired_time,
            treatment: self.treatment,
            message: self.message,
            completed: self.status == BookingStatus::Completed,
            status: self.status,
            gdpr_consent: self.gdpr_consent,
            created_by_admin: self.created_by_admin,
            created_at,
            updated_at: created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = blocked_dates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockedDateRange {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlockedDateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBlockedDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl NewBlockedDateRange {
    /// A missing end date blocks the start date only.
    pub fn new(start_date: NaiveDate, end_date: Option<NaiveDate>, reason: Option<String>) -> Self {
        Self {
            start_date,
            end_date: end_date.unwrap_or(start_date),
            reason,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = blocked_times)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockedTime {
    pub id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlockedTime {
    pub fn slot(&self) -> Slot {
        Slot::new(self.date, self.time.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBlockedTime {
    pub date: NaiveDate,
    pub time: String,
    pub reason: Option<String>,
}

impl NewBlockedTime {
    pub fn slot(&self) -> Slot {
        Slot::new(self.date, self.time.clone())
    }
}

/// Snapshot of the slot state of a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub date: NaiveDate,
    pub day_blocked: bool,
    pub reason: Option<String>,
    pub blocked_times: Vec<String>,
    pub occupied_times: Vec<String>,
}
