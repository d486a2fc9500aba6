//! Identity of a bookable unit.
//!
//! A slot is a calendar day plus an opaque time label such as `"14:30"`.
//! Days are compared without any time-of-day component, labels are compared
//! as exact strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: String,
}

impl Slot {
    pub fn new(date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            date,
            time: time.into(),
        }
    }

    /// Only a booking with both a date and a time label is bound to a slot.
    pub fn from_parts(date: Option<NaiveDate>, time: Option<&str>) -> Option<Self> {
        match (date, time) {
            (Some(date), Some(time)) => Some(Self::new(date, time)),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.time)
    }
}
