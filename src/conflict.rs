use crate::backend::AvailabilityStore;
use crate::error::{BackendError, Rejection};
use chrono::{Datelike, NaiveDate, Weekday};

/// Weekdays on which the business takes no bookings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessDays {
    closed: Vec<Weekday>,
}

impl BusinessDays {
    pub fn all_open() -> Self {
        Self::default()
    }

    pub fn closed_on(weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        let mut closed: Vec<Weekday> = weekdays.into_iter().collect();
        closed.sort_by_key(|weekday| weekday.num_days_from_monday());
        closed.dedup();
        Self { closed }
    }

    pub fn is_open(&self, date: NaiveDate) -> bool {
        !self.closed.contains(&date.weekday())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject(Rejection),
}

impl Decision {
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Decision::Admit => Ok(()),
            Decision::Reject(rejection) => Err(rejection),
        }
    }
}

/// Advisory admission check for a candidate slot.
///
/// Checks run in a fixed order and stop at the first rejection: business
/// day, day block, time block, occupancy. A candidate without a date isn't
/// bound to any slot and is always admitted. The result is only a snapshot;
/// the backend write decides for good.
pub fn evaluate<S: AvailabilityStore + ?Sized>(
    store: &S,
    business_days: &BusinessDays,
    date: Option<NaiveDate>,
    time: Option<&str>,
) -> Result<Decision, BackendError> {
    let Some(date) = date else {
        return Ok(Decision::Admit);
    };

    if !business_days.is_open(date) {
        return Ok(Decision::Reject(Rejection::NonBusinessDay));
    }
    if store.is_day_blocked(date)? {
        return Ok(Decision::Reject(Rejection::DateBlocked));
    }

    let Some(time) = time else {
        return Ok(Decision::Admit);
    };

    if store.blocked_times(date)?.contains(time) {
        return Ok(Decision::Reject(Rejection::TimeBlocked));
    }
    if store.occupied_times(date)?.contains(time) {
        return Ok(Decision::Reject(Rejection::SlotTaken));
    }
    Ok(Decision::Admit)
}
