use crate::backend::AvailabilityStore;
use crate::error::BackendError;
use crate::types::Availability;
use chrono::NaiveDate;

/// Collects the three slot facts of `date` straight from the store.
pub fn check_availability<S: AvailabilityStore + ?Sized>(
    store: &S,
    date: NaiveDate,
) -> Result<Availability, BackendError> {
    let day_block = store.day_block(date)?;
    Ok(Availability {
        date,
        day_blocked: day_block.is_some(),
        reason: day_block.and_then(|range| range.reason),
        blocked_times: store.blocked_times(date)?.into_iter().collect(),
        occupied_times: store.occupied_times(date)?.into_iter().collect(),
    })
}
