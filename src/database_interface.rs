use crate::backend::{AvailabilityStore, BookingBackend};
use crate::error::{BackendError, BlockConflict, Rejection};
use crate::schema::{blocked_dates, blocked_times, bookings};
use crate::types::{
    BlockedDateRange, BlockedTime, Booking, BookingStatus, NewBlockedDateRange, NewBlockedTime,
    NewBooking,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_types::Integer;
use std::collections::BTreeSet;
use tracing::error;
use uuid::Uuid;

const CANCELLED: &str = "cancelled";
const MAX_CONNECTIONS: u32 = 10;
/// First key of the advisory locks taken per calendar day.
const DAY_LOCK_CLASS: i32 = 0x626b;

type PooledPg = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Queryable, Selectable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct BookingRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: String,
    desired_date: Option<NaiveDate>,
    desired_time: Option<String>,
    treatment: String,
    message: Option<String>,
    status: String,
    completed: bool,
    gdpr_consent: bool,
    created_by_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BackendError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            desired_date: row.desired_date,
            desired_time: row.desired_time,
            treatment: row.treatment,
            message: row.message,
            status: row.status.parse().map_err(BackendError::Database)?,
            completed: row.completed,
            gdpr_consent: row.gdpr_consent,
            created_by_admin: row.created_by_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = bookings)]
struct NewBookingRow<'a> {
    id: Uuid,
    name: &'a str,
    email: Option<&'a str>,
    phone: &'a str,
    desired_date: Option<NaiveDate>,
    desired_time: Option<&'a str>,
    treatment: &'a str,
    message: Option<&'a str>,
    status: &'a str,
    completed: bool,
    gdpr_consent: bool,
    created_by_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'a> NewBookingRow<'a> {
    fn new(booking: &'a NewBooking) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: &booking.name,
            email: booking.email.as_deref(),
            phone: &booking.phone,
            desired_date: booking.desired_date,
            desired_time: booking.desired_time.as_deref(),
            treatment: &booking.treatment,
            message: booking.message.as_deref(),
            status: booking.status.as_str(),
            completed: booking.status == BookingStatus::Completed,
            gdpr_consent: booking.gdpr_consent,
            created_by_admin: booking.created_by_admin,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseInterface {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, BackendError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(MAX_CONNECTIONS)
            .build(manager)
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledPg, BackendError> {
        self.pool.get().map_err(|err| {
            error!(%err, "Failed to get database connection");
            BackendError::Unavailable(err.to_string())
        })
    }

    /// Every write that depends on the blocks or bookings of `date` takes
    /// this lock first. It is released when the transaction ends.
    fn lock_day(connection: &mut PgConnection, date: NaiveDate) -> Result<(), BackendError> {
        diesel::sql_query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind::<Integer, _>(DAY_LOCK_CLASS)
            .bind::<Integer, _>(date.num_days_from_ce())
            .execute(connection)?;
        Ok(())
    }

    fn find_day_block(
        connection: &mut PgConnection,
        date: NaiveDate,
    ) -> Result<Option<BlockedDateRange>, BackendError> {
        Ok(blocked_dates::table
            .filter(blocked_dates::start_date.le(date))
            .filter(blocked_dates::end_date.ge(date))
            .order(blocked_dates::start_date.asc())
            .select(BlockedDateRange::as_select())
            .first(connection)
            .optional()?)
    }

    fn is_time_blocked(
        connection: &mut PgConnection,
        date: NaiveDate,
        time: &str,
    ) -> Result<bool, BackendError> {
        Ok(diesel::select(diesel::dsl::exists(
            blocked_times::table
                .filter(blocked_times::date.eq(date))
                .filter(blocked_times::time.eq(time)),
        ))
        .get_result(connection)?)
    }

    fn is_slot_booked(
        connection: &mut PgConnection,
        date: NaiveDate,
        time: &str,
    ) -> Result<bool, BackendError> {
        Ok(diesel::select(diesel::dsl::exists(
            bookings::table
                .filter(bookings::desired_date.eq(date))
                .filter(bookings::desired_time.eq(time))
                .filter(bookings::status.ne(CANCELLED)),
        ))
        .get_result(connection)?)
    }
}

impl AvailabilityStore for DatabaseInterface {
    fn day_block(&self, date: NaiveDate) -> Result<Option<BlockedDateRange>, BackendError> {
        let mut connection = self.connection()?;
        Self::find_day_block(&mut connection, date)
    }

    fn blocked_times(&self, date: NaiveDate) -> Result<BTreeSet<String>, BackendError> {
        let mut connection = self.connection()?;
        let times = blocked_times::table
            .filter(blocked_times::date.eq(date))
            .select(blocked_times::time)
            .load::<String>(&mut connection)?;
        Ok(times.into_iter().collect())
    }

    fn occupied_times(&self, date: NaiveDate) -> Result<BTreeSet<String>, BackendError> {
        let mut connection = self.connection()?;
        let times = bookings::table
            .filter(bookings::desired_date.eq(date))
            .filter(bookings::status.ne(CANCELLED))
            .filter(bookings::desired_time.is_not_null())
            .select(bookings::desired_time)
            .load::<Option<String>>(&mut connection)?;
        Ok(times.into_iter().flatten().collect())
    }
}

impl BookingBackend for DatabaseInterface {
    fn bookings(&self) -> Result<Vec<Booking>, BackendError> {
        let mut connection = self.connection()?;
        bookings::table
            .order((bookings::created_at.desc(), bookings::id.desc()))
            .select(BookingRow::as_select())
            .load(&mut connection)?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }

    fn booking(&self, id: Uuid) -> Result<Option<Booking>, BackendError> {
        let mut connection = self.connection()?;
        bookings::table
            .find(id)
            .select(BookingRow::as_select())
            .first(&mut connection)
            .optional()?
            .map(Booking::try_from)
            .transpose()
    }

    /// Re-checks the blocks under the day lock. Slot exclusivity comes from
    /// `bookings_active_slot_key`; its violation surfaces as
    /// `Rejection::SlotTaken`.
    fn insert_booking(&self, booking: NewBooking) -> Result<Booking, BackendError> {
        let mut connection = self.connection()?;
        let row = connection.transaction::<BookingRow, BackendError, _>(|connection| {
            if let Some(date) = booking.desired_date {
                Self::lock_day(connection, date)?;
                if Self::find_day_block(connection, date)?.is_some() {
                    return Err(Rejection::DateBlocked.into());
                }
                if let Some(time) = booking.desired_time.as_deref() {
                    if Self::is_time_blocked(connection, date, time)? {
                        return Err(Rejection::TimeBlocked.into());
                    }
                }
            }

            Ok(diesel::insert_into(bookings::table)
                .values(NewBookingRow::new(&booking))
                .returning(BookingRow::as_returning())
                .get_result(connection)?)
        })?;
        Booking::try_from(row)
    }

    fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>, BackendError> {
        let mut connection = self.connection()?;
        let row = connection.transaction::<Option<BookingRow>, BackendError, _>(|connection| {
            let Some(desired_date) = bookings::table
                .find(id)
                .select(bookings::desired_date)
                .first::<Option<NaiveDate>>(connection)
                .optional()?
            else {
                return Ok(None);
            };
            if let Some(date) = desired_date {
                Self::lock_day(connection, date)?;
            }

            let Some(current) = bookings::table
                .find(id)
                .select(BookingRow::as_select())
                .for_update()
                .first(connection)
                .optional()?
            else {
                return Ok(None);
            };
            if status.occupies_slot() && current.status == CANCELLED {
                if let Some(date) = current.desired_date {
                    if Self::find_day_block(connection, date)?.is_some() {
                        return Err(Rejection::DateBlocked.into());
                    }
                    if let Some(time) = current.desired_time.as_deref() {
                        if Self::is_time_blocked(connection, date, time)? {
                            return Err(Rejection::TimeBlocked.into());
                        }
                    }
                }
            }

            let target = bookings::table.find(id);
            let row = if status == BookingStatus::Completed {
                diesel::update(target)
                    .set((
                        bookings::status.eq(status.as_str()),
                        bookings::completed.eq(true),
                        bookings::updated_at.eq(Utc::now()),
                    ))
                    .returning(BookingRow::as_returning())
                    .get_result(connection)?
            } else {
                diesel::update(target)
                    .set((
                        bookings::status.eq(status.as_str()),
                        bookings::updated_at.eq(Utc::now()),
                    ))
                    .returning(BookingRow::as_returning())
                    .get_result(connection)?
            };
            Ok(Some(row))
        })?;
        row.map(Booking::try_from).transpose()
    }

    fn blocked_date_ranges(&self) -> Result<Vec<BlockedDateRange>, BackendError> {
        let mut connection = self.connection()?;
        Ok(blocked_dates::table
            .order((blocked_dates::start_date.asc(), blocked_dates::id.asc()))
            .select(BlockedDateRange::as_select())
            .load(&mut connection)?)
    }

    /// Locks every day of the range in ascending order before counting, so a
    /// booking write on any of those days either committed before the count
    /// or waits until the range is in place.
    fn insert_blocked_date_range(
        &self,
        range: NewBlockedDateRange,
    ) -> Result<BlockedDateRange, BackendError> {
        let mut connection = self.connection()?;
        connection.transaction::<BlockedDateRange, BackendError, _>(|connection| {
            for date in range
                .start_date
                .iter_days()
                .take_while(|date| *date <= range.end_date)
            {
                Self::lock_day(connection, date)?;
            }

            let active_bookings: i64 = bookings::table
                .filter(bookings::desired_date.between(range.start_date, range.end_date))
                .filter(bookings::status.ne(CANCELLED))
                .count()
                .get_result(connection)?;
            if active_bookings > 0 {
                return Err(BlockConflict::ActiveBookings(active_bookings as usize).into());
            }

            Ok(diesel::insert_into(blocked_dates::table)
                .values((
                    blocked_dates::id.eq(Uuid::now_v7()),
                    blocked_dates::start_date.eq(range.start_date),
                    blocked_dates::end_date.eq(range.end_date),
                    blocked_dates::reason.eq(range.reason.as_deref()),
                    blocked_dates::created_at.eq(Utc::now()),
                ))
                .returning(BlockedDateRange::as_returning())
                .get_result(connection)?)
        })
    }

    fn remove_blocked_date_range(&self, id: Uuid) -> Result<bool, BackendError> {
        let mut connection = self.connection()?;
        let removed = diesel::delete(blocked_dates::table.find(id)).execute(&mut connection)?;
        Ok(removed > 0)
    }

    fn blocked_time_slots(&self) -> Result<Vec<BlockedTime>, BackendError> {
        let mut connection = self.connection()?;
        Ok(blocked_times::table
            .order((blocked_times::date.asc(), blocked_times::time.asc()))
            .select(BlockedTime::as_select())
            .load(&mut connection)?)
    }

    fn insert_blocked_time(&self, blocked_time: NewBlockedTime) -> Result<BlockedTime, BackendError> {
        let mut connection = self.connection()?;
        connection.transaction::<BlockedTime, BackendError, _>(|connection| {
            let NewBlockedTime { date, time, reason } = &blocked_time;
            Self::lock_day(connection, *date)?;
            if Self::find_day_block(connection, *date)?.is_some() {
                return Err(BlockConflict::DateBlocked.into());
            }
            if Self::is_slot_booked(connection, *date, time)? {
                return Err(BlockConflict::SlotBooked.into());
            }
            if Self::is_time_blocked(connection, *date, time)? {
                return Err(BlockConflict::AlreadyBlocked.into());
            }

            Ok(diesel::insert_into(blocked_times::table)
                .values((
                    blocked_times::id.eq(Uuid::now_v7()),
                    blocked_times::date.eq(*date),
                    blocked_times::time.eq(time.as_str()),
                    blocked_times::reason.eq(reason.as_deref()),
                    blocked_times::created_at.eq(Utc::now()),
                ))
                .returning(BlockedTime::as_returning())
                .get_result(connection)?)
        })
    }

    fn remove_blocked_time(&self, id: Uuid) -> Result<bool, BackendError> {
        let mut connection = self.connection()?;
        let removed = diesel::delete(blocked_times::table.find(id)).execute(&mut connection)?;
        Ok(removed > 0)
    }
}
