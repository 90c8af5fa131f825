//! Postgres repository implementation using Diesel.
//!
//! The embedded migration installs a `btree_gist` range-overlap EXCLUDE
//! constraint on scheduled bookings, which makes the database, not the
//! application, the final arbiter of the per-host non-overlap invariant
//! across any number of service instances. `insert_scheduled_if_free`
//! still runs a serializable re-read before the insert so buffer padding
//! (which the raw constraint cannot express) gets the same atomic
//! treatment; a constraint violation that slips past the re-read maps to
//! the `Overlap` outcome, never to an infrastructure error.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: connection string (required)
//! - `PG_POOL_MAX`: maximum pool size (default: 10)
//! - `PG_POOL_MIN`: minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: idle connection timeout in seconds (default: 600)

use async_trait::async_trait;
use chrono::Duration;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::task;

use crate::db::repository::{
    AvailabilityRepository, BookingRepository, RepositoryError, RepositoryResult, ReserveOutcome,
};
use crate::models::{
    AvailabilityWindow, Booking, BookingId, BookingStatus, HostId, MeetingType, MeetingTypeId,
    TimeRange,
};

mod models;
mod schema;

use models::{BookingRow, MeetingTypeRow, NewWindowRow, WindowRow};
use schema::{availability_windows, bookings, meeting_types};

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let parse = |name: &str, default: u64| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        Ok(Self {
            database_url,
            max_pool_size: parse("PG_POOL_MAX", 10) as u32,
            min_pool_size: parse("PG_POOL_MIN", 1) as u32,
            connection_timeout_sec: parse("PG_CONN_TIMEOUT_SEC", 30),
            idle_timeout_sec: parse("PG_IDLE_TIMEOUT_SEC", 600),
        })
    }
}

/// Postgres-backed implementation of the repository traits.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Build the connection pool and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(std::time::Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(std::time::Duration::from_secs(config.idle_timeout_sec)))
            .build(manager)?;

        let mut conn = pool.get()?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| RepositoryError::configuration(format!("migration failure: {e}")))?;

        Ok(Self { pool })
    }

    /// Run a blocking Diesel closure on the blocking thread pool.
    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::internal(format!("blocking task join error: {e}")))?
        .map_err(|e| e.with_operation(op))
    }
}

#[async_trait]
impl AvailabilityRepository for PostgresRepository {
    async fn get_meeting_type(
        &self,
        id: MeetingTypeId,
    ) -> RepositoryResult<Option<MeetingType>> {
        let raw_id = id.value();
        self.with_conn("get_meeting_type", move |conn| {
            let row: Option<MeetingTypeRow> = meeting_types::table
                .find(raw_id)
                .first(conn)
                .optional()?;
            row.map(MeetingTypeRow::into_domain).transpose()
        })
        .await
    }

    async fn put_meeting_type(&self, meeting_type: MeetingType) -> RepositoryResult<()> {
        let row = MeetingTypeRow::from_domain(&meeting_type);
        self.with_conn("put_meeting_type", move |conn| {
            diesel::insert_into(meeting_types::table)
                .values(&row)
                .on_conflict(meeting_types::id)
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn list_windows(
        &self,
        meeting_type_id: MeetingTypeId,
    ) -> RepositoryResult<Vec<AvailabilityWindow>> {
        let raw_id = meeting_type_id.value();
        self.with_conn("list_windows", move |conn| {
            let rows: Vec<WindowRow> = availability_windows::table
                .filter(availability_windows::meeting_type_id.eq(raw_id))
                .order((availability_windows::weekday, availability_windows::start_local))
                .load(conn)?;
            rows.into_iter().map(WindowRow::into_domain).collect()
        })
        .await
    }

    async fn replace_windows(
        &self,
        meeting_type_id: MeetingTypeId,
        windows: Vec<AvailabilityWindow>,
    ) -> RepositoryResult<()> {
        let raw_id = meeting_type_id.value();
        let rows: Vec<NewWindowRow> = windows.iter().map(NewWindowRow::from_domain).collect();
        self.with_conn("replace_windows", move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                diesel::delete(
                    availability_windows::table
                        .filter(availability_windows::meeting_type_id.eq(raw_id)),
                )
                .execute(conn)?;
                diesel::insert_into(availability_windows::table)
                    .values(&rows)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn("health_check", |conn| {
            sql_query("SELECT 1").execute(conn)?;
            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl BookingRepository for PostgresRepository {
    async fn insert_scheduled_if_free(
        &self,
        booking: Booking,
        buffer_before: Duration,
        buffer_after: Duration,
    ) -> RepositoryResult<ReserveOutcome> {
        if !booking.range.is_valid() {
            return Err(RepositoryError::validation(
                "booking range must satisfy start < end",
            ));
        }
        if booking.status != BookingStatus::Scheduled {
            return Err(RepositoryError::validation(
                "reservations must be inserted with status 'scheduled'",
            ));
        }

        let row = BookingRow::from_domain(&booking);
        let host = booking.host_id.value();
        // An existing booking padded with (buffer_before, buffer_after)
        // overlaps the candidate iff existing.start < candidate.end +
        // buffer_before and existing.end > candidate.start - buffer_after.
        let probe_end = booking.range.end + buffer_before;
        let probe_start = booking.range.start - buffer_after;

        self.with_conn("insert_scheduled_if_free", move |conn| {
            conn.build_transaction()
                .serializable()
                .run(|conn| -> RepositoryResult<ReserveOutcome> {
                    let clash: Option<uuid::Uuid> = bookings::table
                        .filter(bookings::host_id.eq(host))
                        .filter(bookings::status.eq(BookingStatus::Scheduled.as_str()))
                        .filter(bookings::start_utc.lt(probe_end))
                        .filter(bookings::end_utc.gt(probe_start))
                        .select(bookings::id)
                        .first(conn)
                        .optional()?;
                    if clash.is_some() {
                        return Ok(ReserveOutcome::Overlap);
                    }

                    match diesel::insert_into(bookings::table).values(&row).execute(conn) {
                        Ok(_) => Ok(ReserveOutcome::Created(booking.clone())),
                        // The exclusion constraint fired: another instance
                        // committed an overlapping booking first.
                        Err(diesel::result::Error::DatabaseError(_, info))
                            if info.constraint_name() == Some("bookings_no_overlap") =>
                        {
                            Ok(ReserveOutcome::Overlap)
                        }
                        Err(e) => Err(e.into()),
                    }
                })
        })
        .await
    }

    async fn get_booking(&self, id: BookingId) -> RepositoryResult<Option<Booking>> {
        let raw_id = id.value();
        self.with_conn("get_booking", move |conn| {
            let row: Option<BookingRow> =
                bookings::table.find(raw_id).first(conn).optional()?;
            row.map(BookingRow::into_domain).transpose()
        })
        .await
    }

    async fn list_active_in_range(
        &self,
        host_id: HostId,
        range: TimeRange,
    ) -> RepositoryResult<Vec<Booking>> {
        let host = host_id.value();
        self.with_conn("list_active_in_range", move |conn| {
            let rows: Vec<BookingRow> = bookings::table
                .filter(bookings::host_id.eq(host))
                .filter(bookings::status.eq(BookingStatus::Scheduled.as_str()))
                .filter(bookings::start_utc.lt(range.end))
                .filter(bookings::end_utc.gt(range.start))
                .order(bookings::start_utc)
                .load(conn)?;
            rows.into_iter().map(BookingRow::into_domain).collect()
        })
        .await
    }

    async fn update_status_if(
        &self,
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> RepositoryResult<Option<Booking>> {
        let raw_id = id.value();
        self.with_conn("update_status_if", move |conn| {
            let updated: Option<BookingRow> = diesel::update(
                bookings::table
                    .find(raw_id)
                    .filter(bookings::status.eq(from.as_str())),
            )
            .set(bookings::status.eq(to.as_str()))
            .get_result(conn)
            .optional()?;

            match updated {
                Some(row) => Ok(Some(row.into_domain()?)),
                None => {
                    // Distinguish a lost CAS from a missing booking.
                    let exists: Option<uuid::Uuid> = bookings::table
                        .find(raw_id)
                        .select(bookings::id)
                        .first(conn)
                        .optional()?;
                    if exists.is_some() {
                        Ok(None)
                    } else {
                        Err(RepositoryError::not_found(format!("booking {raw_id}")))
                    }
                }
            }
        })
        .await
    }
}
