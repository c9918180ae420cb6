//! PostgreSQL-backed event log.
//!
//! One table per ledger, append-only:
//!
//! ```sql
//! CREATE TABLE speaker_feedback_events (
//!     sequence    BIGINT PRIMARY KEY,
//!     event_type  TEXT NOT NULL,
//!     data        BYTEA NOT NULL,
//!     recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```
//!
//! Sequences are assigned explicitly (`count + 1 ..`) inside a transaction
//! that holds `pg_advisory_xact_lock` on the table name, which serializes
//! appends per ledger. Versions therefore stay gap-free and an
//! `expected_version` mismatch is detected before any row is written.
//! Payloads are bincode bytes tagged with the event's versioned type string.

use chrono::{DateTime, Utc};
use s2s_core::event::{Event, Recorded};
use s2s_core::event_log::{EventLog, StoreError};
use s2s_core::ids::Version;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use tracing::{debug, instrument};

/// Table holding the speaker-program ledger.
pub const SPEAKER_EVENTS_TABLE: &str = "speaker_feedback_events";

/// Table holding the attendee-feedback ledger.
pub const ATTENDEE_EVENTS_TABLE: &str = "attendee_feedback_events";

/// Table holding the bookmark ledger.
pub const BOOKMARK_EVENTS_TABLE: &str = "bookmark_events";

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// An append-only event log stored in one PostgreSQL table.
///
/// The type parameter pins the ledger's event enum; decoding rows into a
/// different enum is a compile error, not a runtime surprise.
pub struct PostgresEventLog<E> {
    pool: PgPool,
    table: String,
    _marker: PhantomData<fn() -> E>,
}

impl<E> PostgresEventLog<E> {
    /// A log over an existing pool and table.
    #[must_use]
    pub const fn new(pool: PgPool, table: String) -> Self {
        Self {
            pool,
            table,
            _marker: PhantomData,
        }
    }

    /// Connect a fresh pool and wrap the given table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection fails.
    pub async fn connect(database_url: &str, table: String) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(backend)?;
        Ok(Self::new(pool, table))
    }

    /// Create the ledger table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the DDL fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                sequence    BIGINT PRIMARY KEY,
                event_type  TEXT NOT NULL,
                data        BYTEA NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await.map_err(backend)?;
        debug!(table = %self.table, "ledger table ready");
        Ok(())
    }

    /// The underlying connection pool, for sharing across ledgers.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self, events), fields(table = %self.table, batch = events.len()))]
    async fn append_tx(
        &self,
        expected_version: Option<Version>,
        events: Vec<E>,
    ) -> Result<Version, StoreError>
    where
        E: Event + Serialize,
    {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Serializes appends per ledger; released at commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.table)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let count_sql = format!("SELECT count(*) FROM {}", self.table);
        let (count,): (i64,) = sqlx::query_as(&count_sql)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
        let actual = Version::new(u64::try_from(count).unwrap_or_default());

        if let Some(expected) = expected_version {
            if expected != actual {
                return Err(StoreError::ConcurrencyConflict { expected, actual });
            }
        }

        let insert_sql = format!(
            "INSERT INTO {} (sequence, event_type, data, recorded_at)
             VALUES ($1, $2, $3, now())",
            self.table
        );
        let mut next_sequence = count;
        for event in &events {
            next_sequence += 1;
            let bytes = event
                .to_bytes()
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            sqlx::query(&insert_sql)
                .bind(next_sequence)
                .bind(event.event_type())
                .bind(bytes)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(Version::new(actual.value() + events.len() as u64))
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn read_all_rows(&self) -> Result<Vec<Recorded<E>>, StoreError>
    where
        E: Event + DeserializeOwned,
    {
        let select_sql = format!(
            "SELECT sequence, recorded_at, data FROM {} ORDER BY sequence ASC",
            self.table
        );
        let rows: Vec<(i64, DateTime<Utc>, Vec<u8>)> = sqlx::query_as(&select_sql)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter()
            .map(|(sequence, recorded_at, data)| {
                let event = E::from_bytes(&data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Recorded {
                    sequence: u64::try_from(sequence).unwrap_or_default(),
                    timestamp: recorded_at,
                    event,
                })
            })
            .collect()
    }
}

impl<E> EventLog<E> for PostgresEventLog<E>
where
    E: Event + Serialize + DeserializeOwned,
{
    fn append(
        &self,
        expected_version: Option<Version>,
        events: Vec<E>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>> {
        Box::pin(self.append_tx(expected_version, events))
    }

    fn read_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Recorded<E>>, StoreError>> + Send + '_>> {
        Box::pin(self.read_all_rows())
    }
}
