//! # Schedule Repository
//!
//! Per-day availability overrides. A row with `is_available = 0` marks a
//! technician on leave for that date; absence of a row means available.
//!
//! ## Upsert Semantics
//! Two admins saving the same (technician, date) concurrently must not
//! produce two rows. The UNIQUE(technician_id, date) constraint plus
//! `ON CONFLICT DO UPDATE` makes the write last-writer-wins without a
//! read-modify-write race.

use chrono::NaiveDate;
use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

use lotus_core::types::ScheduleEntry;

use crate::error::{DbError, DbResult};

/// Repository for schedule operations.
#[derive(Debug, Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

impl ScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ScheduleRepository { pool }
    }

    /// Creates or updates the entry for (technician, date).
    ///
    /// The technician must exist (FK); the id and created_at of an
    /// existing row are preserved, only `is_available` and `updated_at`
    /// change.
    pub async fn upsert(
        &self,
        technician_id: &str,
        date: NaiveDate,
        is_available: bool,
    ) -> DbResult<ScheduleEntry> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO schedules (id, technician_id, date, is_available, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (technician_id, date)
            DO UPDATE SET is_available = excluded.is_available,
                          updated_at   = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(technician_id)
        .bind(date)
        .bind(is_available)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(technician_id, date)
            .await?
            .ok_or_else(|| DbError::not_found("schedule", technician_id))
    }

    /// Fetches the entry for (technician, date), if any.
    pub async fn get(
        &self,
        technician_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<ScheduleEntry>> {
        let entry = sqlx::query_as::<_, ScheduleEntry>(
            "SELECT * FROM schedules WHERE technician_id = ? AND date = ?",
        )
        .bind(technician_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Lists all entries for a technician, by date.
    pub async fn for_technician(&self, technician_id: &str) -> DbResult<Vec<ScheduleEntry>> {
        let entries = sqlx::query_as::<_, ScheduleEntry>(
            "SELECT * FROM schedules WHERE technician_id = ? ORDER BY date",
        )
        .bind(technician_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Ids of all technicians marked off for the given date.
    pub async fn on_leave_for_date(&self, date: NaiveDate) -> DbResult<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT technician_id FROM schedules WHERE date = ? AND is_available = 0",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    /// Whether the technician is marked off for the date. Runs on the
    /// caller's executor so booking can check inside its transaction.
    pub async fn is_on_leave<'e, E>(
        &self,
        executor: E,
        technician_id: &str,
        date: NaiveDate,
    ) -> DbResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let on_leave: Option<bool> = sqlx::query_scalar(
            "SELECT is_available = 0 FROM schedules WHERE technician_id = ? AND date = ?",
        )
        .bind(technician_id)
        .bind(date)
        .fetch_optional(executor)
        .await?;

        Ok(on_leave.unwrap_or(false))
    }

    /// Removes all entries for a technician, on the caller's executor.
    /// Paired with technician deletion.
    pub async fn delete_for_technician<'e, E>(
        &self,
        executor: E,
        technician_id: &str,
    ) -> DbResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM schedules WHERE technician_id = ?")
            .bind(technician_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
