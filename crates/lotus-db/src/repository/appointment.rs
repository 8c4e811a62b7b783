//! # Appointment Repository
//!
//! Bookings, conflict probes and the waitlist queue.
//!
//! ## Conflict Rule
//! Only `pending` appointments block a window. Waiting, completed,
//! cancelled and waitlist rows never conflict, so completing or
//! cancelling a booking immediately frees its slot.
//!
//! ## Waitlist Ordering
//! Promotion is strictly first-come-first-served on `created_at`; equal
//! timestamps (same-millisecond inserts) tie-break on rowid, which is
//! insertion order in SQLite.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use lotus_core::availability::BusyInterval;
use lotus_core::money::Money;
use lotus_core::types::{Appointment, AppointmentStatus, PaymentMethod};

use crate::error::{DbError, DbResult};

/// Repository for appointment operations.
#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
}

impl AppointmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AppointmentRepository { pool }
    }

    /// Inserts a fully-formed appointment on the caller's executor.
    pub async fn insert<'e, E>(&self, executor: E, appointment: &Appointment) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO appointments
                (id, member_id, technician_id, service_id, start_time, end_time,
                 status, origin_price_cents, actual_price_cents,
                 payment_method, paid_balance_cents, paid_cash_cents,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&appointment.id)
        .bind(&appointment.member_id)
        .bind(&appointment.technician_id)
        .bind(&appointment.service_id)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(appointment.status)
        .bind(appointment.origin_price_cents)
        .bind(appointment.actual_price_cents)
        .bind(appointment.payment_method)
        .bind(appointment.paid_balance_cents)
        .bind(appointment.paid_cash_cents)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Fetches an appointment by id.
    pub async fn get(&self, id: &str) -> DbResult<Appointment> {
        self.get_with(&self.pool, id).await
    }

    /// Fetches an appointment on the caller's executor.
    pub async fn get_with<'e, E>(&self, executor: E, id: &str) -> DbResult<Appointment>
    where
        E: SqliteExecutor<'e>,
    {
        let appointment =
            sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
                .bind(id)
                .fetch_optional(executor)
                .await?;

        appointment.ok_or_else(|| DbError::not_found("appointment", id))
    }

    /// Whether any pending appointment of the technician overlaps
    /// `[start, end)`. `exclude` skips one appointment id (used when
    /// probing whether a waiting booking now fits its own slot).
    pub async fn conflict_exists<'e, E>(
        &self,
        executor: E,
        technician_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&str>,
    ) -> DbResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE technician_id = ?
                  AND status = 'pending'
                  AND start_time < ?
                  AND end_time > ?
                  AND id != ?
            )
            "#,
        )
        .bind(technician_id)
        .bind(end)
        .bind(start)
        .bind(exclude.unwrap_or(""))
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// Pending-appointment intervals intersecting the given day, for the
    /// availability partition and slot grids.
    pub async fn busy_intervals_for_day(&self, date: NaiveDate) -> DbResult<Vec<BusyInterval>> {
        let day_start = date.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let day_end = day_start.map(|t| t + chrono::Duration::days(1));
        let (day_start, day_end) = match (day_start, day_end) {
            (Some(s), Some(e)) => (s, e),
            _ => return Ok(Vec::new()),
        };

        let rows: Vec<(String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT technician_id, start_time, end_time
            FROM appointments
            WHERE status = 'pending'
              AND start_time < ?
              AND end_time > ?
            ORDER BY start_time
            "#,
        )
        .bind(day_end)
        .bind(day_start)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(technician_id, start, end)| BusyInterval {
                technician_id,
                start,
                end,
            })
            .collect())
    }

    /// Waiting appointments of a technician in strict FCFS order.
    pub async fn waiting_fcfs<'e, E>(
        &self,
        executor: E,
        technician_id: &str,
    ) -> DbResult<Vec<Appointment>>
    where
        E: SqliteExecutor<'e>,
    {
        let waiting = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE technician_id = ? AND status = 'waiting'
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(technician_id)
        .fetch_all(executor)
        .await?;

        Ok(waiting)
    }

    /// Updates the status of an appointment on the caller's executor.
    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        id: &str,
        status: AppointmentStatus,
    ) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result =
            sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status)
                .bind(Utc::now())
                .bind(id)
                .execute(executor)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("appointment", id));
        }

        Ok(())
    }

    /// Marks the appointment completed and records the payment split.
    pub async fn apply_settlement<'e, E>(
        &self,
        executor: E,
        id: &str,
        method: PaymentMethod,
        paid_balance: Money,
        paid_cash: Money,
    ) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET status = 'completed',
                payment_method = ?,
                paid_balance_cents = ?,
                paid_cash_cents = ?,
                updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(method)
        .bind(paid_balance.cents())
        .bind(paid_cash.cents())
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("pending appointment", id));
        }

        Ok(())
    }

    /// Moves all pending appointments of a technician to the waitlist
    /// state. Used when a technician is removed; their queue survives to
    /// be rebooked manually.
    pub async fn move_pending_to_waitlist<'e, E>(
        &self,
        executor: E,
        technician_id: &str,
    ) -> DbResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET status = 'waitlist', updated_at = ?
            WHERE technician_id = ? AND status = 'pending'
            "#,
        )
        .bind(Utc::now())
        .bind(technician_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Applies a manual price adjustment. Only pending appointments can
    /// be discounted; the settled price is immutable.
    pub async fn set_actual_price(&self, id: &str, price: Money) -> DbResult<()> {
        if price.is_negative() {
            return Err(DbError::InvalidInput("price must not be negative".to_string()));
        }

        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET actual_price_cents = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(price.cents())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("pending appointment", id));
        }

        Ok(())
    }

    /// Lists a member's appointments, newest first.
    pub async fn list_for_member(&self, member_id: &str) -> DbResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE member_id = ? ORDER BY start_time DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(appointments)
    }
}
