//! # Order Repository
//!
//! The append-only order ledger. Orders are never updated or deleted;
//! idempotency comes from the UNIQUE source columns, and the ledger
//! service resolves insert races by re-reading the winning row.

use sqlx::{SqliteExecutor, SqlitePool};

use lotus_core::types::{FissionLog, Order};

use crate::error::{DbError, DbResult};

/// Repository for order ledger operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a ledger row on the caller's executor. A UNIQUE violation
    /// on a source column means another writer already materialized this
    /// event; callers handle that, it is not a failure of the ledger.
    pub async fn insert<'e, E>(&self, executor: E, order: &Order) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, member_id, inviter_id, paid_cents, commission_cents,
                 kind, appointment_id, inventory_log_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.member_id)
        .bind(&order.inviter_id)
        .bind(order.paid_cents)
        .bind(order.commission_cents)
        .bind(order.kind)
        .bind(&order.appointment_id)
        .bind(&order.inventory_log_id)
        .bind(order.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Fetches an order by id.
    pub async fn get(&self, id: &str) -> DbResult<Order> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        order.ok_or_else(|| DbError::not_found("order", id))
    }

    /// Fetches the order materializing an appointment, if any.
    pub async fn get_by_appointment<'e, E>(
        &self,
        executor: E,
        appointment_id: &str,
    ) -> DbResult<Option<Order>>
    where
        E: SqliteExecutor<'e>,
    {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE appointment_id = ?")
            .bind(appointment_id)
            .fetch_optional(executor)
            .await?;

        Ok(order)
    }

    /// Fetches the order materializing an inventory sale, if any.
    pub async fn get_by_inventory_log<'e, E>(
        &self,
        executor: E,
        inventory_log_id: &str,
    ) -> DbResult<Option<Order>>
    where
        E: SqliteExecutor<'e>,
    {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE inventory_log_id = ?")
            .bind(inventory_log_id)
            .fetch_optional(executor)
            .await?;

        Ok(order)
    }

    /// A member's ledger, newest first (by source event time).
    pub async fn list_for_member(&self, member_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE member_id = ? ORDER BY created_at DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Writes a referral payout record, on the caller's executor.
    pub async fn insert_fission<'e, E>(&self, executor: E, log: &FissionLog) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO fission_logs
                (id, inviter_id, invitee_id, commission_cents, appointment_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.inviter_id)
        .bind(&log.invitee_id)
        .bind(log.commission_cents)
        .bind(&log.appointment_id)
        .bind(log.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Payout history for an inviter, newest first.
    pub async fn fission_for_inviter(&self, inviter_id: &str) -> DbResult<Vec<FissionLog>> {
        let logs = sqlx::query_as::<_, FissionLog>(
            "SELECT * FROM fission_logs WHERE inviter_id = ? ORDER BY created_at DESC",
        )
        .bind(inviter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Total row count, for reconciliation checks.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
