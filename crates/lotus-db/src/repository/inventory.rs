//! # Inventory Log Repository
//!
//! Append-only stock movement records. Rows are written inside the
//! inventory service's transaction, alongside the stock update they
//! describe, so `stock_before`/`stock_after` are always consistent.

use sqlx::{SqliteExecutor, SqlitePool};

use lotus_core::types::InventoryLog;

use crate::error::{DbError, DbResult};

/// Repository for inventory log operations.
#[derive(Debug, Clone)]
pub struct InventoryLogRepository {
    pool: SqlitePool,
}

impl InventoryLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLogRepository { pool }
    }

    /// Inserts a log row on the caller's executor.
    pub async fn insert<'e, E>(&self, executor: E, log: &InventoryLog) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO inventory_logs
                (id, product_id, action, change_amount, stock_before, stock_after,
                 member_id, sale_amount_cents, remark, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.product_id)
        .bind(log.action)
        .bind(log.change_amount)
        .bind(log.stock_before)
        .bind(log.stock_after)
        .bind(&log.member_id)
        .bind(log.sale_amount_cents)
        .bind(&log.remark)
        .bind(log.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Fetches a log row by id.
    pub async fn get(&self, id: &str) -> DbResult<InventoryLog> {
        self.get_with(&self.pool, id).await
    }

    /// Fetches a log row on the caller's executor.
    pub async fn get_with<'e, E>(&self, executor: E, id: &str) -> DbResult<InventoryLog>
    where
        E: SqliteExecutor<'e>,
    {
        let log = sqlx::query_as::<_, InventoryLog>("SELECT * FROM inventory_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        log.ok_or_else(|| DbError::not_found("inventory log", id))
    }

    /// Movement history for a product, newest first.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<InventoryLog>> {
        let logs = sqlx::query_as::<_, InventoryLog>(
            "SELECT * FROM inventory_logs WHERE product_id = ? ORDER BY created_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}
