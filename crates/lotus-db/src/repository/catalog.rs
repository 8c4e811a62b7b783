//! # Catalog Repository
//!
//! Service items (bookable) and physical products (retail stock).
//! Stock mutations happen through the inventory service; this repository
//! only exposes the executor-bound `set_stock` it needs.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use lotus_core::money::Money;
use lotus_core::types::{PhysicalProduct, ServiceItem};
use lotus_core::validation::{validate_duration_minutes, validate_name, validate_price_cents};

use crate::error::{DbError, DbResult};

/// Repository for the service and product catalog.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Service Items
    // -------------------------------------------------------------------------

    /// Creates a bookable service item.
    pub async fn create_service(
        &self,
        name: &str,
        duration_minutes: i64,
        price_cents: i64,
    ) -> DbResult<ServiceItem> {
        validate_name(name).map_err(|e| DbError::InvalidInput(e.to_string()))?;
        validate_duration_minutes(duration_minutes)
            .map_err(|e| DbError::InvalidInput(e.to_string()))?;
        validate_price_cents(price_cents).map_err(|e| DbError::InvalidInput(e.to_string()))?;

        let service = ServiceItem {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            duration_minutes,
            price_cents,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO service_items
                (id, name, duration_minutes, price_cents, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(service.duration_minutes)
        .bind(service.price_cents)
        .bind(service.is_active)
        .bind(service.created_at)
        .bind(service.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(service)
    }

    /// Fetches a service item by id.
    pub async fn get_service(&self, id: &str) -> DbResult<ServiceItem> {
        let service =
            sqlx::query_as::<_, ServiceItem>("SELECT * FROM service_items WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        service.ok_or_else(|| DbError::not_found("service item", id))
    }

    /// Lists service items; `active_only` hides retired ones.
    pub async fn list_services(&self, active_only: bool) -> DbResult<Vec<ServiceItem>> {
        let sql = if active_only {
            "SELECT * FROM service_items WHERE is_active = 1 ORDER BY name"
        } else {
            "SELECT * FROM service_items ORDER BY name"
        };

        let services = sqlx::query_as::<_, ServiceItem>(sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(services)
    }

    /// Activates or retires a service item. Retiring does not touch
    /// existing appointments; it only stops new bookings.
    pub async fn set_service_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE service_items SET is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("service item", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Physical Products
    // -------------------------------------------------------------------------

    /// Creates a retail product with an initial stock level.
    pub async fn create_product(
        &self,
        name: &str,
        retail_price: Money,
        stock: i64,
    ) -> DbResult<PhysicalProduct> {
        validate_name(name).map_err(|e| DbError::InvalidInput(e.to_string()))?;
        validate_price_cents(retail_price.cents())
            .map_err(|e| DbError::InvalidInput(e.to_string()))?;
        if stock < 0 {
            return Err(DbError::InvalidInput("stock must not be negative".to_string()));
        }

        let product = PhysicalProduct {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            retail_price_cents: retail_price.cents(),
            stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO physical_products
                (id, name, retail_price_cents, stock, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.retail_price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Fetches a product by id.
    pub async fn get_product(&self, id: &str) -> DbResult<PhysicalProduct> {
        let product =
            sqlx::query_as::<_, PhysicalProduct>("SELECT * FROM physical_products WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        product.ok_or_else(|| DbError::not_found("product", id))
    }

    /// Fetches a product on the caller's executor. The inventory service
    /// re-reads stock inside its write transaction.
    pub async fn get_product_with<'e, E>(&self, executor: E, id: &str) -> DbResult<PhysicalProduct>
    where
        E: SqliteExecutor<'e>,
    {
        let product =
            sqlx::query_as::<_, PhysicalProduct>("SELECT * FROM physical_products WHERE id = ?")
                .bind(id)
                .fetch_optional(executor)
                .await?;

        product.ok_or_else(|| DbError::not_found("product", id))
    }

    /// Lists all products by name.
    pub async fn list_products(&self) -> DbResult<Vec<PhysicalProduct>> {
        let products =
            sqlx::query_as::<_, PhysicalProduct>("SELECT * FROM physical_products ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(products)
    }

    /// Sets the absolute stock level on the caller's executor.
    pub async fn set_stock<'e, E>(&self, executor: E, id: &str, stock: i64) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE physical_products SET stock = ?, updated_at = ? WHERE id = ?",
        )
        .bind(stock)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("product", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_service_lifecycle() {
        let db = test_db().await;
        let svc = db
            .catalog()
            .create_service("Aromatherapy", 60, 9900)
            .await
            .unwrap();
        assert!(svc.is_active);
        assert_eq!(svc.price().cents(), 9900);

        db.catalog().set_service_active(&svc.id, false).await.unwrap();

        let active = db.catalog().list_services(true).await.unwrap();
        assert!(active.is_empty());
        let all = db.catalog().list_services(false).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_service_validation() {
        let db = test_db().await;
        assert!(db.catalog().create_service("", 60, 9900).await.is_err());
        assert!(db.catalog().create_service("Facial", 0, 9900).await.is_err());
        assert!(db.catalog().create_service("Facial", 60, -1).await.is_err());
    }

    #[tokio::test]
    async fn test_product_stock() {
        let db = test_db().await;
        let product = db
            .catalog()
            .create_product("Jasmine Oil", Money::from_cents(12_800), 10)
            .await
            .unwrap();

        db.catalog().set_stock(db.pool(), &product.id, 7).await.unwrap();
        let fetched = db.catalog().get_product(&product.id).await.unwrap();
        assert_eq!(fetched.stock, 7);
    }
}
