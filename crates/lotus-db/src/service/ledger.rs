//! # Order Ledger
//!
//! Idempotent materialization of revenue events into the `orders` table.
//!
//! ## Idempotency Protocol
//! ```text
//! 1. SELECT by source id        → found? return the existing row
//! 2. INSERT the new row         → ok? return it
//! 3. UNIQUE violation on the    → another writer won the race;
//!    source column                 SELECT the winner and return it
//! ```
//! Any other error propagates. The ledger never updates or deletes rows,
//! and `created_at` is pinned to the source event's time, not the insert
//! time, so replays of an old event do not reorder the ledger.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use lotus_core::money::Money;
use lotus_core::types::{AppointmentStatus, InventoryAction, Order, OrderKind};

use crate::error::{DbResult, ServiceError, ServiceResult};
use crate::pool::Database;
use crate::service::commission_for;

/// A reference to the revenue event an order should be created from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    /// A completed appointment, by id.
    Appointment(String),
    /// A sale-type inventory log, by id.
    InventorySale(String),
}

/// Input for materializing a completed appointment.
#[derive(Debug, Clone)]
pub struct ServiceOrderEvent {
    pub appointment_id: String,
    pub member_id: String,
    pub inviter_id: Option<String>,
    pub paid: Money,
    pub commission: Money,
    /// Completion time of the appointment; becomes the order's created_at.
    pub occurred_at: DateTime<Utc>,
}

/// Input for materializing an inventory sale.
#[derive(Debug, Clone)]
pub struct InventorySaleEvent {
    pub inventory_log_id: String,
    pub member_id: String,
    pub inviter_id: Option<String>,
    pub paid: Money,
    pub commission: Money,
    /// Time of the stock movement; becomes the order's created_at.
    pub occurred_at: DateTime<Utc>,
}

/// The append-only order ledger.
///
/// The `record_*` methods take a `&mut SqliteConnection` so they run
/// inside the caller's transaction; an order must commit or roll back
/// together with the settlement or stock movement that produced it.
/// [`OrderLedger::create`] is the standalone entry point that derives the
/// event from the source record itself.
#[derive(Debug, Clone)]
pub struct OrderLedger {
    db: Database,
}

impl OrderLedger {
    pub fn new(db: Database) -> Self {
        OrderLedger { db }
    }

    /// Creates the order for a source event, reading everything it needs
    /// from the source itself.
    ///
    /// The settlement and inventory workflows record their orders inline;
    /// this entry point serves retries and out-of-band order creation. It
    /// is idempotent: any number of calls for the same source, concurrent
    /// or not, leave exactly one order row.
    pub async fn create(&self, source: OrderSource) -> ServiceResult<Order> {
        let rate = self.db.settings().commission.referral_rate;
        let mut conn = self.db.pool().acquire().await?;

        match source {
            OrderSource::Appointment(appointment_id) => {
                let appointment = self
                    .db
                    .appointments()
                    .get_with(&mut *conn, &appointment_id)
                    .await?;
                if appointment.status != AppointmentStatus::Completed {
                    return Err(ServiceError::InvalidOrderSource {
                        reason: format!(
                            "appointment {appointment_id} is {:?}, not completed",
                            appointment.status
                        ),
                    });
                }

                let member = self
                    .db
                    .members()
                    .get_with(&mut *conn, &appointment.member_id)
                    .await?;
                let paid = appointment.actual_price();
                let commission = match &member.referrer_id {
                    Some(_) => commission_for(paid, rate).map_err(ServiceError::Core)?,
                    None => Money::zero(),
                };

                let order = self
                    .record_service_order(
                        &mut conn,
                        ServiceOrderEvent {
                            appointment_id,
                            member_id: member.id,
                            inviter_id: member.referrer_id,
                            paid,
                            commission,
                            occurred_at: appointment.updated_at,
                        },
                    )
                    .await?;
                Ok(order)
            }

            OrderSource::InventorySale(log_id) => {
                let log = self
                    .db
                    .inventory_logs()
                    .get_with(&mut *conn, &log_id)
                    .await?;
                if log.action != InventoryAction::Sale || log.change_amount >= 0 {
                    return Err(ServiceError::InvalidOrderSource {
                        reason: format!("inventory log {log_id} is not a sale"),
                    });
                }
                let member_id = log.member_id.clone().ok_or_else(|| {
                    ServiceError::InvalidOrderSource {
                        reason: format!("inventory log {log_id} has no member"),
                    }
                })?;

                let member = self.db.members().get_with(&mut *conn, &member_id).await?;
                let paid = match log.sale_amount_cents {
                    Some(cents) => Money::from_cents(cents),
                    None => {
                        let product = self
                            .db
                            .catalog()
                            .get_product_with(&mut *conn, &log.product_id)
                            .await?;
                        Money::from_cents(product.retail_price_cents * -log.change_amount)
                    }
                };
                let commission = match &member.referrer_id {
                    Some(_) => commission_for(paid, rate).map_err(ServiceError::Core)?,
                    None => Money::zero(),
                };

                let order = self
                    .record_inventory_sale(
                        &mut conn,
                        InventorySaleEvent {
                            inventory_log_id: log_id,
                            member_id,
                            inviter_id: member.referrer_id,
                            paid,
                            commission,
                            occurred_at: log.created_at,
                        },
                    )
                    .await?;
                Ok(order)
            }
        }
    }

    /// Materializes a completed appointment. Safe to call any number of
    /// times for the same appointment; exactly one row ever exists.
    pub async fn record_service_order(
        &self,
        conn: &mut SqliteConnection,
        event: ServiceOrderEvent,
    ) -> DbResult<Order> {
        let orders = self.db.orders();

        if let Some(existing) = orders
            .get_by_appointment(&mut *conn, &event.appointment_id)
            .await?
        {
            debug!(order_id = %existing.id, "Service order already materialized");
            return Ok(existing);
        }

        let order = Order {
            id: Uuid::new_v4().to_string(),
            member_id: event.member_id,
            inviter_id: event.inviter_id,
            paid_cents: event.paid.cents(),
            commission_cents: event.commission.cents(),
            kind: OrderKind::Service,
            appointment_id: Some(event.appointment_id.clone()),
            inventory_log_id: None,
            created_at: event.occurred_at,
        };

        match orders.insert(&mut *conn, &order).await {
            Ok(()) => Ok(order),
            Err(err) if err.is_unique_violation_on("appointment_id") => {
                // Lost the race; the winner's row is the order of record.
                orders
                    .get_by_appointment(&mut *conn, &event.appointment_id)
                    .await?
                    .ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Materializes an inventory sale, with the same idempotency protocol
    /// keyed on the inventory log id.
    pub async fn record_inventory_sale(
        &self,
        conn: &mut SqliteConnection,
        event: InventorySaleEvent,
    ) -> DbResult<Order> {
        let orders = self.db.orders();

        if let Some(existing) = orders
            .get_by_inventory_log(&mut *conn, &event.inventory_log_id)
            .await?
        {
            debug!(order_id = %existing.id, "Inventory sale already materialized");
            return Ok(existing);
        }

        let order = Order {
            id: Uuid::new_v4().to_string(),
            member_id: event.member_id,
            inviter_id: event.inviter_id,
            paid_cents: event.paid.cents(),
            commission_cents: event.commission.cents(),
            kind: OrderKind::Physical,
            appointment_id: None,
            inventory_log_id: Some(event.inventory_log_id.clone()),
            created_at: event.occurred_at,
        };

        match orders.insert(&mut *conn, &order).await {
            Ok(()) => Ok(order),
            Err(err) if err.is_unique_violation_on("inventory_log_id") => {
                orders
                    .get_by_inventory_log(&mut *conn, &event.inventory_log_id)
                    .await?
                    .ok_or(err)
            }
            Err(err) => Err(err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::service::booking::BookingRequest;
    use crate::service::settlement::SettlementRequest;
    use chrono::NaiveDate;

    struct Fixture {
        db: Database,
        member_id: String,
        technician_id: String,
        service_id: String,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = db.catalog().create_service("Massage", 60, 8800).await.unwrap();
        let technician = db
            .technicians()
            .create("Wang Fang", &[service.id.clone()])
            .await
            .unwrap();
        let referrer = db
            .members()
            .create("Liu Yang", "13900139000", None)
            .await
            .unwrap();
        let member = db
            .members()
            .create("Chen Wei", "13800138000", Some(&referrer.id))
            .await
            .unwrap();

        Fixture {
            db,
            member_id: member.id,
            technician_id: technician.id,
            service_id: service.id,
        }
    }

    fn start() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
            .and_utc()
    }

    async fn booked(f: &Fixture) -> String {
        f.db.booking()
            .book(BookingRequest {
                member_id: f.member_id.clone(),
                technician_id: f.technician_id.clone(),
                service_id: f.service_id.clone(),
                start_time: start(),
                join_waitlist: false,
            })
            .await
            .unwrap()
            .id
    }

    async fn settled(f: &Fixture) -> String {
        let id = booked(f).await;
        f.db.settlement()
            .settle(SettlementRequest {
                appointment_id: id.clone(),
                paid_balance: Money::zero(),
                paid_cash: Money::from_cents(8800),
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_create_returns_settlement_order() {
        let f = fixture().await;
        let appointment_id = settled(&f).await;

        // settlement already materialized the order; create finds it
        let order = f
            .db
            .order_ledger()
            .create(OrderSource::Appointment(appointment_id.clone()))
            .await
            .unwrap();
        assert_eq!(order.appointment_id.as_deref(), Some(appointment_id.as_str()));
        assert_eq!(order.paid_cents, 8800);
        assert_eq!(order.commission_cents, 880);
        assert_eq!(f.db.orders().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_pending_appointment() {
        let f = fixture().await;
        let appointment_id = booked(&f).await;

        let result = f
            .db
            .order_ledger()
            .create(OrderSource::Appointment(appointment_id))
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidOrderSource { .. })));
        assert_eq!(f.db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_returns_existing_inventory_sale_order() {
        let f = fixture().await;
        let product = f
            .db
            .catalog()
            .create_product("Jasmine Oil", Money::from_cents(12_800), 5)
            .await
            .unwrap();
        let outcome = f
            .db
            .inventory()
            .record_change(crate::service::inventory::StockChangeRequest {
                product_id: product.id.clone(),
                action: InventoryAction::Sale,
                change: -1,
                member_id: Some(f.member_id.clone()),
                sale_amount: None,
                remark: None,
            })
            .await
            .unwrap();
        let recorded = outcome.order.unwrap();

        // the single pooled test connection must serve every read here
        let order = f
            .db
            .order_ledger()
            .create(OrderSource::InventorySale(outcome.log.id.clone()))
            .await
            .unwrap();
        assert_eq!(order.id, recorded.id);
        assert_eq!(order.paid_cents, 12_800);
        assert_eq!(f.db.orders().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_non_sale_inventory_log() {
        let f = fixture().await;
        let product = f
            .db
            .catalog()
            .create_product("Jasmine Oil", Money::from_cents(12_800), 5)
            .await
            .unwrap();
        let outcome = f
            .db
            .inventory()
            .record_change(crate::service::inventory::StockChangeRequest {
                product_id: product.id.clone(),
                action: InventoryAction::Restock,
                change: 10,
                member_id: None,
                sale_amount: None,
                remark: None,
            })
            .await
            .unwrap();

        let result = f
            .db
            .order_ledger()
            .create(OrderSource::InventorySale(outcome.log.id))
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidOrderSource { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_creates_converge_to_one_order() {
        let f = fixture().await;
        let appointment_id = settled(&f).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let db = f.db.clone();
            let id = appointment_id.clone();
            handles.push(tokio::spawn(async move {
                db.order_ledger().create(OrderSource::Appointment(id)).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(f.db.orders().count().await.unwrap(), 1);
    }
}
