//! # Inventory Service
//!
//! Stock movements for physical products. A counter sale to a member is
//! a revenue event: the stock update, the movement log, the commission
//! and the ledger order all commit together or not at all.
//!
//! Insufficient stock aborts before anything is written; stock never
//! goes negative.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use lotus_core::money::Money;
use lotus_core::types::{FissionLog, InventoryAction, InventoryLog, Order};
use lotus_core::validation::validate_inventory_change;

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::pool::Database;
use crate::service::commission_for;
use crate::service::ledger::{InventorySaleEvent, OrderLedger};

/// A stock movement request.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StockChangeRequest {
    pub product_id: String,
    pub action: InventoryAction,
    /// Signed quantity delta: negative for sales, positive for restocks.
    pub change: i64,
    /// Buying member; required for a sale to produce a ledger order.
    pub member_id: Option<String>,
    /// Explicit sale total. When absent, a sale falls back to
    /// `-change × retail price`.
    pub sale_amount: Option<Money>,
    pub remark: Option<String>,
}

/// What a stock movement produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StockChangeOutcome {
    pub log: InventoryLog,
    /// Present only for member sales.
    pub order: Option<Order>,
}

/// Stock movement workflows.
#[derive(Debug, Clone)]
pub struct InventoryService {
    db: Database,
}

impl InventoryService {
    pub fn new(db: Database) -> Self {
        InventoryService { db }
    }

    /// Applies a stock change and, for member sales, materializes the
    /// revenue in the order ledger.
    pub async fn record_change(
        &self,
        request: StockChangeRequest,
    ) -> ServiceResult<StockChangeOutcome> {
        validate_inventory_change(request.action, request.change)?;
        if let Some(amount) = request.sale_amount {
            if amount.is_negative() {
                return Err(ServiceError::Db(DbError::InvalidInput(
                    "sale amount must not be negative".to_string(),
                )));
            }
        }

        let member = match &request.member_id {
            Some(id) => Some(self.db.members().get(id).await?),
            None => None,
        };

        let catalog = self.db.catalog();
        let ledger = OrderLedger::new(self.db.clone());
        let occurred_at = Utc::now();

        let mut tx = self.db.pool().begin().await?;

        // Stock as of this transaction, not the pre-check snapshot.
        let product = catalog.get_product_with(&mut *tx, &request.product_id).await?;
        let stock_after = product.stock + request.change;
        if stock_after < 0 {
            return Err(ServiceError::InsufficientStock {
                product_id: request.product_id.clone(),
                available: product.stock,
                requested: -request.change,
            });
        }

        catalog.set_stock(&mut *tx, &product.id, stock_after).await?;

        let log = InventoryLog {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            action: request.action,
            change_amount: request.change,
            stock_before: product.stock,
            stock_after,
            member_id: request.member_id.clone(),
            sale_amount_cents: request.sale_amount.map(|m| m.cents()),
            remark: request.remark.clone(),
            created_at: occurred_at,
        };
        self.db.inventory_logs().insert(&mut *tx, &log).await?;

        let mut order = None;
        if request.action == InventoryAction::Sale {
            if let Some(member) = &member {
                let paid = request.sale_amount.unwrap_or_else(|| {
                    Money::from_cents(product.retail_price_cents * -request.change)
                });

                let mut commission = Money::zero();
                if let Some(inviter_id) = &member.referrer_id {
                    commission =
                        commission_for(paid, self.db.settings().commission.referral_rate)
                            .map_err(ServiceError::Core)?;

                    if commission.is_positive() {
                        let fission = FissionLog {
                            id: Uuid::new_v4().to_string(),
                            inviter_id: inviter_id.clone(),
                            invitee_id: member.id.clone(),
                            commission_cents: commission.cents(),
                            appointment_id: None,
                            created_at: occurred_at,
                        };
                        self.db.orders().insert_fission(&mut *tx, &fission).await?;

                        // Same arithmetic cross-check as settlement: the
                        // inviter's balance must move by exactly the
                        // commission.
                        let members = self.db.members();
                        let before = members.get_with(&mut *tx, inviter_id).await?.balance();
                        members.credit_balance(&mut *tx, inviter_id, commission).await?;
                        let after = members.get_with(&mut *tx, inviter_id).await?.balance();
                        if after - before != commission {
                            return Err(ServiceError::BalanceDeltaMismatch {
                                inviter_id: inviter_id.clone(),
                                expected: commission,
                                actual: after - before,
                            });
                        }
                    }
                }

                order = Some(
                    ledger
                        .record_inventory_sale(
                            &mut tx,
                            InventorySaleEvent {
                                inventory_log_id: log.id.clone(),
                                member_id: member.id.clone(),
                                inviter_id: member.referrer_id.clone(),
                                paid,
                                commission,
                                occurred_at,
                            },
                        )
                        .await?,
                );
            }
        }

        tx.commit().await?;

        info!(
            product_id = %product.id,
            action = ?request.action,
            change = request.change,
            stock_after,
            order = order.is_some(),
            "Stock change recorded"
        );

        Ok(StockChangeOutcome { log, order })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
