//! # Settlement Engine
//!
//! Completes an appointment and applies every financial consequence in
//! one transaction.
//!
//! ## Settlement Transaction
//! ```text
//! BEGIN
//!  1. re-read appointment     (must still be pending)
//!  2. re-read member          (balance check against tx-local state)
//!  3. mark completed + record payment split
//!  4. debit balance, accumulate spend, upgrade tier (never downgrade)
//!  5. referral commission     (fission log + inviter credit, if positive)
//!  6. materialize the order   (idempotent, created_at = completion time)
//! COMMIT
//! ```
//! Settling an already-completed appointment returns the recorded outcome
//! unchanged instead of failing, so retried requests are harmless.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use lotus_core::types::{Appointment, AppointmentStatus, FissionLog, Member, MemberTier, Order};
use lotus_core::money::Money;
use lotus_core::validation::validate_payment_split;

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::pool::Database;
use crate::service::booking::BookingService;
use crate::service::commission_for;
use crate::service::ledger::{OrderLedger, ServiceOrderEvent};

/// A settlement request: the declared balance/cash split.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SettlementRequest {
    pub appointment_id: String,
    pub paid_balance: Money,
    pub paid_cash: Money,
}

/// What a settlement produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SettlementOutcome {
    pub appointment: Appointment,
    pub member: Member,
    pub order: Order,
    /// Commission credited to the member's referrer (zero when there is
    /// no referrer or the computed amount rounds to zero).
    pub commission: Money,
}

/// Appointment completion and payment.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    db: Database,
}

impl SettlementEngine {
    pub fn new(db: Database) -> Self {
        SettlementEngine { db }
    }

    /// Settles a pending appointment.
    pub async fn settle(&self, request: SettlementRequest) -> ServiceResult<SettlementOutcome> {
        let appointments = self.db.appointments();
        let members = self.db.members();
        let ledger = OrderLedger::new(self.db.clone());

        let completed_at = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        // 1. Appointment state, as of this transaction.
        let appointment = appointments
            .get_with(&mut *tx, &request.appointment_id)
            .await?;

        match appointment.status {
            AppointmentStatus::Pending => {}
            AppointmentStatus::Completed => {
                // A previous settlement won; return what it recorded.
                drop(tx);
                return self.recorded_outcome(&appointment.id).await;
            }
            status => {
                return Err(ServiceError::InvalidStatus {
                    appointment_id: request.appointment_id.clone(),
                    status,
                })
            }
        }

        let price = appointment.actual_price();
        let method = validate_payment_split(price, request.paid_balance, request.paid_cash)?;

        // 2. Member state, same transaction.
        let member = members.get_with(&mut *tx, &appointment.member_id).await?;
        if request.paid_balance > member.balance() {
            return Err(ServiceError::InsufficientBalance {
                required: request.paid_balance,
                available: member.balance(),
            });
        }

        // 3. Completion + payment split.
        appointments
            .apply_settlement(
                &mut *tx,
                &appointment.id,
                method,
                request.paid_balance,
                request.paid_cash,
            )
            .await?;

        // 4. Balance, spend and tier. The tier only ever moves up.
        let new_balance = member.balance() - request.paid_balance;
        let new_spend = member.yearly_spend() + price;
        let derived = MemberTier::for_spend(new_spend, &self.db.settings().tiers);
        let new_tier = if derived.rank() > member.tier.rank() {
            derived
        } else {
            member.tier
        };

        members
            .apply_settlement(&mut *tx, &member.id, new_balance, new_spend, new_tier)
            .await?;

        // 5. Referral commission.
        let mut commission = Money::zero();
        if let Some(inviter_id) = &member.referrer_id {
            commission = commission_for(price, self.db.settings().commission.referral_rate)
                .map_err(ServiceError::Core)?;

            if commission.is_positive() {
                let fission = FissionLog {
                    id: Uuid::new_v4().to_string(),
                    inviter_id: inviter_id.clone(),
                    invitee_id: member.id.clone(),
                    commission_cents: commission.cents(),
                    appointment_id: Some(appointment.id.clone()),
                    created_at: completed_at,
                };
                self.db.orders().insert_fission(&mut *tx, &fission).await?;

                // Cross-check the credit arithmetically: re-read the
                // inviter and require the balance to have moved by exactly
                // the commission.
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

        // 6. The order of record.
        let order = ledger
            .record_service_order(
                &mut tx,
                ServiceOrderEvent {
                    appointment_id: appointment.id.clone(),
                    member_id: member.id.clone(),
                    inviter_id: member.referrer_id.clone(),
                    paid: price,
                    commission,
                    occurred_at: completed_at,
                },
            )
            .await?;

        tx.commit().await?;

        info!(
            appointment_id = %appointment.id,
            member_id = %member.id,
            paid = %price,
            commission = %commission,
            new_tier = ?new_tier,
            "Appointment settled"
        );

        // Completion freed the window for the waitlist.
        let booking = BookingService::new(self.db.clone());
        if let Err(err) = booking.reconcile_waitlist(&appointment.technician_id).await {
            warn!(
                technician_id = %appointment.technician_id,
                error = %err,
                "Waitlist reconciliation failed after settlement"
            );
        }

        let appointment = appointments.get(&appointment.id).await?;
        let member = members.get(&member.id).await?;

        Ok(SettlementOutcome {
            appointment,
            member,
            order,
            commission,
        })
    }

    /// Outcome of a settlement that already happened, reconstructed from
    /// the ledger.
    async fn recorded_outcome(&self, appointment_id: &str) -> ServiceResult<SettlementOutcome> {
        let appointment = self.db.appointments().get(appointment_id).await?;
        let order = self
            .db
            .orders()
            .get_by_appointment(self.db.pool(), appointment_id)
            .await?
            .ok_or_else(|| {
                ServiceError::Db(DbError::not_found("order for appointment", appointment_id))
            })?;
        let member = self.db.members().get(&appointment.member_id).await?;
        let commission = order.commission();

        Ok(SettlementOutcome {
            appointment,
            member,
            order,
            commission,
        })
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
    use chrono::{DateTime, NaiveDate};
    use lotus_core::types::{OrderKind, PaymentMethod};

    struct Fixture {
        db: Database,
        member_id: String,
        technician_id: String,
        service_id: String,
    }

    async fn fixture() -> Fixture {
        fixture_with_referrer(false).await
    }

    async fn fixture_with_referrer(referred: bool) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = db.catalog().create_service("Massage", 60, 8800).await.unwrap();
        let technician = db
            .technicians()
            .create("Wang Fang", &[service.id.clone()])
            .await
            .unwrap();

        let referrer_id = if referred {
            let referrer = db
                .members()
                .create("Liu Yang", "13900139000", None)
                .await
                .unwrap();
            Some(referrer.id)
        } else {
            None
        };

        let member = db
            .members()
            .create("Chen Wei", "13800138000", referrer_id.as_deref())
            .await
            .unwrap();

        Fixture {
            db,
            member_id: member.id,
            technician_id: technician.id,
            service_id: service.id,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    async fn book(f: &Fixture, start: DateTime<Utc>, join_waitlist: bool) -> Appointment {
        f.db.booking()
            .book(BookingRequest {
                member_id: f.member_id.clone(),
                technician_id: f.technician_id.clone(),
                service_id: f.service_id.clone(),
                start_time: start,
                join_waitlist,
            })
            .await
            .unwrap()
    }

    async fn top_up(f: &Fixture, cents: i64) {
        f.db.members()
            .credit_balance(f.db.pool(), &f.member_id, Money::from_cents(cents))
            .await
            .unwrap();
    }

    fn settle_request(id: &str, balance: i64, cash: i64) -> SettlementRequest {
        SettlementRequest {
            appointment_id: id.to_string(),
            paid_balance: Money::from_cents(balance),
            paid_cash: Money::from_cents(cash),
        }
    }

    #[tokio::test]
    async fn test_balance_settlement() {
        let f = fixture().await;
        top_up(&f, 20_000).await;
        let appointment = book(&f, at(14, 0), false).await;

        let outcome = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 8800, 0))
            .await
            .unwrap();

        assert_eq!(outcome.appointment.status, AppointmentStatus::Completed);
        assert_eq!(outcome.appointment.payment_method, Some(PaymentMethod::Balance));
        assert_eq!(outcome.member.balance_cents, 20_000 - 8800);
        assert_eq!(outcome.member.yearly_spend_cents, 8800);
        assert_eq!(outcome.order.paid_cents, 8800);
        assert_eq!(outcome.order.kind, OrderKind::Service);
        assert_eq!(outcome.order.appointment_id.as_deref(), Some(appointment.id.as_str()));
    }

    #[tokio::test]
    async fn test_mixed_settlement_and_epsilon() {
        let f = fixture().await;
        top_up(&f, 5_000).await;
        let appointment = book(&f, at(14, 0), false).await;

        // one cent short of 88.00 is within tolerance
        let outcome = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 5_000, 3_799))
            .await
            .unwrap();

        assert_eq!(outcome.appointment.payment_method, Some(PaymentMethod::Mixed));
        assert_eq!(outcome.appointment.paid_balance_cents, Some(5_000));
        assert_eq!(outcome.appointment.paid_cash_cents, Some(3_799));
    }

    #[tokio::test]
    async fn test_split_mismatch_rejected() {
        let f = fixture().await;
        top_up(&f, 20_000).await;
        let appointment = book(&f, at(14, 0), false).await;

        // two cents off
        let result = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 8798, 0))
            .await;
        assert!(result.is_err());

        // nothing changed
        let unchanged = f.db.appointments().get(&appointment.id).await.unwrap();
        assert_eq!(unchanged.status, AppointmentStatus::Pending);
        let member = f.db.members().get(&f.member_id).await.unwrap();
        assert_eq!(member.balance_cents, 20_000);
    }

    #[tokio::test]
    async fn test_insufficient_balance_aborts() {
        let f = fixture().await;
        top_up(&f, 1_000).await;
        let appointment = book(&f, at(14, 0), false).await;

        let result = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 8800, 0))
            .await;
        assert!(matches!(result, Err(ServiceError::InsufficientBalance { .. })));

        let unchanged = f.db.appointments().get(&appointment.id).await.unwrap();
        assert_eq!(unchanged.status, AppointmentStatus::Pending);
        assert_eq!(f.db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settle_non_pending_rejected() {
        let f = fixture().await;
        book(&f, at(14, 0), false).await;
        let waiting = book(&f, at(14, 0), true).await;

        let result = f
            .db
            .settlement()
            .settle(settle_request(&waiting.id, 0, 8800))
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_referral_commission() {
        let f = fixture_with_referrer(true).await;
        let appointment = book(&f, at(14, 0), false).await;

        // cash settle: 88.00 at the default 10% rate pays 8.80
        let outcome = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 0, 8800))
            .await
            .unwrap();

        assert_eq!(outcome.commission.cents(), 880);
        assert_eq!(outcome.order.commission_cents, 880);

        let member = f.db.members().get(&f.member_id).await.unwrap();
        let inviter_id = member.referrer_id.clone().unwrap();
        let inviter = f.db.members().get(&inviter_id).await.unwrap();
        assert_eq!(inviter.balance_cents, 880);

        let payouts = f.db.orders().fission_for_inviter(&inviter_id).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].commission_cents, 880);
        assert_eq!(payouts[0].appointment_id.as_deref(), Some(appointment.id.as_str()));
    }

    #[tokio::test]
    async fn test_no_commission_without_referrer() {
        let f = fixture().await;
        let appointment = book(&f, at(14, 0), false).await;

        let outcome = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 0, 8800))
            .await
            .unwrap();

        assert!(outcome.commission.is_zero());
        assert_eq!(outcome.order.commission_cents, 0);
        assert!(outcome.order.inviter_id.is_none());
    }

    #[tokio::test]
    async fn test_tier_upgrade_is_strict_and_monotonic() {
        let f = fixture().await;

        // 100 sessions at 10.00 land exactly on the silver threshold
        let svc = f.db.catalog().create_service("Quick Rinse", 30, 1_000).await.unwrap();
        f.db.technicians()
            .update_skills(&f.technician_id, &[f.service_id.clone(), svc.id.clone()])
            .await
            .unwrap();

        let mut start = at(10, 0);
        for _ in 0..100 {
            let appointment = f
                .db
                .booking()
                .book(BookingRequest {
                    member_id: f.member_id.clone(),
                    technician_id: f.technician_id.clone(),
                    service_id: svc.id.clone(),
                    start_time: start,
                    join_waitlist: false,
                })
                .await
                .unwrap();
            f.db.settlement()
                .settle(settle_request(&appointment.id, 0, 1_000))
                .await
                .unwrap();
            start += chrono::Duration::minutes(30);
            if start.time() >= chrono::NaiveTime::from_hms_opt(21, 30, 0).unwrap() {
                start = (start + chrono::Duration::days(1))
                    .date_naive()
                    .and_hms_opt(10, 0, 0)
                    .unwrap()
                    .and_utc();
            }
        }

        // spend == 1000.00 exactly: still basic (threshold is strict)
        let member = f.db.members().get(&f.member_id).await.unwrap();
        assert_eq!(member.yearly_spend_cents, 100_000);
        assert_eq!(member.tier, MemberTier::Basic);

        // one more cent of spend crosses it
        let appointment = f
            .db
            .booking()
            .book(BookingRequest {
                member_id: f.member_id.clone(),
                technician_id: f.technician_id.clone(),
                service_id: svc.id.clone(),
                start_time: start,
                join_waitlist: false,
            })
            .await
            .unwrap();
        f.db.settlement()
            .settle(settle_request(&appointment.id, 0, 1_000))
            .await
            .unwrap();

        let member = f.db.members().get(&f.member_id).await.unwrap();
        assert_eq!(member.tier, MemberTier::Silver);
    }

    #[tokio::test]
    async fn test_double_settle_is_idempotent() {
        let f = fixture().await;
        top_up(&f, 20_000).await;
        let appointment = book(&f, at(14, 0), false).await;

        let first = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 8800, 0))
            .await
            .unwrap();
        let second = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 8800, 0))
            .await
            .unwrap();

        assert_eq!(first.order.id, second.order.id);
        assert_eq!(f.db.orders().count().await.unwrap(), 1);

        // the balance was debited exactly once
        let member = f.db.members().get(&f.member_id).await.unwrap();
        assert_eq!(member.balance_cents, 20_000 - 8800);
    }

    #[tokio::test]
    async fn test_concurrent_settles_produce_one_order() {
        let f = fixture().await;
        top_up(&f, 20_000).await;
        let appointment = book(&f, at(14, 0), false).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let db = f.db.clone();
            let id = appointment.id.clone();
            handles.push(tokio::spawn(async move {
                db.settlement().settle(settle_request(&id, 8800, 0)).await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(f.db.orders().count().await.unwrap(), 1);
        let member = f.db.members().get(&f.member_id).await.unwrap();
        assert_eq!(member.balance_cents, 20_000 - 8800);
        assert_eq!(member.yearly_spend_cents, 8800);
    }

    #[tokio::test]
    async fn test_settlement_frees_slot_for_waitlist() {
        let f = fixture().await;
        let holder = book(&f, at(14, 0), false).await;
        let waiter = book(&f, at(14, 0), true).await;

        f.db.settlement()
            .settle(settle_request(&holder.id, 0, 8800))
            .await
            .unwrap();

        let promoted = f.db.appointments().get(&waiter.id).await.unwrap();
        assert_eq!(promoted.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_discounted_price_settles_at_actual() {
        let f = fixture().await;
        let appointment = book(&f, at(14, 0), false).await;
        f.db.appointments()
            .set_actual_price(&appointment.id, Money::from_cents(8000))
            .await
            .unwrap();

        let outcome = f
            .db
            .settlement()
            .settle(settle_request(&appointment.id, 0, 8000))
            .await
            .unwrap();

        assert_eq!(outcome.order.paid_cents, 8000);
        let member = f.db.members().get(&f.member_id).await.unwrap();
        assert_eq!(member.yearly_spend_cents, 8000);
    }
}

