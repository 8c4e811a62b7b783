//! # Service Module
//!
//! Transactional workflows built on top of the repositories.
//!
//! ```text
//! AvailabilityService   read-only: partitioning, slot grids
//! BookingService        book / cancel / waitlist / technician removal
//! SettlementEngine      completion, payment, tier, commission
//! OrderLedger           idempotent materialization of revenue events
//! InventoryService      stock movements and counter sales
//! ```
//!
//! Each mutating workflow owns exactly one transaction and threads its
//! `&mut *tx` through the repository methods it calls; nothing commits
//! halfway. Read-only pre-checks run on the pool and are re-verified
//! inside the transaction where they guard a write.

use lotus_core::error::CoreError;
use lotus_core::money::{Money, Rate};

pub mod availability;
pub mod booking;
pub mod inventory;
pub mod ledger;
pub mod settlement;

/// Computes the referral commission for a paid amount, enforcing the
/// ledger invariant `0 ≤ commission ≤ paid`.
///
/// A violation aborts the caller's transaction; commissions are never
/// clamped into range, because an out-of-range value means the rate
/// configuration or arithmetic is broken.
pub(crate) fn commission_for(paid: Money, rate: Rate) -> Result<Money, CoreError> {
    let commission = paid.apply_rate(rate);

    if commission.is_negative() || commission > paid {
        return Err(CoreError::CommissionOutOfBounds { commission, paid });
    }

    Ok(commission)
}
