//! # Business Configuration
//!
//! Shared business settings: operating hours, the referral commission rate
//! and member tier thresholds. Services receive a [`Settings`] value at
//! construction (explicit dependency injection - no ambient globals), so
//! tests can run with custom hours or rates without touching process state.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, Rate};

// =============================================================================
// Business Hours
// =============================================================================

/// The single configured business-hours window used by slot-grid generation.
///
/// Multi-location / multi-timezone operation is out of scope; all times are
/// interpreted as UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    /// Opening time of day.
    pub open: NaiveTime,
    /// Closing time of day. A slot whose service would end after this is
    /// not bookable.
    pub close: NaiveTime,
    /// Slot grid interval in minutes.
    pub slot_minutes: i64,
}

impl BusinessHours {
    pub fn new(open: NaiveTime, close: NaiveTime, slot_minutes: i64) -> Self {
        BusinessHours {
            open,
            close,
            slot_minutes,
        }
    }

    /// Opening instant on the given date.
    pub fn open_on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.open).and_utc()
    }

    /// Closing instant on the given date.
    pub fn close_on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.close).and_utc()
    }

    /// Slot interval as a chrono duration.
    pub fn slot_interval(&self) -> Duration {
        Duration::minutes(self.slot_minutes)
    }
}

impl Default for BusinessHours {
    /// 10:00 - 22:00, 30-minute slots.
    fn default() -> Self {
        BusinessHours {
            open: NaiveTime::from_hms_opt(10, 0, 0).expect("static opening time"),
            close: NaiveTime::from_hms_opt(22, 0, 0).expect("static closing time"),
            slot_minutes: 30,
        }
    }
}

// =============================================================================
// Commission
// =============================================================================

/// Referral commission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    /// Fraction of the paid amount credited to the payer's referrer.
    pub referral_rate: Rate,
}

impl Default for CommissionConfig {
    /// 10% referral commission.
    fn default() -> Self {
        CommissionConfig {
            referral_rate: Rate::from_bps(1000),
        }
    }
}

// =============================================================================
// Member Tiers
// =============================================================================

/// Yearly-spend thresholds for tier derivation. A member's spend must be
/// strictly greater than a threshold to reach that tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierThresholds {
    pub silver: Money,
    pub gold: Money,
    pub platinum: Money,
}

impl Default for TierThresholds {
    /// silver > 1,000.00; gold > 5,000.00; platinum > 10,000.00
    fn default() -> Self {
        TierThresholds {
            silver: Money::from_cents(100_000),
            gold: Money::from_cents(500_000),
            platinum: Money::from_cents(1_000_000),
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Bundle of all business configuration, injected into services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub business_hours: BusinessHours,
    pub commission: CommissionConfig,
    pub tiers: TierThresholds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hours() {
        let hours = BusinessHours::default();
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

        assert_eq!(hours.open_on(date).to_rfc3339(), "2026-03-14T10:00:00+00:00");
        assert_eq!(hours.close_on(date).to_rfc3339(), "2026-03-14T22:00:00+00:00");
        assert_eq!(hours.slot_interval(), Duration::minutes(30));
    }

    #[test]
    fn test_default_commission_rate() {
        assert_eq!(CommissionConfig::default().referral_rate.bps(), 1000);
    }
}
