//! # Domain Types
//!
//! Core domain types for the spa back-office.
//!
//! ```text
//! Technician ──┐
//!              ├──► Appointment ──► settlement ──► Member (balance, tier)
//! ServiceItem ─┘         │                            │
//!                        ▼                            ▼
//!                      Order ◄── InventoryLog     FissionLog
//! ```
//!
//! Monetary fields are stored as integer cents (`*_cents: i64`); accessor
//! methods wrap them in [`Money`]. Status fields are real enums, persisted
//! as lowercase TEXT via sqlx derives (behind the `sqlx` feature).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::TierThresholds;
use crate::money::Money;

// =============================================================================
// Skill Set
// =============================================================================

/// Canonical set of service item ids a technician can perform.
///
/// Upstream input may mix service ids and legacy service names; the write
/// path resolves that ambiguity once (see the technician repository) and
/// only canonical ids are stored, so the matching algorithm never sees a
/// name. Stored as a JSON array in a TEXT column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSet(BTreeSet<String>);

impl SkillSet {
    pub fn new() -> Self {
        SkillSet(BTreeSet::new())
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SkillSet(ids.into_iter().map(Into::into).collect())
    }

    /// Whether the technician has the given service skill.
    pub fn contains(&self, service_id: &str) -> bool {
        self.0.contains(service_id)
    }

    pub fn insert(&mut self, service_id: impl Into<String>) {
        self.0.insert(service_id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

#[cfg(feature = "sqlx")]
mod skill_set_sqlx {
    //! TEXT (JSON array) column mapping for [`SkillSet`].

    use super::SkillSet;
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
    use std::collections::BTreeSet;

    impl sqlx::Type<Sqlite> for SkillSet {
        fn type_info() -> SqliteTypeInfo {
            <String as sqlx::Type<Sqlite>>::type_info()
        }
    }

    impl<'r> sqlx::Decode<'r, Sqlite> for SkillSet {
        fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
            let raw = <String as sqlx::Decode<Sqlite>>::decode(value)?;
            let ids: BTreeSet<String> = serde_json::from_str(&raw)?;
            Ok(SkillSet(ids))
        }
    }

    impl<'q> sqlx::Encode<'q, Sqlite> for SkillSet {
        fn encode_by_ref(
            &self,
            buf: &mut Vec<SqliteArgumentValue<'q>>,
        ) -> Result<IsNull, BoxDynError> {
            let json = serde_json::to_string(&self.0)?;
            buf.push(SqliteArgumentValue::Text(json.into()));
            Ok(IsNull::No)
        }
    }
}

// =============================================================================
// Technician
// =============================================================================

/// On/off-duty state of a technician.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TechnicianStatus {
    Free,
    Booked,
    Leave,
}

/// A technician with a canonical skill set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Technician {
    pub id: String,
    pub name: String,
    pub skills: SkillSet,
    pub status: TechnicianStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Service Item
// =============================================================================

/// A bookable spa service with price and duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServiceItem {
    pub id: String,
    pub name: String,
    /// Service length in minutes; determines the appointment end time.
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.duration_minutes)
    }
}

// =============================================================================
// Member
// =============================================================================

/// Member classification derived from cumulative yearly spend.
///
/// Ordering matters: [`MemberTier::rank`] is used to guarantee monotonic
/// upgrades (settlement never downgrades a tier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MemberTier {
    Basic,
    Silver,
    Gold,
    Platinum,
}

impl MemberTier {
    /// Derives the tier for a yearly spend. Thresholds are strict
    /// (spend must exceed the threshold to reach the tier).
    pub fn for_spend(spend: Money, thresholds: &TierThresholds) -> Self {
        if spend > thresholds.platinum {
            MemberTier::Platinum
        } else if spend > thresholds.gold {
            MemberTier::Gold
        } else if spend > thresholds.silver {
            MemberTier::Silver
        } else {
            MemberTier::Basic
        }
    }

    /// Numeric rank for monotonic-upgrade comparisons.
    pub const fn rank(&self) -> u8 {
        match self {
            MemberTier::Basic => 0,
            MemberTier::Silver => 1,
            MemberTier::Gold => 2,
            MemberTier::Platinum => 3,
        }
    }
}

/// A customer profile with prepaid balance and referral metadata.
///
/// `referrer_id` is non-cyclic by construction: a referrer must be a
/// pre-existing member at creation time and is never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Member {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub tier: MemberTier,
    pub yearly_spend_cents: i64,
    /// Prepaid balance; never negative (settlement aborts before overdraw).
    pub balance_cents: i64,
    pub referrer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    #[inline]
    pub fn yearly_spend(&self) -> Money {
        Money::from_cents(self.yearly_spend_cents)
    }
}

// =============================================================================
// Schedule Entry
// =============================================================================

/// Explicit per-day availability override for a technician.
///
/// Absence of a row for a (technician, date) pair means available; at most
/// one row per pair exists (UNIQUE constraint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ScheduleEntry {
    pub id: String,
    pub technician_id: String,
    pub date: NaiveDate,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Appointment
// =============================================================================

/// Appointment lifecycle state.
///
/// Transitions are one-directional except `Waiting → Pending` (waitlist
/// promotion); any non-terminal state may move to `Cancelled`. `Waitlist`
/// is the cancel-cleanup state for appointments whose technician was
/// removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Waiting,
    Completed,
    Cancelled,
    Waitlist,
}

/// How a settlement was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Balance,
    Cash,
    Mixed,
}

/// A booking with pricing and (after settlement) payment details.
///
/// Invariant at creation: `end_time = start_time + service duration`.
/// `actual_price_cents` starts equal to the service price and may be
/// discounted manually before completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Appointment {
    pub id: String,
    pub member_id: String,
    pub technician_id: String,
    pub service_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub origin_price_cents: i64,
    pub actual_price_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub paid_balance_cents: Option<i64>,
    pub paid_cash_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    #[inline]
    pub fn actual_price(&self) -> Money {
        Money::from_cents(self.actual_price_cents)
    }

    #[inline]
    pub fn origin_price(&self) -> Money {
        Money::from_cents(self.origin_price_cents)
    }
}

// =============================================================================
// Physical Products & Inventory
// =============================================================================

/// A retail product sold over the counter (not a bookable service).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PhysicalProduct {
    pub id: String,
    pub name: String,
    pub retail_price_cents: i64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhysicalProduct {
    #[inline]
    pub fn retail_price(&self) -> Money {
        Money::from_cents(self.retail_price_cents)
    }
}

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum InventoryAction {
    Restock,
    Sale,
    Adjustment,
}

/// A stock movement record. `Sale` logs with a member attached are the
/// source events for physical orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryLog {
    pub id: String,
    pub product_id: String,
    pub action: InventoryAction,
    /// Signed quantity delta: negative for sales, positive for restocks.
    pub change_amount: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub member_id: Option<String>,
    /// Explicit sale total; when absent, `-change_amount * retail price`
    /// is used at order-creation time.
    pub sale_amount_cents: Option<i64>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order Ledger
// =============================================================================

/// Which kind of source event an order materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Service,
    Physical,
}

/// An immutable ledger row materializing a completed appointment or an
/// inventory sale. Exactly one of `appointment_id` / `inventory_log_id`
/// is set (CHECK constraint); each is UNIQUE so duplicate submissions
/// converge to one row. `created_at` is pinned to the source event's
/// completion time, not the insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub member_id: String,
    pub inviter_id: Option<String>,
    pub paid_cents: i64,
    pub commission_cents: i64,
    pub kind: OrderKind,
    pub appointment_id: Option<String>,
    pub inventory_log_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn commission(&self) -> Money {
        Money::from_cents(self.commission_cents)
    }
}

/// A referral commission payout record. Written only when the computed
/// commission is positive and within bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FissionLog {
    pub id: String,
    pub inviter_id: String,
    pub invitee_id: String,
    pub commission_cents: i64,
    pub appointment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
