//! # Lotus Core
//!
//! Pure business logic for the Lotus spa back-office: money arithmetic,
//! availability resolution, member tiers and input validation.
//!
//! ## Architecture
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      lotus-core                            │
//! │                                                            │
//! │  money         Money / Rate, integer-cent arithmetic       │
//! │  config        business hours, commission, tier thresholds │
//! │  types         domain entities and status enums            │
//! │  availability  overlap math, partitioning, slot grids      │
//! │  validation    input validation before any transaction     │
//! │  error         CoreError / ValidationError                 │
//! └────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//!                 lotus-db (persistence + services)
//! ```
//!
//! ## Golden Rule
//! This crate performs NO I/O. Every function is deterministic given its
//! inputs, so the scheduling and settlement math is testable without a
//! database. The optional `sqlx` feature adds column mappings for the
//! types; it never adds queries.

pub mod availability;
pub mod config;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// Re-export the most commonly used items at the crate root.
pub use availability::{
    day_slot_grid, overlaps, partition_technicians, AvailabilityPartition, BusyInterval, Slot,
    SlotStatus, UnavailableReason, UnavailableTechnician,
};
pub use config::{BusinessHours, CommissionConfig, Settings, TierThresholds};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate, PAYMENT_EPSILON};
pub use types::{
    Appointment, AppointmentStatus, FissionLog, InventoryAction, InventoryLog, Member, MemberTier,
    Order, OrderKind, PaymentMethod, PhysicalProduct, ScheduleEntry, ServiceItem, SkillSet,
    Technician, TechnicianStatus,
};
