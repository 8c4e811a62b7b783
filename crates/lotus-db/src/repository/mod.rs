//! # Repository Module
//!
//! Database repository implementations for the Lotus back-office.
//!
//! ## Repository Pattern
//! ```text
//! Service (booking, settlement, ...)
//!      │
//!      │  db.appointments().get(id)
//!      ▼
//! AppointmentRepository
//!      │  SQL
//!      ▼
//! SQLite
//! ```
//! Repositories keep SQL in one place and know nothing about workflows.
//! Methods that must run inside a caller's transaction take a
//! `SqliteExecutor` argument instead of using the repository's own pool;
//! the transactional services thread their `&mut *tx` through those.
//!
//! ## Available Repositories
//!
//! - [`technician::TechnicianRepository`] - Technicians and skill resolution
//! - [`schedule::ScheduleRepository`] - Per-day availability overrides
//! - [`member::MemberRepository`] - Members, balances, tiers
//! - [`catalog::CatalogRepository`] - Service items and physical products
//! - [`appointment::AppointmentRepository`] - Bookings and busy intervals
//! - [`inventory::InventoryLogRepository`] - Stock movement records
//! - [`order::OrderRepository`] - The append-only order ledger

pub mod appointment;
pub mod catalog;
pub mod inventory;
pub mod member;
pub mod order;
pub mod schedule;
pub mod technician;
