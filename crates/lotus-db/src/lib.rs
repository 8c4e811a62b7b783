//! # lotus-db: Persistence Layer for the Lotus Spa Back-Office
//!
//! SQLite storage, repositories and the transactional services that
//! implement the scheduling and settlement workflows.
//!
//! ## Architecture Position
//! ```text
//! transport (HTTP, CLI, ...)        ← external collaborator
//!      │
//!      ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  lotus-db (THIS CRATE)                  │
//! │                                                         │
//! │  services      booking, settlement, ledger, inventory,  │
//! │                availability                             │
//! │  repositories  one per aggregate, SQL lives here        │
//! │  pool          SqlitePool + embedded migrations         │
//! └─────────────────────────────────────────────────────────┘
//!      │
//!      ▼
//! lotus-core (pure business logic)
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use lotus_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("lotus.db")).await?;
//! let partition = db.availability()
//!     .available_technicians(&service_id, start)
//!     .await?;
//! let appointment = db.booking().book(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ErrorKind, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::appointment::AppointmentRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::inventory::InventoryLogRepository;
pub use repository::member::MemberRepository;
pub use repository::order::OrderRepository;
pub use repository::schedule::ScheduleRepository;
pub use repository::technician::TechnicianRepository;

// Service re-exports
pub use service::availability::AvailabilityService;
pub use service::booking::{BookingRequest, BookingService};
pub use service::inventory::{InventoryService, StockChangeOutcome, StockChangeRequest};
pub use service::ledger::{InventorySaleEvent, OrderLedger, OrderSource, ServiceOrderEvent};
pub use service::settlement::{SettlementEngine, SettlementOutcome, SettlementRequest};
