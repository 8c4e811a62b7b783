//! # Database and Service Error Types
//!
//! ## Error Flow
//! ```text
//! SQLite Error (sqlx::Error)
//!      │
//!      ▼
//! DbError (this module) ← adds context and categorization
//!      │
//!      ▼
//! ServiceError (this module) ← workflow-level rejections
//!      │
//!      ▼
//! transport maps ErrorKind to its status codes
//! ```

use thiserror::Error;

use lotus_core::error::CoreError;
use lotus_core::money::Money;
use lotus_core::types::AppointmentStatus;

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
///
/// These wrap sqlx errors and provide additional context for debugging
/// and for the unique-violation fallback in the order ledger.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// `field` carries the `<table>.<column>` from the SQLite message, so
    /// the order ledger can recognize a lost insert race.
    #[error("duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    #[error("check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Input rejected before any query ran.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether this error is a unique-constraint violation on the given
    /// `<table>.<column>`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <name>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// Coarse classification of a service rejection.
///
/// Transport layers map these to their own status codes; the services
/// themselves never speak HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is malformed, violates a business rule, or
    /// references an entity that does not exist. Rejected before any
    /// transaction opens.
    Validation,
    /// The request is well-formed but loses to current state (slot taken,
    /// wrong status, mismatched payment split).
    Conflict,
    /// Current state cannot supply what the request draws on (prepaid
    /// balance, stock). Detected inside the transaction, which rolls back.
    Resource,
    /// An internal invariant was violated; the transaction was aborted.
    Invariant,
    /// Infrastructure failure.
    Internal,
}

/// Workflow-level errors raised by the transactional services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service item exists but is not bookable.
    #[error("service item {id} is inactive")]
    ServiceInactive { id: String },

    /// The technician does not offer the requested service.
    #[error("technician {technician_id} does not offer service {service_id}")]
    SkillMismatch {
        technician_id: String,
        service_id: String,
    },

    /// The technician is marked off-duty for the requested date.
    #[error("technician {technician_id} is on leave on {date}")]
    TechnicianOnLeave {
        technician_id: String,
        date: chrono::NaiveDate,
    },

    /// The window overlaps an existing pending booking.
    #[error("technician {technician_id} already has a booking in that window")]
    SlotConflict { technician_id: String },

    /// The window falls outside business hours.
    #[error("requested window is outside business hours")]
    OutsideBusinessHours,

    /// The appointment is not in a status that permits the operation.
    #[error("appointment {appointment_id} is {status:?}, cannot perform operation")]
    InvalidStatus {
        appointment_id: String,
        status: AppointmentStatus,
    },

    /// The member's prepaid balance cannot cover the declared balance part.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Money, available: Money },

    /// Not enough stock to apply the requested change.
    #[error("insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Crediting a referrer did not move their balance by the computed
    /// commission. Arithmetic cross-check; the transaction is aborted.
    #[error(
        "balance of {inviter_id} moved by {actual}, expected {expected}"
    )]
    BalanceDeltaMismatch {
        inviter_id: String,
        expected: Money,
        actual: Money,
    },

    /// The referenced source cannot back an order: the appointment is not
    /// completed, or the inventory log is not a member sale.
    #[error("invalid order source: {reason}")]
    InvalidOrderSource { reason: String },

    /// Business rule violation from lotus-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(err.into())
    }
}

impl ServiceError {
    /// Classifies the error for transport mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::ServiceInactive { .. }
            | ServiceError::SkillMismatch { .. }
            | ServiceError::OutsideBusinessHours => ErrorKind::Validation,
            ServiceError::TechnicianOnLeave { .. }
            | ServiceError::SlotConflict { .. }
            | ServiceError::InvalidStatus { .. }
            | ServiceError::InvalidOrderSource { .. } => ErrorKind::Conflict,
            ServiceError::InsufficientBalance { .. }
            | ServiceError::InsufficientStock { .. } => ErrorKind::Resource,
            ServiceError::BalanceDeltaMismatch { .. } => ErrorKind::Invariant,
            ServiceError::Core(CoreError::CommissionOutOfBounds { .. }) => ErrorKind::Invariant,
            ServiceError::Core(_) => ErrorKind::Validation,
            ServiceError::Db(DbError::NotFound { .. })
            | ServiceError::Db(DbError::InvalidInput(_)) => ErrorKind::Validation,
            ServiceError::Db(DbError::UniqueViolation { .. })
            | ServiceError::Db(DbError::CheckViolation { .. }) => ErrorKind::Conflict,
            ServiceError::Db(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Unit Tests
// =============================================================================
