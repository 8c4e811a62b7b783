//! # Error Types
//!
//! Domain-specific error types for lotus-core.
//!
//! ## Error Hierarchy
//! ```text
//! lotus-core errors (this file)
//! ├── CoreError        - Business rule violations
//! └── ValidationError  - Input validation failures
//!
//! lotus-db errors (separate crate)
//! ├── DbError          - Database operation failures
//! └── ServiceError     - Transactional workflow failures
//!
//! Flow: ValidationError → CoreError → ServiceError → transport
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, amounts)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
///
/// These are pure-logic failures; anything needing database context
/// (missing rows, conflicts) is raised by lotus-db instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Declared payment split does not add up to the appointment price.
    ///
    /// The split must match within one cent; see
    /// [`crate::money::PAYMENT_EPSILON`].
    #[error("payment split {declared} does not match price {expected}")]
    PaymentSplitMismatch { declared: Money, expected: Money },

    /// A computed commission fell outside `0 ≤ commission ≤ paid`.
    ///
    /// This indicates a configuration or arithmetic defect, not bad user
    /// input; callers abort the settlement rather than clamping.
    #[error("commission {commission} out of bounds for paid amount {paid}")]
    CommissionOutOfBounds { commission: Money, paid: Money },

    /// Stock movement direction does not match the declared action
    /// (e.g. a positive change on a sale).
    #[error("inventory change {change} is invalid for action '{action}'")]
    InvalidInventoryChange { action: String, change: i64 },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs, so bad input never reaches a
/// transaction.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Time window is inverted or empty.
    #[error("{field}: end must be after start")]
    EmptyWindow { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
