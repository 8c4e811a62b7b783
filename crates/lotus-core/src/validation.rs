//! # Validation Module
//!
//! Input validation utilities for the spa back-office.
//!
//! ## Validation Strategy
//! ```text
//! Layer 1: Transport (deserialization, type checks)
//!      │
//!      ▼
//! Layer 2: THIS MODULE - business rule validation
//!      │
//!      ▼
//! Layer 3: Database (NOT NULL, UNIQUE, CHECK, FK constraints)
//! ```
//! Each layer catches a different class of bad input; the database
//! constraints are the last line of defense for concurrent writers.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, PAYMENT_EPSILON};
use crate::types::{InventoryAction, PaymentMethod};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (member, technician, service, product).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 100 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates a member phone number.
///
/// ## Rules
/// - Must not be empty
/// - 5 to 20 characters; digits with optional leading `+`
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if phone.len() < 5 || phone.len() > 20 {
        return Err(ValidationError::OutOfRange {
            field: "phone".to_string(),
            min: 5,
            max: 20,
        });
    }

    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits (with optional leading +)".to_string(),
        });
    }

    Ok(())
}

/// Validates a UUID string format.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents.
///
/// Zero is allowed (complimentary services); negative is not.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates a service duration in minutes.
///
/// ## Rules
/// - Must be positive
/// - At most 12 hours (a single service cannot exceed the business day)
pub fn validate_duration_minutes(minutes: i64) -> ValidationResult<()> {
    if minutes <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "duration_minutes".to_string(),
        });
    }

    if minutes > 720 {
        return Err(ValidationError::OutOfRange {
            field: "duration_minutes".to_string(),
            min: 1,
            max: 720,
        });
    }

    Ok(())
}

/// Validates a booking window.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<()> {
    if end <= start {
        return Err(ValidationError::EmptyWindow {
            field: "booking window".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Payment Split
// =============================================================================

/// Validates a declared balance/cash split against the appointment price
/// and classifies the payment method.
///
/// ## Rules
/// - Neither part may be negative
/// - `balance + cash` must equal the price within [`PAYMENT_EPSILON`]
///
/// ## Example
/// ```rust
/// use lotus_core::money::Money;
/// use lotus_core::types::PaymentMethod;
/// use lotus_core::validation::validate_payment_split;
///
/// let method = validate_payment_split(
///     Money::from_cents(5000),
///     Money::from_cents(3000),
///     Money::from_cents(2000),
/// ).unwrap();
/// assert_eq!(method, PaymentMethod::Mixed);
/// ```
pub fn validate_payment_split(
    price: Money,
    balance: Money,
    cash: Money,
) -> CoreResult<PaymentMethod> {
    if balance.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "balance payment".to_string(),
        }
        .into());
    }
    if cash.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "cash payment".to_string(),
        }
        .into());
    }

    let declared = balance + cash;
    if (declared - price).abs() > PAYMENT_EPSILON {
        return Err(CoreError::PaymentSplitMismatch {
            declared,
            expected: price,
        });
    }

    let method = if cash.is_zero() {
        PaymentMethod::Balance
    } else if balance.is_zero() {
        PaymentMethod::Cash
    } else {
        PaymentMethod::Mixed
    };

    Ok(method)
}

// =============================================================================
// Inventory
// =============================================================================

/// Validates that a stock change's sign matches its declared action.
///
/// ## Rules
/// - `Restock`: change must be positive
/// - `Sale`: change must be negative
/// - `Adjustment`: change must be non-zero (either direction)
pub fn validate_inventory_change(action: InventoryAction, change: i64) -> CoreResult<()> {
    let ok = match action {
        InventoryAction::Restock => change > 0,
        InventoryAction::Sale => change < 0,
        InventoryAction::Adjustment => change != 0,
    };

    if !ok {
        let action = match action {
            InventoryAction::Restock => "restock",
            InventoryAction::Sale => "sale",
            InventoryAction::Adjustment => "adjustment",
        };
        return Err(CoreError::InvalidInventoryChange {
            action: action.to_string(),
            change,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
