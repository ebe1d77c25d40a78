//! # Validation Module
//!
//! Input validation for catalog writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (before any SQL runs)                            │
//! │  ├── name / sku format                                                 │
//! │  ├── price > 0, threshold ≥ 0, opening stock ≥ 0                       │
//! │  └── deposit agrees with the returnable flag                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── UNIQUE (tenant_id, sku), UNIQUE (tenant_id, name)                 │
//! │  ├── CHECK quantity >= 0, bottles_outstanding >= 0                     │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use uuid::Uuid;

use crate::error::ValidationError;
use crate::types::{NewProduct, Product};
use crate::SKU_MAX_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const NAME_MAX_LEN: usize = 255;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 20 characters
/// - Only letters, digits, hyphens and underscores
///
/// ```rust
/// use stockledger_core::validation::validate_sku;
///
/// assert!(validate_sku("LAGER-50").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > SKU_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: SKU_MAX_LEN,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > NAME_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: NAME_MAX_LEN,
        });
    }

    Ok(())
}

/// Product name: 1..=255 characters after trimming.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

/// Category name: 1..=255 characters after trimming.
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_name("category name", name)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Price must be strictly positive.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Counts that may be zero but never negative.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Returnable products carry a positive deposit, all others carry none.
///
/// ```rust
/// use stockledger_core::validation::validate_deposit;
///
/// assert!(validate_deposit(true, 200).is_ok());
/// assert!(validate_deposit(true, 0).is_err());
/// assert!(validate_deposit(false, 0).is_ok());
/// assert!(validate_deposit(false, 50).is_err());
/// ```
pub fn validate_deposit(is_returnable: bool, deposit_cents: i64) -> ValidationResult<()> {
    match (is_returnable, deposit_cents) {
        (true, d) if d <= 0 => Err(ValidationError::DepositMismatch {
            expected: "greater than 0",
            kind: "returnable",
        }),
        (false, d) if d != 0 => Err(ValidationError::DepositMismatch {
            expected: "0",
            kind: "non-returnable",
        }),
        _ => Ok(()),
    }
}

/// Validates a UUID string.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates creation input. A missing SKU is fine (it gets generated).
pub fn validate_new_product(new: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&new.name)?;
    if let Some(sku) = &new.sku {
        validate_sku(sku)?;
    }
    validate_price_cents(new.price_cents)?;
    validate_non_negative("quantity", new.quantity)?;
    validate_non_negative("low_stock_threshold", new.low_stock_threshold)?;
    validate_deposit(new.is_returnable, new.deposit_cents)?;
    Ok(())
}

/// Validates a full product row, e.g. after applying an update.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_sku(&product.sku)?;
    validate_price_cents(product.price_cents)?;
    validate_non_negative("low_stock_threshold", product.low_stock_threshold)?;
    validate_deposit(product.is_returnable, product.deposit_cents)?;
    Ok(())
}

/// Generates a SKU for products created without one.
///
/// The first 20 characters of a UUID v4: unique enough per tenant, and any
/// collision surfaces as a `DuplicateKey` from the store.
pub fn generate_sku() -> String {
    Uuid::new_v4().to_string()[..SKU_MAX_LEN].to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
