//! # Validation Module
//!
//! Request validation run before any workflow touches storage.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (axum Json extractor)                        │
//! │  └── Types and required fields                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Ranges, lengths, non-empty line lists                             │
//! │  └── Pure: same request, same verdict                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Workflow (inside the transaction)                            │
//! │  └── References, ownership, stock availability                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── CHECK (quantity >= 0), UNIQUE, FOREIGN KEY                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::dto::{
    CreatePaymentRequest, CreateReturnRequest, CreateSaleRequest, ProvisionStockRequest,
    StockAdjustmentRequest, UpdateReturnRequest, UpdateSaleRequest,
};
use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Limits
// =============================================================================

/// Largest quantity on one sale or return line.
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// Largest quantity on one manual stock adjustment.
pub const MAX_ADJUSTMENT_QUANTITY: i64 = 100_000;

/// Largest single payment, refund or return unit price.
pub const MAX_AMOUNT: i64 = 100_000_000;

pub const MAX_RECEIPT_NUMBER_LEN: usize = 50;
pub const MAX_REASON_LEN: usize = 500;
pub const MAX_PAYMENT_REFERENCE_LEN: usize = 100;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a database id supplied by the client.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a whole-unit quantity in `1..=max`.
pub fn validate_quantity(field: &str, qty: i64, max: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max,
        });
    }

    Ok(())
}

/// Validates an optional text field against a maximum length (in characters).
pub fn validate_max_len(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates a strictly positive amount no larger than [`MAX_AMOUNT`].
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if amount.minor_units() > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a sale creation request.
///
/// ## Rules
/// - company and branch ids positive, customer id positive when given
/// - at least one line
/// - each line: product id positive, quantity 1..=10 000
/// - price override ≥ 0 (zero means "use the list price")
/// - receipt number at most 50 characters
pub fn validate_create_sale(req: &CreateSaleRequest) -> ValidationResult<()> {
    validate_id("companyId", req.company_id)?;
    validate_id("branchId", req.branch_id)?;
    if let Some(customer_id) = req.customer_id {
        validate_id("customerId", customer_id)?;
    }
    validate_max_len("receiptNumber", req.receipt_number.as_deref(), MAX_RECEIPT_NUMBER_LEN)?;

    if req.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    for line in &req.lines {
        validate_id("productId", line.product_id)?;
        validate_quantity("quantity", line.quantity, MAX_LINE_QUANTITY)?;
        if let Some(price) = line.unit_price {
            if price.is_negative() {
                return Err(ValidationError::OutOfRange {
                    field: "unitPrice".to_string(),
                    min: 0,
                    max: MAX_AMOUNT,
                });
            }
        }
    }

    Ok(())
}

pub fn validate_update_sale(req: &UpdateSaleRequest) -> ValidationResult<()> {
    validate_max_len("receiptNumber", req.receipt_number.as_deref(), MAX_RECEIPT_NUMBER_LEN)
}

/// Validates a return creation request.
///
/// ## Rules
/// - refund amount in `1..=MAX_AMOUNT`
/// - reason at most 500 characters
/// - at least one line; quantity 1..=10 000; unit price 0..=MAX_AMOUNT
pub fn validate_create_return(req: &CreateReturnRequest) -> ValidationResult<()> {
    validate_id("saleId", req.sale_id)?;
    validate_id("actorUserId", req.actor_user_id)?;
    validate_amount("refundAmount", req.refund_amount)?;
    validate_max_len("reason", req.reason.as_deref(), MAX_REASON_LEN)?;

    if req.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    for line in &req.lines {
        validate_id("productId", line.product_id)?;
        validate_quantity("quantity", line.quantity, MAX_LINE_QUANTITY)?;
        let price = line.unit_price.minor_units();
        if !(0..=MAX_AMOUNT).contains(&price) {
            return Err(ValidationError::OutOfRange {
                field: "unitPrice".to_string(),
                min: 0,
                max: MAX_AMOUNT,
            });
        }
    }

    Ok(())
}

pub fn validate_update_return(req: &UpdateReturnRequest) -> ValidationResult<()> {
    validate_max_len("reason", req.reason.as_deref(), MAX_REASON_LEN)?;
    if let Some(amount) = req.refund_amount {
        validate_amount("refundAmount", amount)?;
    }
    Ok(())
}

pub fn validate_create_payment(req: &CreatePaymentRequest) -> ValidationResult<()> {
    validate_id("saleId", req.sale_id)?;
    validate_id("paymentMethodId", req.payment_method_id)?;
    validate_amount("amount", req.amount)?;
    validate_max_len("reference", req.reference.as_deref(), MAX_PAYMENT_REFERENCE_LEN)
}

/// Validates a manual stock adjustment.
///
/// The reason is mandatory: an unexplained movement defeats the ledger.
pub fn validate_stock_adjustment(req: &StockAdjustmentRequest) -> ValidationResult<()> {
    validate_quantity("quantity", req.quantity, MAX_ADJUSTMENT_QUANTITY)?;
    if req.reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    validate_max_len("reason", Some(&req.reason), MAX_REASON_LEN)
}

pub fn validate_provision_stock(req: &ProvisionStockRequest) -> ValidationResult<()> {
    validate_id("productId", req.product_id)?;
    validate_id("branchId", req.branch_id)?;
    if !(0..=MAX_ADJUSTMENT_QUANTITY).contains(&req.quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_ADJUSTMENT_QUANTITY,
        });
    }
    if req.minimum_threshold < 0 {
        return Err(ValidationError::OutOfRange {
            field: "minimumThreshold".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
